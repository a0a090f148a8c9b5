mod common;

use common::*;
use ocb::stream::{decode_events, decode_file_events, Endianness};
use ocb::Error;

fn results_of(words: &[u32]) -> Vec<ocb::Result<ocb::event::OCBEvent>> {
    decode_events(words.iter().copied().map(Ok)).collect()
}

#[test]
fn minimal_one_hit_event() {
    // Spelled-out raw values; arrival order as produced by the hardware.
    #[rustfmt::skip]
    let words: [u32; 9] = [
        0x80000001, // OCB header, event 1
        0x00100000, // gate header, board 1, type 0
        0x10000010, // GTS header, tag 0x10
        0x20100000, // hit time, channel 1, hit 0, rising, t 0
        0x20104001, // hit time, channel 1, hit 0, falling, t 1
        0x40000010, // GTS trailer 1, tag 0x10
        0x50000005, // GTS trailer 2, gts_time 5
        0xD0100000, // FEB trailer, board 1
        0x90000000, // OCB trailer
    ];

    let events: Vec<_> = decode_file_events(&le_bytes(&words)[..], Endianness::Little)
        .map(|zult| zult.unwrap())
        .collect();

    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.event_number, 1);
    assert!(event.feb(0).is_none());
    let feb = event.feb(1).expect("FEB 1 should have data");

    assert_eq!(feb.hit_times.len(), 1);
    let record = &feb.hit_times[0];
    assert_eq!((record.channel_id, record.hit_id), (1, 0));
    assert_eq!(record.rise.time, 0);
    assert_eq!(record.fall.unwrap().time, 1);
    assert_eq!(record.rise.gts_tag, 0x10);
    assert_eq!(record.fall.unwrap().gts_tag, 0x10);
    assert!(feb.hit_amplitudes.is_empty());
}

#[test]
fn late_hit_lands_in_previous_interval() {
    let words = [
        ocb_header(0, 0, 2),
        gate_header0(1, 0, 0),
        gts_header(0x10),
        hit_time(1, 0, 0, 0, 100),
        gts_trailer1(0x10),
        gts_trailer2(5),
        gts_header(0x11),
        // tag 0 matches 0x10 & 3, not 0x11 & 3
        hit_time(1, 0, 0, 1, 130),
        gts_trailer1(0x11),
        gts_trailer2(6),
        feb_trailer(1),
        ocb_trailer(0, 0, 0),
    ];

    let events: Vec<_> = results_of(&words)
        .into_iter()
        .map(|zult| zult.unwrap())
        .collect();
    let feb = events[0].feb(1).unwrap();

    assert_eq!(feb.hit_times.len(), 1);
    let record = &feb.hit_times[0];
    assert_eq!(record.rise.gts_tag, 0x10, "hit belongs to interval 0x10");
    assert_eq!(record.fall.unwrap().gts_tag, 0x10);
    assert_eq!(record.fall.unwrap().time, 130);
}

#[test]
fn envelope_mismatch_aborts_packet_but_not_stream() {
    let mut words = vec![ocb_header(2, 0, 1), ocb_trailer(3, 0, 0)];
    words.extend_from_slice(&[ocb_header(0, 0, 9), ocb_trailer(0, 0, 0)]);

    let zults = results_of(&words);
    assert_eq!(zults.len(), 2);
    assert!(matches!(zults[0], Err(Error::OCBEnvelopeMismatch { .. })));
    assert_eq!(zults[1].as_ref().unwrap().event_number, 9);
}

#[test]
fn event_done_mismatch_is_a_warning_only() {
    let words = [
        ocb_header(0, 0, 1),
        gate_header0(1, 0, 0),
        gts_header(0x10),
        hit_time(1, 0, 0, 0, 0),
        hit_time(1, 0, 0, 1, 1),
        gts_trailer1(0x10),
        gts_trailer2(5),
        event_done(1, 0, 99),
        feb_trailer(1),
        ocb_trailer(0, 0, 0),
    ];

    let events: Vec<_> = results_of(&words)
        .into_iter()
        .map(|zult| zult.unwrap())
        .collect();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].feb(1).unwrap().hit_times.len(), 1);
}

#[test]
fn duplicate_rising_edge_aborts_event() {
    let words = [
        ocb_header(0, 0, 1),
        gate_header0(1, 0, 0),
        gts_header(0x10),
        hit_time(1, 0, 0, 0, 10),
        hit_time(1, 0, 0, 0, 11),
        gts_trailer1(0x10),
        gts_trailer2(5),
        feb_trailer(1),
        ocb_trailer(0, 0, 0),
    ];

    let zults = results_of(&words);
    assert_eq!(zults.len(), 1);
    assert!(matches!(
        zults[0],
        Err(Error::DuplicateRisingEdge {
            channel_id: 1,
            hit_id: 0
        })
    ));
}

#[test]
fn trailer_error_bit_is_reported() {
    let words = [ocb_header(0, 0, 1), ocb_trailer(0, 0, 1 << 15)];

    let events: Vec<_> = results_of(&words)
        .into_iter()
        .map(|zult| zult.unwrap())
        .collect();
    let event = &events[0];
    assert!(event.errors[15]);
    assert_eq!(
        event.error_descriptions().collect::<Vec<_>>(),
        ["Gate open timeout"]
    );
}

#[test]
fn gains_are_matched_per_channel() {
    let words = [
        ocb_header(0, 0, 1),
        gate_header0(2, 0, 0),
        hold_time(2, 0x40),
        gts_header(0x20),
        hit_time(4, 0, 0, 0, 10),
        hit_time(4, 0, 0, 1, 30),
        hit_amplitude(4, 0, 0, 1, 800),
        hit_amplitude(4, 0, 0, 2, 801),
        gts_trailer1(0x20),
        gts_trailer2(7),
        feb_trailer(2),
        ocb_trailer(0, 0, 0),
    ];

    let events: Vec<_> = results_of(&words)
        .into_iter()
        .map(|zult| zult.unwrap())
        .collect();
    let feb = events[0].feb(2).unwrap();
    assert_eq!(feb.hold_time, Some(0x40));
    assert_eq!(feb.hit_amplitudes.len(), 1);
    let record = &feb.hit_amplitudes[0];
    assert_eq!(record.lg.unwrap().value, 800);
    assert_eq!(record.hg.unwrap().value, 801);
    assert_eq!(record.lg.unwrap().gts_tag, 0x20);
}

#[test]
fn two_boards_in_one_event() {
    let words = [
        ocb_header(0, 0, 3),
        gate_header0(0, 0, 0),
        gts_header(0x30),
        hit_time(1, 0, 0, 0, 1),
        hit_time(1, 0, 0, 1, 2),
        gts_trailer1(0x30),
        gts_trailer2(1),
        feb_trailer(0),
        gate_header0(5, 0, 0),
        gts_header(0x30),
        hit_time(2, 0, 0, 0, 3),
        hit_time(2, 0, 0, 1, 4),
        gts_trailer1(0x30),
        gts_trailer2(1),
        feb_trailer(5),
        ocb_trailer(0, 0, 0),
    ];

    let events: Vec<_> = results_of(&words)
        .into_iter()
        .map(|zult| zult.unwrap())
        .collect();
    let event = &events[0];
    assert_eq!(event.num_febs_fired(), 2);
    assert_eq!(event.feb(0).unwrap().board_id, 0);
    assert_eq!(event.feb(5).unwrap().board_id, 5);
    for (index, slot) in event.febs.iter().enumerate() {
        if let Some(feb) = slot {
            assert_eq!(usize::from(feb.board_id), index);
        }
    }
}

#[test]
fn decoding_is_idempotent_across_packets() {
    let packet = [
        ocb_header(0, 0, 4),
        gate_header0(1, 0, 0),
        gts_header(0x10),
        hit_time(1, 0, 0, 0, 0),
        hit_time(1, 0, 0, 1, 1),
        gts_trailer1(0x10),
        gts_trailer2(5),
        feb_trailer(1),
        ocb_trailer(0, 0, 0),
    ];
    let mut words = packet.to_vec();
    words.extend_from_slice(&packet);

    let events: Vec<_> = results_of(&words)
        .into_iter()
        .map(|zult| zult.unwrap())
        .collect();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0], events[1]);
}

#[test]
fn big_endian_stream() {
    let words = [ocb_header(0, 0, 6), ocb_trailer(0, 0, 0)];
    let bytes: Vec<u8> = words.iter().flat_map(|word| word.to_be_bytes()).collect();

    let events: Vec<_> = decode_file_events(&bytes[..], Endianness::Big)
        .map(|zult| zult.unwrap())
        .collect();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_number, 6);
}

#[test]
fn events_serialize_to_json_and_back() {
    let words = [
        ocb_header(0, 0, 5),
        gate_header0(1, 0, 0),
        gts_header(0x10),
        hit_time(1, 0, 0, 0, 0),
        hit_time(1, 0, 0, 1, 1),
        gts_trailer1(0x10),
        gts_trailer2(5),
        feb_trailer(1),
        ocb_trailer(0, 0, 0),
    ];
    let events: Vec<_> = results_of(&words)
        .into_iter()
        .map(|zult| zult.unwrap())
        .collect();

    let json = serde_json::to_string(&events[0]).unwrap();
    let back: ocb::event::OCBEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(back, events[0]);
}
