//! Decoding of single 32-bit readout words.
//!
//! Every word in the stream carries its kind in the top 4 bits (the *word
//! id*); the remaining 28 bits are unpacked per kind. The decoder only
//! validates the word id; semantic checks on sub-fields happen where the
//! word is consumed.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub type BoardId = u8;
pub type ChannelId = u8;
pub type GtsTag = u32;

/// Extract `length` bits of `raw` starting at bit `start` (bit 0 = lsb).
fn field(raw: u32, start: u32, length: u32) -> u32 {
    (raw >> start) & ((1u32 << length) - 1)
}

/// Word id, i.e. the most significant 4 bits of a raw word.
#[must_use]
pub fn word_id(raw: u32) -> u8 {
    field(raw, 28, 4) as u8
}

/// A single decoded readout word.
///
/// Words are ephemeral values: the stream driver decodes each raw word once
/// and the assemblers match on the variants.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Word {
    GateHeader(GateHeader),
    GTSHeader(GTSHeader),
    HitTime(HitTime),
    HitAmplitude(HitAmplitude),
    GTSTrailer1(GTSTrailer1),
    GTSTrailer2(GTSTrailer2),
    GateTrailer(GateTrailer),
    GateTime(GateTime),
    OCBPacketHeader(OCBPacketHeader),
    OCBPacketTrailer(OCBPacketTrailer),
    HoldTime(HoldTime),
    EventDone(EventDone),
    FEBDataPacketTrailer(FEBDataPacketTrailer),
    /// Housekeeping word (id 0xE); opaque at this level.
    Housekeeping(u32),
    /// Special word (id 0xF); opaque at this level.
    Special(u32),
}

impl Word {
    /// Decode a raw 32-bit word into its tagged variant.
    ///
    /// # Errors
    /// [`Error::InvalidWord`] if the word id is not a known kind (id 0xA is
    /// reserved by the hardware).
    pub fn decode(raw: u32) -> Result<Word> {
        Ok(match word_id(raw) {
            0x0 => Word::GateHeader(GateHeader::decode(raw)),
            0x1 => Word::GTSHeader(GTSHeader::decode(raw)),
            0x2 => Word::HitTime(HitTime::decode(raw)),
            0x3 => Word::HitAmplitude(HitAmplitude::decode(raw)),
            0x4 => Word::GTSTrailer1(GTSTrailer1::decode(raw)),
            0x5 => Word::GTSTrailer2(GTSTrailer2::decode(raw)),
            0x6 => Word::GateTrailer(GateTrailer::decode(raw)),
            0x7 => Word::GateTime(GateTime::decode(raw)),
            0x8 => Word::OCBPacketHeader(OCBPacketHeader::decode(raw)),
            0x9 => Word::OCBPacketTrailer(OCBPacketTrailer::decode(raw)),
            0xB => Word::HoldTime(HoldTime::decode(raw)),
            0xC => Word::EventDone(EventDone::decode(raw)),
            0xD => Word::FEBDataPacketTrailer(FEBDataPacketTrailer::decode(raw)),
            0xE => Word::Housekeeping(raw),
            0xF => Word::Special(raw),
            id => return Err(Error::InvalidWord { id }),
        })
    }
}

impl Display for Word {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Word::GateHeader(w) => w.fmt(f),
            Word::GTSHeader(w) => w.fmt(f),
            Word::HitTime(w) => w.fmt(f),
            Word::HitAmplitude(w) => w.fmt(f),
            Word::GTSTrailer1(w) => w.fmt(f),
            Word::GTSTrailer2(w) => w.fmt(f),
            Word::GateTrailer(w) => w.fmt(f),
            Word::GateTime(w) => w.fmt(f),
            Word::OCBPacketHeader(w) => w.fmt(f),
            Word::OCBPacketTrailer(w) => w.fmt(f),
            Word::HoldTime(w) => w.fmt(f),
            Word::EventDone(w) => w.fmt(f),
            Word::FEBDataPacketTrailer(w) => w.fmt(f),
            Word::Housekeeping(raw) => write!(f, "Housekeeping {{ raw: {raw:#010x} }}"),
            Word::Special(raw) => write!(f, "Special {{ raw: {raw:#010x} }}"),
        }
    }
}

/// Opens a FEB packet.
///
/// `header_type` selects two layouts: type 0 carries the gate type and gate
/// number, type 1 the gate time measured from the GTS clock. Fields of the
/// other layout decode to zero.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateHeader {
    pub board_id: BoardId,
    pub header_type: u8,
    /// Valid for `header_type == 0`.
    pub gate_type: u8,
    /// Valid for `header_type == 0`.
    pub gate_number: u16,
    /// Valid for `header_type == 1`.
    pub gate_time_from_gts: u16,
}

impl GateHeader {
    #[must_use]
    pub fn decode(raw: u32) -> Self {
        let header_type = field(raw, 19, 1) as u8;
        let mut header = GateHeader {
            board_id: field(raw, 20, 8) as u8,
            header_type,
            gate_type: 0,
            gate_number: 0,
            gate_time_from_gts: 0,
        };
        if header_type == 0 {
            header.gate_type = field(raw, 16, 3) as u8;
            header.gate_number = field(raw, 0, 16) as u16;
        } else {
            header.gate_time_from_gts = field(raw, 0, 11) as u16;
        }
        header
    }
}

impl Display for GateHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.header_type == 0 {
            write!(
                f,
                "GateHeader {{ board: {}, gate_type: {}, gate_number: {} }}",
                self.board_id, self.gate_type, self.gate_number
            )
        } else {
            write!(
                f,
                "GateHeader {{ board: {}, gate_time_from_gts: {} }}",
                self.board_id, self.gate_time_from_gts
            )
        }
    }
}

/// Opens a GTS interval within a FEB packet.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct GTSHeader {
    pub gts_tag: GtsTag,
}

impl GTSHeader {
    #[must_use]
    pub fn decode(raw: u32) -> Self {
        GTSHeader {
            gts_tag: field(raw, 0, 28),
        }
    }
}

impl Display for GTSHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GTSHeader {{ tag: {:#x} }}", self.gts_tag)
    }
}

/// One edge of a hit pulse.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitTime {
    pub channel_id: ChannelId,
    pub hit_id: u8,
    /// Low 2 bits of the GTS tag the hit belongs to; used for late-arrival
    /// routing.
    pub tag_id: u8,
    /// 0 = rising, 1 = falling.
    pub edge: u8,
    pub hit_time: u16,
}

impl HitTime {
    pub const RISING: u8 = 0;
    pub const FALLING: u8 = 1;

    #[must_use]
    pub fn decode(raw: u32) -> Self {
        HitTime {
            channel_id: field(raw, 20, 8) as u8,
            hit_id: field(raw, 17, 3) as u8,
            tag_id: field(raw, 15, 2) as u8,
            edge: field(raw, 14, 1) as u8,
            hit_time: field(raw, 0, 13) as u16,
        }
    }

    #[must_use]
    pub fn is_rising(&self) -> bool {
        self.edge == Self::RISING
    }
}

impl Display for HitTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "HitTime {{ channel: {}, hit: {}, tag: {}, edge: {}, time: {} }}",
            self.channel_id, self.hit_id, self.tag_id, self.edge, self.hit_time
        )
    }
}

/// One amplitude sample of a hit.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitAmplitude {
    pub channel_id: ChannelId,
    pub hit_id: u8,
    pub tag_id: u8,
    /// 2 = high gain, anything else = low gain.
    pub amplitude_id: u8,
    pub amplitude_value: u16,
}

impl HitAmplitude {
    pub const HIGH_GAIN: u8 = 2;

    #[must_use]
    pub fn decode(raw: u32) -> Self {
        HitAmplitude {
            channel_id: field(raw, 20, 8) as u8,
            hit_id: field(raw, 17, 3) as u8,
            tag_id: field(raw, 15, 2) as u8,
            amplitude_id: field(raw, 12, 3) as u8,
            amplitude_value: field(raw, 0, 12) as u16,
        }
    }

    #[must_use]
    pub fn is_high_gain(&self) -> bool {
        self.amplitude_id == Self::HIGH_GAIN
    }
}

impl Display for HitAmplitude {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "HitAmplitude {{ channel: {}, hit: {}, tag: {}, gain: {}, value: {} }}",
            self.channel_id, self.hit_id, self.tag_id, self.amplitude_id, self.amplitude_value
        )
    }
}

/// First of the two words closing a GTS interval; repeats the interval tag.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct GTSTrailer1 {
    pub gts_tag: GtsTag,
}

impl GTSTrailer1 {
    #[must_use]
    pub fn decode(raw: u32) -> Self {
        GTSTrailer1 {
            gts_tag: field(raw, 0, 28),
        }
    }
}

impl Display for GTSTrailer1 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GTSTrailer1 {{ tag: {:#x} }}", self.gts_tag)
    }
}

/// Second of the two words closing a GTS interval; carries the GTS time.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct GTSTrailer2 {
    pub data: bool,
    pub ocb_busy: bool,
    pub feb_busy: bool,
    pub gts_time: u32,
}

impl GTSTrailer2 {
    #[must_use]
    pub fn decode(raw: u32) -> Self {
        GTSTrailer2 {
            data: field(raw, 27, 1) == 1,
            ocb_busy: field(raw, 26, 1) == 1,
            feb_busy: field(raw, 25, 1) == 1,
            gts_time: field(raw, 0, 20),
        }
    }
}

impl Display for GTSTrailer2 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "GTSTrailer2 {{ data: {}, ocb_busy: {}, feb_busy: {}, gts_time: {} }}",
            self.data, self.ocb_busy, self.feb_busy, self.gts_time
        )
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateTrailer {
    pub board_id: BoardId,
    pub gate_type: u8,
    pub gate_number: u16,
}

impl GateTrailer {
    #[must_use]
    pub fn decode(raw: u32) -> Self {
        GateTrailer {
            board_id: field(raw, 20, 8) as u8,
            gate_type: field(raw, 16, 3) as u8,
            gate_number: field(raw, 0, 16) as u16,
        }
    }
}

impl Display for GateTrailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "GateTrailer {{ board: {}, gate_type: {}, gate_number: {} }}",
            self.board_id, self.gate_type, self.gate_number
        )
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateTime {
    pub gate_time: u32,
}

impl GateTime {
    #[must_use]
    pub fn decode(raw: u32) -> Self {
        GateTime {
            gate_time: field(raw, 0, 28),
        }
    }
}

impl Display for GateTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GateTime {{ time: {} }}", self.gate_time)
    }
}

/// Opens an OCB packet; one per gate/trigger.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct OCBPacketHeader {
    pub gate_type: u8,
    pub gate_tag: u8,
    pub event_number: u32,
}

impl OCBPacketHeader {
    #[must_use]
    pub fn decode(raw: u32) -> Self {
        OCBPacketHeader {
            gate_type: field(raw, 25, 3) as u8,
            gate_tag: field(raw, 23, 2) as u8,
            event_number: field(raw, 0, 23),
        }
    }
}

impl Display for OCBPacketHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "OCBPacketHeader {{ gate_type: {}, gate_tag: {}, event: {} }}",
            self.gate_type, self.gate_tag, self.event_number
        )
    }
}

/// Closes an OCB packet.
///
/// `errors` is a 16-bit flag word; bit `i` set reports the condition labelled
/// by [`crate::event::OCBEvent::ERROR_LABELS`]`[i]`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct OCBPacketTrailer {
    pub gate_type: u8,
    pub gate_tag: u8,
    pub errors: u16,
}

impl OCBPacketTrailer {
    #[must_use]
    pub fn decode(raw: u32) -> Self {
        OCBPacketTrailer {
            gate_type: field(raw, 25, 3) as u8,
            gate_tag: field(raw, 23, 2) as u8,
            errors: field(raw, 0, 16) as u16,
        }
    }
}

impl Display for OCBPacketTrailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "OCBPacketTrailer {{ gate_type: {}, gate_tag: {}, errors: {:#06x} }}",
            self.gate_type, self.gate_tag, self.errors
        )
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoldTime {
    pub board_id: BoardId,
    pub header_type: u8,
    pub hold_time: u16,
}

impl HoldTime {
    #[must_use]
    pub fn decode(raw: u32) -> Self {
        HoldTime {
            board_id: field(raw, 20, 8) as u8,
            header_type: field(raw, 19, 1) as u8,
            hold_time: field(raw, 0, 11) as u16,
        }
    }
}

impl Display for HoldTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "HoldTime {{ board: {}, header_type: {}, hold_time: {} }}",
            self.board_id, self.header_type, self.hold_time
        )
    }
}

/// Reports the FEB's own word count for the packet being closed.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventDone {
    pub board_id: BoardId,
    /// Low 4 bits of the gate number.
    pub gate_number: u8,
    pub word_count: u16,
}

impl EventDone {
    #[must_use]
    pub fn decode(raw: u32) -> Self {
        EventDone {
            board_id: field(raw, 20, 8) as u8,
            gate_number: field(raw, 16, 4) as u8,
            word_count: field(raw, 0, 16) as u16,
        }
    }
}

impl Display for EventDone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "EventDone {{ board: {}, gate_number: {}, word_count: {} }}",
            self.board_id, self.gate_number, self.word_count
        )
    }
}

/// Closes a FEB packet and reports the board's status flags.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct FEBDataPacketTrailer {
    pub board_id: BoardId,
    pub artificial_trl2: bool,
    pub event_done_timeout: bool,
    pub d1_fifo_full: bool,
    pub d0_fifo_full: bool,
    pub rb_cnt_error: bool,
    pub nb_decoder_errors: u16,
}

impl FEBDataPacketTrailer {
    #[must_use]
    pub fn decode(raw: u32) -> Self {
        FEBDataPacketTrailer {
            board_id: field(raw, 20, 8) as u8,
            artificial_trl2: field(raw, 19, 1) == 1,
            event_done_timeout: field(raw, 18, 1) == 1,
            d1_fifo_full: field(raw, 17, 1) == 1,
            d0_fifo_full: field(raw, 16, 1) == 1,
            rb_cnt_error: field(raw, 15, 1) == 1,
            nb_decoder_errors: field(raw, 0, 15) as u16,
        }
    }
}

impl Display for FEBDataPacketTrailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "FEBDataPacketTrailer {{ board: {}, decoder_errors: {} }}",
            self.board_id, self.nb_decoder_errors
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_ocb_header() {
        let word = Word::decode(0x8000_0001).unwrap();
        let Word::OCBPacketHeader(header) = word else {
            panic!("expected OCBPacketHeader, got {word:?}");
        };
        assert_eq!(header.gate_type, 0);
        assert_eq!(header.gate_tag, 0);
        assert_eq!(header.event_number, 1);
    }

    #[test]
    fn decode_ocb_header_fields() {
        // gate_type 5, gate_tag 2, event_number 0x123456
        let raw = 0x8 << 28 | 5 << 25 | 2 << 23 | 0x12_3456;
        let Word::OCBPacketHeader(header) = Word::decode(raw).unwrap() else {
            panic!("wrong variant");
        };
        assert_eq!(header.gate_type, 5);
        assert_eq!(header.gate_tag, 2);
        assert_eq!(header.event_number, 0x12_3456);
    }

    #[test]
    fn decode_gate_header_type0() {
        let Word::GateHeader(header) = Word::decode(0x0010_0000).unwrap() else {
            panic!("wrong variant");
        };
        assert_eq!(header.board_id, 1);
        assert_eq!(header.header_type, 0);
        assert_eq!(header.gate_type, 0);
        assert_eq!(header.gate_number, 0);
    }

    #[test]
    fn decode_gate_header_type1() {
        // board 3, type 1, gate_time_from_gts 0x2a
        let raw = 3 << 20 | 1 << 19 | 0x2a;
        let Word::GateHeader(header) = Word::decode(raw).unwrap() else {
            panic!("wrong variant");
        };
        assert_eq!(header.board_id, 3);
        assert_eq!(header.header_type, 1);
        assert_eq!(header.gate_time_from_gts, 0x2a);
        assert_eq!(header.gate_number, 0, "type-0 fields decode to zero");
    }

    #[test]
    fn decode_hit_time_edges() {
        let Word::HitTime(rise) = Word::decode(0x2010_0000).unwrap() else {
            panic!("wrong variant");
        };
        assert_eq!(rise.channel_id, 1);
        assert_eq!(rise.hit_id, 0);
        assert_eq!(rise.tag_id, 0);
        assert!(rise.is_rising());
        assert_eq!(rise.hit_time, 0);

        let Word::HitTime(fall) = Word::decode(0x2010_4001).unwrap() else {
            panic!("wrong variant");
        };
        assert_eq!(fall.edge, HitTime::FALLING);
        assert_eq!(fall.hit_time, 1);
    }

    #[test]
    fn decode_hit_amplitude() {
        // channel 7, hit 2, tag 3, amplitude_id 2 (HG), value 0xabc
        let raw = 0x3 << 28 | 7 << 20 | 2 << 17 | 3 << 15 | 2 << 12 | 0xabc;
        let Word::HitAmplitude(hit) = Word::decode(raw).unwrap() else {
            panic!("wrong variant");
        };
        assert_eq!(hit.channel_id, 7);
        assert_eq!(hit.hit_id, 2);
        assert_eq!(hit.tag_id, 3);
        assert!(hit.is_high_gain());
        assert_eq!(hit.amplitude_value, 0xabc);
    }

    #[test]
    fn decode_gts_trailer2_flags() {
        let raw = 0x5 << 28 | 1 << 27 | 1 << 26 | 1 << 25 | 0xf_ffff;
        let Word::GTSTrailer2(trailer) = Word::decode(raw).unwrap() else {
            panic!("wrong variant");
        };
        assert!(trailer.data);
        assert!(trailer.ocb_busy);
        assert!(trailer.feb_busy);
        assert_eq!(trailer.gts_time, 0xf_ffff);
    }

    #[test]
    fn decode_feb_trailer_flags() {
        let raw = 0xD << 28 | 4 << 20 | 1 << 19 | 1 << 16 | 1 << 15 | 0x7fff;
        let Word::FEBDataPacketTrailer(trailer) = Word::decode(raw).unwrap() else {
            panic!("wrong variant");
        };
        assert_eq!(trailer.board_id, 4);
        assert!(trailer.artificial_trl2);
        assert!(!trailer.event_done_timeout);
        assert!(!trailer.d1_fifo_full);
        assert!(trailer.d0_fifo_full);
        assert!(trailer.rb_cnt_error);
        assert_eq!(trailer.nb_decoder_errors, 0x7fff);
    }

    #[test]
    fn decode_event_done() {
        let raw = 0xC << 28 | 2 << 20 | 0x9 << 16 | 42;
        let Word::EventDone(done) = Word::decode(raw).unwrap() else {
            panic!("wrong variant");
        };
        assert_eq!(done.board_id, 2);
        assert_eq!(done.gate_number, 9);
        assert_eq!(done.word_count, 42);
    }

    #[test]
    fn decode_gts_tags_are_28_bits() {
        let Word::GTSHeader(header) = Word::decode(0x1fff_ffff).unwrap() else {
            panic!("wrong variant");
        };
        assert_eq!(header.gts_tag, 0xfff_ffff);

        let Word::GTSTrailer1(trailer) = Word::decode(0x4fff_ffff).unwrap() else {
            panic!("wrong variant");
        };
        assert_eq!(trailer.gts_tag, 0xfff_ffff);
    }

    #[test]
    fn decode_opaque_words() {
        assert!(matches!(
            Word::decode(0xE123_4567).unwrap(),
            Word::Housekeeping(0xE123_4567)
        ));
        assert!(matches!(
            Word::decode(0xF000_0000).unwrap(),
            Word::Special(0xF000_0000)
        ));
    }

    #[test]
    fn reserved_id_is_invalid() {
        let err = Word::decode(0xA000_0000).unwrap_err();
        assert!(matches!(err, Error::InvalidWord { id: 0xA }));
    }
}
