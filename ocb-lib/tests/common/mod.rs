//! Raw-word builders for synthesizing readout streams in tests.

pub fn ocb_header(gate_type: u32, gate_tag: u32, event_number: u32) -> u32 {
    0x8 << 28 | gate_type << 25 | gate_tag << 23 | event_number
}

pub fn ocb_trailer(gate_type: u32, gate_tag: u32, errors: u32) -> u32 {
    0x9 << 28 | gate_type << 25 | gate_tag << 23 | errors
}

pub fn gate_header0(board_id: u32, gate_type: u32, gate_number: u32) -> u32 {
    board_id << 20 | gate_type << 16 | gate_number
}

pub fn hold_time(board_id: u32, hold: u32) -> u32 {
    0xB << 28 | board_id << 20 | hold
}

pub fn gts_header(tag: u32) -> u32 {
    0x1 << 28 | tag
}

pub fn gts_trailer1(tag: u32) -> u32 {
    0x4 << 28 | tag
}

pub fn gts_trailer2(gts_time: u32) -> u32 {
    0x5 << 28 | gts_time
}

pub fn hit_time(channel: u32, hit: u32, tag: u32, edge: u32, time: u32) -> u32 {
    0x2 << 28 | channel << 20 | hit << 17 | tag << 15 | edge << 14 | time
}

pub fn hit_amplitude(channel: u32, hit: u32, tag: u32, amplitude_id: u32, value: u32) -> u32 {
    0x3 << 28 | channel << 20 | hit << 17 | tag << 15 | amplitude_id << 12 | value
}

pub fn event_done(board_id: u32, gate_number: u32, word_count: u32) -> u32 {
    0xC << 28 | board_id << 20 | gate_number << 16 | word_count
}

pub fn feb_trailer(board_id: u32) -> u32 {
    0xD << 28 | board_id << 20
}

pub fn le_bytes(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|word| word.to_le_bytes()).collect()
}
