//! Decoded event model and packet assembly.
//!
//! An OCB packet holds one gate/trigger worth of data: up to
//! [`OCBEvent::NUM_FEBS`] FEB packets, each containing the merged hit records
//! of its GTS intervals. Slicing runs top-down (the OCB level hands each FEB
//! sub-slice to the FEB level, which routes hit words into GTS windows) and
//! the decoded containers accumulate bottom-up.

mod feb;
mod gts;

use std::collections::BTreeMap;
use std::fmt::Display;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};
use crate::words::{BoardId, ChannelId, GtsTag, Word};

/// Number of FEB slots per OCB.
pub const NUM_FEBS_PER_OCB: usize = 9;

/// One observed edge of a hit pulse.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeSample {
    /// 13-bit hit time within the GTS interval.
    pub time: u16,
    /// 2-bit tag carried by the hit word.
    pub tag_id: u8,
    /// GTS tag of the interval the word was attributed to.
    pub gts_tag: GtsTag,
}

/// One amplitude sample of a channel.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct GainSample {
    /// 12-bit amplitude value.
    pub value: u16,
    pub tag_id: u8,
    pub gts_tag: GtsTag,
}

/// Merged hit times for one (channel, hit) key within a GTS interval.
///
/// A record is opened by a rising edge and completed by the matching falling
/// edge; a pulse whose falling edge never arrived is kept rising-only.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitTimeRecord {
    pub board_id: BoardId,
    pub channel_id: ChannelId,
    pub hit_id: u8,
    pub rise: EdgeSample,
    pub fall: Option<EdgeSample>,
}

impl Display for HitTimeRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Hit {{ board: {}, channel: {}, hit: {}, rise: {}, fall: {} }}",
            self.board_id,
            self.channel_id,
            self.hit_id,
            self.rise.time,
            self.fall.map_or(-1, |s| i32::from(s.time)),
        )
    }
}

/// Merged amplitude samples for one channel within a GTS interval.
///
/// A channel emits at most one low-gain and one high-gain sample per
/// interval.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitAmplitudeRecord {
    pub board_id: BoardId,
    pub channel_id: ChannelId,
    pub lg: Option<GainSample>,
    pub hg: Option<GainSample>,
}

impl Display for HitAmplitudeRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Amplitude {{ board: {}, channel: {}, lg: {}, hg: {} }}",
            self.board_id,
            self.channel_id,
            self.lg.map_or(-1, |s| i32::from(s.value)),
            self.hg.map_or(-1, |s| i32::from(s.value)),
        )
    }
}

/// One board's contribution to one event.
///
/// Constructed once, when the board's trailer word is reached; immutable
/// afterwards.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FEBPacket {
    pub board_id: BoardId,
    /// Hold time from the optional second word of the packet.
    pub hold_time: Option<u16>,
    /// GTS tag to GTS time, one entry per closed interval.
    pub gts_times: BTreeMap<GtsTag, u32>,
    pub hit_times: Vec<HitTimeRecord>,
    pub hit_amplitudes: Vec<HitAmplitudeRecord>,
    // Status flags from the FEB data packet trailer.
    pub artificial_trl2: bool,
    pub event_done_timeout: bool,
    pub d1_fifo_full: bool,
    pub d0_fifo_full: bool,
    pub rb_cnt_error: bool,
    pub nb_decoder_errors: u16,
}

impl Display for FEBPacket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "FEBPacket {{ board: {}, hit_times: {}, hit_amplitudes: {}, gts_intervals: {} }}",
            self.board_id,
            self.hit_times.len(),
            self.hit_amplitudes.len(),
            self.gts_times.len()
        )
    }
}

/// One decoded gate/trigger.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct OCBEvent {
    /// 23-bit event number from the OCB packet header.
    pub event_number: u32,
    pub gate_type: u8,
    pub gate_tag: u8,
    /// Trailer error flags; bit labels in [`OCBEvent::ERROR_LABELS`].
    pub errors: [bool; 16],
    /// FEB packets indexed by board id; `None` when the board sent no data.
    pub febs: [Option<FEBPacket>; NUM_FEBS_PER_OCB],
}

impl Display for OCBEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "OCBEvent {{ event: {}, gate_type: {}, gate_tag: {}, febs_fired: {} }}",
            self.event_number,
            self.gate_type,
            self.gate_tag,
            self.num_febs_fired()
        )
    }
}

impl OCBEvent {
    /// Number of FEB slots per OCB.
    pub const NUM_FEBS: usize = NUM_FEBS_PER_OCB;
    /// GTS headers seen before this threshold do not count toward the FEB
    /// word count reported by `EventDone`.
    pub const NUM_GTS_BEFORE_EVENT: u32 = 2;
    /// Labels for the OCB trailer error bits.
    pub const ERROR_LABELS: [&'static str; 16] = [
        "FEB 0 error",
        "FEB 1 error",
        "FEB 2 error",
        "FEB 3 error",
        "FEB 4 error",
        "FEB 5 error",
        "FEB 6 error",
        "FEB 7 error",
        "FEB 8 error",
        "FEB 9 error",
        "FEB 10 error",
        "FEB 11 error",
        "FEB 12 error",
        "FEB 13 error",
        "Gate close error",
        "Gate open timeout",
    ];

    /// The FEB packet for `board`, if that board contributed data.
    #[must_use]
    pub fn feb(&self, board: usize) -> Option<&FEBPacket> {
        self.febs.get(board).and_then(Option::as_ref)
    }

    /// Number of boards that contributed a FEB packet.
    #[must_use]
    pub fn num_febs_fired(&self) -> usize {
        self.febs.iter().flatten().count()
    }

    /// Labels of the error bits set in the OCB trailer.
    pub fn error_descriptions(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.errors
            .iter()
            .enumerate()
            .filter(|(_, set)| **set)
            .map(|(bit, _)| Self::ERROR_LABELS[bit])
    }

    /// Decode one OCB packet from its word slice.
    ///
    /// The slice must begin with an `OCBPacketHeader` and end with an
    /// `OCBPacketTrailer`; anything else is reported as a truncated stream.
    ///
    /// # Errors
    /// [`Error::OCBEnvelopeMismatch`] when header and trailer disagree on
    /// gate type or tag, [`Error::FebTrailerWithoutHeader`] for a FEB trailer
    /// with no open gate header, and any error from FEB or GTS assembly.
    pub fn decode(words: &[Word]) -> Result<OCBEvent> {
        let (Some(Word::OCBPacketHeader(header)), Some(Word::OCBPacketTrailer(trailer))) =
            (words.first(), words.last())
        else {
            return Err(Error::TruncatedStream);
        };

        if header.gate_type != trailer.gate_type || header.gate_tag != trailer.gate_tag {
            return Err(Error::OCBEnvelopeMismatch {
                header_gate_type: header.gate_type,
                trailer_gate_type: trailer.gate_type,
                header_gate_tag: header.gate_tag,
                trailer_gate_tag: trailer.gate_tag,
            });
        }

        let mut errors = [false; 16];
        for (bit, flag) in errors.iter_mut().enumerate() {
            *flag = trailer.errors >> bit & 1 == 1;
        }

        let mut event = OCBEvent {
            event_number: header.event_number,
            gate_type: header.gate_type,
            gate_tag: header.gate_tag,
            errors,
            febs: Default::default(),
        };

        // FEB slicing state: index and board of the last open gate header,
        // plus the word counter reconciled against EventDone.
        let mut gate_header_index: Option<usize> = None;
        let mut feb_board: Option<BoardId> = None;
        let mut feb_words: u32 = 0;
        let mut num_gts: u32 = 0;

        for (index, word) in words.iter().enumerate() {
            match word {
                Word::GateHeader(gate) if gate.header_type == 0 => {
                    feb_words = 0;
                    num_gts = 0;
                    gate_header_index = Some(index);
                    feb_board = Some(gate.board_id);
                    // A lone type-0 header is inserted by the OCB itself and
                    // does not count toward the FEB word count; one followed
                    // by the type-1 variant does.
                    if let Some(Word::GateHeader(_)) = words.get(index + 1) {
                        feb_words += 1;
                    }
                }
                Word::GateHeader(_) | Word::GateTime(_) | Word::HoldTime(_) => feb_words += 1,
                Word::GTSHeader(_) => {
                    num_gts += 1;
                    if num_gts > Self::NUM_GTS_BEFORE_EVENT {
                        feb_words += 1;
                    }
                }
                Word::GTSTrailer1(_)
                | Word::GTSTrailer2(_)
                | Word::HitTime(_)
                | Word::HitAmplitude(_) => {
                    if num_gts > Self::NUM_GTS_BEFORE_EVENT {
                        feb_words += 1;
                    }
                }
                Word::EventDone(done) => {
                    if u32::from(done.word_count) != feb_words {
                        warn!(
                            board = done.board_id,
                            reported = done.word_count,
                            counted = feb_words,
                            "EventDone word count does not match FEB packet"
                        );
                    }
                }
                Word::FEBDataPacketTrailer(feb_trailer) => {
                    feb_words += 1;
                    let (Some(start), Some(board)) = (gate_header_index.take(), feb_board.take())
                    else {
                        return Err(Error::FebTrailerWithoutHeader {
                            board_id: feb_trailer.board_id,
                        });
                    };
                    let board = usize::from(board);
                    if board >= Self::NUM_FEBS {
                        warn!(board, "FEB board id out of range, skipping");
                    } else if event.febs[board].is_some() {
                        warn!(board, "duplicate FEB data packet, skipping");
                    } else {
                        event.febs[board] = Some(FEBPacket::decode(&words[start..=index])?);
                    }
                }
                Word::OCBPacketHeader(_) | Word::OCBPacketTrailer(_) => {}
                other => warn!(word = %other, "unexpected word inside OCB packet"),
            }
        }

        Ok(event)
    }
}
