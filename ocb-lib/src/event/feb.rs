//! FEB packet assembly and current/previous GTS routing.
//!
//! Hit words for a GTS interval may arrive after the trailer that closes it,
//! interspersed in the following interval. The hardware guarantees at most
//! one interval of latency, so routing keeps exactly two accumulation
//! windows and matches the low 2 bits of each hit's tag against the current
//! and previous GTS tags.

use std::collections::BTreeMap;

use tracing::debug;

use super::{gts, FEBPacket};
use crate::error::{Error, Result};
use crate::words::{BoardId, ChannelId, GtsTag, Word};

const TAG_MASK: u32 = 0x3;

fn matches_tag(tag_id: u8, gts_tag: Option<GtsTag>) -> bool {
    gts_tag.is_some_and(|tag| u32::from(tag_id) & TAG_MASK == tag & TAG_MASK)
}

impl FEBPacket {
    /// Decode one FEB packet from its word slice.
    ///
    /// The slice is produced by OCB-level slicing: it begins with the
    /// board's `GateHeader`, optionally followed by a `HoldTime`, and ends
    /// with the `FEBDataPacketTrailer` carrying the status flags.
    ///
    /// # Errors
    /// [`Error::FebPacketEmpty`] when the slice is empty or does not begin
    /// with a gate header; otherwise the routing and merging errors of the
    /// GTS layer ([`Error::HitTagMismatch`], [`Error::TrailerTagMismatch`],
    /// [`Error::TrailerWithoutHeader`], and the duplicate-edge/gain
    /// errors).
    pub fn decode(words: &[Word]) -> Result<FEBPacket> {
        let Some(Word::GateHeader(header)) = words.first() else {
            return Err(Error::FebPacketEmpty);
        };

        let mut packet = FEBPacket {
            board_id: header.board_id,
            hold_time: None,
            gts_times: BTreeMap::new(),
            hit_times: Vec::new(),
            hit_amplitudes: Vec::new(),
            artificial_trl2: false,
            event_done_timeout: false,
            d1_fifo_full: false,
            d0_fifo_full: false,
            rb_cnt_error: false,
            nb_decoder_errors: 0,
        };
        if let Some(Word::HoldTime(hold)) = words.get(1) {
            packet.hold_time = Some(hold.hold_time);
        }
        if let Some(Word::FEBDataPacketTrailer(trailer)) = words.last() {
            packet.artificial_trl2 = trailer.artificial_trl2;
            packet.event_done_timeout = trailer.event_done_timeout;
            packet.d1_fifo_full = trailer.d1_fifo_full;
            packet.d0_fifo_full = trailer.d0_fifo_full;
            packet.rb_cnt_error = trailer.rb_cnt_error;
            packet.nb_decoder_errors = trailer.nb_decoder_errors;
        }

        let mut current_tag: Option<GtsTag> = None;
        let mut previous_tag: Option<GtsTag> = None;
        let mut current: Vec<Word> = Vec::new();
        let mut previous: Vec<Word> = Vec::new();

        for word in words {
            match word {
                Word::GTSHeader(gts_header) => {
                    current_tag = Some(gts_header.gts_tag);
                    current.clear();
                    current.push(*word);
                }
                Word::HitTime(hit) => route_hit(
                    *word,
                    hit.tag_id,
                    hit.channel_id,
                    packet.board_id,
                    current_tag,
                    previous_tag,
                    &mut current,
                    &mut previous,
                )?,
                Word::HitAmplitude(hit) => route_hit(
                    *word,
                    hit.tag_id,
                    hit.channel_id,
                    packet.board_id,
                    current_tag,
                    previous_tag,
                    &mut current,
                    &mut previous,
                )?,
                Word::GTSTrailer1(trailer) => {
                    if current_tag != Some(trailer.gts_tag) {
                        return Err(Error::TrailerTagMismatch {
                            trailer_tag: trailer.gts_tag,
                            current_tag,
                        });
                    }
                    current.push(*word);
                }
                Word::GTSTrailer2(trailer) => {
                    if current.is_empty() {
                        return Err(Error::TrailerWithoutHeader);
                    }
                    current.push(*word);

                    // The previous interval can receive no more late hits;
                    // merge it and shift the windows.
                    if !previous.is_empty() {
                        if let Some(tag) = previous_tag {
                            gts::merge_block(
                                packet.board_id,
                                tag,
                                &previous,
                                &mut packet.hit_times,
                                &mut packet.hit_amplitudes,
                            )?;
                        }
                        previous.clear();
                    }
                    if let Some(tag) = current_tag {
                        packet.gts_times.insert(tag, trailer.gts_time);
                    }
                    previous_tag = current_tag;
                    previous = std::mem::take(&mut current);
                }
                // Envelope and bookkeeping words were captured above; they
                // are not routed through the GTS windows.
                _ => {}
            }
        }

        if let Some(tag) = previous_tag {
            if !previous.is_empty() {
                gts::merge_block(
                    packet.board_id,
                    tag,
                    &previous,
                    &mut packet.hit_times,
                    &mut packet.hit_amplitudes,
                )?;
            }
        }
        if let Some(tag) = current_tag {
            if !current.is_empty() {
                // An interval never closed by a trailer 2; its hits are
                // still processed.
                debug!(
                    board = packet.board_id,
                    tag, "GTS interval left open at FEB trailer"
                );
                gts::merge_block(
                    packet.board_id,
                    tag,
                    &current,
                    &mut packet.hit_times,
                    &mut packet.hit_amplitudes,
                )?;
            }
        }

        Ok(packet)
    }
}

#[allow(clippy::too_many_arguments)]
fn route_hit(
    word: Word,
    tag_id: u8,
    channel_id: ChannelId,
    board_id: BoardId,
    current_tag: Option<GtsTag>,
    previous_tag: Option<GtsTag>,
    current: &mut Vec<Word>,
    previous: &mut Vec<Word>,
) -> Result<()> {
    if matches_tag(tag_id, current_tag) {
        current.push(word);
    } else if matches_tag(tag_id, previous_tag) {
        previous.push(word);
    } else {
        return Err(Error::HitTagMismatch {
            board_id,
            channel_id,
            tag_id,
        });
    }
    Ok(())
}
