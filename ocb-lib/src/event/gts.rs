//! Per-interval hit merging.
//!
//! All hit words attributed to one GTS interval are merged into per-key
//! records: hit times pair a rising with a falling edge per (channel, hit),
//! hit amplitudes collect the low- and high-gain sample per channel. The
//! (channel, hit) key for times is tighter because one channel can pulse
//! several times in an interval, each pulse with its own hit id, while only
//! one sample per gain is emitted per channel.

use std::collections::BTreeMap;

use tracing::warn;

use super::{EdgeSample, GainSample, HitAmplitudeRecord, HitTimeRecord};
use crate::error::{Error, Result};
use crate::words::{BoardId, ChannelId, GtsTag, HitAmplitude, HitTime, Word};

/// Merge the hit words of one GTS interval into `times` and `amplitudes`.
///
/// Non-hit words in the block (the interval header and trailers) are
/// ignored. Records are appended in key order.
///
/// # Errors
/// [`Error::DuplicateRisingEdge`], [`Error::FallingBeforeRising`],
/// [`Error::DuplicateGainLG`], [`Error::DuplicateGainHG`].
pub(super) fn merge_block(
    board_id: BoardId,
    gts_tag: GtsTag,
    words: &[Word],
    times: &mut Vec<HitTimeRecord>,
    amplitudes: &mut Vec<HitAmplitudeRecord>,
) -> Result<()> {
    let mut open: BTreeMap<(ChannelId, u8), HitTimeRecord> = BTreeMap::new();
    let mut completed: Vec<HitTimeRecord> = Vec::new();
    let mut gains: BTreeMap<ChannelId, HitAmplitudeRecord> = BTreeMap::new();
    let mut words_per_hit: BTreeMap<(ChannelId, u8), usize> = BTreeMap::new();

    for word in words {
        match word {
            Word::HitTime(hit) => {
                *words_per_hit
                    .entry((hit.channel_id, hit.hit_id))
                    .or_default() += 1;
                merge_time(board_id, gts_tag, hit, &mut open, &mut completed)?;
            }
            Word::HitAmplitude(hit) => {
                *words_per_hit
                    .entry((hit.channel_id, hit.hit_id))
                    .or_default() += 1;
                merge_amplitude(board_id, gts_tag, hit, &mut gains)?;
            }
            _ => {}
        }
    }

    for ((channel, hit), count) in &words_per_hit {
        if *count != 4 {
            warn!(
                board = board_id,
                channel = *channel,
                hit = *hit,
                words = *count,
                "hit data block size != 4"
            );
        }
    }

    // Unpaired rising edges are kept as rising-only records.
    completed.extend(open.into_values());
    completed.sort_by_key(|record| (record.channel_id, record.hit_id));
    times.extend(completed);
    amplitudes.extend(gains.into_values());
    Ok(())
}

fn merge_time(
    board_id: BoardId,
    gts_tag: GtsTag,
    hit: &HitTime,
    open: &mut BTreeMap<(ChannelId, u8), HitTimeRecord>,
    completed: &mut Vec<HitTimeRecord>,
) -> Result<()> {
    let key = (hit.channel_id, hit.hit_id);
    let sample = EdgeSample {
        time: hit.hit_time,
        tag_id: hit.tag_id,
        gts_tag,
    };

    if hit.is_rising() {
        if open.contains_key(&key) {
            return Err(Error::DuplicateRisingEdge {
                channel_id: hit.channel_id,
                hit_id: hit.hit_id,
            });
        }
        open.insert(
            key,
            HitTimeRecord {
                board_id,
                channel_id: hit.channel_id,
                hit_id: hit.hit_id,
                rise: sample,
                fall: None,
            },
        );
    } else {
        let Some(mut record) = open.remove(&key) else {
            return Err(Error::FallingBeforeRising {
                channel_id: hit.channel_id,
                hit_id: hit.hit_id,
            });
        };
        record.fall = Some(sample);
        completed.push(record);
    }
    Ok(())
}

fn merge_amplitude(
    board_id: BoardId,
    gts_tag: GtsTag,
    hit: &HitAmplitude,
    gains: &mut BTreeMap<ChannelId, HitAmplitudeRecord>,
) -> Result<()> {
    let record = gains
        .entry(hit.channel_id)
        .or_insert_with(|| HitAmplitudeRecord {
            board_id,
            channel_id: hit.channel_id,
            lg: None,
            hg: None,
        });
    let sample = GainSample {
        value: hit.amplitude_value,
        tag_id: hit.tag_id,
        gts_tag,
    };

    if hit.is_high_gain() {
        if record.hg.is_some() {
            return Err(Error::DuplicateGainHG {
                channel_id: hit.channel_id,
            });
        }
        record.hg = Some(sample);
    } else {
        if record.lg.is_some() {
            return Err(Error::DuplicateGainLG {
                channel_id: hit.channel_id,
            });
        }
        record.lg = Some(sample);
    }
    Ok(())
}
