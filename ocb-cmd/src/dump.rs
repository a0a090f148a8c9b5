use std::path::Path;

use anyhow::{Context, Result};
use ocb::stream::{decode_file_events, read_words, Endianness};
use ocb::words::Word;
use tracing::warn;

/// Print assembled events, one block per OCB packet.
pub fn dump(fpath: &Path, endianness: Endianness, max_events: Option<usize>) -> Result<()> {
    let reader = std::fs::File::open(fpath).context("opening input")?;
    let reader = std::io::BufReader::new(reader);

    let mut count = 0;
    for zult in decode_file_events(reader, endianness) {
        if let Some(max) = max_events {
            if count >= max {
                break;
            }
        }
        let event = match zult {
            Ok(event) => event,
            Err(err) => {
                warn!("skipping undecodable packet: {err}");
                continue;
            }
        };
        count += 1;

        println!("{event}");
        for label in event.error_descriptions() {
            println!("  error: {label}");
        }
        for feb in event.febs.iter().flatten() {
            println!("  {feb}");
            if let Some(hold) = feb.hold_time {
                println!("    hold_time: {hold}");
            }
            for (tag, time) in &feb.gts_times {
                println!("    gts {tag:#x} -> time {time}");
            }
            for record in &feb.hit_times {
                println!("    {record}");
            }
            for record in &feb.hit_amplitudes {
                println!("    {record}");
            }
        }
    }
    println!("{count} events");
    Ok(())
}

/// Print every decoded word in stream order.
pub fn dump_words(fpath: &Path, endianness: Endianness) -> Result<()> {
    let reader = std::fs::File::open(fpath).context("opening input")?;
    let reader = std::io::BufReader::new(reader);

    for zult in read_words(reader, endianness) {
        let raw = zult?;
        match Word::decode(raw) {
            Ok(word) => println!("{raw:#010x}  {word}"),
            Err(err) => println!("{raw:#010x}  undecodable: {err}"),
        }
    }
    Ok(())
}
