use std::collections::BTreeMap;
use std::io::{stdout, Write};
use std::path::Path;

use anyhow::{Context, Result};
use ocb::event::OCBEvent;
use ocb::stream::{decode_file_events, Endianness};
use ocb::words::BoardId;
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone)]
pub enum Format {
    Json,
    Text,
}

impl clap::ValueEnum for Format {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Json, Self::Text]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        match self {
            Self::Json => Some(clap::builder::PossibleValue::new("json")),
            Self::Text => Some(clap::builder::PossibleValue::new("text")),
        }
    }
}

#[derive(Default, Debug, Clone, Serialize)]
struct BoardSummary {
    events: usize,
    hit_times: usize,
    hit_amplitudes: usize,
}

#[derive(Default, Debug, Clone, Serialize)]
struct Summary {
    events: usize,
    events_with_errors: usize,
    decode_errors: usize,
    hit_times: usize,
    hit_amplitudes: usize,
    boards: BTreeMap<BoardId, BoardSummary>,
    error_counts: BTreeMap<String, usize>,
}

impl Summary {
    fn add(&mut self, event: &OCBEvent) {
        self.events += 1;
        if event.errors.iter().any(|set| *set) {
            self.events_with_errors += 1;
        }
        for label in event.error_descriptions() {
            *self.error_counts.entry(label.to_string()).or_default() += 1;
        }
        for feb in event.febs.iter().flatten() {
            let board = self.boards.entry(feb.board_id).or_default();
            board.events += 1;
            board.hit_times += feb.hit_times.len();
            board.hit_amplitudes += feb.hit_amplitudes.len();
            self.hit_times += feb.hit_times.len();
            self.hit_amplitudes += feb.hit_amplitudes.len();
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct Info {
    filename: String,
    summary: Summary,
}

fn summarize(fpath: &Path, endianness: Endianness) -> Result<Info> {
    let reader = std::fs::File::open(fpath).context("opening input")?;
    let reader = std::io::BufReader::new(reader);

    let mut summary = Summary::default();
    for zult in decode_file_events(reader, endianness) {
        match zult {
            Ok(event) => summary.add(&event),
            Err(err) => {
                summary.decode_errors += 1;
                warn!("skipping undecodable packet: {err}");
            }
        }
    }

    Ok(Info {
        filename: fpath.to_string_lossy().to_string(),
        summary,
    })
}

pub fn info(fpath: &Path, format: &Format, endianness: Endianness) -> Result<()> {
    let info = summarize(fpath, endianness)?;

    match format {
        Format::Json => {
            serde_json::to_writer_pretty(stdout(), &info).context("serializing to json")
        }
        Format::Text => {
            let data = render_text(&info).context("rendering info")?;
            stdout()
                .write_all(str::as_bytes(&data))
                .context("writing to stdout")
        }
    }
}

fn render_text(info: &Info) -> Result<String> {
    let mut hb = handlebars::Handlebars::new();
    assert!(hb.register_template_string("info", TEXT_TEMPLATE).is_ok());

    hb.render("info", &info).context("rendering text")
}

const TEXT_TEMPLATE: &str = r"{{ filename }}
===============================================================================
Events:            {{ summary.events }}
With error flags:  {{ summary.events_with_errors }}
Decode errors:     {{ summary.decode_errors }}
Hit times:         {{ summary.hit_times }}
Hit amplitudes:    {{ summary.hit_amplitudes }}
-------------------------------------------------------------------------------
Board   Events   Hit times   Hit amplitudes
-------------------------------------------------------------------------------
{{ #each summary.boards }}{{ @key }}       {{ events }}        {{ hit_times }}           {{ hit_amplitudes }}
{{ /each }}{{ #each summary.error_counts }}{{ @key }}: {{ this }}
{{ /each }}";
