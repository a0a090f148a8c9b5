mod dump;
mod info;

use std::io::stderr;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use ocb::stream::Endianness;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show summary information about an OCB readout file.
    Info {
        /// Input readout file
        input: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: info::Format,

        /// Read 32-bit words as big-endian instead of little-endian.
        #[arg(long, action)]
        be: bool,
    },
    /// Print decoded events from an OCB readout file.
    Dump {
        /// Input readout file
        input: PathBuf,

        /// Read 32-bit words as big-endian instead of little-endian.
        #[arg(long, action)]
        be: bool,

        /// Stop after this many events.
        #[arg(short, long, value_name = "count")]
        max_events: Option<usize>,

        /// Print every decoded word instead of assembled events.
        #[arg(long, action)]
        words: bool,
    },
}

fn endianness(be: bool) -> Endianness {
    if be {
        Endianness::Big
    } else {
        Endianness::Little
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(stderr)
        .with_ansi(false)
        .without_time()
        .with_env_filter(
            EnvFilter::try_from_env("OCB_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    debug!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    match &cli.command {
        Commands::Info { input, format, be } => info::info(input, format, endianness(*be)),
        Commands::Dump {
            input,
            be,
            max_events,
            words,
        } => {
            if *words {
                dump::dump_words(input, endianness(*be))
            } else {
                dump::dump(input, endianness(*be), *max_events)
            }
        }
    }
}
