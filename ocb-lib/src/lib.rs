//! Decoder for the binary readout stream produced by an Off-detector
//! Concentrator Board (OCB).
//!
//! The stream is a flat sequence of 32-bit words multiplexing data from up to
//! nine Front-End Boards (FEBs). This crate reconstructs the nested packet
//! structure (OCB packets holding FEB packets, which hold Global Time-Stamp
//! intervals of per-channel hits) and exposes each OCB packet as a decoded
//! [`event::OCBEvent`].
//!
//! # Example
//! ```no_run
//! use ocb::stream::{decode_file_events, Endianness};
//!
//! let file = std::fs::File::open("run0001.dat").unwrap();
//! let reader = std::io::BufReader::new(file);
//! for zult in decode_file_events(reader, Endianness::Little) {
//!     let event = zult.unwrap();
//!     println!(
//!         "event {} fired {} FEBs",
//!         event.event_number,
//!         event.num_febs_fired()
//!     );
//! }
//! ```

mod error;

pub mod event;
pub mod stream;
pub mod words;

pub use error::{Error, Result};
