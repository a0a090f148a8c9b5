//! Stream driving: raw bytes to words to decoded events.
//!
//! The byte source yields 32-bit words from 4-byte groups; the event driver
//! buffers the words of one OCB packet and decodes the packet when its
//! trailer arrives. Decoding is pull-based and lazy: nothing is read past
//! the last event the consumer asked for.

use std::io::{ErrorKind, Read};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::event::OCBEvent;
use crate::words::Word;

/// Byte order of the 4-byte groups in the raw stream.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

struct WordIter<R>
where
    R: Read + Send,
{
    reader: R,
    endianness: Endianness,
    done: bool,
}

impl<R> Iterator for WordIter<R>
where
    R: Read + Send,
{
    type Item = Result<u32>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut buf = [0u8; 4];
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => {
                    self.done = true;
                    if filled != 0 {
                        warn!(bytes = filled, "trailing bytes do not form a full word");
                    }
                    return None;
                }
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => {
                    self.done = true;
                    return Some(Err(Error::Io(err)));
                }
            }
        }
        Some(Ok(match self.endianness {
            Endianness::Little => u32::from_le_bytes(buf),
            Endianness::Big => u32::from_be_bytes(buf),
        }))
    }
}

/// Return an iterator of raw 32-bit words read from `reader`.
///
/// A trailing group of fewer than 4 bytes is logged and dropped.
pub fn read_words<R>(reader: R, endianness: Endianness) -> impl Iterator<Item = Result<u32>> + Send
where
    R: Read + Send,
{
    WordIter {
        reader,
        endianness,
        done: false,
    }
}

struct EventIter<I>
where
    I: Iterator<Item = Result<u32>>,
{
    words: I,
    buffer: Vec<Word>,
    inside: bool,
    done: bool,
}

impl<I> Iterator for EventIter<I>
where
    I: Iterator<Item = Result<u32>>,
{
    type Item = Result<OCBEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let raw = match self.words.next() {
                None => {
                    self.done = true;
                    if self.inside {
                        return Some(Err(Error::TruncatedStream));
                    }
                    return None;
                }
                Some(Err(err)) => {
                    self.done = true;
                    return Some(Err(err));
                }
                Some(Ok(raw)) => raw,
            };

            let word = match Word::decode(raw) {
                Ok(word) => word,
                Err(err) => {
                    // Fatal for the current packet; resynchronize on the
                    // next OCB header.
                    self.inside = false;
                    self.buffer.clear();
                    return Some(Err(err));
                }
            };

            match word {
                Word::OCBPacketHeader(_) if self.inside => {
                    // The offending header opens the next packet.
                    self.buffer.clear();
                    self.buffer.push(word);
                    return Some(Err(Error::NestedOcbHeader));
                }
                Word::OCBPacketHeader(_) => {
                    self.inside = true;
                    self.buffer.clear();
                    self.buffer.push(word);
                }
                Word::OCBPacketTrailer(_) if self.inside => {
                    self.buffer.push(word);
                    self.inside = false;
                    let zult = OCBEvent::decode(&self.buffer);
                    self.buffer.clear();
                    return Some(zult);
                }
                Word::OCBPacketTrailer(_) => {
                    warn!("OCB packet trailer without an open packet, skipping");
                }
                _ if self.inside => self.buffer.push(word),
                other => debug!(word = %other, "word outside OCB packet, skipping"),
            }
        }
    }
}

/// Return an iterator of decoded [`OCBEvent`]s, one per OCB packet.
///
/// Each raw word is decoded once on ingestion; an error in one packet is
/// yielded as `Err` and decoding continues with the next OCB header. The
/// iterator ends after [`Error::TruncatedStream`] or an I/O error.
///
/// # Example
/// ```
/// use ocb::stream::decode_events;
///
/// #[rustfmt::skip]
/// let words: Vec<u32> = vec![
///     0x8000_0001, // OCB packet header, event 1
///     0x0010_0000, // gate header, board 1
///     0xD010_0000, // FEB trailer, board 1
///     0x9000_0000, // OCB packet trailer
/// ];
/// let events: Vec<_> = decode_events(words.into_iter().map(Ok))
///     .map(|zult| zult.unwrap())
///     .collect();
/// assert_eq!(events.len(), 1);
/// assert_eq!(events[0].event_number, 1);
/// ```
pub fn decode_events<I>(words: I) -> impl Iterator<Item = Result<OCBEvent>>
where
    I: Iterator<Item = Result<u32>>,
{
    EventIter {
        words,
        buffer: Vec::new(),
        inside: false,
        done: false,
    }
}

/// Decode events straight from a byte source, composing [`read_words`] and
/// [`decode_events`].
pub fn decode_file_events<R>(
    reader: R,
    endianness: Endianness,
) -> impl Iterator<Item = Result<OCBEvent>> + Send
where
    R: Read + Send,
{
    decode_events(read_words(reader, endianness))
}
