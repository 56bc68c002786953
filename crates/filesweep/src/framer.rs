//! Record framing: splits a byte stream into delimiter-bounded records.
//!
//! Design principles:
//! 1. Single pass over the stream in fixed-size chunks
//! 2. Bytes are opaque; no text-encoding interpretation
//! 3. A record past the size bound fails the whole file, not just the record
//! 4. A non-empty remainder at EOF is the final record; a trailing delimiter
//!    does not produce an empty one

use crate::error::{Result, SweepError};
use std::io::{self, Read};

/// Bytes read from the source per syscall.
const READ_CHUNK_BYTES: usize = 262_144; // 256 KiB

/// Iterator over the delimited records of a byte stream.
///
/// Yields `Err(OversizedRecord)` once and fuses if any record exceeds
/// `max_record_bytes`; the accumulator is discarded at that point. A record
/// of exactly `max_record_bytes` is accepted.
pub struct RecordFramer<R: Read> {
    reader: R,
    delimiter: Vec<u8>,
    max_record_bytes: usize,
    buf: Vec<u8>,
    // Resume offset for delimiter search, so multi-byte delimiters split
    // across chunks are found without rescanning the whole accumulator.
    search_from: usize,
    chunk: Vec<u8>,
    eof: bool,
    done: bool,
}

impl<R: Read> RecordFramer<R> {
    pub fn new(reader: R, delimiter: impl Into<Vec<u8>>, max_record_bytes: u64) -> Self {
        let delimiter = delimiter.into();
        debug_assert!(!delimiter.is_empty(), "delimiter must not be empty");
        Self {
            reader,
            delimiter,
            max_record_bytes: usize::try_from(max_record_bytes).unwrap_or(usize::MAX),
            buf: Vec::new(),
            search_from: 0,
            chunk: vec![0u8; READ_CHUNK_BYTES],
            eof: false,
            done: false,
        }
    }

    fn oversized(&mut self) -> SweepError {
        self.buf = Vec::new();
        self.done = true;
        SweepError::OversizedRecord {
            limit: self.max_record_bytes as u64,
        }
    }

    fn find_delimiter(&mut self) -> Option<usize> {
        let d_len = self.delimiter.len();
        if self.buf.len() < d_len {
            return None;
        }
        let last = self.buf.len() - d_len;
        for i in self.search_from..=last {
            if self.buf[i..i + d_len] == self.delimiter[..] {
                return Some(i);
            }
        }
        self.search_from = last + 1;
        None
    }
}

impl<R: Read> Iterator for RecordFramer<R> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            if let Some(idx) = self.find_delimiter() {
                if idx > self.max_record_bytes {
                    return Some(Err(self.oversized()));
                }
                let mut record: Vec<u8> = self.buf.drain(..idx + self.delimiter.len()).collect();
                record.truncate(idx);
                self.search_from = 0;
                return Some(Ok(record));
            }

            // No delimiter in the accumulator. The record in progress is at
            // least buf.len() - (delimiter.len() - 1) bytes long.
            if self.buf.len() >= self.max_record_bytes.saturating_add(self.delimiter.len()) {
                return Some(Err(self.oversized()));
            }

            if self.eof {
                self.done = true;
                if self.buf.is_empty() {
                    return None;
                }
                if self.buf.len() > self.max_record_bytes {
                    return Some(Err(self.oversized()));
                }
                return Some(Ok(std::mem::take(&mut self.buf)));
            }

            match self.reader.read(&mut self.chunk) {
                Ok(0) => self.eof = true,
                Ok(n) => self.buf.extend_from_slice(&self.chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    self.done = true;
                    return Some(Err(SweepError::fs("reading claimed file", e)));
                }
            }
        }
    }
}
