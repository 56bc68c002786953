//! Record decoding seam and the whole-file-fail policy.
//!
//! The engine never interprets record bytes itself; an injected [`Decoder`]
//! does. A decoder that reports not-matched fails the entire file so
//! operators can fix and resubmit it atomically instead of receiving a
//! partial, order-ambiguous ingestion.

use crate::error::{Result, SweepError};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Longest slice of an offending record echoed into error messages.
const RECORD_PREVIEW_BYTES: usize = 500;

/// One decoded record: an event timestamp plus structured fields.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEvent {
    pub timestamp: DateTime<Utc>,
    pub fields: Map<String, Value>,
}

/// Format-specific decoding capability, selected by configuration and
/// injected at construction. `None` means the record did not match.
pub trait Decoder: Send + Sync {
    fn decode(&self, record: &[u8]) -> Option<DecodedEvent>;
}

/// How decoded events are handed to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmitMode {
    /// Forward each event as soon as its record decodes.
    #[default]
    PerRecord,
    /// Accumulate the whole file and forward one ordered batch only after
    /// every record decoded; emit nothing if any record fails.
    FileBatch,
}

/// Applies the injected decoder to raw records.
pub struct ParseDispatcher {
    decoder: Box<dyn Decoder>,
}

impl ParseDispatcher {
    pub fn new(decoder: Box<dyn Decoder>) -> Self {
        Self { decoder }
    }

    /// Decode one record, treating not-matched as a file-fatal error that
    /// carries the offending record for diagnostics.
    pub fn parse_record(&self, record: &[u8]) -> Result<DecodedEvent> {
        self.decoder
            .decode(record)
            .ok_or_else(|| SweepError::FormatMismatch {
                record: preview(record),
            })
    }
}

fn preview(record: &[u8]) -> String {
    let text = String::from_utf8_lossy(record);
    if text.len() > RECORD_PREVIEW_BYTES {
        let cut = text
            .char_indices()
            .take_while(|(i, _)| *i <= RECORD_PREVIEW_BYTES)
            .last()
            .map(|(i, _)| i)
            .unwrap_or(0);
        format!("{}... (truncated)", &text[..cut])
    } else {
        text.into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RejectAll;
    impl Decoder for RejectAll {
        fn decode(&self, _record: &[u8]) -> Option<DecodedEvent> {
            None
        }
    }

    struct EchoDecoder;
    impl Decoder for EchoDecoder {
        fn decode(&self, record: &[u8]) -> Option<DecodedEvent> {
            let mut fields = Map::new();
            fields.insert(
                "message".to_string(),
                Value::String(String::from_utf8_lossy(record).into_owned()),
            );
            Some(DecodedEvent {
                timestamp: Utc::now(),
                fields,
            })
        }
    }

    #[test]
    fn matched_record_produces_event() {
        let dispatcher = ParseDispatcher::new(Box::new(EchoDecoder));
        let event = dispatcher.parse_record(b"hello").unwrap();
        assert_eq!(event.fields["message"], "hello");
    }

    #[test]
    fn not_matched_record_is_a_format_mismatch() {
        let dispatcher = ParseDispatcher::new(Box::new(RejectAll));
        let err = dispatcher.parse_record(b"anything").unwrap_err();
        match err {
            SweepError::FormatMismatch { record } => assert_eq!(record, "anything"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn long_records_are_truncated_in_diagnostics() {
        let dispatcher = ParseDispatcher::new(Box::new(RejectAll));
        let big = vec![b'x'; 2_000];
        let err = dispatcher.parse_record(&big).unwrap_err();
        match err {
            SweepError::FormatMismatch { record } => {
                assert!(record.len() < 600);
                assert!(record.ends_with("(truncated)"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
