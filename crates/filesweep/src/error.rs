//! Error taxonomy for the sweep engine.
//!
//! Lock contention is deliberately not represented here: a busy lock is an
//! expected outcome of concurrent sweeping and is surfaced as
//! [`ClaimOutcome::SkippedLocked`](crate::claim::ClaimOutcome), never as an
//! error. Everything in [`SweepError`] aborts processing of exactly one file;
//! nothing terminates the sweep loop.

use std::io;
use thiserror::Error;

/// A failure that aborts the current file and routes it to error disposition.
#[derive(Debug, Error)]
pub enum SweepError {
    /// A record grew past the configured size bound before a delimiter was
    /// seen. The whole file is rejected so an operator can inspect it.
    #[error("record exceeds {limit} bytes before a delimiter was seen")]
    OversizedRecord { limit: u64 },

    /// The decoder reported not-matched for a record. One bad record fails
    /// the whole file so operators fix and resubmit it atomically.
    #[error("record did not match the configured format: {record:?}")]
    FormatMismatch { record: String },

    /// Open/read/rename/remove failure during claim, framing, emission, or
    /// disposition.
    #[error("{context}: {source}")]
    Filesystem {
        context: String,
        #[source]
        source: io::Error,
    },

    /// The configured glob pattern could not be parsed.
    #[error("invalid glob pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

impl SweepError {
    pub(crate) fn fs(context: impl Into<String>, source: io::Error) -> Self {
        SweepError::Filesystem {
            context: context.into(),
            source,
        }
    }

    /// Short tag embedded in error-disposition filenames, e.g.
    /// `input.tsv.FormatMismatch.error`.
    pub fn kind(&self) -> &'static str {
        match self {
            SweepError::OversizedRecord { .. } => "OversizedRecord",
            SweepError::FormatMismatch { .. } => "FormatMismatch",
            SweepError::Filesystem { .. } | SweepError::Pattern { .. } => "FilesystemFailure",
        }
    }
}

pub type Result<T> = std::result::Result<T, SweepError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tags_match_disposition_names() {
        let oversized = SweepError::OversizedRecord { limit: 16 };
        assert_eq!(oversized.kind(), "OversizedRecord");

        let mismatch = SweepError::FormatMismatch {
            record: "bad".to_string(),
        };
        assert_eq!(mismatch.kind(), "FormatMismatch");

        let fs = SweepError::fs("renaming", io::Error::new(io::ErrorKind::Other, "boom"));
        assert_eq!(fs.kind(), "FilesystemFailure");
    }
}
