//! Exclusive per-file claims built from advisory locks and atomic rename.
//!
//! The filesystem is the only coordination medium: cooperating engine
//! instances (same or different hosts on a shared filesystem) take a
//! non-blocking exclusive `flock` on a candidate and, while holding it,
//! rename the file to a claim name embedding the acquirer id and a
//! timestamp. The rename-under-lock closes the race where two instances
//! both pass the lock check; after the rename only the claiming instance
//! knows the new name, so the lock is released immediately.
//!
//! Uses the `fs2` crate for cross-platform file locking (MSRV 1.75
//! compatible; std's File::lock needs Rust 1.89+).

use crate::error::{Result, SweepError};
use chrono::Utc;
use fs2::FileExt;
use serde::Deserialize;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// How candidate files are opened for locking. Some network filesystems
/// only honor flock on write-open handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockOpenMode {
    #[default]
    ReadOnly,
    ReadWrite,
}

/// Whether a locked rename waits for the lock or gives up immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockWait {
    /// Fail fast; used by claim attempts where contention is expected.
    NoWait,
    /// Block until the lock is free; used by the error-disposition rename,
    /// where this instance is already the sole owner.
    Wait,
}

/// Outcome of a claim attempt. A busy lock is not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The file was renamed to the returned claim path and is now owned
    /// exclusively by this instance.
    Claimed(PathBuf),
    /// Another instance holds the lock; the file is untouched and will be
    /// reconsidered next tick.
    SkippedLocked,
}

/// Takes and releases exclusive ownership of candidate files.
#[derive(Debug, Clone)]
pub struct ClaimCoordinator {
    acquirer_id: String,
    processing_suffix: String,
    open_mode: LockOpenMode,
}

impl ClaimCoordinator {
    /// Create a coordinator identified by this process id.
    pub fn new(processing_suffix: impl Into<String>, open_mode: LockOpenMode) -> Self {
        Self {
            acquirer_id: std::process::id().to_string(),
            processing_suffix: processing_suffix.into(),
            open_mode,
        }
    }

    /// Override the acquirer identity. Needed when several coordinators run
    /// in one process. The id must not contain `.`, which delimits the
    /// claim-name segments.
    pub fn with_acquirer_id(mut self, acquirer_id: impl Into<String>) -> Self {
        let acquirer_id = acquirer_id.into();
        debug_assert!(!acquirer_id.contains('.'));
        self.acquirer_id = acquirer_id;
        self
    }

    /// The claim name this coordinator would use for `path` right now:
    /// `<path>.<acquirer_id>.<unix_ts><processing_suffix>`. Distinct
    /// acquirers can never produce colliding names for the same file.
    pub fn claim_path(&self, path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(format!(
            ".{}.{}{}",
            self.acquirer_id,
            Utc::now().timestamp(),
            self.processing_suffix
        ));
        PathBuf::from(name)
    }

    /// Attempt to claim `path`. On success the original path no longer
    /// exists; only the returned claim path does, until disposition.
    pub fn claim(&self, path: &Path) -> Result<ClaimOutcome> {
        let claim_path = self.claim_path(path);
        if self.rename_locked(path, &claim_path, LockWait::NoWait)? {
            debug!(path = %path.display(), claim = %claim_path.display(), "claimed file");
            Ok(ClaimOutcome::Claimed(claim_path))
        } else {
            warn!(path = %path.display(), "lock busy, skipping file");
            Ok(ClaimOutcome::SkippedLocked)
        }
    }

    /// Rename `from` to `to` while holding an exclusive advisory lock on
    /// `from`, so concurrent scanners never observe a half-claimed file.
    /// Returns `false` if `NoWait` was requested and the lock was busy.
    pub fn rename_locked(&self, from: &Path, to: &Path, wait: LockWait) -> Result<bool> {
        let mut options = OpenOptions::new();
        options.read(true);
        if self.open_mode == LockOpenMode::ReadWrite {
            options.write(true);
        }
        let file = options
            .open(from)
            .map_err(|e| SweepError::fs(format!("opening {} for locking", from.display()), e))?;

        match wait {
            LockWait::NoWait => match FileExt::try_lock_exclusive(&file) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
                Err(e) => {
                    return Err(SweepError::fs(
                        format!("locking {}", from.display()),
                        e,
                    ))
                }
            },
            LockWait::Wait => {
                FileExt::lock_exclusive(&file)
                    .map_err(|e| SweepError::fs(format!("locking {}", from.display()), e))?;
            }
        }

        // The rename must happen while the lock is held.
        fs::rename(from, to).map_err(|e| {
            SweepError::fs(
                format!("renaming {} to {}", from.display(), to.display()),
                e,
            )
        })?;

        // Lock released when `file` closes here.
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn coordinator(suffix: &str) -> ClaimCoordinator {
        ClaimCoordinator::new(suffix, LockOpenMode::ReadOnly)
    }

    #[test]
    fn claim_renames_to_processing_name() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("input.tsv");
        File::create(&path).unwrap().write_all(b"x\n").unwrap();

        let claims = coordinator(".processing").with_acquirer_id("42");
        let outcome = claims.claim(&path).unwrap();
        let claim_path = match outcome {
            ClaimOutcome::Claimed(p) => p,
            other => panic!("expected claim, got {other:?}"),
        };

        assert!(!path.exists());
        assert!(claim_path.exists());
        let name = claim_path.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("input.tsv.42."));
        assert!(name.ends_with(".processing"));
    }

    #[test]
    fn claim_names_are_injective_across_acquirers() {
        let path = Path::new("/data/in/input.tsv");
        let a = coordinator(".processing").with_acquirer_id("1001");
        let b = coordinator(".processing").with_acquirer_id("1002");
        assert_ne!(a.claim_path(path), b.claim_path(path));
    }

    #[test]
    fn locked_file_is_skipped_not_errored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("contended.tsv");
        File::create(&path).unwrap().write_all(b"x\n").unwrap();

        // Another instance: an independent open file description holding
        // the exclusive lock conflicts even within one process.
        let holder = File::open(&path).unwrap();
        FileExt::try_lock_exclusive(&holder).unwrap();

        let claims = coordinator(".processing").with_acquirer_id("7");
        assert_eq!(claims.claim(&path).unwrap(), ClaimOutcome::SkippedLocked);
        assert!(path.exists(), "skipped file must be untouched");

        drop(holder);
        assert!(matches!(
            claims.claim(&path).unwrap(),
            ClaimOutcome::Claimed(_)
        ));
    }

    #[test]
    fn claim_of_missing_file_is_a_filesystem_error() {
        let dir = TempDir::new().unwrap();
        let claims = coordinator(".processing");
        let err = claims.claim(&dir.path().join("gone.tsv")).unwrap_err();
        assert_eq!(err.kind(), "FilesystemFailure");
    }

    #[test]
    fn rename_locked_waits_when_asked() {
        let dir = TempDir::new().unwrap();
        let from = dir.path().join("a");
        let to = dir.path().join("b");
        File::create(&from).unwrap();

        let claims = coordinator(".processing");
        assert!(claims.rename_locked(&from, &to, LockWait::Wait).unwrap());
        assert!(!from.exists());
        assert!(to.exists());
    }

    #[test]
    fn read_write_open_mode_also_claims() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rw.tsv");
        File::create(&path).unwrap().write_all(b"x\n").unwrap();

        let claims = ClaimCoordinator::new(".processing", LockOpenMode::ReadWrite);
        assert!(matches!(
            claims.claim(&path).unwrap(),
            ClaimOutcome::Claimed(_)
        ));
    }
}
