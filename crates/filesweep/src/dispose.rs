//! Terminal disposition of claimed files.
//!
//! Every claim ends in exactly one of: removal, archive-move, or
//! error-rename. The archive mirrors the source file's absolute directory
//! under the archive root, so same-named files from different directories
//! never collide. The error rename leaves the file next to where it was
//! found, carrying the error kind in its name as a durable audit trail.

use crate::claim::{ClaimCoordinator, LockWait};
use crate::error::{Result, SweepError};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, error, info};

/// Applies success and failure dispositions to claimed files.
#[derive(Debug, Clone)]
pub struct DispositionHandler {
    remove_after_processing: bool,
    archive_root: PathBuf,
    processing_suffix: String,
    error_suffix: String,
    claims: ClaimCoordinator,
}

impl DispositionHandler {
    pub fn new(
        remove_after_processing: bool,
        archive_root: impl Into<PathBuf>,
        processing_suffix: impl Into<String>,
        error_suffix: impl Into<String>,
        claims: ClaimCoordinator,
    ) -> Self {
        Self {
            remove_after_processing,
            archive_root: archive_root.into(),
            processing_suffix: processing_suffix.into(),
            error_suffix: error_suffix.into(),
            claims,
        }
    }

    /// Consume a successfully processed claim: delete it, or move it into
    /// the archive under its original name.
    pub fn on_success(&self, claim_path: &Path) -> Result<()> {
        if self.remove_after_processing {
            fs::remove_file(claim_path).map_err(|e| {
                SweepError::fs(format!("removing {}", claim_path.display()), e)
            })?;
            debug!(path = %claim_path.display(), "removed processed file");
            return Ok(());
        }

        let original_name = self.original_basename(claim_path);
        let dest_dir = mirror_under(&self.archive_root, &absolute_parent(claim_path)?);
        fs::create_dir_all(&dest_dir).map_err(|e| {
            SweepError::fs(format!("creating archive dir {}", dest_dir.display()), e)
        })?;
        let dest = dest_dir.join(original_name);
        move_file(claim_path, &dest)?;
        debug!(path = %claim_path.display(), archived = %dest.display(), "archived processed file");
        Ok(())
    }

    /// Consume a failed claim: rename it to
    /// `<original>.<error-kind><error_suffix>` in place, under a blocking
    /// lock. If that rename itself fails the file stays claimed; nothing
    /// safe remains to do automatically, so it is left for an operator.
    pub fn on_failure(&self, claim_path: &Path, cause: &SweepError) {
        let error_name = format!(
            "{}.{}{}",
            self.original_basename(claim_path),
            cause.kind(),
            self.error_suffix
        );
        let error_path = claim_path.with_file_name(error_name);
        match self
            .claims
            .rename_locked(claim_path, &error_path, LockWait::Wait)
        {
            Ok(_) => {
                info!(
                    path = %error_path.display(),
                    error_kind = cause.kind(),
                    "file moved to error disposition"
                );
            }
            Err(e) => {
                error!(
                    path = %claim_path.display(),
                    error = %e,
                    "error rename failed; leaving file claimed for manual recovery"
                );
            }
        }
    }

    /// Recover the original basename from a claim name by stripping the
    /// processing suffix and the `.<acquirer>.<timestamp>` infix. Falls
    /// back to the claim basename for names this engine did not create.
    fn original_basename(&self, claim_path: &Path) -> String {
        let name = claim_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        strip_claim_markers(&name, &self.processing_suffix).unwrap_or(name)
    }
}

fn strip_claim_markers(claim_name: &str, processing_suffix: &str) -> Option<String> {
    let stem = claim_name.strip_suffix(processing_suffix)?;
    let (rest, timestamp) = stem.rsplit_once('.')?;
    if timestamp.is_empty() || !timestamp.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let (original, acquirer) = rest.rsplit_once('.')?;
    if original.is_empty() || acquirer.is_empty() {
        return None;
    }
    Some(original.to_string())
}

/// Absolute directory containing `path`, for archive mirroring.
fn absolute_parent(path: &Path) -> Result<PathBuf> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::canonicalize(parent)
        .map_err(|e| SweepError::fs(format!("resolving directory of {}", path.display()), e))
}

/// Move a file, falling back to copy + remove when rename fails; the
/// archive root may sit on a different filesystem than the source.
fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to).map_err(|e| {
        SweepError::fs(
            format!("archiving {} to {}", from.display(), to.display()),
            e,
        )
    })?;
    fs::remove_file(from)
        .map_err(|e| SweepError::fs(format!("removing archived {}", from.display()), e))
}

/// Re-root an absolute directory under `root`, dropping root/prefix
/// components: `/archive` + `/data/in` -> `/archive/data/in`.
fn mirror_under(root: &Path, dir: &Path) -> PathBuf {
    let mut out = root.to_path_buf();
    for component in dir.components() {
        if let Component::Normal(part) = component {
            out.push(part);
        }
    }
    out
}
