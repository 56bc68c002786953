//! Candidate discovery: glob listing with eligibility filtering.
//!
//! A path is eligible when it matches the configured pattern, is a regular
//! file, does not already carry the processing or error suffix, and has
//! been stable (now - mtime) for at least the minimum age. The age check
//! debounces against writers still appending; completion is inferred from
//! mtime, not content.

use crate::error::{Result, SweepError};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::debug;

/// Read-only lister of eligible candidate files.
#[derive(Debug, Clone)]
pub struct Scanner {
    pattern: String,
    processing_suffix: String,
    error_suffix: String,
    min_age: Duration,
}

impl Scanner {
    pub fn new(
        pattern: impl Into<String>,
        processing_suffix: impl Into<String>,
        error_suffix: impl Into<String>,
        min_age: Duration,
    ) -> Self {
        Self {
            pattern: pattern.into(),
            processing_suffix: processing_suffix.into(),
            error_suffix: error_suffix.into(),
            min_age,
        }
    }

    /// List all currently eligible paths. Failures cover the whole tick:
    /// the caller logs and retries on the next tick.
    pub fn list_eligible(&self) -> Result<Vec<PathBuf>> {
        let now = SystemTime::now();
        let entries = glob::glob(&self.pattern).map_err(|e| SweepError::Pattern {
            pattern: self.pattern.clone(),
            source: e,
        })?;

        let mut eligible = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| SweepError::fs("listing candidate files", e.into()))?;
            if self.is_marked(&path) {
                continue;
            }
            let metadata = match fs::metadata(&path) {
                Ok(m) => m,
                // Another instance can claim the file between the glob and
                // the stat; that is not a scan failure.
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(SweepError::fs(
                        format!("reading metadata for {}", path.display()),
                        e,
                    ))
                }
            };
            if !metadata.is_file() {
                continue;
            }
            let modified = metadata.modified().map_err(|e| {
                SweepError::fs(format!("reading mtime for {}", path.display()), e)
            })?;
            let age = now
                .duration_since(modified)
                .unwrap_or(Duration::ZERO);
            if age < self.min_age {
                debug!(path = %path.display(), "file too young, waiting");
                continue;
            }
            eligible.push(path);
        }
        Ok(eligible)
    }

    fn is_marked(&self, path: &Path) -> bool {
        let name = path.to_string_lossy();
        name.ends_with(self.processing_suffix.as_str())
            || name.ends_with(self.error_suffix.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::{set_file_mtime, FileTime};
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn create_file(dir: &Path, name: &str, age_secs: i64) -> PathBuf {
        let path = dir.join(name);
        File::create(&path).unwrap().write_all(b"data\n").unwrap();
        let mtime = FileTime::from_unix_time(FileTime::now().unix_seconds() - age_secs, 0);
        set_file_mtime(&path, mtime).unwrap();
        path
    }

    fn scanner(dir: &Path, min_age_secs: u64) -> Scanner {
        Scanner::new(
            format!("{}/*", dir.display()),
            ".processing",
            ".error",
            Duration::from_secs(min_age_secs),
        )
    }

    #[test]
    fn lists_stable_unmarked_files() {
        let dir = TempDir::new().unwrap();
        let old = create_file(dir.path(), "old.tsv", 60);
        create_file(dir.path(), "claimed.tsv.99.1700000000.processing", 60);
        create_file(dir.path(), "bad.tsv.FormatMismatch.error", 60);

        let eligible = scanner(dir.path(), 5).list_eligible().unwrap();
        assert_eq!(eligible, vec![old]);
    }

    #[test]
    fn excludes_files_younger_than_min_age() {
        let dir = TempDir::new().unwrap();
        create_file(dir.path(), "fresh.tsv", 0);
        let old = create_file(dir.path(), "stable.tsv", 120);

        let eligible = scanner(dir.path(), 60).list_eligible().unwrap();
        assert_eq!(eligible, vec![old]);
    }

    #[test]
    fn zero_min_age_accepts_everything_unmarked() {
        let dir = TempDir::new().unwrap();
        create_file(dir.path(), "now.tsv", 0);

        let eligible = scanner(dir.path(), 0).list_eligible().unwrap();
        assert_eq!(eligible.len(), 1);
    }

    #[test]
    fn directories_are_not_candidates() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("subdir")).unwrap();
        let file = create_file(dir.path(), "file.tsv", 60);

        let eligible = scanner(dir.path(), 5).list_eligible().unwrap();
        assert_eq!(eligible, vec![file]);
    }

    #[test]
    fn pattern_narrows_candidates() {
        let dir = TempDir::new().unwrap();
        let tsv = create_file(dir.path(), "a.tsv", 60);
        create_file(dir.path(), "b.json", 60);

        let scanner = Scanner::new(
            format!("{}/*.tsv", dir.path().display()),
            ".processing",
            ".error",
            Duration::from_secs(5),
        );
        assert_eq!(scanner.list_eligible().unwrap(), vec![tsv]);
    }

    #[test]
    fn empty_directory_is_an_empty_scan() {
        let dir = TempDir::new().unwrap();
        assert!(scanner(dir.path(), 5).list_eligible().unwrap().is_empty());
    }
}
