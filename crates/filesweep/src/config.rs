//! Engine configuration and validation.

use crate::claim::LockOpenMode;
use crate::decoders::DecoderConfig;
use crate::parse::EmitMode;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_MAX_RECORD_BYTES: u64 = 536_870_912; // 512 MiB
const DEFAULT_SCAN_INTERVAL_SECS: u64 = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{0}")]
    Invalid(String),
}

/// Sweep engine configuration.
///
/// Defaults match the operational conventions of directory-drop ingestion:
/// newline-delimited records, 512 MiB record bound, five-second ticks.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SweepConfig {
    /// Glob pattern selecting candidate files.
    pub pattern: String,

    /// Minimum age in seconds (now - mtime) before a file is considered
    /// stable enough to claim.
    pub min_file_age_secs: u64,

    /// Tag attached to every emitted event.
    #[serde(default = "default_tag")]
    pub tag: String,

    /// Suffix marking claimed files. Must not be empty.
    #[serde(default = "default_processing_suffix")]
    pub processing_suffix: String,

    /// Suffix marking error-disposed files. Must not be empty.
    #[serde(default = "default_error_suffix")]
    pub error_suffix: String,

    /// Record delimiter bytes.
    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    /// Maximum record size; a longer record aborts its whole file.
    #[serde(default = "default_max_record_bytes")]
    pub max_record_bytes: u64,

    /// Root under which processed files are archived (mirroring their
    /// original absolute directory). Ignored with `remove_after_processing`.
    #[serde(default = "default_archive_root")]
    pub archive_root: PathBuf,

    /// Delete processed files instead of archiving them.
    #[serde(default)]
    pub remove_after_processing: bool,

    /// Seconds between sweep ticks.
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,

    /// Per-record or whole-file-batch emission.
    #[serde(default)]
    pub emit_mode: EmitMode,

    /// Open mode used when locking candidates; some network filesystems
    /// require write access to flock.
    #[serde(default)]
    pub lock_open_mode: LockOpenMode,

    /// Claim-name identity for this engine instance. Defaults to the
    /// process id; set it when several instances share one process.
    #[serde(default)]
    pub acquirer_id: Option<String>,

    /// Record decoder selection and options.
    pub decoder: DecoderConfig,
}

fn default_tag() -> String {
    "file.sweep".to_string()
}

fn default_processing_suffix() -> String {
    ".processing".to_string()
}

fn default_error_suffix() -> String {
    ".error".to_string()
}

fn default_delimiter() -> String {
    "\n".to_string()
}

fn default_max_record_bytes() -> u64 {
    DEFAULT_MAX_RECORD_BYTES
}

fn default_archive_root() -> PathBuf {
    PathBuf::from("/tmp")
}

fn default_scan_interval_secs() -> u64 {
    DEFAULT_SCAN_INTERVAL_SECS
}

impl SweepConfig {
    /// Load and validate a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: SweepConfig =
            toml::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot run safely.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pattern.is_empty() {
            return Err(ConfigError::Invalid("`pattern` must not be empty".into()));
        }
        glob::Pattern::new(&self.pattern).map_err(|e| {
            ConfigError::Invalid(format!("`pattern` is not a valid glob: {e}"))
        })?;
        if self.processing_suffix.is_empty() {
            return Err(ConfigError::Invalid(
                "`processing_suffix` must not be empty".into(),
            ));
        }
        if self.error_suffix.is_empty() {
            return Err(ConfigError::Invalid(
                "`error_suffix` must not be empty".into(),
            ));
        }
        if self.delimiter.is_empty() {
            return Err(ConfigError::Invalid("`delimiter` must not be empty".into()));
        }
        if self.max_record_bytes == 0 {
            return Err(ConfigError::Invalid(
                "`max_record_bytes` must be positive".into(),
            ));
        }
        if let Some(id) = &self.acquirer_id {
            if id.is_empty() || id.contains('.') {
                return Err(ConfigError::Invalid(
                    "`acquirer_id` must be non-empty and must not contain `.`".into(),
                ));
            }
        }
        if !self.remove_after_processing {
            fs::create_dir_all(&self.archive_root).map_err(|e| {
                ConfigError::Invalid(format!(
                    "`archive_root` ({}) must be writable: {e}",
                    self.archive_root.display()
                ))
            })?;
        }
        // Decoder options are checked by the same build used at startup.
        self.decoder.build()?;
        Ok(())
    }
}
