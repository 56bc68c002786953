//! The sweep loop: scan, claim, process, dispose.
//!
//! Design principles:
//! - One background thread per engine instance; candidates are processed
//!   sequentially within a tick
//! - Every per-file failure is isolated; nothing propagates out of the loop
//! - No state machine survives a tick beyond what filename suffixes encode
//! - Shutdown is observed between ticks; the in-flight file always finishes
//!   its claim -> process -> dispose sequence

use crate::claim::{ClaimCoordinator, ClaimOutcome};
use crate::config::SweepConfig;
use crate::dispose::DispositionHandler;
use crate::error::{Result, SweepError};
use crate::framer::RecordFramer;
use crate::parse::{Decoder, EmitMode, ParseDispatcher};
use crate::scanner::Scanner;
use crate::sink::EventSink;
use std::fs::File;
use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info};

/// Single engine instance sweeping one glob pattern.
pub struct SweepLoop {
    tag: String,
    delimiter: Vec<u8>,
    max_record_bytes: u64,
    emit_mode: EmitMode,
    scan_interval: Duration,
    scanner: Scanner,
    claims: ClaimCoordinator,
    dispatcher: ParseDispatcher,
    disposer: DispositionHandler,
    sink: Box<dyn EventSink>,
}

/// Controls a spawned sweep loop.
pub struct SweepHandle {
    stop_tx: mpsc::Sender<()>,
    join: JoinHandle<()>,
}

impl SweepHandle {
    /// Request a stop and wait for the loop to finish its in-flight tick.
    pub fn shutdown(self) {
        let _ = self.stop_tx.send(());
        let _ = self.join.join();
    }
}

impl SweepLoop {
    /// Assemble an engine instance from validated configuration plus the
    /// injected decoder and sink capabilities.
    pub fn new(config: SweepConfig, decoder: Box<dyn Decoder>, sink: Box<dyn EventSink>) -> Self {
        let mut claims = ClaimCoordinator::new(&config.processing_suffix, config.lock_open_mode);
        if let Some(id) = &config.acquirer_id {
            claims = claims.with_acquirer_id(id.clone());
        }
        let scanner = Scanner::new(
            &config.pattern,
            &config.processing_suffix,
            &config.error_suffix,
            Duration::from_secs(config.min_file_age_secs),
        );
        let disposer = DispositionHandler::new(
            config.remove_after_processing,
            &config.archive_root,
            &config.processing_suffix,
            &config.error_suffix,
            claims.clone(),
        );
        Self {
            tag: config.tag,
            delimiter: config.delimiter.into_bytes(),
            max_record_bytes: config.max_record_bytes,
            emit_mode: config.emit_mode,
            scan_interval: Duration::from_secs(config.scan_interval_secs),
            scanner,
            claims,
            dispatcher: ParseDispatcher::new(decoder),
            disposer,
            sink,
        }
    }

    /// Run the loop on a background thread until shutdown.
    pub fn spawn(mut self) -> Result<SweepHandle> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let join = thread::Builder::new()
            .name("filesweep-sweep".to_string())
            .spawn(move || {
                info!(interval_secs = self.scan_interval.as_secs(), "sweep loop started");
                loop {
                    match stop_rx.recv_timeout(self.scan_interval) {
                        Err(RecvTimeoutError::Timeout) => self.run_tick(),
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                info!("sweep loop stopped");
            })
            .map_err(|e| SweepError::fs("spawning sweep thread", e))?;
        Ok(SweepHandle { stop_tx, join })
    }

    /// One pass over all currently eligible files. Public so embedders and
    /// tests can drive ticks deterministically.
    pub fn run_tick(&mut self) {
        let candidates = match self.scanner.list_eligible() {
            Ok(candidates) => candidates,
            Err(e) => {
                error!(error = %e, "scan failed; will retry next tick");
                return;
            }
        };
        for path in candidates {
            self.sweep_file(&path);
        }
    }

    fn sweep_file(&mut self, path: &Path) {
        let claim_path = match self.claims.claim(path) {
            Ok(ClaimOutcome::Claimed(claim_path)) => claim_path,
            Ok(ClaimOutcome::SkippedLocked) => return,
            Err(e) => {
                // Nothing was renamed, so there is nothing to dispose.
                error!(
                    path = %path.display(),
                    error = %e,
                    error_kind = e.kind(),
                    "claim failed"
                );
                return;
            }
        };

        match self.process_claimed(&claim_path) {
            Ok(records) => {
                debug!(path = %path.display(), records, "processed file");
                if let Err(e) = self.disposer.on_success(&claim_path) {
                    error!(
                        path = %claim_path.display(),
                        error = %e,
                        error_kind = e.kind(),
                        "success disposition failed"
                    );
                    self.disposer.on_failure(&claim_path, &e);
                }
            }
            Err(e) => {
                error!(
                    path = %claim_path.display(),
                    error = %e,
                    error_kind = e.kind(),
                    "processing failed"
                );
                self.disposer.on_failure(&claim_path, &e);
            }
        }
    }

    /// Frame, decode, and emit one claimed file in byte order.
    fn process_claimed(&mut self, claim_path: &Path) -> Result<u64> {
        let file = File::open(claim_path)
            .map_err(|e| SweepError::fs(format!("opening {}", claim_path.display()), e))?;
        let framer = RecordFramer::new(file, self.delimiter.clone(), self.max_record_bytes);

        let mut emitted = 0u64;
        match self.emit_mode {
            EmitMode::PerRecord => {
                for record in framer {
                    let event = self.dispatcher.parse_record(&record?)?;
                    self.sink
                        .emit(&self.tag, event)
                        .map_err(|e| SweepError::fs("emitting event", e))?;
                    emitted += 1;
                }
            }
            EmitMode::FileBatch => {
                let mut events = Vec::new();
                for record in framer {
                    events.push(self.dispatcher.parse_record(&record?)?);
                }
                if !events.is_empty() {
                    emitted = events.len() as u64;
                    self.sink
                        .emit_batch(&self.tag, events)
                        .map_err(|e| SweepError::fs("emitting event batch", e))?;
                }
            }
        }
        Ok(emitted)
    }
}
