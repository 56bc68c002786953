//! File-sweep ingestion engine.
//!
//! Periodically discovers files dropped into a directory tree, claims
//! exclusive ownership of each one across cooperating engine instances,
//! splits its contents into size-bounded records, decodes every record via
//! an injected [`Decoder`](parse::Decoder), emits the results to an
//! [`EventSink`](sink::EventSink), and gives the file a terminal
//! disposition: deleted, archived, or renamed to an error location.
//!
//! Coordination uses only filesystem primitives. A claim is an advisory
//! lock held across an atomic rename to a uniquely derived name, so no
//! file is processed twice and no central lock service is needed; claim
//! and error suffixes in filenames are the only state that survives a
//! tick. Bad data fails whole files, never partial ones: an oversized or
//! unparsable record aborts its file and routes it to an error name an
//! operator can inspect and resubmit.

pub mod claim;
pub mod config;
pub mod decoders;
pub mod dispose;
pub mod error;
pub mod framer;
pub mod parse;
pub mod scanner;
pub mod sink;
pub mod sweep;

pub use claim::{ClaimCoordinator, ClaimOutcome, LockOpenMode, LockWait};
pub use config::{ConfigError, SweepConfig};
pub use decoders::DecoderConfig;
pub use dispose::DispositionHandler;
pub use error::{Result, SweepError};
pub use framer::RecordFramer;
pub use parse::{DecodedEvent, Decoder, EmitMode, ParseDispatcher};
pub use scanner::Scanner;
pub use sink::{EventSink, JsonLinesSink, MemorySink};
pub use sweep::{SweepHandle, SweepLoop};
