//! Quarry gate watch
//!
//! Polls a gate camera for still frames, asks a vision model to describe the
//! vehicle in each frame, and records every real vehicle event in a monthly
//! traffic ledger together with a public link to an archived thumbnail.
//!
//! # Pipeline
//!
//! Each poll runs one iteration of
//! capture → classify → filter → archive → log, strictly in that order.
//! Any stage failure ends the iteration; the next poll starts fresh.
//!
//! # Module Structure
//!
//! - `ingest`: camera snapshot source (`FrameSource`)
//! - `classify`: vision model client and reply parsing (`Classifier`)
//! - `filter`: reportable-event decision
//! - `archive`: thumbnailing and public object stores (`ObjectStore`)
//! - `ledger`: monthly ledger resolution and backends (`LedgerBackend`)
//! - `driver`: the poll loop
//! - `google`: service-account auth shared by the Drive and Sheets backends
//! - `config`: layered configuration (file, then environment)

pub mod archive;
pub mod classify;
pub mod config;
pub mod driver;
pub mod error;
pub mod filter;
pub mod frame;
pub mod google;
pub mod ingest;
pub mod ledger;

pub use archive::{
    AnyStore, Archiver, DriveConfig, DriveStore, ImageReference, LocalStore, ObjectStore,
    SnapshotArchiver,
};
pub use classify::{
    ClassificationResult, Classifier, Direction, GeminiClassifier, GeminiConfig, LoadStatus,
    TarpStatus, VehicleType,
};
pub use config::{ArchiveBackend, LedgerBackendKind, QuarryConfig};
pub use driver::{IterationOutcome, PollDriver, PollStats};
pub use error::{PipelineError, StageResult};
pub use filter::is_reportable;
pub use frame::Frame;
pub use google::{ServiceAccountAuth, StaticToken, TokenProvider};
pub use ingest::{FrameSource, SnapshotConfig, SnapshotSource};
pub use ledger::{
    period_key, AnySink, LedgerBackend, LogRecord, LogSink, RecordSink, SheetsConfig,
    SheetsLedger, SqliteLedger, LEDGER_COLUMNS,
};
