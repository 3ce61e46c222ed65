//! Reconciliation core for the roadbuzz live traffic-report view.
//!
//! This crate holds the logic that keeps a bounded, de-duplicated,
//! time-windowed view of community traffic reports consistent across two
//! asynchronous inputs: a polled REST snapshot and a push stream of
//! incremental report updates. It is deliberately free of I/O; the
//! collaborators that talk to the network live in `roadbuzz-client`.
//!
//! The central type is [`store::ReportStore`], which exposes three merge
//! primitives (`replace_snapshot`, `apply_update`, `apply_vote_result`)
//! and a non-blocking ordered read (`current_view`).

pub mod config;
pub mod error;
pub mod recency;
pub mod report;
pub mod store;

pub use config::{ClientConfig, ConfigError};
pub use error::ValidationError;
pub use recency::{DEFAULT_RECENCY_WINDOW, RecencyPolicy};
pub use report::{Category, NewReport, Report, ReportId, Reporter, Severity, VoteType};
pub use store::{MergeOutcome, ReportStore, SnapshotSummary};
