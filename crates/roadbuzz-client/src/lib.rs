//! Network-facing collaborators for the roadbuzz live view.
//!
//! The reconciliation logic itself lives in `roadbuzz-core`; this crate
//! supplies everything around it:
//!
//! - [`gateway`]: REST access to the reports backend (snapshot, vote,
//!   create, delete)
//! - [`fetcher`]: snapshot pull that replaces the store's visible set
//! - [`voting`] / [`authoring`]: authenticated write-through commands
//! - [`transport`]: the push-channel abstraction and its HTTP streaming
//!   implementation
//! - [`lifecycle`]: reference-counted subscription management with
//!   automatic reconnect and reconcile-on-connect
//! - [`client`]: the assembled facade

pub mod authoring;
pub mod client;
pub mod error;
pub mod fetcher;
pub mod gateway;
pub mod lifecycle;
pub mod session;
pub mod transport;
pub mod voting;

pub use authoring::ReportAuthoring;
pub use client::RoadbuzzClient;
pub use error::ClientError;
pub use fetcher::SnapshotFetcher;
pub use gateway::{BoxFuture, HttpReportsGateway, ReportsGateway};
pub use lifecycle::{ChannelState, LiveUpdateFeed, Subscription};
pub use session::Session;
pub use transport::{HttpStreamTransport, PushConnection, PushTransport};
pub use voting::VoteCommandHandler;
