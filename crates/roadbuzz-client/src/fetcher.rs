//! Snapshot fetcher.
//!
//! Pulls the recent-reports snapshot over REST and replaces the store's
//! visible set. On any failure the store is left untouched and the error
//! goes back to the caller; there is no automatic retry loop here — a
//! persistent backend failure should be visible, not masked.

use std::sync::Arc;

use chrono::Utc;
use roadbuzz_core::ReportStore;
use tracing::{info, warn};

use crate::error::ClientError;
use crate::gateway::ReportsGateway;

/// Feeds the store from the REST snapshot endpoint.
pub struct SnapshotFetcher {
    gateway: Arc<dyn ReportsGateway>,
    store: Arc<ReportStore>,
}

impl SnapshotFetcher {
    /// Creates a fetcher over the given gateway and store.
    #[must_use]
    pub fn new(gateway: Arc<dyn ReportsGateway>, store: Arc<ReportStore>) -> Self {
        Self { gateway, store }
    }

    /// Fetches a snapshot and replaces the visible set.
    ///
    /// Returns the number of reports visible after the replace.
    ///
    /// # Errors
    ///
    /// Returns the transport/API error unchanged; the store is not
    /// modified when the fetch fails.
    pub async fn fetch_and_replace(&self) -> Result<usize, ClientError> {
        let hours = self.store.recency().window_hours();
        let rows = self.gateway.fetch_recent(hours).await?;
        let summary = self.store.replace_snapshot(&rows, Utc::now());
        if summary.dropped > 0 {
            warn!(dropped = summary.dropped, "snapshot contained malformed rows");
        }
        info!(
            applied = summary.applied,
            skipped = summary.skipped,
            preserved = summary.preserved,
            "snapshot applied"
        );
        Ok(summary.applied)
    }
}
