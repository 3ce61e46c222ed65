//! Vote command handler.
//!
//! Votes are write-through: the server computes the tallies and this
//! handler folds the acknowledged report back into the store. There is no
//! optimistic local increment — a failed write would otherwise leave the
//! view permanently diverged from the backend.

use std::sync::Arc;

use chrono::Utc;
use roadbuzz_core::{Report, ReportId, ReportStore, VoteType};
use tracing::info;

use crate::error::ClientError;
use crate::gateway::ReportsGateway;
use crate::session::Session;

/// Issues vote mutations and reconciles the authoritative response.
pub struct VoteCommandHandler {
    gateway: Arc<dyn ReportsGateway>,
    store: Arc<ReportStore>,
    session: Arc<Session>,
}

impl VoteCommandHandler {
    /// Creates a handler over the given collaborators.
    #[must_use]
    pub fn new(
        gateway: Arc<dyn ReportsGateway>,
        store: Arc<ReportStore>,
        session: Arc<Session>,
    ) -> Self {
        Self {
            gateway,
            store,
            session,
        }
    }

    /// Casts a vote on `id` and folds the server's updated report into
    /// the store.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Unauthorized`] for an anonymous session, raised
    ///   before any network call.
    /// - [`ClientError::Conflict`] when the server rejects a duplicate
    ///   vote; the store is left unchanged.
    /// - [`ClientError::Transport`] / [`ClientError::Api`] on remote
    ///   failure; the store is left unchanged.
    pub async fn vote(&self, id: ReportId, vote: VoteType) -> Result<Report, ClientError> {
        let token = self.session.bearer_token()?;
        let report = self.gateway.vote(id, vote, &token).await?;
        info!(
            report_id = %report.id,
            upvotes = report.upvotes,
            downvotes = report.downvotes,
            "vote acknowledged"
        );
        self.store.apply_vote_result(report.clone(), Utc::now());
        Ok(report)
    }
}
