//! Report creation and retirement commands.
//!
//! Both are authenticated write-throughs, like voting: the server's
//! response (or the implied `active = false` on delete) is what reaches
//! the store, never a local guess.

use std::sync::Arc;

use chrono::Utc;
use roadbuzz_core::{NewReport, Report, ReportId, ReportStore};
use tracing::info;

use crate::error::ClientError;
use crate::gateway::ReportsGateway;
use crate::session::Session;

/// Issues create/delete mutations on reports.
pub struct ReportAuthoring {
    gateway: Arc<dyn ReportsGateway>,
    store: Arc<ReportStore>,
    session: Arc<Session>,
}

impl ReportAuthoring {
    /// Creates the command handler.
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

    /// Files a new report and folds the server's echo into the store.
    ///
    /// # Errors
    ///
    /// [`ClientError::Unauthorized`] for an anonymous session (before
    /// any network call), otherwise the gateway's error unchanged.
    pub async fn create_report(&self, draft: NewReport) -> Result<Report, ClientError> {
        let token = self.session.bearer_token()?;
        let report = self.gateway.create_report(&draft, &token).await?;
        info!(report_id = %report.id, "report created");
        self.store.apply_update(report.clone(), Utc::now());
        Ok(report)
    }

    /// Retires a report. On success the entry leaves the live view.
    ///
    /// # Errors
    ///
    /// [`ClientError::Unauthorized`] for an anonymous session (before
    /// any network call), otherwise the gateway's error unchanged.
    pub async fn delete_report(&self, id: ReportId) -> Result<(), ClientError> {
        let token = self.session.bearer_token()?;
        self.gateway.delete_report(id, &token).await?;
        info!(report_id = %id, "report retired");
        if let Some(mut existing) = self.store.get(id) {
            existing.active = false;
            self.store.apply_update(existing, Utc::now());
        }
        Ok(())
    }
}
