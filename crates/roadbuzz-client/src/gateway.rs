//! REST gateway to the traffic-reports backend.
//!
//! [`ReportsGateway`] is the object-safe seam the fetcher and command
//! handlers talk through; tests substitute in-memory fakes.
//! [`HttpReportsGateway`] is the production implementation over reqwest.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use roadbuzz_core::{NewReport, Report, ReportId, VoteType};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::debug;

use crate::error::ClientError;

/// Boxed future used to keep the gateway traits object-safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Remote operations on the reports collection.
pub trait ReportsGateway: Send + Sync {
    /// Fetches the recent-reports snapshot, raw rows included, so the
    /// store can validate each row independently.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-success status.
    fn fetch_recent(&self, hours: u32) -> BoxFuture<'_, Result<Vec<serde_json::Value>, ClientError>>;

    /// Casts a vote and returns the authoritative updated report.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Conflict`] for a rejected duplicate vote,
    /// [`ClientError::Unauthorized`] when the token is not accepted.
    fn vote<'a>(
        &'a self,
        id: ReportId,
        vote: VoteType,
        token: &'a SecretString,
    ) -> BoxFuture<'a, Result<Report, ClientError>>;

    /// Creates a report and returns the server's echo with assigned id
    /// and timestamps.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or rejection.
    fn create_report<'a>(
        &'a self,
        draft: &'a NewReport,
        token: &'a SecretString,
    ) -> BoxFuture<'a, Result<Report, ClientError>>;

    /// Retires a report.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or rejection.
    fn delete_report<'a>(
        &'a self,
        id: ReportId,
        token: &'a SecretString,
    ) -> BoxFuture<'a, Result<(), ClientError>>;
}

#[derive(Serialize)]
struct VoteBody {
    #[serde(rename = "voteType")]
    vote_type: VoteType,
}

/// Gateway over the HTTP REST API.
pub struct HttpReportsGateway {
    http: reqwest::Client,
    base_url: String,
}

impl HttpReportsGateway {
    /// Creates a gateway rooted at `base_url` (the API base, e.g.
    /// `http://localhost:8080/api`).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] if the HTTP client cannot be
    /// built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("roadbuzz-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::Config(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn reports_url(&self, suffix: &str) -> String {
        format!("{}/traffic-reports{suffix}", self.base_url)
    }

    async fn fetch_recent_inner(&self, hours: u32) -> Result<Vec<serde_json::Value>, ClientError> {
        let url = self.reports_url("/recent");
        debug!(%url, hours, "fetching report snapshot");
        let response = self
            .http
            .get(&url)
            .query(&[("hours", hours)])
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    async fn vote_inner(
        &self,
        id: ReportId,
        vote: VoteType,
        token: &SecretString,
    ) -> Result<Report, ClientError> {
        let url = self.reports_url(&format!("/{id}/vote"));
        debug!(%url, ?vote, "posting vote");
        let response = self
            .http
            .post(&url)
            .bearer_auth(token.expose_secret())
            .json(&VoteBody { vote_type: vote })
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    async fn create_inner(
        &self,
        draft: &NewReport,
        token: &SecretString,
    ) -> Result<Report, ClientError> {
        let url = self.reports_url("");
        debug!(%url, "creating report");
        let response = self
            .http
            .post(&url)
            .bearer_auth(token.expose_secret())
            .json(draft)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    async fn delete_inner(&self, id: ReportId, token: &SecretString) -> Result<(), ClientError> {
        let url = self.reports_url(&format!("/{id}"));
        debug!(%url, "deleting report");
        let response = self
            .http
            .delete(&url)
            .bearer_auth(token.expose_secret())
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

impl ReportsGateway for HttpReportsGateway {
    fn fetch_recent(
        &self,
        hours: u32,
    ) -> BoxFuture<'_, Result<Vec<serde_json::Value>, ClientError>> {
        Box::pin(self.fetch_recent_inner(hours))
    }

    fn vote<'a>(
        &'a self,
        id: ReportId,
        vote: VoteType,
        token: &'a SecretString,
    ) -> BoxFuture<'a, Result<Report, ClientError>> {
        Box::pin(self.vote_inner(id, vote, token))
    }

    fn create_report<'a>(
        &'a self,
        draft: &'a NewReport,
        token: &'a SecretString,
    ) -> BoxFuture<'a, Result<Report, ClientError>> {
        Box::pin(self.create_inner(draft, token))
    }

    fn delete_report<'a>(
        &'a self,
        id: ReportId,
        token: &'a SecretString,
    ) -> BoxFuture<'a, Result<(), ClientError>> {
        Box::pin(self.delete_inner(id, token))
    }
}

/// Maps non-success statuses onto the error taxonomy.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(match status.as_u16() {
        401 | 403 => ClientError::Unauthorized,
        409 => ClientError::Conflict(message),
        code => ClientError::Api {
            status: code,
            message,
        },
    })
}
