//! Error taxonomy for the network-facing collaborators.

use thiserror::Error;

/// Errors surfaced by fetch, vote, authoring, and push-channel
/// operations. Everything here is reported to the caller; nothing in
/// this crate panics the hosting process over a network condition.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// The operation requires an authenticated session and none is
    /// present. Raised before any network call is made.
    #[error("not authenticated: a signed-in session is required")]
    Unauthorized,

    /// Network or connection failure. Retryable at the caller's
    /// discretion.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server rejected the mutation as a duplicate or conflicting
    /// write. The store is left unchanged.
    #[error("rejected by server: {0}")]
    Conflict(String),

    /// Any other non-success HTTP status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, as far as it could be read.
        message: String,
    },

    /// A response body that should have been a report (or a list of
    /// them) did not parse.
    #[error("payload parse error: {0}")]
    Parse(String),

    /// Client-side configuration problem (bad base URL, builder
    /// failure).
    #[error("client configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value.to_string())
    }
}
