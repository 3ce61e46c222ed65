//! Caller session state.
//!
//! Authentication itself (login, token refresh) is out of scope; the
//! token is obtained elsewhere and handed to the session. The session's
//! job is to gate authenticated commands locally so that an anonymous
//! caller is rejected before any network traffic happens.

use std::sync::RwLock;

use secrecy::{ExposeSecret, SecretString};

use crate::error::ClientError;

/// Holds the optional bearer token for the current user.
///
/// Shared behind an `Arc`; sign-in and sign-out may happen while other
/// components hold a reference.
#[derive(Debug, Default)]
pub struct Session {
    token: RwLock<Option<SecretString>>,
}

impl Session {
    /// A session with no credentials.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A session carrying a bearer token.
    #[must_use]
    pub fn authenticated(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(SecretString::from(token.into()))),
        }
    }

    /// Installs (or replaces) the bearer token.
    pub fn sign_in(&self, token: impl Into<String>) {
        let mut guard = self.token.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(SecretString::from(token.into()));
    }

    /// Drops the bearer token.
    pub fn sign_out(&self) {
        let mut guard = self.token.write().unwrap_or_else(|e| e.into_inner());
        *guard = None;
    }

    /// True when a token is installed.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Returns the bearer token for an outgoing request.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Unauthorized`] when no token is installed.
    pub fn bearer_token(&self) -> Result<SecretString, ClientError> {
        self.token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|t| SecretString::from(t.expose_secret().to_owned()))
            .ok_or(ClientError::Unauthorized)
    }
}
