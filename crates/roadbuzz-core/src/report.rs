//! Report data model and wire format.
//!
//! The wire format is the backend's camelCase JSON. `id` and `createdAt`
//! are required; everything else is defaulted so that a sparse payload
//! still decodes. Validation beyond shape (finite coordinates, non-empty
//! title) lives in [`Report::validate`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Stable identifier of a report, unique within the backend.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct ReportId(pub i64);

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<i64> for ReportId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Incident category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    TrafficJam,
    Accident,
    RoadClosed,
    Checkpoint,
    Construction,
    Flooding,
    Other,
}

/// Incident severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Direction of a vote.
///
/// The backend's canonical wire values are `UPVOTE` / `DOWNVOTE`. The bare
/// `UP` / `DOWN` strings that a superseded client draft sent are accepted
/// as input aliases but never emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoteType {
    /// Upvote, serialized as `UPVOTE`.
    #[serde(rename = "UPVOTE", alias = "UP")]
    Up,
    /// Downvote, serialized as `DOWNVOTE`.
    #[serde(rename = "DOWNVOTE", alias = "DOWN")]
    Down,
}

/// External identity of the user who filed a report. Read-only here;
/// moderation and account state are owned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reporter {
    /// Backend user id.
    pub id: i64,
    /// Display name.
    pub username: String,
}

/// A single traffic-incident record as reconciled by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Unique, stable identifier.
    pub id: ReportId,
    /// Short human-readable title. Required and non-blank.
    pub title: String,
    /// Longer free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Incident category.
    pub category: Category,
    /// Incident severity.
    pub severity: Severity,
    /// WGS84 latitude.
    pub latitude: f64,
    /// WGS84 longitude.
    pub longitude: f64,
    /// Reverse-geocoded address, if the backend resolved one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Photo attachment URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Set by the backend's moderation flow, never by this client.
    #[serde(default)]
    pub verified: bool,
    /// `false` means the report is retired and must leave the live view.
    #[serde(default = "default_active")]
    pub active: bool,
    /// Server-computed upvote tally.
    #[serde(default)]
    pub upvotes: u32,
    /// Server-computed downvote tally.
    #[serde(default)]
    pub downvotes: u32,
    /// Creation time, immutable once set. Required.
    pub created_at: DateTime<Utc>,
    /// Last server-side modification time, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Who filed the report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reported_by: Option<Reporter>,
}

const fn default_active() -> bool {
    true
}

impl Report {
    /// Decodes and validates a single report payload.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if the payload is malformed or fails
    /// semantic validation. Callers drop the item and count it; a bad
    /// payload is never fatal to the batch it arrived in.
    pub fn decode(value: serde_json::Value) -> Result<Self, ValidationError> {
        let report: Self = serde_json::from_value(value)?;
        report.validate()?;
        Ok(report)
    }

    /// Checks the invariants serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Coordinates`] for non-finite or
    /// out-of-range coordinates and [`ValidationError::EmptyTitle`] for a
    /// blank title.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let lat_ok = self.latitude.is_finite() && self.latitude.abs() <= 90.0;
        let lon_ok = self.longitude.is_finite() && self.longitude.abs() <= 180.0;
        if !lat_ok || !lon_ok {
            return Err(ValidationError::Coordinates {
                id: self.id,
                latitude: self.latitude,
                longitude: self.longitude,
            });
        }
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle { id: self.id });
        }
        Ok(())
    }

    /// The timestamp used to compare snapshot rows against stream updates:
    /// `updated_at` when the server set one, otherwise `created_at`.
    #[must_use]
    pub fn freshness(&self) -> DateTime<Utc> {
        self.updated_at.unwrap_or(self.created_at)
    }
}

/// Payload for creating a new report. The backend assigns `id`,
/// `createdAt`, vote tallies, and the reporter identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReport {
    /// Short human-readable title.
    pub title: String,
    /// Longer free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Incident category.
    pub category: Category,
    /// Incident severity.
    pub severity: Severity,
    /// WGS84 latitude.
    pub latitude: f64,
    /// WGS84 longitude.
    pub longitude: f64,
    /// Street address, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Photo attachment URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}
