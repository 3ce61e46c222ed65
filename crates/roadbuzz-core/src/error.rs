//! Validation errors for report payloads.
//!
//! These are the per-item soft errors of the merge pipeline: a payload
//! that fails validation is dropped and counted, never fatal to the batch
//! that carried it.

use thiserror::Error;

use crate::report::ReportId;

/// A report payload that cannot be admitted into the store.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ValidationError {
    /// The payload is not a well-formed report object (missing `id`,
    /// `createdAt`, coordinates, or a field of the wrong type).
    #[error("malformed report payload: {0}")]
    Decode(String),

    /// Coordinates are non-finite or outside the WGS84 range.
    #[error("report {id} has invalid coordinates ({latitude}, {longitude})")]
    Coordinates {
        /// Id of the offending report.
        id: ReportId,
        /// Latitude as received.
        latitude: f64,
        /// Longitude as received.
        longitude: f64,
    },

    /// The title is empty or whitespace-only.
    #[error("report {id} has an empty title")]
    EmptyTitle {
        /// Id of the offending report.
        id: ReportId,
    },
}

impl From<serde_json::Error> for ValidationError {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value.to_string())
    }
}
