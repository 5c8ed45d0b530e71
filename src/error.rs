//! Unified error handling for the logbook pipeline.
//!
//! Only timestamp parsing is strict inside the core: a timestamp that cannot be
//! read would silently corrupt chronological ordering, so it is surfaced as
//! [`LogbookError::InvalidTimestamp`]. Everything else the core touches
//! (missing coordinates, geometry, mileage) resolves to a safe default.
//!
//! The remaining variants belong to the optional I/O layers.

use thiserror::Error;

/// Errors produced by the logbook library.
#[derive(Debug, Error)]
pub enum LogbookError {
    /// A trip timestamp that neither ISO parsing nor the 19-character fallback understood.
    #[error("invalid timestamp '{value}'")]
    InvalidTimestamp { value: String },

    /// JSON payload could not be decoded.
    #[cfg(feature = "serde")]
    #[error("JSON decode error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport-level HTTP failure.
    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote API answered with a non-success status.
    #[cfg(feature = "http")]
    #[error("{endpoint} failed: {status} - {body}")]
    Api {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The remote API answered with a payload of the wrong shape.
    #[cfg(feature = "http")]
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl LogbookError {
    pub(crate) fn invalid_timestamp(value: &str) -> Self {
        Self::InvalidTimestamp {
            value: value.to_string(),
        }
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, LogbookError>;
