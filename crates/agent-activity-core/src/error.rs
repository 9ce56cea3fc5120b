//! Error kinds shared by every layer of Agent Activity.
//!
//! Reconstruction and aggregation never fail on well-formed input, so the
//! only errors are rejected input and store failures. The transport decides
//! how to surface each kind; [`ActivityError::is_retryable`] tells it
//! whether a client may simply try again.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActivityError {
    /// Malformed append. The record was rejected and nothing was stored.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// Bad caller input, rejected before any store access.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Transient I/O failure. Every query is read-only, so retrying the
    /// whole query is safe.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Structural inconsistency detected in stored data. Not retried.
    #[error("store corrupt: {0}")]
    StoreCorrupt(String),
}

impl ActivityError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ActivityError::StoreUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, ActivityError>;
