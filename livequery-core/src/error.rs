//! Error types for livequery operations

use thiserror::Error;

/// A channel predicate walked into a value that cannot be indexed.
///
/// Raised when an intermediate segment of a dot path is missing or null on
/// the record being tested. A missing leaf is not an error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Field path '{path}' cannot be resolved: segment '{segment}' reached a missing value")]
pub struct FieldPathError {
    /// The full dot path of the predicate.
    pub path: String,
    /// The segment that was applied to a missing or null value.
    pub segment: String,
}

/// Remote service errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request to {service} failed: {reason}")]
    RequestFailed { service: String, reason: String },

    #[error("{service} rejected the call with status {status}: {message}")]
    Rejected {
        service: String,
        status: u16,
        message: String,
    },

    #[error("Invalid response from {service}: {reason}")]
    InvalidResponse { service: String, reason: String },

    #[error("Record not found in {service}: {id}")]
    NotFound { service: String, id: String },

    #[error("Connection closed: {reason}")]
    ConnectionClosed { reason: String },
}

/// Master error type for cache operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Channel error: {0}")]
    FieldPath(#[from] FieldPathError),

    #[error("load_all did not converge after {limit} iterations (page {page} of {pages})")]
    IterationLimitExceeded { limit: usize, page: u64, pages: u64 },

    #[error("Cache state lock poisoned")]
    LockPoisoned,

    #[error("Cache for {service} has been destroyed")]
    Destroyed { service: String },
}

/// Result type alias for remote service calls.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

// =============================================================================
// TESTS
// =============================================================================
