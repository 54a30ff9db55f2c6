//! Error types for clue.

use clue_geo::GeoError;
use thiserror::Error;

/// Result type alias using clue's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Rejections of malformed pagination or filter input.
///
/// Always the caller's fault; never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("skip must be >= 0, got {0}")]
    NegativeSkip(i64),

    #[error("limit must be between 1 and {max}, got {limit}")]
    LimitOutOfRange { limit: i64, max: i64 },

    #[error("unknown sort field '{field}' for {entity}")]
    UnknownSortField { entity: &'static str, field: String },

    #[error("invalid sort direction '{0}', expected ASC or DESC")]
    InvalidSortDirection(String),

    #[error("unknown filter '{key}' for {entity}")]
    UnknownFilter { entity: &'static str, key: String },

    #[error("invalid value for filter '{key}': {reason}")]
    InvalidFilterValue { key: String, reason: String },
}

/// Core error type for clue operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed pagination/filter input
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Unusable search region (zero area, non-finite corner)
    #[error("Invalid region: {0}")]
    DegenerateRegion(#[from] GeoError),

    /// A store call exceeded its deadline
    #[error("Store timeout: {operation} exceeded {timeout_ms}ms")]
    StoreTimeout { operation: String, timeout_ms: u64 },

    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Any other store-layer failure
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Store returned data violating an invariant
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Caller-facing error classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    DegenerateRegion,
    Timeout,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::DegenerateRegion => "degenerate_region",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Internal => "internal",
        }
    }
}

impl Error {
    /// Map onto the caller-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::DegenerateRegion(e) if e.is_degenerate() => ErrorKind::DegenerateRegion,
            Error::DegenerateRegion(_) => ErrorKind::Validation,
            Error::StoreTimeout { .. } => ErrorKind::Timeout,
            Error::Database(_) | Error::Store(_) | Error::Config(_) | Error::InvalidData(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Text safe to hand back to a caller. Internal failures never expose
    /// SQL or driver messages.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Validation | ErrorKind::DegenerateRegion => self.to_string(),
            ErrorKind::Timeout => "store request timed out".to_string(),
            ErrorKind::Internal => "internal error".to_string(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::InvalidData(e.to_string())
    }
}
