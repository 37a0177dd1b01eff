//! Error types for achievement-ledger
//!
//! Two layers:
//! - [`StorageError`] - failures raised by the reference store (SQLite) or the
//!   content store (sled). Never handed to callers of the services.
//! - [`LedgerError`] - the tagged kinds callers see. Each kind has a stable
//!   code and HTTP-style status so adapters can render it without matching
//!   on message text.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Status conflict: {0}")]
    Conflict(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    #[error("SQL error: {0}")]
    Sql(String),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl From<diesel::result::Error> for StorageError {
    fn from(error: diesel::result::Error) -> Self {
        StorageError::Sql(error.to_string())
    }
}

/// Errors returned by the lifecycle, aggregation and roster services
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Reference, content, student or lecturer missing
    #[error("Not found: {0}")]
    NotFound(String),

    /// Role not permitted, or ownership/advisor match failed
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Operation attempted outside its required status
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Status transition lost a race
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Credentials did not resolve to an active principal
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),
}

impl LedgerError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::NotFound(_) => "not_found",
            LedgerError::Forbidden(_) => "forbidden",
            LedgerError::InvalidState(_) => "invalid_state",
            LedgerError::Conflict(_) => "conflict",
            LedgerError::ValidationFailed(_) => "validation_failed",
            LedgerError::StoreUnavailable(_) => "store_unavailable",
            LedgerError::Unauthenticated(_) => "unauthenticated",
        }
    }

    /// HTTP status an adapter should answer with
    pub fn http_status(&self) -> u16 {
        match self {
            LedgerError::NotFound(_) => 404,
            LedgerError::Forbidden(_) => 403,
            LedgerError::InvalidState(_) => 422,
            LedgerError::Conflict(_) => 409,
            LedgerError::ValidationFailed(_) => 400,
            LedgerError::StoreUnavailable(_) => 503,
            LedgerError::Unauthenticated(_) => 401,
        }
    }

    /// JSON error body, `{"error": {"code": ..., "message": ...}}`
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        })
    }
}

impl From<StorageError> for LedgerError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::NotFound(msg) => LedgerError::NotFound(msg),
            StorageError::Conflict(msg) => LedgerError::Conflict(msg),
            other => LedgerError::StoreUnavailable(other.to_string()),
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
