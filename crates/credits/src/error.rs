//! Credit engine error types

use thiserror::Error;

/// Errors surfaced by the credit engine and its storage backends
///
/// An exhausted allowance is deliberately not represented here: denial is an
/// expected, frequent outcome and is reported as a normal return value by
/// the consume path.
#[derive(Debug, Error)]
pub enum CreditsError {
    #[error("credit store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("invalid plan tier: {0}")]
    InvalidTier(String),

    #[error("concurrent modification of credit record: {0}")]
    Contention(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for CreditsError {
    fn from(err: sqlx::Error) -> Self {
        CreditsError::StoreUnavailable(err.to_string())
    }
}

pub type CreditsResult<T> = Result<T, CreditsError>;
