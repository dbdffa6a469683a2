//! Persistence layer errors.

use thiserror::Error;

/// Persistence faults.
///
/// A lookup for an identifier that does not exist is never a `StoreError`;
/// operations report absence through their return values instead.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Error reported by PostgreSQL or the connection to it.
    #[error("database error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// A row was rejected by an integrity constraint.
    ///
    /// Raised by `MemoryStore`; PostgreSQL constraint violations arrive as
    /// `Postgres`.
    #[error("constraint violation: {0}")]
    Constraint(String),
}

/// A request body that cannot be turned into a record or an update.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0}")]
    Malformed(String),

    #[error("field '{0}' must be a positive integer")]
    NotPositive(&'static str),

    #[error("field '{0}' must not be empty")]
    Empty(&'static str),

    #[error("field '{0}' cannot be updated")]
    UnknownField(String),

    #[error("no fields to update")]
    NothingToUpdate,
}

impl From<serde_json::Error> for ValidationError {
    fn from(e: serde_json::Error) -> Self {
        ValidationError::Malformed(e.to_string())
    }
}
