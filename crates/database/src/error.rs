//! Database error types.

use thiserror::Error;

/// Errors that can occur during database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// SQLx error (connection, query, etc.)
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Migration error
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Record not found
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Record already exists
    #[error("{entity} already exists: {id}")]
    AlreadyExists { entity: &'static str, id: String },

    /// A stored row could not be interpreted.
    #[error("corrupt {entity} row: {detail}")]
    Corrupt { entity: &'static str, detail: String },
}

impl DatabaseError {
    /// Whether this error reports a unique-key collision.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, DatabaseError::AlreadyExists { .. })
    }

    /// Whether this error reports a missing row.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DatabaseError::NotFound { .. })
    }
}

/// Map a unique-constraint violation to [`DatabaseError::AlreadyExists`].
pub(crate) fn map_unique_violation(
    e: sqlx::Error,
    entity: &'static str,
    id: impl FnOnce() -> String,
) -> DatabaseError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.is_unique_violation() {
            return DatabaseError::AlreadyExists { entity, id: id() };
        }
    }
    DatabaseError::Sqlx(e)
}

/// Result type for database operations.
pub type Result<T> = std::result::Result<T, DatabaseError>;
