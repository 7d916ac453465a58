//! # Database Error Types
//!
//! Error types for store operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite error (sqlx::Error)      Domain outcome (CoreError)            │
//! │       │                                 │                               │
//! │       ▼                                 ▼                               │
//! │  DbError (this module) ← categorized, source message kept            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  severity(): Fatal ──► app must stop (bootstrap, connection)           │
//! │              Recoverable ──► screen shows the message                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use comanda_core::{CoreError, ValidationError};
use thiserror::Error;

/// Store operation errors.
#[derive(Debug, Clone, Error)]
pub enum DbError {
    /// Entity not found in the store.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A product name (folded) already belongs to another product.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Database connection failed after the backend was opened.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The native engine could not be opened.
    ///
    /// ## When This Occurs
    /// - Directory of the database file doesn't exist
    /// - File permissions issue
    /// - Native backend forced but unusable
    #[error("Native store unavailable: {0}")]
    BackendUnavailable(String),

    /// Schema bootstrap failed. Fatal: nothing may run on a half-migrated
    /// schema.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Statement failed at runtime.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// A backend answered a query with rows of the wrong shape.
    #[error("Unexpected row: expected {expected}")]
    UnexpectedRow { expected: &'static str },

    /// Expected domain outcome (not found by reference, ambiguity, closed tab).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Internal store error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

/// How a caller must treat a [`DbError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The application must not proceed.
    Fatal,
    /// A normal branch: show the message, let the user retry.
    Recoverable,
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Classifies the error for the calling screen.
    pub fn severity(&self) -> Severity {
        match self {
            DbError::MigrationFailed(_)
            | DbError::ConnectionFailed(_)
            | DbError::BackendUnavailable(_)
            | DbError::Internal(_) => Severity::Fatal,
            _ => Severity::Recoverable,
        }
    }

    /// Wraps any error raised while bootstrapping the schema.
    pub(crate) fn into_migration(self) -> Self {
        match self {
            DbError::MigrationFailed(_) => self,
            other => DbError::MigrationFailed(other.to_string()),
        }
    }
}

impl From<ValidationError> for DbError {
    fn from(err: ValidationError) -> Self {
        DbError::Core(CoreError::Validation(err))
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → UniqueViolation / QueryFailed
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// sqlx::Error::PoolClosed     → DbError::ConnectionFailed
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // "UNIQUE constraint failed: <table>.<column>"
                if let Some(field) = msg.strip_prefix("UNIQUE constraint failed: ") {
                    DbError::UniqueViolation {
                        field: field.to_string(),
                        value: "unknown".to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            sqlx::Error::ColumnDecode { index, source } => {
                DbError::QueryFailed(format!("cannot decode column {index}: {source}"))
            }

            _ => DbError::Internal(err.to_string()),
        }
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_classification() {
        assert_eq!(
            DbError::MigrationFailed("boom".into()).severity(),
            Severity::Fatal
        );
        assert_eq!(
            DbError::BackendUnavailable("no disk".into()).severity(),
            Severity::Fatal
        );
        assert_eq!(
            DbError::Core(CoreError::ProductNotFound("x".into())).severity(),
            Severity::Recoverable
        );
        assert_eq!(DbError::not_found("Tab", 3).severity(), Severity::Recoverable);
    }

    #[test]
    fn test_core_errors_keep_their_message() {
        let err: DbError = CoreError::ProductNotFound("Esfiha".into()).into();
        assert_eq!(err.to_string(), "Product not found: Esfiha");
    }

    #[test]
    fn test_into_migration_wraps_once() {
        let err = DbError::QueryFailed("no such table".into()).into_migration();
        assert_eq!(err.to_string(), "Migration failed: Query failed: no such table");

        let again = err.into_migration();
        assert_eq!(again.to_string(), "Migration failed: Query failed: no such table");
    }
}
