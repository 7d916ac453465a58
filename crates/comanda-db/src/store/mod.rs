//! # Storage Backends
//!
//! Two interchangeable engines behind one trait, chosen once per [`Store`].
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         open_backend(config)                            │
//! │                                                                         │
//! │   BackendPreference::Auto ──► SqliteStore::open ──ok──► Native          │
//! │                                     │                                   │
//! │                                     └──err──► warn! ──► MemoryStore     │
//! │                                                                         │
//! │   BackendPreference::Native ──► SqliteStore::open ──err──► Unavailable  │
//! │   BackendPreference::Memory ──► MemoryStore                             │
//! │                                                                         │
//! │   ┌────────────────────────┐        ┌────────────────────────┐         │
//! │   │ SqliteStore (native)   │        │ MemoryStore (emulated) │         │
//! │   │ sqlx pool, real file   │        │ Mutex<MemoryTables>    │         │
//! │   └───────────┬────────────┘        └───────────┬────────────┘         │
//! │               └──────────── dyn Backend ────────┘                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`Store`]: crate::Store

pub mod memory;
pub mod native;
pub mod statement;

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{BackendPreference, DbConfig};
use crate::error::{DbError, DbResult};

pub use memory::MemoryStore;
pub use native::SqliteStore;
pub use statement::{
    collect_rows, ColumnSpec, Command, FromStoreRow, IndexSpec, Query, Row, RunOutcome, Table,
};

/// Which engine is serving the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// SQLite through sqlx.
    Native,
    /// The in-memory emulator.
    Emulated,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Native => f.write_str("native"),
            BackendKind::Emulated => f.write_str("emulated"),
        }
    }
}

/// A storage engine able to run every [`Command`] and answer every [`Query`].
///
/// ## Contract
/// - `run` returns the affected row count and, for inserts, the new row id
/// - `query` returns rows in the order documented on [`Query`]
/// - `execute` runs a batch in order, stopping at the first failure; earlier
///   statements stay applied
#[async_trait]
pub trait Backend: Send + Sync + fmt::Debug {
    /// Engine kind, fixed for the life of the backend.
    fn kind(&self) -> BackendKind;

    /// Runs one mutation.
    async fn run(&self, command: &Command) -> DbResult<RunOutcome>;

    /// Runs one read.
    async fn query(&self, query: &Query) -> DbResult<Vec<Row>>;

    /// Runs a batch of mutations sequentially.
    async fn execute(&self, batch: &[Command]) -> DbResult<()> {
        for command in batch {
            self.run(command).await?;
        }
        Ok(())
    }

    /// Releases engine resources. Further calls fail or see an empty store.
    async fn close(&self) {}
}

/// Opens the backend the configuration asks for.
///
/// ## Returns
/// * `Ok(backend)` - ready to use, schema not yet bootstrapped
/// * `Err(DbError::BackendUnavailable)` - only when Native is forced
pub async fn open_backend(config: &DbConfig) -> DbResult<Arc<dyn Backend>> {
    match config.backend {
        BackendPreference::Memory => {
            info!("Using in-memory emulator");
            Ok(Arc::new(MemoryStore::new()))
        }
        BackendPreference::Native => {
            let store = SqliteStore::open(config).await?;
            Ok(Arc::new(store))
        }
        BackendPreference::Auto => match SqliteStore::open(config).await {
            Ok(store) => Ok(Arc::new(store)),
            Err(e) => {
                warn!(
                    error = %e,
                    path = %config.database_path.display(),
                    "Native store unavailable, falling back to in-memory emulator"
                );
                Ok(Arc::new(MemoryStore::new()))
            }
        },
    }
}

/// Maps a poisoned lock or other impossible state into a fatal error.
pub(crate) fn internal(context: &str, err: impl fmt::Display) -> DbError {
    DbError::Internal(format!("{context}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_preference_never_touches_sqlite() {
        let config =
            DbConfig::new("/nonexistent-dir/sub/kitutes.db").backend(BackendPreference::Memory);
        let backend = open_backend(&config).await.unwrap();
        assert_eq!(backend.kind(), BackendKind::Emulated);
    }

    #[tokio::test]
    async fn test_auto_falls_back_when_sqlite_cannot_open() {
        let config = DbConfig::new("/nonexistent-dir/sub/kitutes.db");
        let backend = open_backend(&config).await.unwrap();
        assert_eq!(backend.kind(), BackendKind::Emulated);
    }

    #[tokio::test]
    async fn test_forced_native_reports_unavailable() {
        let config =
            DbConfig::new("/nonexistent-dir/sub/kitutes.db").backend(BackendPreference::Native);
        let err = open_backend(&config).await.unwrap_err();
        assert!(matches!(err, DbError::BackendUnavailable(_)));
    }

    #[tokio::test]
    async fn test_native_in_memory_opens() {
        let backend = open_backend(&DbConfig::in_memory()).await.unwrap();
        assert_eq!(backend.kind(), BackendKind::Native);
        assert_eq!(backend.kind().to_string(), "native");
    }
}
