//! # Store Context
//!
//! The single handle every screen receives. Cloning is cheap; all clones
//! share one backend and one schema bootstrap.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  App startup                                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Store::open(config) ← backend chosen once (native or emulated)        │
//! │       │                                                                 │
//! │       │  clone() into every screen                                     │
//! │       ▼                                                                 │
//! │  first run/query/execute ──► OnceCell: ensure_schema (exactly once)   │
//! │       │                       concurrent first callers await the same  │
//! │       │                       in-flight bootstrap                       │
//! │       ▼                                                                 │
//! │  every later call ──► outcome memoized: backend directly on success,   │
//! │                       the same MigrationFailed on failure               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{error, info, warn};

use crate::config::DbConfig;
use crate::error::{DbError, DbResult};
use crate::repository::{
    AdminRepository, LineItemRepository, ProductRepository, ReportRepository, SaleRepository,
    TabRepository,
};
use crate::schema::{self, SchemaSnapshot};
use crate::store::{
    collect_rows, open_backend, Backend, BackendKind, Command, FromStoreRow, Query, Row,
    RunOutcome,
};

#[derive(Debug)]
struct StoreInner {
    backend: Arc<dyn Backend>,
    /// Outcome of the one bootstrap, success or failure.
    schema: OnceCell<Result<(), DbError>>,
    bootstraps: AtomicUsize,
}

/// Shared store handle.
///
/// ## Usage
/// ```rust,ignore
/// let store = Store::open(DbConfig::from_env()).await?;
///
/// let tab = store.tabs().create("Mesa 4").await?;
/// store.line_items().add(NewLineItem::new(tab, "Coxinha", 2)).await?;
/// let detail = store.tabs().detail(tab).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Opens the backend the configuration asks for.
    ///
    /// ## Returns
    /// * `Ok(Store)` - native, or emulated after a logged fallback
    /// * `Err(DbError::BackendUnavailable)` - native forced and unusable
    /// * `Err(DbError::MigrationFailed)` - `bootstrap_on_open` and the
    ///   bootstrap failed
    pub async fn open(config: DbConfig) -> DbResult<Self> {
        let backend = open_backend(&config).await?;
        let store = Store::with_backend(backend);

        info!(backend = %store.kind(), "Store opened");

        if config.bootstrap_on_open {
            store.ensure_ready().await?;
        }

        Ok(store)
    }

    /// Wraps an already opened backend.
    pub fn with_backend(backend: Arc<dyn Backend>) -> Self {
        Store {
            inner: Arc::new(StoreInner {
                backend,
                schema: OnceCell::new(),
                bootstraps: AtomicUsize::new(0),
            }),
        }
    }

    /// Engine serving this store.
    pub fn kind(&self) -> BackendKind {
        self.inner.backend.kind()
    }

    /// Runs the schema bootstrap on first use.
    ///
    /// The bootstrap runs once per store. A failure is kept: every later
    /// operation gets the same `MigrationFailed` without touching the
    /// backend again, until the store is reopened.
    pub async fn ensure_ready(&self) -> DbResult<()> {
        self.inner
            .schema
            .get_or_init(|| async {
                self.inner.bootstraps.fetch_add(1, Ordering::SeqCst);
                let outcome = schema::ensure_schema(self.inner.backend.as_ref()).await;
                if let Err(e) = &outcome {
                    error!(error = %e, "Schema bootstrap failed, store unusable");
                }
                outcome
            })
            .await
            .clone()
    }

    /// How many times the bootstrap has started.
    #[cfg(test)]
    pub(crate) fn bootstrap_count(&self) -> usize {
        self.inner.bootstraps.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Statements
    // =========================================================================

    /// Runs a batch of commands in order. No rollback: statements before a
    /// failure stay applied.
    pub async fn execute(&self, batch: &[Command]) -> DbResult<()> {
        self.ensure_ready().await?;
        self.inner.backend.execute(batch).await.map_err(|e| {
            warn!(statements = batch.len(), error = %e, "Store batch failed");
            e
        })
    }

    /// Runs one command.
    pub async fn run(&self, command: &Command) -> DbResult<RunOutcome> {
        self.ensure_ready().await?;
        self.inner.backend.run(command).await.map_err(|e| {
            warn!(command = command.label(), error = %e, "Store command failed");
            e
        })
    }

    /// Runs one query.
    pub async fn query(&self, query: &Query) -> DbResult<Vec<Row>> {
        self.ensure_ready().await?;
        self.inner.backend.query(query).await.map_err(|e| {
            warn!(query = query.label(), error = %e, "Store query failed");
            e
        })
    }

    /// Runs a query and converts every row.
    pub async fn fetch_all<T: FromStoreRow>(&self, query: &Query) -> DbResult<Vec<T>> {
        collect_rows(self.query(query).await?)
    }

    /// Runs a query and converts the first row, if any.
    pub async fn fetch_optional<T: FromStoreRow>(&self, query: &Query) -> DbResult<Option<T>> {
        self.query(query)
            .await?
            .into_iter()
            .next()
            .map(T::from_row)
            .transpose()
    }

    /// Introspected schema, after bootstrap.
    pub async fn schema(&self) -> DbResult<SchemaSnapshot> {
        self.ensure_ready().await?;
        schema::describe(self.inner.backend.as_ref()).await
    }

    /// Closes the backend. Operations afterwards fail.
    pub async fn close(&self) {
        info!(backend = %self.kind(), "Closing store");
        self.inner.backend.close().await;
    }

    // =========================================================================
    // Repositories
    // =========================================================================

    /// Returns the product repository.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let coxinhas = store.products().search_prefix("cox").await?;
    /// ```
    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.clone())
    }

    /// Returns the tab repository.
    pub fn tabs(&self) -> TabRepository {
        TabRepository::new(self.clone())
    }

    /// Returns the line item repository.
    pub fn line_items(&self) -> LineItemRepository {
        LineItemRepository::new(self.clone())
    }

    /// Returns the sale record repository.
    pub fn sales(&self) -> SaleRepository {
        SaleRepository::new(self.clone())
    }

    /// Returns the report repository.
    pub fn reports(&self) -> ReportRepository {
        ReportRepository::new(self.clone())
    }

    /// Returns the maintenance repository.
    pub fn admin(&self) -> AdminRepository {
        AdminRepository::new(self.clone())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendPreference;
    use async_trait::async_trait;

    /// Fails every schema command and counts how often it was asked.
    #[derive(Debug, Default)]
    struct RejectsSchema {
        commands: AtomicUsize,
    }

    #[async_trait]
    impl Backend for RejectsSchema {
        fn kind(&self) -> BackendKind {
            BackendKind::Emulated
        }

        async fn run(&self, _command: &Command) -> DbResult<RunOutcome> {
            self.commands.fetch_add(1, Ordering::SeqCst);
            Err(DbError::QueryFailed("disk I/O error".into()))
        }

        async fn query(&self, _query: &Query) -> DbResult<Vec<Row>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_first_operation_bootstraps() {
        let store = Store::open(DbConfig::in_memory()).await.unwrap();
        assert_eq!(store.bootstrap_count(), 0);

        let tabs: Vec<comanda_core::Tab> = store.fetch_all(&Query::AllTabs).await.unwrap();
        assert!(tabs.is_empty());
        assert_eq!(store.bootstrap_count(), 1);

        store.query(&Query::AllProducts).await.unwrap();
        assert_eq!(store.bootstrap_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_use_bootstraps_once() {
        let store = Store::open(DbConfig::emulated()).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.query(&Query::AllTabs).await.map(|rows| rows.len())
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 0);
        }

        assert_eq!(store.bootstrap_count(), 1);
    }

    #[tokio::test]
    async fn test_bootstrap_on_open() {
        let config = DbConfig::emulated().bootstrap_on_open(true);
        let store = Store::open(config).await.unwrap();
        assert_eq!(store.bootstrap_count(), 1);
        assert_eq!(store.schema().await.unwrap().tables.len(), 4);
    }

    #[tokio::test]
    async fn test_fallback_is_transparent() {
        let config =
            DbConfig::new("/nonexistent-dir/sub/kitutes.db").backend(BackendPreference::Auto);
        let store = Store::open(config).await.unwrap();
        assert_eq!(store.kind(), BackendKind::Emulated);

        let tab = store.tabs().create("Mesa 1").await.unwrap();
        assert_eq!(store.tabs().get(tab).await.unwrap().unwrap().name, "Mesa 1");
    }

    #[tokio::test]
    async fn test_failed_bootstrap_is_kept() {
        let backend = Arc::new(RejectsSchema::default());
        let store = Store::with_backend(backend.clone());

        let first = store.query(&Query::AllTabs).await.unwrap_err();
        assert!(matches!(first, DbError::MigrationFailed(_)));

        // No second attempt, same fatal error for every caller
        let second = store.tabs().list_open().await.unwrap_err();
        assert!(matches!(second, DbError::MigrationFailed(_)));
        assert_eq!(second.to_string(), first.to_string());
        assert_eq!(store.bootstrap_count(), 1);
        assert_eq!(backend.commands.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_closed_native_store_fails() {
        let store = Store::open(DbConfig::in_memory().bootstrap_on_open(true))
            .await
            .unwrap();
        store.close().await;

        let err = store.query(&Query::AllTabs).await.unwrap_err();
        assert!(matches!(err, DbError::ConnectionFailed(_)));
    }
}
