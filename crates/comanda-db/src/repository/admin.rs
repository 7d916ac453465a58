//! # Admin Repository
//!
//! Whole-store maintenance: a serializable snapshot of every table (the data
//! behind spreadsheet export) and a wipe that keeps the schema.

use serde::Serialize;
use tracing::{debug, warn};

use comanda_core::{LineItem, Product, SaleRecord, Tab};

use crate::error::DbResult;
use crate::store::{BackendKind, Command, Query};
use crate::Store;

/// Every row of every table, ordered by id (sale records by day).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreSnapshot {
    pub backend: BackendKind,
    pub products: Vec<Product>,
    pub tabs: Vec<Tab>,
    pub line_items: Vec<LineItem>,
    pub sale_records: Vec<SaleRecord>,
}

impl StoreSnapshot {
    /// Total number of rows across tables.
    pub fn row_count(&self) -> usize {
        self.products.len() + self.tabs.len() + self.line_items.len() + self.sale_records.len()
    }
}

/// Repository for maintenance operations.
#[derive(Debug, Clone)]
pub struct AdminRepository {
    store: Store,
}

impl AdminRepository {
    /// Creates a new AdminRepository.
    pub fn new(store: Store) -> Self {
        AdminRepository { store }
    }

    /// Reads every table.
    pub async fn snapshot(&self) -> DbResult<StoreSnapshot> {
        let mut products: Vec<Product> = self.store.fetch_all(&Query::AllProducts).await?;
        products.sort_by_key(|p| p.id.raw());

        let snapshot = StoreSnapshot {
            backend: self.store.kind(),
            products,
            tabs: self.store.fetch_all(&Query::AllTabs).await?,
            line_items: self.store.fetch_all(&Query::AllLineItems).await?,
            sale_records: self.store.fetch_all(&Query::AllSales).await?,
        };

        debug!(rows = snapshot.row_count(), "Snapshot taken");
        Ok(snapshot)
    }

    /// Deletes every row; tables, indexes and id counters stay.
    pub async fn wipe(&self) -> DbResult<u64> {
        let outcome = self.store.run(&Command::WipeAll).await?;
        warn!(deleted = outcome.affected_rows, "Store wiped");
        Ok(outcome.affected_rows)
    }
}
