//! # In-Memory Emulator
//!
//! Stands in for SQLite when the native engine can't be opened, or when a
//! test asks for it. Every [`Command`] and [`Query`] behaves as it does on
//! SQLite: same filters, same ordering, same autoincrement ids, and a
//! catalog of tables, columns and indexes that answers introspection.
//!
//! ## Thread Safety
//! ```text
//! Screen A ─┐
//!           ├──► Mutex<MemoryTables> ──► one statement at a time
//! Screen B ─┘
//! ```
//! The lock is never held across an await.
//!
//! Nothing persists: dropping the store drops the data.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

use comanda_core::{
    fold_name, LineItem, LineItemId, Product, ProductId, SaleRecord, SaleRecordId, Tab, TabId,
    TabStatus,
};

use super::statement::{Command, Query, Row, RunOutcome, Table};
use super::{internal, Backend, BackendKind};
use crate::error::{DbError, DbResult};

// =============================================================================
// Records
// =============================================================================

#[derive(Debug, Clone)]
struct ProductRecord {
    product: Product,
    name_key: String,
}

/// A tab row; `status` is NULL-able exactly like a legacy SQLite row.
#[derive(Debug, Clone)]
struct TabRecord {
    id: TabId,
    name: String,
    name_key: String,
    status: Option<TabStatus>,
    opened_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl TabRecord {
    fn to_tab(&self) -> DbResult<Tab> {
        let status = self.status.ok_or_else(|| {
            DbError::QueryFailed(format!("tab {} has no status", self.id))
        })?;
        Ok(Tab {
            id: self.id,
            name: self.name.clone(),
            status,
            opened_at: self.opened_at,
            closed_at: self.closed_at,
            updated_at: self.updated_at,
        })
    }
}

/// Tables, columns and indexes created so far.
#[derive(Debug, Default)]
struct Catalog {
    columns: BTreeMap<&'static str, Vec<&'static str>>,
    indexes: BTreeSet<&'static str>,
}

#[derive(Debug, Default)]
struct MemoryTables {
    catalog: Catalog,
    products: BTreeMap<i64, ProductRecord>,
    tabs: BTreeMap<i64, TabRecord>,
    line_items: BTreeMap<i64, LineItem>,
    sales: BTreeMap<i64, SaleRecord>,
    /// Last id handed out per table; survives deletes like `sqlite_sequence`.
    sequences: HashMap<Table, i64>,
}

impl MemoryTables {
    fn require_table(&self, table: Table) -> DbResult<()> {
        if self.catalog.columns.contains_key(table.name()) {
            Ok(())
        } else {
            Err(DbError::QueryFailed(format!("no such table: {table}")))
        }
    }

    fn next_id(&mut self, table: Table) -> i64 {
        let seq = self.sequences.entry(table).or_insert(0);
        *seq += 1;
        *seq
    }

    fn sorted_products(&self, keep: impl Fn(&ProductRecord) -> bool) -> Vec<Row> {
        let mut matches: Vec<&ProductRecord> =
            self.products.values().filter(|r| keep(r)).collect();
        matches.sort_by(|a, b| {
            a.name_key
                .cmp(&b.name_key)
                .then_with(|| a.product.id.raw().cmp(&b.product.id.raw()))
        });
        matches
            .into_iter()
            .map(|r| Row::Product(r.product.clone()))
            .collect()
    }

    fn tab_rows<'a>(
        &self,
        records: impl IntoIterator<Item = &'a TabRecord>,
    ) -> DbResult<Vec<Row>> {
        records
            .into_iter()
            .map(|r| r.to_tab().map(Row::Tab))
            .collect()
    }

    // =========================================================================
    // Commands
    // =========================================================================

    fn run(&mut self, command: &Command) -> DbResult<RunOutcome> {
        match command {
            Command::CreateTable { table } => {
                self.catalog
                    .columns
                    .entry(table.name())
                    .or_insert_with(|| vec!["id"]);
                Ok(RunOutcome::affected(0))
            }

            Command::AddColumn { table, column } => {
                let columns = self
                    .catalog
                    .columns
                    .get_mut(table.name())
                    .ok_or_else(|| DbError::QueryFailed(format!("no such table: {table}")))?;
                if columns.contains(&column.name) {
                    return Err(DbError::QueryFailed(format!(
                        "duplicate column name: {}",
                        column.name
                    )));
                }
                columns.push(column.name);
                Ok(RunOutcome::affected(0))
            }

            Command::CreateIndex { index } => {
                let columns = self
                    .catalog
                    .columns
                    .get(index.table.name())
                    .ok_or_else(|| {
                        DbError::QueryFailed(format!("no such table: {}", index.table))
                    })?;
                if !columns.contains(&index.column) {
                    return Err(DbError::QueryFailed(format!(
                        "no such column: {}",
                        index.column
                    )));
                }
                self.catalog.indexes.insert(index.name);
                Ok(RunOutcome::affected(0))
            }

            Command::NormalizeTabStatus => {
                self.require_table(Table::Tabs)?;
                let mut affected = 0;
                for record in self.tabs.values_mut().filter(|r| r.status.is_none()) {
                    record.status = Some(TabStatus::Open);
                    affected += 1;
                }
                Ok(RunOutcome::affected(affected))
            }

            // Emulated rows are always complete
            Command::BackfillDefaults { .. } => Ok(RunOutcome::affected(0)),

            // Nothing persists, so there is never a first-generation file
            Command::ImportLegacyTables { .. } => Ok(RunOutcome::affected(0)),

            Command::InsertProduct {
                name,
                price_cents,
                at,
            } => {
                self.require_table(Table::Products)?;
                let id = self.next_id(Table::Products);
                self.products.insert(
                    id,
                    ProductRecord {
                        product: Product {
                            id: ProductId::from_raw(id),
                            name: name.clone(),
                            price_cents: *price_cents,
                            updated_at: *at,
                        },
                        name_key: fold_name(name),
                    },
                );
                Ok(RunOutcome::inserted(id))
            }

            Command::UpdateProduct {
                id,
                name,
                price_cents,
                at,
            } => {
                self.require_table(Table::Products)?;
                match self.products.get_mut(&id.raw()) {
                    Some(record) => {
                        record.product.name = name.clone();
                        record.product.price_cents = *price_cents;
                        record.product.updated_at = *at;
                        record.name_key = fold_name(name);
                        Ok(RunOutcome::affected(1))
                    }
                    None => Ok(RunOutcome::affected(0)),
                }
            }

            Command::DeleteProduct { id } => {
                self.require_table(Table::Products)?;
                let removed = self.products.remove(&id.raw()).is_some();
                Ok(RunOutcome::affected(removed as u64))
            }

            Command::InsertTab { name, at } => {
                self.require_table(Table::Tabs)?;
                let id = self.next_id(Table::Tabs);
                self.tabs.insert(
                    id,
                    TabRecord {
                        id: TabId::from_raw(id),
                        name: name.clone(),
                        name_key: fold_name(name),
                        status: Some(TabStatus::Open),
                        opened_at: *at,
                        closed_at: None,
                        updated_at: *at,
                    },
                );
                Ok(RunOutcome::inserted(id))
            }

            Command::CloseTab { id, at } => {
                self.require_table(Table::Tabs)?;
                match self.tabs.get_mut(&id.raw()) {
                    Some(record) if record.status == Some(TabStatus::Open) => {
                        record.status = Some(TabStatus::Closed);
                        record.closed_at = Some(*at);
                        record.updated_at = *at;
                        Ok(RunOutcome::affected(1))
                    }
                    _ => Ok(RunOutcome::affected(0)),
                }
            }

            Command::DeleteTab { id } => {
                self.require_table(Table::Tabs)?;
                self.require_table(Table::LineItems)?;
                self.line_items.retain(|_, item| item.tab_id != *id);
                let removed = self.tabs.remove(&id.raw()).is_some();
                Ok(RunOutcome::affected(removed as u64))
            }

            Command::InsertLineItem {
                tab_id,
                product_id,
                product_name,
                quantity,
                unit_price_cents,
                note,
                at,
            } => {
                self.require_table(Table::LineItems)?;
                let id = self.next_id(Table::LineItems);
                self.line_items.insert(
                    id,
                    LineItem {
                        id: LineItemId::from_raw(id),
                        tab_id: *tab_id,
                        product_id: *product_id,
                        product_name: product_name.clone(),
                        quantity: *quantity,
                        unit_price_cents: *unit_price_cents,
                        note: note.clone(),
                        created_at: *at,
                    },
                );
                Ok(RunOutcome::inserted(id))
            }

            Command::DeleteLineItem { id } => {
                self.require_table(Table::LineItems)?;
                let removed = self.line_items.remove(&id.raw()).is_some();
                Ok(RunOutcome::affected(removed as u64))
            }

            Command::FinalizeTab { id, day, at } => {
                self.require_table(Table::SaleRecords)?;
                self.require_table(Table::LineItems)?;
                self.require_table(Table::Tabs)?;

                let tab_name = match self.tabs.get(&id.raw()) {
                    Some(record) if record.status == Some(TabStatus::Open) => record.name.clone(),
                    _ => return Ok(RunOutcome::affected(0)),
                };

                // BTreeMap order is id order, like ORDER BY id
                let items: Vec<LineItem> = self
                    .line_items
                    .values()
                    .filter(|item| item.tab_id == *id)
                    .cloned()
                    .collect();

                let mut last_id = None;
                for item in &items {
                    let sale_id = self.next_id(Table::SaleRecords);
                    self.sales.insert(
                        sale_id,
                        SaleRecord {
                            id: SaleRecordId::from_raw(sale_id),
                            day: *day,
                            tab_name: tab_name.clone(),
                            product_name: item.product_name.clone(),
                            quantity: item.quantity,
                            unit_price_cents: item.unit_price_cents,
                            recorded_at: *at,
                        },
                    );
                    last_id = Some(sale_id);
                }

                self.line_items.retain(|_, item| item.tab_id != *id);
                self.tabs.remove(&id.raw());

                Ok(RunOutcome {
                    affected_rows: items.len() as u64 + 1,
                    inserted_id: last_id,
                })
            }

            Command::DeleteSalesForDay { day } => {
                self.require_table(Table::SaleRecords)?;
                let before = self.sales.len();
                self.sales.retain(|_, sale| sale.day != *day);
                Ok(RunOutcome::affected((before - self.sales.len()) as u64))
            }

            Command::DeleteAllSales => {
                self.require_table(Table::SaleRecords)?;
                let removed = self.sales.len() as u64;
                self.sales.clear();
                Ok(RunOutcome::affected(removed))
            }

            Command::WipeAll => {
                for table in Table::ALL {
                    self.require_table(table)?;
                }
                let removed = self.products.len()
                    + self.tabs.len()
                    + self.line_items.len()
                    + self.sales.len();
                self.products.clear();
                self.tabs.clear();
                self.line_items.clear();
                self.sales.clear();
                Ok(RunOutcome::affected(removed as u64))
            }
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    fn query(&self, query: &Query) -> DbResult<Vec<Row>> {
        match query {
            Query::Tables => Ok(self
                .catalog
                .columns
                .keys()
                .map(|name| Row::Name(name.to_string()))
                .collect()),

            Query::TableColumns { table } => Ok(self
                .catalog
                .columns
                .get(table.name())
                .map(|columns| columns.iter().map(|c| Row::Name(c.to_string())).collect())
                .unwrap_or_default()),

            Query::Indexes => Ok(self
                .catalog
                .indexes
                .iter()
                .map(|name| Row::Name(name.to_string()))
                .collect()),

            Query::AllProducts => {
                self.require_table(Table::Products)?;
                Ok(self.sorted_products(|_| true))
            }

            Query::ProductById { id } => {
                self.require_table(Table::Products)?;
                Ok(self
                    .products
                    .get(&id.raw())
                    .map(|r| Row::Product(r.product.clone()))
                    .into_iter()
                    .collect())
            }

            Query::ProductByName { name } => {
                self.require_table(Table::Products)?;
                let key = fold_name(name);
                Ok(self
                    .products
                    .values()
                    .filter(|r| r.name_key == key)
                    .map(|r| Row::Product(r.product.clone()))
                    .collect())
            }

            Query::ProductsByNamePrefix { prefix } => {
                self.require_table(Table::Products)?;
                let key = fold_name(prefix);
                Ok(self.sorted_products(|r| r.name_key.starts_with(&key)))
            }

            Query::ProductsContaining { text } => {
                self.require_table(Table::Products)?;
                let key = fold_name(text);
                Ok(self.sorted_products(|r| r.name_key.contains(&key)))
            }

            Query::AllTabs => {
                self.require_table(Table::Tabs)?;
                self.tab_rows(self.tabs.values())
            }

            Query::TabById { id } => {
                self.require_table(Table::Tabs)?;
                self.tab_rows(self.tabs.get(&id.raw()))
            }

            Query::TabsByStatus { status } => {
                self.require_table(Table::Tabs)?;
                let mut matches: Vec<&TabRecord> = self
                    .tabs
                    .values()
                    .filter(|r| r.status == Some(*status))
                    .collect();
                matches.sort_by(|a, b| {
                    a.name_key
                        .cmp(&b.name_key)
                        .then_with(|| a.id.raw().cmp(&b.id.raw()))
                });
                self.tab_rows(matches)
            }

            Query::TabHistory => {
                self.require_table(Table::Tabs)?;
                let mut matches: Vec<&TabRecord> = self
                    .tabs
                    .values()
                    .filter(|r| r.status == Some(TabStatus::Closed))
                    .collect();
                matches.sort_by_key(|r| (Reverse(r.updated_at), r.name_key.clone(), r.id.raw()));
                self.tab_rows(matches)
            }

            Query::AllLineItems => {
                self.require_table(Table::LineItems)?;
                Ok(self.line_items.values().cloned().map(Row::LineItem).collect())
            }

            Query::LineItemById { id } => {
                self.require_table(Table::LineItems)?;
                Ok(self
                    .line_items
                    .get(&id.raw())
                    .cloned()
                    .map(Row::LineItem)
                    .into_iter()
                    .collect())
            }

            Query::LineItemsForTab { tab_id } => {
                self.require_table(Table::LineItems)?;
                Ok(self
                    .line_items
                    .values()
                    .filter(|item| item.tab_id == *tab_id)
                    .cloned()
                    .map(Row::LineItem)
                    .collect())
            }

            Query::LineItemsForStatus { status } => {
                self.require_table(Table::LineItems)?;
                self.require_table(Table::Tabs)?;
                Ok(self
                    .line_items
                    .values()
                    .filter(|item| {
                        self.tabs
                            .get(&item.tab_id.raw())
                            .is_some_and(|tab| tab.status == Some(*status))
                    })
                    .cloned()
                    .map(Row::LineItem)
                    .collect())
            }

            Query::AllSales => {
                self.require_table(Table::SaleRecords)?;
                let mut sales: Vec<&SaleRecord> = self.sales.values().collect();
                sales.sort_by_key(|s| (s.day, s.id.raw()));
                Ok(sales.into_iter().cloned().map(Row::Sale).collect())
            }

            Query::SalesForDay { day } => {
                self.require_table(Table::SaleRecords)?;
                Ok(self
                    .sales
                    .values()
                    .filter(|s| s.day == *day)
                    .cloned()
                    .map(Row::Sale)
                    .collect())
            }
        }
    }
}

// =============================================================================
// Store
// =============================================================================

/// The in-memory backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<MemoryTables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Executes a function with read access to the tables.
    fn with_tables<F, R>(&self, f: F) -> DbResult<R>
    where
        F: FnOnce(&MemoryTables) -> DbResult<R>,
    {
        let tables = self
            .tables
            .lock()
            .map_err(|e| internal("emulator lock poisoned", e))?;
        f(&tables)
    }

    /// Executes a function with write access to the tables.
    fn with_tables_mut<F, R>(&self, f: F) -> DbResult<R>
    where
        F: FnOnce(&mut MemoryTables) -> DbResult<R>,
    {
        let mut tables = self
            .tables
            .lock()
            .map_err(|e| internal("emulator lock poisoned", e))?;
        f(&mut tables)
    }

    /// Inserts a tab row without a status, as an old database would hold.
    #[cfg(test)]
    pub(crate) fn insert_legacy_tab(&self, name: &str) -> DbResult<TabId> {
        self.with_tables_mut(|tables| {
            tables.require_table(Table::Tabs)?;
            let id = tables.next_id(Table::Tabs);
            let now = Utc::now();
            tables.tabs.insert(
                id,
                TabRecord {
                    id: TabId::from_raw(id),
                    name: name.to_string(),
                    name_key: fold_name(name),
                    status: None,
                    opened_at: now,
                    closed_at: None,
                    updated_at: now,
                },
            );
            Ok(TabId::from_raw(id))
        })
    }
}

#[async_trait]
impl Backend for MemoryStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Emulated
    }

    async fn run(&self, command: &Command) -> DbResult<RunOutcome> {
        self.with_tables_mut(|tables| tables.run(command))
    }

    async fn query(&self, query: &Query) -> DbResult<Vec<Row>> {
        self.with_tables(|tables| tables.query(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::statement::{ColumnSpec, IndexSpec};

    async fn with_tabs_table() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .execute(&[
                Command::CreateTable { table: Table::Tabs },
                Command::CreateTable {
                    table: Table::LineItems,
                },
            ])
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_statements_on_missing_tables_fail() {
        let store = MemoryStore::new();
        let err = store.query(&Query::AllTabs).await.unwrap_err();
        assert_eq!(err.to_string(), "Query failed: no such table: tabs");
    }

    #[tokio::test]
    async fn test_duplicate_column_rejected_like_sqlite() {
        let store = with_tabs_table().await;
        let add = Command::AddColumn {
            table: Table::Tabs,
            column: ColumnSpec::nullable("status", "TEXT"),
        };
        store.run(&add).await.unwrap();
        assert!(store.run(&add).await.is_err());

        store
            .run(&Command::CreateIndex {
                index: IndexSpec {
                    name: "idx_tabs_status",
                    table: Table::Tabs,
                    column: "status",
                },
            })
            .await
            .unwrap();
        assert_eq!(
            store.query(&Query::Indexes).await.unwrap(),
            vec![Row::Name("idx_tabs_status".into())]
        );
    }

    #[tokio::test]
    async fn test_ids_are_not_reused_after_delete() {
        let store = with_tabs_table().await;
        let at = Utc::now();

        let first = store
            .run(&Command::InsertTab { name: "Mesa 1".into(), at })
            .await
            .unwrap();
        store
            .run(&Command::DeleteTab {
                id: TabId::from_raw(first.inserted_id.unwrap()),
            })
            .await
            .unwrap();

        let second = store
            .run(&Command::InsertTab { name: "Mesa 2".into(), at })
            .await
            .unwrap();
        assert_eq!(first.inserted_id, Some(1));
        assert_eq!(second.inserted_id, Some(2));
    }

    #[tokio::test]
    async fn test_legacy_rows_normalized() {
        let store = with_tabs_table().await;
        let id = store.insert_legacy_tab("Balcão").unwrap();

        // A status-less row matches no status filter
        let open = store
            .query(&Query::TabsByStatus {
                status: TabStatus::Open,
            })
            .await
            .unwrap();
        assert!(open.is_empty());

        let outcome = store.run(&Command::NormalizeTabStatus).await.unwrap();
        assert_eq!(outcome.affected_rows, 1);

        let rows = store.query(&Query::TabById { id }).await.unwrap();
        match &rows[..] {
            [Row::Tab(tab)] => assert_eq!(tab.status, TabStatus::Open),
            other => panic!("unexpected rows: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_finalize_skips_tabs_that_are_not_open() {
        let store = MemoryStore::new();
        crate::schema::ensure_schema(&store).await.unwrap();
        let at = Utc::now();
        let id = store
            .run(&Command::InsertTab {
                name: "Mesa 4".into(),
                at,
            })
            .await
            .unwrap()
            .inserted_id
            .unwrap();
        let tab = TabId::from_raw(id);
        store
            .run(&Command::InsertLineItem {
                tab_id: tab,
                product_id: None,
                product_name: "Pastel".into(),
                quantity: 1,
                unit_price_cents: 500,
                note: None,
                at,
            })
            .await
            .unwrap();
        store.run(&Command::CloseTab { id: tab, at }).await.unwrap();

        let finalize = Command::FinalizeTab {
            id: tab,
            day: "2026-10-19".parse().unwrap(),
            at,
        };
        assert_eq!(store.run(&finalize).await.unwrap().affected_rows, 0);
        assert!(store.query(&Query::AllSales).await.unwrap().is_empty());
        assert_eq!(
            store
                .query(&Query::LineItemsForTab { tab_id: tab })
                .await
                .unwrap()
                .len(),
            1
        );
    }
}
