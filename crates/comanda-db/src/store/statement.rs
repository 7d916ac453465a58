//! # Statement Intents
//!
//! The closed set of statements repositories may issue. Backends match on
//! these exhaustively, so there is no such thing as an unrecognized statement.
//!
//! ```text
//! ┌──────────────────────────────┐       ┌──────────────────────────────┐
//! │ Command (mutations, DDL)     │       │ Query (reads, introspection) │
//! │  run()     → RunOutcome      │       │  query() → Vec<Row>          │
//! │  execute() → () for a batch  │       │                              │
//! └──────────────────────────────┘       └──────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;

use comanda_core::{LineItem, LineItemId, Product, ProductId, SaleRecord, Tab, TabId, TabStatus};

use crate::error::{DbError, DbResult};

// =============================================================================
// Tables & Schema Elements
// =============================================================================

/// Tables owned by the data layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Products,
    Tabs,
    LineItems,
    SaleRecords,
}

impl Table {
    /// Every table, in creation order.
    pub const ALL: [Table; 4] = [
        Table::Products,
        Table::Tabs,
        Table::LineItems,
        Table::SaleRecords,
    ];

    /// Name of the table in the store.
    pub const fn name(&self) -> &'static str {
        match self {
            Table::Products => "products",
            Table::Tabs => "tabs",
            Table::LineItems => "line_items",
            Table::SaleRecords => "sale_records",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A column the application requires, added when missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub sql_type: &'static str,
    pub not_null: bool,
    /// Literal SQL default, e.g. `0` or `''`.
    pub default: Option<&'static str>,
}

impl ColumnSpec {
    pub const fn nullable(name: &'static str, sql_type: &'static str) -> Self {
        ColumnSpec {
            name,
            sql_type,
            not_null: false,
            default: None,
        }
    }

    /// `NOT NULL` columns need a default so `ADD COLUMN` works on populated
    /// tables.
    pub const fn required(
        name: &'static str,
        sql_type: &'static str,
        default: &'static str,
    ) -> Self {
        ColumnSpec {
            name,
            sql_type,
            not_null: true,
            default: Some(default),
        }
    }

    /// Column definition as used in `ALTER TABLE .. ADD COLUMN`.
    pub fn definition(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.sql_type);
        if self.not_null {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = self.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(default);
        }
        sql
    }
}

/// A non-unique single-column index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: &'static str,
    pub table: Table,
    pub column: &'static str,
}

// =============================================================================
// Commands
// =============================================================================

/// Statements that change the store.
///
/// Name keys (`name_key` columns) are derived by each backend from the name
/// it is given, so callers never pass them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // --- schema -------------------------------------------------------------
    CreateTable {
        table: Table,
    },
    AddColumn {
        table: Table,
        column: ColumnSpec,
    },
    CreateIndex {
        index: IndexSpec,
    },
    /// Tabs with a NULL status become open.
    NormalizeTabStatus,
    /// NULL timestamps become `at`; missing name keys are computed.
    BackfillDefaults {
        at: DateTime<Utc>,
    },
    /// Carries rows of the first-generation tables (`produtos`, `comandas`,
    /// `itens`) into the current ones, once per row. `affected_rows` counts
    /// the rows written.
    ImportLegacyTables {
        at: DateTime<Utc>,
    },

    // --- products -----------------------------------------------------------
    InsertProduct {
        name: String,
        price_cents: i64,
        at: DateTime<Utc>,
    },
    UpdateProduct {
        id: ProductId,
        name: String,
        price_cents: i64,
        at: DateTime<Utc>,
    },
    DeleteProduct {
        id: ProductId,
    },

    // --- tabs ---------------------------------------------------------------
    InsertTab {
        name: String,
        at: DateTime<Utc>,
    },
    /// Flips an open tab to closed; affects nothing if already closed.
    CloseTab {
        id: TabId,
        at: DateTime<Utc>,
    },
    /// Deletes the tab and its line items.
    DeleteTab {
        id: TabId,
    },

    // --- line items ---------------------------------------------------------
    InsertLineItem {
        tab_id: TabId,
        product_id: Option<ProductId>,
        product_name: String,
        quantity: i64,
        unit_price_cents: i64,
        note: Option<String>,
        at: DateTime<Utc>,
    },
    DeleteLineItem {
        id: LineItemId,
    },

    // --- sale records -------------------------------------------------------
    /// Writes one sale record per line item of an open tab, then deletes the
    /// tab and its items, all or nothing.
    ///
    /// `affected_rows` is the number of records written plus one for the
    /// deleted tab, so `0` means the tab was missing or not open and nothing
    /// changed. `inserted_id` is the id of the last record written; record
    /// ids are consecutive.
    FinalizeTab {
        id: TabId,
        day: NaiveDate,
        at: DateTime<Utc>,
    },
    DeleteSalesForDay {
        day: NaiveDate,
    },
    DeleteAllSales,

    // --- maintenance --------------------------------------------------------
    /// Deletes every row of every table; schema and id counters stay.
    WipeAll,
}

impl Command {
    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Command::CreateTable { .. } => "create_table",
            Command::AddColumn { .. } => "add_column",
            Command::CreateIndex { .. } => "create_index",
            Command::NormalizeTabStatus => "normalize_tab_status",
            Command::BackfillDefaults { .. } => "backfill_defaults",
            Command::ImportLegacyTables { .. } => "import_legacy_tables",
            Command::InsertProduct { .. } => "insert_product",
            Command::UpdateProduct { .. } => "update_product",
            Command::DeleteProduct { .. } => "delete_product",
            Command::InsertTab { .. } => "insert_tab",
            Command::CloseTab { .. } => "close_tab",
            Command::DeleteTab { .. } => "delete_tab",
            Command::InsertLineItem { .. } => "insert_line_item",
            Command::DeleteLineItem { .. } => "delete_line_item",
            Command::FinalizeTab { .. } => "finalize_tab",
            Command::DeleteSalesForDay { .. } => "delete_sales_for_day",
            Command::DeleteAllSales => "delete_all_sales",
            Command::WipeAll => "wipe_all",
        }
    }
}

/// Result of a single command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunOutcome {
    pub affected_rows: u64,
    /// Row id of the inserted row, for inserts.
    pub inserted_id: Option<i64>,
}

impl RunOutcome {
    pub const fn affected(rows: u64) -> Self {
        RunOutcome {
            affected_rows: rows,
            inserted_id: None,
        }
    }

    pub const fn inserted(id: i64) -> Self {
        RunOutcome {
            affected_rows: 1,
            inserted_id: Some(id),
        }
    }

    /// Inserted id, or an error if the command was not an insert.
    pub fn require_inserted_id(&self) -> DbResult<i64> {
        self.inserted_id
            .ok_or_else(|| DbError::Internal("insert returned no row id".to_string()))
    }
}

// =============================================================================
// Queries
// =============================================================================

/// Statements that read the store.
///
/// ## Ordering
/// - Product and open-tab lists: folded name, then id (insertion order)
/// - Tab history: most recently updated first, then folded name, then id
/// - Everything else: id, sale records by day first
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    // --- introspection ------------------------------------------------------
    /// Table names, sorted.
    Tables,
    /// Column names of a table, in definition order.
    TableColumns {
        table: Table,
    },
    /// Index names, sorted.
    Indexes,

    // --- products -----------------------------------------------------------
    AllProducts,
    ProductById {
        id: ProductId,
    },
    /// Folded-name equality.
    ProductByName {
        name: String,
    },
    /// Folded-name prefix.
    ProductsByNamePrefix {
        prefix: String,
    },
    /// Folded-name substring.
    ProductsContaining {
        text: String,
    },

    // --- tabs ---------------------------------------------------------------
    AllTabs,
    TabById {
        id: TabId,
    },
    TabsByStatus {
        status: TabStatus,
    },
    /// Closed tabs, most recently updated first.
    TabHistory,

    // --- line items ---------------------------------------------------------
    AllLineItems,
    LineItemById {
        id: LineItemId,
    },
    LineItemsForTab {
        tab_id: TabId,
    },
    /// Items of every tab with the given status.
    LineItemsForStatus {
        status: TabStatus,
    },

    // --- sale records -------------------------------------------------------
    AllSales,
    SalesForDay {
        day: NaiveDate,
    },
}

impl Query {
    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Query::Tables => "tables",
            Query::TableColumns { .. } => "table_columns",
            Query::Indexes => "indexes",
            Query::AllProducts => "all_products",
            Query::ProductById { .. } => "product_by_id",
            Query::ProductByName { .. } => "product_by_name",
            Query::ProductsByNamePrefix { .. } => "products_by_name_prefix",
            Query::ProductsContaining { .. } => "products_containing",
            Query::AllTabs => "all_tabs",
            Query::TabById { .. } => "tab_by_id",
            Query::TabsByStatus { .. } => "tabs_by_status",
            Query::TabHistory => "tab_history",
            Query::AllLineItems => "all_line_items",
            Query::LineItemById { .. } => "line_item_by_id",
            Query::LineItemsForTab { .. } => "line_items_for_tab",
            Query::LineItemsForStatus { .. } => "line_items_for_status",
            Query::AllSales => "all_sales",
            Query::SalesForDay { .. } => "sales_for_day",
        }
    }
}

// =============================================================================
// Rows
// =============================================================================

/// One row returned by a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Row {
    Product(Product),
    Tab(Tab),
    LineItem(LineItem),
    Sale(SaleRecord),
    /// A table, column or index name.
    Name(String),
}

/// Typed extraction from a [`Row`], like `sqlx::FromRow` for intents.
pub trait FromStoreRow: Sized {
    fn from_row(row: Row) -> DbResult<Self>;
}

macro_rules! impl_from_store_row {
    ($ty:ty, $variant:ident, $expected:literal) => {
        impl FromStoreRow for $ty {
            fn from_row(row: Row) -> DbResult<Self> {
                match row {
                    Row::$variant(value) => Ok(value),
                    _ => Err(DbError::UnexpectedRow {
                        expected: $expected,
                    }),
                }
            }
        }
    };
}

impl_from_store_row!(Product, Product, "product");
impl_from_store_row!(Tab, Tab, "tab");
impl_from_store_row!(LineItem, LineItem, "line item");
impl_from_store_row!(SaleRecord, Sale, "sale record");
impl_from_store_row!(String, Name, "name");

/// Converts every row of a result set.
pub fn collect_rows<T: FromStoreRow>(rows: Vec<Row>) -> DbResult<Vec<T>> {
    rows.into_iter().map(T::from_row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_definitions() {
        assert_eq!(
            ColumnSpec::required("price_cents", "INTEGER", "0").definition(),
            "price_cents INTEGER NOT NULL DEFAULT 0"
        );
        assert_eq!(
            ColumnSpec::nullable("note", "TEXT").definition(),
            "note TEXT"
        );
    }

    #[test]
    fn test_row_extraction_checks_shape() {
        let name = String::from_row(Row::Name("products".into())).unwrap();
        assert_eq!(name, "products");

        let err = Product::from_row(Row::Name("products".into())).unwrap_err();
        assert!(matches!(err, DbError::UnexpectedRow { expected: "product" }));
    }

    #[test]
    fn test_run_outcome() {
        assert_eq!(RunOutcome::inserted(4).require_inserted_id().unwrap(), 4);
        assert!(RunOutcome::affected(2).require_inserted_id().is_err());
    }
}
