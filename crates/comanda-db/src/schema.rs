//! # Schema Bootstrap
//!
//! Brings any historical database up to the shape the application needs,
//! without ever dropping or renaming anything.
//!
//! ## Steps
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. CREATE TABLE IF NOT EXISTS  (id INTEGER PRIMARY KEY AUTOINCREMENT)  │
//! │  2. introspect columns ──► ADD COLUMN for each missing one              │
//! │  3. produtos / comandas / itens ──► copied once into the new tables     │
//! │  4. tabs.status NULL ──► 'open'                                         │
//! │  5. NULL timestamps ──► now, missing name_key ──► fold_name(name)       │
//! │  6. CREATE INDEX IF NOT EXISTS                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every step is idempotent, so a second run changes nothing. Any failure
//! becomes [`DbError::MigrationFailed`]; callers must not continue on a
//! half-migrated schema.

use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::store::{collect_rows, Backend, ColumnSpec, Command, IndexSpec, Query, Table};

// =============================================================================
// Required Shape
// =============================================================================

const PRODUCT_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::required("name", "TEXT", "''"),
    ColumnSpec::nullable("name_key", "TEXT"),
    ColumnSpec::required("price_cents", "INTEGER", "0"),
    ColumnSpec::nullable("updated_at", "TEXT"),
];

const TAB_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::required("name", "TEXT", "''"),
    ColumnSpec::nullable("name_key", "TEXT"),
    ColumnSpec::nullable("status", "TEXT"),
    ColumnSpec::nullable("opened_at", "TEXT"),
    ColumnSpec::nullable("closed_at", "TEXT"),
    ColumnSpec::nullable("updated_at", "TEXT"),
];

const LINE_ITEM_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::required("tab_id", "INTEGER", "0"),
    ColumnSpec::nullable("product_id", "INTEGER"),
    ColumnSpec::required("product_name", "TEXT", "''"),
    ColumnSpec::required("quantity", "INTEGER", "1"),
    ColumnSpec::required("unit_price_cents", "INTEGER", "0"),
    ColumnSpec::nullable("note", "TEXT"),
    ColumnSpec::nullable("created_at", "TEXT"),
];

const SALE_RECORD_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::required("day", "TEXT", "''"),
    ColumnSpec::required("tab_name", "TEXT", "''"),
    ColumnSpec::required("product_name", "TEXT", "''"),
    ColumnSpec::required("quantity", "INTEGER", "1"),
    ColumnSpec::required("unit_price_cents", "INTEGER", "0"),
    ColumnSpec::nullable("recorded_at", "TEXT"),
];

/// Columns each table must end up with, besides `id`.
pub fn required_columns(table: Table) -> &'static [ColumnSpec] {
    match table {
        Table::Products => PRODUCT_COLUMNS,
        Table::Tabs => TAB_COLUMNS,
        Table::LineItems => LINE_ITEM_COLUMNS,
        Table::SaleRecords => SALE_RECORD_COLUMNS,
    }
}

/// Lookup indexes; none of them unique.
pub const INDEXES: &[IndexSpec] = &[
    IndexSpec {
        name: "idx_line_items_tab_id",
        table: Table::LineItems,
        column: "tab_id",
    },
    IndexSpec {
        name: "idx_products_name",
        table: Table::Products,
        column: "name",
    },
    IndexSpec {
        name: "idx_products_name_key",
        table: Table::Products,
        column: "name_key",
    },
    IndexSpec {
        name: "idx_tabs_status",
        table: Table::Tabs,
        column: "status",
    },
    IndexSpec {
        name: "idx_sale_records_day",
        table: Table::SaleRecords,
        column: "day",
    },
];

// =============================================================================
// Bootstrap
// =============================================================================

/// Creates or migrates the schema on the given backend.
///
/// ## Returns
/// * `Ok(())` - schema complete, legacy rows normalized
/// * `Err(DbError::MigrationFailed)` - fatal, the store is unusable
pub async fn ensure_schema(backend: &dyn Backend) -> DbResult<()> {
    bootstrap(backend).await.map_err(DbError::into_migration)
}

async fn bootstrap(backend: &dyn Backend) -> DbResult<()> {
    info!(backend = %backend.kind(), "Bootstrapping schema");

    let create: Vec<Command> = Table::ALL
        .into_iter()
        .map(|table| Command::CreateTable { table })
        .collect();
    backend.execute(&create).await?;

    let mut added = 0;
    for table in Table::ALL {
        let existing: Vec<String> =
            collect_rows(backend.query(&Query::TableColumns { table }).await?)?;

        // SQLite column names are case-insensitive
        let missing: Vec<Command> = required_columns(table)
            .iter()
            .filter(|column| !existing.iter().any(|e| e.eq_ignore_ascii_case(column.name)))
            .map(|column| Command::AddColumn {
                table,
                column: *column,
            })
            .collect();

        if !missing.is_empty() {
            debug!(table = %table, count = missing.len(), "Adding missing columns");
            added += missing.len();
            backend.execute(&missing).await?;
        }
    }

    let now = Utc::now();
    let imported = backend
        .run(&Command::ImportLegacyTables { at: now })
        .await?
        .affected_rows;
    let normalized = backend.run(&Command::NormalizeTabStatus).await?.affected_rows;
    let backfilled = backend
        .run(&Command::BackfillDefaults { at: now })
        .await?
        .affected_rows;

    let indexes: Vec<Command> = INDEXES
        .iter()
        .map(|index| Command::CreateIndex { index: *index })
        .collect();
    backend.execute(&indexes).await?;

    info!(added, imported, normalized, backfilled, "Schema ready");
    Ok(())
}

// =============================================================================
// Introspection
// =============================================================================

/// The schema as the backend reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaSnapshot {
    /// Table name → column names in definition order.
    pub tables: BTreeMap<String, Vec<String>>,
    /// Index names, sorted.
    pub indexes: Vec<String>,
}

impl SchemaSnapshot {
    pub fn columns(&self, table: Table) -> &[String] {
        self.tables
            .get(table.name())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Introspects tables, columns and indexes.
pub async fn describe(backend: &dyn Backend) -> DbResult<SchemaSnapshot> {
    let names: Vec<String> = collect_rows(backend.query(&Query::Tables).await?)?;

    let mut tables = BTreeMap::new();
    for name in names {
        let columns = match Table::ALL.into_iter().find(|t| t.name() == name) {
            Some(table) => collect_rows(backend.query(&Query::TableColumns { table }).await?)?,
            // Foreign tables are listed without columns
            None => Vec::new(),
        };
        tables.insert(name, columns);
    }

    let indexes = collect_rows(backend.query(&Query::Indexes).await?)?;

    Ok(SchemaSnapshot { tables, indexes })
}
