//! # SQLite Backend
//!
//! The native engine: a sqlx connection pool over a single database file.
//!
//! ## Pool
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      SqliteStore                                        │
//! │                                                                         │
//! │  SqliteStore::open(config) ← open file (create if missing)             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                           │
//! │  │            SqlitePool                    │                           │
//! │  │  ┌─────┐ ┌─────┐ ┌─────┐ ┌─────┐       │                           │
//! │  │  │Conn1│ │Conn2│ │Conn3│ │Conn4│       │  (max_connections)        │
//! │  │  └─────┘ └─────┘ └─────┘ └─────┘       │                           │
//! │  └─────────────────────────────────────────┘                           │
//! │       │                                                                 │
//! │  Screens refreshing at once ──► separate connections                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! File databases run in WAL mode so a screen reading the tab list never
//! waits for another screen adding an item.
//!
//! ## Row Mapping
//! Columns are added at runtime by the schema manager, so statements are
//! plain `sqlx::query` calls with rows mapped by column name rather than
//! compile-time checked macros.
//!
//! ## First-Generation Tables
//! ```text
//! produtos(nome, preco REAL)                 ──► products (price in cents)
//! comandas(nome, status 'aberta'/'fechada',  ──► tabs (open / closed)
//!          aberta_em, fechada_em)
//! itens(comanda_id, produto, qtd REAL,       ──► line_items of the new tab
//!       preco_unit REAL, obs)
//! ```
//! Imported rows get `imported_at` set in the old table, so each one is
//! carried over exactly once even if its copy is later deleted.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row as _, SqliteConnection, SqlitePool};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, instrument};

use comanda_core::{
    fold_name, LineItem, Product, SaleRecord, Tab, TabId, TabStatus, MAX_ITEM_QUANTITY,
    MAX_PRICE_CENTS,
};

use super::statement::{Command, Query, Row, RunOutcome, Table};
use super::{Backend, BackendKind};
use crate::config::DbConfig;
use crate::error::{DbError, DbResult};

const PRODUCT_COLUMNS: &str = "id, name, price_cents, updated_at";

const TAB_COLUMNS: &str = "id, name, status, opened_at, closed_at, updated_at";

const LINE_ITEM_COLUMNS: &str =
    "id, tab_id, product_id, product_name, quantity, unit_price_cents, note, created_at";

const SALE_COLUMNS: &str =
    "id, day, tab_name, product_name, quantity, unit_price_cents, recorded_at";

/// Tables written by the first generation of the app.
const LEGACY_TABLES: [&str; 3] = ["produtos", "comandas", "itens"];

/// Connections of a file database are recycled after this long.
const MAX_CONNECTION_LIFETIME: Duration = Duration::from_secs(30 * 60);

// =============================================================================
// Store
// =============================================================================

/// SQLite through a sqlx pool.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens the database file named by the configuration.
    ///
    /// ## What This Does
    /// 1. Creates the file if it doesn't exist (the directory must)
    /// 2. WAL journal and NORMAL synchronous for file databases
    /// 3. Opens the pool and one connection, so a bad path fails here
    ///
    /// ## Returns
    /// * `Ok(SqliteStore)` - engine usable, schema untouched
    /// * `Err(DbError::BackendUnavailable)` - file or engine unusable
    pub async fn open(config: &DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Opening SQLite store"
        );

        let in_memory = config.is_in_memory_path();

        let connect_options = if in_memory {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::BackendUnavailable(e.to_string()))?
        } else {
            SqliteConnectOptions::new()
                .filename(&config.database_path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
        };

        // NORMAL synchronous: safe from corruption, may lose the last
        // transaction on power loss
        let connect_options = connect_options.synchronous(SqliteSynchronous::Normal);

        debug!(in_memory, "Connection options configured");

        // An in-memory database lives as long as its connection
        let max_lifetime = if in_memory {
            None
        } else {
            Some(MAX_CONNECTION_LIFETIME)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(max_lifetime)
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::BackendUnavailable(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "SQLite pool created"
        );

        Ok(SqliteStore { pool })
    }

    /// Returns the connection pool, for statements outside the intent set.
    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Checks if the database can execute queries.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    // =========================================================================
    // Commands
    // =========================================================================

    async fn exec(&self, sql: &str) -> DbResult<RunOutcome> {
        let result = sqlx::query(sql).execute(&self.pool).await?;
        Ok(RunOutcome::affected(result.rows_affected()))
    }

    async fn backfill_defaults(&self, at: DateTime<Utc>) -> DbResult<RunOutcome> {
        let timestamp_columns = [
            (Table::Products, "updated_at"),
            (Table::Tabs, "opened_at"),
            (Table::Tabs, "updated_at"),
            (Table::LineItems, "created_at"),
            (Table::SaleRecords, "recorded_at"),
        ];

        let mut affected = 0;
        for (table, column) in timestamp_columns {
            let sql = format!("UPDATE {table} SET {column} = ?1 WHERE {column} IS NULL");
            affected += sqlx::query(&sql)
                .bind(at)
                .execute(&self.pool)
                .await?
                .rows_affected();
        }

        affected += sqlx::query(
            "UPDATE sale_records SET day = ?1 WHERE day IS NULL OR day = ''",
        )
        .bind(at.date_naive())
        .execute(&self.pool)
        .await?
        .rows_affected();

        for table in [Table::Products, Table::Tabs] {
            let select = format!("SELECT id, name FROM {table} WHERE name_key IS NULL");
            let unkeyed = sqlx::query(&select).fetch_all(&self.pool).await?;

            let update = format!("UPDATE {table} SET name_key = ?1 WHERE id = ?2");
            for row in unkeyed {
                let id: i64 = row.try_get("id")?;
                let name: Option<String> = row.try_get("name")?;
                let key = fold_name(name.as_deref().unwrap_or_default());
                affected += sqlx::query(&update)
                    .bind(key)
                    .bind(id)
                    .execute(&self.pool)
                    .await?
                    .rows_affected();
            }
        }

        Ok(RunOutcome::affected(affected))
    }

    async fn delete_tab(&self, id: TabId) -> DbResult<RunOutcome> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM line_items WHERE tab_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM tabs WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(RunOutcome::affected(result.rows_affected()))
    }

    async fn finalize_tab(
        &self,
        id: TabId,
        day: NaiveDate,
        at: DateTime<Utc>,
    ) -> DbResult<RunOutcome> {
        // Dropping the transaction on any early return rolls it back
        let mut tx = self.pool.begin().await?;

        let Some(tab) = sqlx::query("SELECT name, status FROM tabs WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(RunOutcome::affected(0));
        };
        let status: Option<String> = tab.try_get("status")?;
        if status.as_deref() != Some(TabStatus::Open.as_str()) {
            return Ok(RunOutcome::affected(0));
        }
        let tab_name: String = tab.try_get("name")?;

        let inserted = sqlx::query(
            "INSERT INTO sale_records \
             (day, tab_name, product_name, quantity, unit_price_cents, recorded_at) \
             SELECT ?2, ?3, product_name, quantity, unit_price_cents, ?4 \
             FROM line_items WHERE tab_id = ?1 ORDER BY id",
        )
        .bind(id)
        .bind(day)
        .bind(&tab_name)
        .bind(at)
        .execute(&mut *tx)
        .await?;
        let written = inserted.rows_affected();

        sqlx::query("DELETE FROM line_items WHERE tab_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM tabs WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(RunOutcome {
            affected_rows: written + 1,
            inserted_id: (written > 0).then_some(inserted.last_insert_rowid()),
        })
    }

    async fn import_legacy_tables(&self, at: DateTime<Utc>) -> DbResult<RunOutcome> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name IN ('{}')",
            LEGACY_TABLES.join("', '")
        );
        let present: Vec<String> = sqlx::query_scalar(&sql).fetch_all(&mut *tx).await?;
        let has = |table: &str| present.iter().any(|p| p == table);

        let mut imported = 0;
        if has("produtos") {
            add_import_marker(&mut tx, "produtos").await?;
            imported += import_legacy_products(&mut tx, at).await?;
        }
        if has("comandas") {
            add_import_marker(&mut tx, "comandas").await?;
            imported += import_legacy_tabs(&mut tx, has("itens"), at).await?;
        }

        tx.commit().await?;

        if imported > 0 {
            info!(rows = imported, "First-generation rows imported");
        }
        Ok(RunOutcome::affected(imported))
    }

    async fn wipe_all(&self) -> DbResult<RunOutcome> {
        let mut tx = self.pool.begin().await?;

        // Children first
        let mut affected = 0;
        for table in [Table::LineItems, Table::SaleRecords, Table::Tabs, Table::Products] {
            let sql = format!("DELETE FROM {table}");
            affected += sqlx::query(&sql).execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        Ok(RunOutcome::affected(affected))
    }

    // =========================================================================
    // Queries
    // =========================================================================

    async fn names(&self, sql: &str) -> DbResult<Vec<Row>> {
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| Ok(Row::Name(row.try_get("name")?)))
            .collect()
    }
}

// =============================================================================
// First-Generation Import
// =============================================================================

async fn add_import_marker(conn: &mut SqliteConnection, table: &str) -> DbResult<()> {
    let pragma = format!("PRAGMA table_info({table})");
    let columns = sqlx::query(&pragma).fetch_all(&mut *conn).await?;

    let mut marked = false;
    for column in &columns {
        let name: String = column.try_get("name")?;
        marked |= name.eq_ignore_ascii_case("imported_at");
    }

    if !marked {
        let alter = format!("ALTER TABLE {table} ADD COLUMN imported_at TEXT");
        sqlx::query(&alter).execute(&mut *conn).await?;
    }
    Ok(())
}

async fn mark_imported(
    conn: &mut SqliteConnection,
    table: &str,
    id: i64,
    at: DateTime<Utc>,
) -> DbResult<()> {
    let sql = format!("UPDATE {table} SET imported_at = ?1 WHERE id = ?2");
    sqlx::query(&sql).bind(at).bind(id).execute(&mut *conn).await?;
    Ok(())
}

/// Names already in `products` (folded) are skipped but still marked.
async fn import_legacy_products(conn: &mut SqliteConnection, at: DateTime<Utc>) -> DbResult<u64> {
    let rows = sqlx::query(
        "SELECT id, nome, CAST(preco AS REAL) AS preco, updated_at FROM produtos \
         WHERE imported_at IS NULL ORDER BY id",
    )
    .fetch_all(&mut *conn)
    .await?;

    let mut imported = 0;
    for row in rows {
        let legacy_id: i64 = row.try_get("id")?;
        let name: Option<String> = row.try_get("nome")?;
        let name = name.unwrap_or_default().trim().to_string();
        let key = fold_name(&name);

        let taken: Option<i64> =
            sqlx::query_scalar("SELECT id FROM products WHERE name_key = ?1 LIMIT 1")
                .bind(&key)
                .fetch_optional(&mut *conn)
                .await?;

        if !key.is_empty() && taken.is_none() {
            let updated_at: Option<String> = row.try_get("updated_at")?;
            sqlx::query(
                "INSERT INTO products (name, name_key, price_cents, updated_at) \
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(&name)
            .bind(&key)
            .bind(legacy_cents(row.try_get("preco")?))
            .bind(legacy_timestamp(updated_at.as_deref(), at))
            .execute(&mut *conn)
            .await?;
            imported += 1;
        }

        mark_imported(conn, "produtos", legacy_id, at).await?;
    }
    Ok(imported)
}

/// Each `comandas` row becomes a new tab; its `itens` follow it.
async fn import_legacy_tabs(
    conn: &mut SqliteConnection,
    with_items: bool,
    at: DateTime<Utc>,
) -> DbResult<u64> {
    let rows = sqlx::query(
        "SELECT id, nome, status, aberta_em, fechada_em FROM comandas \
         WHERE imported_at IS NULL ORDER BY id",
    )
    .fetch_all(&mut *conn)
    .await?;

    let mut imported = 0;
    for row in rows {
        let legacy_id: i64 = row.try_get("id")?;
        let name: Option<String> = row.try_get("nome")?;
        let name = name.unwrap_or_default().trim().to_string();
        let status: Option<String> = row.try_get("status")?;
        let status = legacy_status(status.as_deref());

        let opened_at: Option<String> = row.try_get("aberta_em")?;
        let opened_at = legacy_timestamp(opened_at.as_deref(), at);
        let closed_at = match status {
            TabStatus::Open => None,
            TabStatus::Closed => {
                let closed_at: Option<String> = row.try_get("fechada_em")?;
                Some(legacy_timestamp(closed_at.as_deref(), at))
            }
        };

        let tab_id = sqlx::query(
            "INSERT INTO tabs (name, name_key, status, opened_at, closed_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&name)
        .bind(fold_name(&name))
        .bind(status)
        .bind(opened_at)
        .bind(closed_at)
        .bind(closed_at.unwrap_or(opened_at))
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();
        imported += 1;

        if with_items {
            imported += import_legacy_items(conn, legacy_id, tab_id, at).await?;
        }

        mark_imported(conn, "comandas", legacy_id, at).await?;
    }
    Ok(imported)
}

async fn import_legacy_items(
    conn: &mut SqliteConnection,
    legacy_tab_id: i64,
    tab_id: i64,
    at: DateTime<Utc>,
) -> DbResult<u64> {
    let rows = sqlx::query(
        "SELECT produto, CAST(qtd AS REAL) AS qtd, CAST(preco_unit AS REAL) AS preco_unit, \
         obs, updated_at FROM itens WHERE comanda_id = ?1 ORDER BY id",
    )
    .bind(legacy_tab_id)
    .fetch_all(&mut *conn)
    .await?;

    for row in &rows {
        let product_name: Option<String> = row.try_get("produto")?;
        let product_name = product_name.unwrap_or_default().trim().to_string();
        let product_id: Option<i64> =
            sqlx::query_scalar("SELECT id FROM products WHERE name_key = ?1 ORDER BY id LIMIT 1")
                .bind(fold_name(&product_name))
                .fetch_optional(&mut *conn)
                .await?;

        let note: Option<String> = row.try_get("obs")?;
        let note = note
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        let created_at: Option<String> = row.try_get("updated_at")?;

        sqlx::query(
            "INSERT INTO line_items (tab_id, product_id, product_name, \
             quantity, unit_price_cents, note, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(tab_id)
        .bind(product_id)
        .bind(&product_name)
        .bind(legacy_quantity(row.try_get("qtd")?))
        .bind(legacy_cents(row.try_get("preco_unit")?))
        .bind(note)
        .bind(legacy_timestamp(created_at.as_deref(), at))
        .execute(&mut *conn)
        .await?;
    }
    Ok(rows.len() as u64)
}

/// Amount in reais stored as REAL ──► whole cents within the price bound.
fn legacy_cents(value: Option<f64>) -> i64 {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => ((v * 100.0).round() as i64).min(MAX_PRICE_CENTS),
        _ => 0,
    }
}

/// Quantity stored as REAL ──► whole units within the item bounds.
fn legacy_quantity(value: Option<f64>) -> i64 {
    match value {
        Some(v) if v.is_finite() => (v.round() as i64).clamp(1, MAX_ITEM_QUANTITY),
        _ => 1,
    }
}

fn legacy_status(value: Option<&str>) -> TabStatus {
    match value.map(|s| s.trim().to_lowercase()).as_deref() {
        Some("fechada") | Some("closed") => TabStatus::Closed,
        _ => TabStatus::Open,
    }
}

/// RFC 3339 or `datetime('now')` text; anything else becomes `fallback`.
fn legacy_timestamp(value: Option<&str>, fallback: DateTime<Utc>) -> DateTime<Utc> {
    let Some(text) = value.map(str::trim).filter(|t| !t.is_empty()) else {
        return fallback;
    };
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").map(|t| t.and_utc()))
        .unwrap_or(fallback)
}

// =============================================================================
// Row Mapping
// =============================================================================

fn map_rows(
    rows: &[SqliteRow],
    map: fn(&SqliteRow) -> Result<Row, sqlx::Error>,
) -> DbResult<Vec<Row>> {
    rows.iter().map(|row| map(row).map_err(DbError::from)).collect()
}

fn product_row(row: &SqliteRow) -> Result<Row, sqlx::Error> {
    Ok(Row::Product(Product {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        price_cents: row.try_get("price_cents")?,
        updated_at: row.try_get("updated_at")?,
    }))
}

fn tab_row(row: &SqliteRow) -> Result<Row, sqlx::Error> {
    Ok(Row::Tab(Tab {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        status: row.try_get("status")?,
        opened_at: row.try_get("opened_at")?,
        closed_at: row.try_get("closed_at")?,
        updated_at: row.try_get("updated_at")?,
    }))
}

fn line_item_row(row: &SqliteRow) -> Result<Row, sqlx::Error> {
    Ok(Row::LineItem(LineItem {
        id: row.try_get("id")?,
        tab_id: row.try_get("tab_id")?,
        product_id: row.try_get("product_id")?,
        product_name: row.try_get("product_name")?,
        quantity: row.try_get("quantity")?,
        unit_price_cents: row.try_get("unit_price_cents")?,
        note: row.try_get("note")?,
        created_at: row.try_get("created_at")?,
    }))
}

fn sale_row(row: &SqliteRow) -> Result<Row, sqlx::Error> {
    Ok(Row::Sale(SaleRecord {
        id: row.try_get("id")?,
        day: row.try_get("day")?,
        tab_name: row.try_get("tab_name")?,
        product_name: row.try_get("product_name")?,
        quantity: row.try_get("quantity")?,
        unit_price_cents: row.try_get("unit_price_cents")?,
        recorded_at: row.try_get("recorded_at")?,
    }))
}

// =============================================================================
// Backend
// =============================================================================

#[async_trait]
impl Backend for SqliteStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Native
    }

    #[instrument(skip(self, command), fields(command = command.label()))]
    async fn run(&self, command: &Command) -> DbResult<RunOutcome> {
        match command {
            Command::CreateTable { table } => {
                self.exec(&format!(
                    "CREATE TABLE IF NOT EXISTS {table} (id INTEGER PRIMARY KEY AUTOINCREMENT)"
                ))
                .await
            }

            Command::AddColumn { table, column } => {
                self.exec(&format!("ALTER TABLE {table} ADD COLUMN {}", column.definition()))
                    .await
            }

            Command::CreateIndex { index } => {
                self.exec(&format!(
                    "CREATE INDEX IF NOT EXISTS {} ON {}({})",
                    index.name, index.table, index.column
                ))
                .await
            }

            Command::NormalizeTabStatus => {
                self.exec("UPDATE tabs SET status = 'open' WHERE status IS NULL")
                    .await
            }

            Command::BackfillDefaults { at } => self.backfill_defaults(*at).await,

            Command::ImportLegacyTables { at } => self.import_legacy_tables(*at).await,

            Command::InsertProduct {
                name,
                price_cents,
                at,
            } => {
                let result = sqlx::query(
                    "INSERT INTO products (name, name_key, price_cents, updated_at) \
                     VALUES (?1, ?2, ?3, ?4)",
                )
                .bind(name)
                .bind(fold_name(name))
                .bind(price_cents)
                .bind(at)
                .execute(&self.pool)
                .await?;
                Ok(RunOutcome::inserted(result.last_insert_rowid()))
            }

            Command::UpdateProduct {
                id,
                name,
                price_cents,
                at,
            } => {
                let result = sqlx::query(
                    "UPDATE products \
                     SET name = ?2, name_key = ?3, price_cents = ?4, updated_at = ?5 \
                     WHERE id = ?1",
                )
                .bind(id)
                .bind(name)
                .bind(fold_name(name))
                .bind(price_cents)
                .bind(at)
                .execute(&self.pool)
                .await?;
                Ok(RunOutcome::affected(result.rows_affected()))
            }

            Command::DeleteProduct { id } => {
                let result = sqlx::query("DELETE FROM products WHERE id = ?1")
                    .bind(id)
                    .execute(&self.pool)
                    .await?;
                Ok(RunOutcome::affected(result.rows_affected()))
            }

            Command::InsertTab { name, at } => {
                let result = sqlx::query(
                    "INSERT INTO tabs (name, name_key, status, opened_at, closed_at, updated_at) \
                     VALUES (?1, ?2, 'open', ?3, NULL, ?3)",
                )
                .bind(name)
                .bind(fold_name(name))
                .bind(at)
                .execute(&self.pool)
                .await?;
                Ok(RunOutcome::inserted(result.last_insert_rowid()))
            }

            Command::CloseTab { id, at } => {
                let result = sqlx::query(
                    "UPDATE tabs SET status = 'closed', closed_at = ?2, updated_at = ?2 \
                     WHERE id = ?1 AND status = 'open'",
                )
                .bind(id)
                .bind(at)
                .execute(&self.pool)
                .await?;
                Ok(RunOutcome::affected(result.rows_affected()))
            }

            Command::DeleteTab { id } => self.delete_tab(*id).await,

            Command::InsertLineItem {
                tab_id,
                product_id,
                product_name,
                quantity,
                unit_price_cents,
                note,
                at,
            } => {
                let result = sqlx::query(
                    "INSERT INTO line_items (tab_id, product_id, product_name, \
                     quantity, unit_price_cents, note, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )
                .bind(tab_id)
                .bind(product_id)
                .bind(product_name)
                .bind(quantity)
                .bind(unit_price_cents)
                .bind(note)
                .bind(at)
                .execute(&self.pool)
                .await?;
                Ok(RunOutcome::inserted(result.last_insert_rowid()))
            }

            Command::DeleteLineItem { id } => {
                let result = sqlx::query("DELETE FROM line_items WHERE id = ?1")
                    .bind(id)
                    .execute(&self.pool)
                    .await?;
                Ok(RunOutcome::affected(result.rows_affected()))
            }

            Command::FinalizeTab { id, day, at } => self.finalize_tab(*id, *day, *at).await,

            Command::DeleteSalesForDay { day } => {
                let result = sqlx::query("DELETE FROM sale_records WHERE day = ?1")
                    .bind(day)
                    .execute(&self.pool)
                    .await?;
                Ok(RunOutcome::affected(result.rows_affected()))
            }

            Command::DeleteAllSales => self.exec("DELETE FROM sale_records").await,

            Command::WipeAll => self.wipe_all().await,
        }
    }

    #[instrument(skip(self, query), fields(query = query.label()))]
    async fn query(&self, query: &Query) -> DbResult<Vec<Row>> {
        match query {
            Query::Tables => {
                self.names(
                    "SELECT name FROM sqlite_master \
                     WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
                )
                .await
            }

            Query::TableColumns { table } => {
                self.names(&format!("PRAGMA table_info({table})")).await
            }

            Query::Indexes => {
                self.names(
                    "SELECT name FROM sqlite_master \
                     WHERE type = 'index' AND name NOT LIKE 'sqlite_%' ORDER BY name",
                )
                .await
            }

            Query::AllProducts => {
                let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name_key, id");
                map_rows(&sqlx::query(&sql).fetch_all(&self.pool).await?, product_row)
            }

            Query::ProductById { id } => {
                let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
                map_rows(&sqlx::query(&sql).bind(id).fetch_all(&self.pool).await?, product_row)
            }

            Query::ProductByName { name } => {
                let sql = format!(
                    "SELECT {PRODUCT_COLUMNS} FROM products WHERE name_key = ?1 ORDER BY id"
                );
                let rows = sqlx::query(&sql).bind(fold_name(name)).fetch_all(&self.pool).await?;
                map_rows(&rows, product_row)
            }

            Query::ProductsByNamePrefix { prefix } => {
                let sql = format!(
                    "SELECT {PRODUCT_COLUMNS} FROM products \
                     WHERE substr(name_key, 1, length(?1)) = ?1 ORDER BY name_key, id"
                );
                let rows = sqlx::query(&sql).bind(fold_name(prefix)).fetch_all(&self.pool).await?;
                map_rows(&rows, product_row)
            }

            Query::ProductsContaining { text } => {
                let sql = format!(
                    "SELECT {PRODUCT_COLUMNS} FROM products \
                     WHERE instr(name_key, ?1) > 0 ORDER BY name_key, id"
                );
                let rows = sqlx::query(&sql).bind(fold_name(text)).fetch_all(&self.pool).await?;
                map_rows(&rows, product_row)
            }

            Query::AllTabs => {
                let sql = format!("SELECT {TAB_COLUMNS} FROM tabs ORDER BY id");
                map_rows(&sqlx::query(&sql).fetch_all(&self.pool).await?, tab_row)
            }

            Query::TabById { id } => {
                let sql = format!("SELECT {TAB_COLUMNS} FROM tabs WHERE id = ?1");
                map_rows(&sqlx::query(&sql).bind(id).fetch_all(&self.pool).await?, tab_row)
            }

            Query::TabsByStatus { status } => {
                let sql = format!(
                    "SELECT {TAB_COLUMNS} FROM tabs WHERE status = ?1 ORDER BY name_key, id"
                );
                map_rows(&sqlx::query(&sql).bind(status).fetch_all(&self.pool).await?, tab_row)
            }

            Query::TabHistory => {
                let sql = format!(
                    "SELECT {TAB_COLUMNS} FROM tabs WHERE status = 'closed' \
                     ORDER BY updated_at DESC, name_key, id"
                );
                map_rows(&sqlx::query(&sql).fetch_all(&self.pool).await?, tab_row)
            }

            Query::AllLineItems => {
                let sql = format!("SELECT {LINE_ITEM_COLUMNS} FROM line_items ORDER BY id");
                map_rows(&sqlx::query(&sql).fetch_all(&self.pool).await?, line_item_row)
            }

            Query::LineItemById { id } => {
                let sql = format!("SELECT {LINE_ITEM_COLUMNS} FROM line_items WHERE id = ?1");
                map_rows(&sqlx::query(&sql).bind(id).fetch_all(&self.pool).await?, line_item_row)
            }

            Query::LineItemsForTab { tab_id } => {
                let sql = format!(
                    "SELECT {LINE_ITEM_COLUMNS} FROM line_items WHERE tab_id = ?1 ORDER BY id"
                );
                let rows = sqlx::query(&sql).bind(tab_id).fetch_all(&self.pool).await?;
                map_rows(&rows, line_item_row)
            }

            Query::LineItemsForStatus { status } => {
                let sql = "SELECT li.id AS id, li.tab_id AS tab_id, li.product_id AS product_id, \
                           li.product_name AS product_name, li.quantity AS quantity, \
                           li.unit_price_cents AS unit_price_cents, li.note AS note, \
                           li.created_at AS created_at \
                           FROM line_items li INNER JOIN tabs t ON t.id = li.tab_id \
                           WHERE t.status = ?1 ORDER BY li.id";
                map_rows(&sqlx::query(sql).bind(status).fetch_all(&self.pool).await?, line_item_row)
            }

            Query::AllSales => {
                let sql = format!("SELECT {SALE_COLUMNS} FROM sale_records ORDER BY day, id");
                map_rows(&sqlx::query(&sql).fetch_all(&self.pool).await?, sale_row)
            }

            Query::SalesForDay { day } => {
                let sql =
                    format!("SELECT {SALE_COLUMNS} FROM sale_records WHERE day = ?1 ORDER BY id");
                map_rows(&sqlx::query(&sql).bind(day).fetch_all(&self.pool).await?, sale_row)
            }
        }
    }

    async fn close(&self) {
        info!("Closing SQLite pool");
        self.pool.close().await;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
