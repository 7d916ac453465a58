//! # Repository Module
//!
//! Typed operations the screens call. Repositories never see SQL; they
//! build [`Command`]/[`Query`] intents and hand them to the [`Store`].
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Screen                                                                │
//! │       │  store.line_items().add(NewLineItem::new(tab, "Cox", 2))       │
//! │       ▼                                                                 │
//! │  LineItemRepository                                                    │
//! │  ├── validate input (comanda-core)                                     │
//! │  ├── resolve product reference (comanda-core)                          │
//! │  └── Command::InsertLineItem { unit_price_cents: frozen, .. }          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Store ──► native SQLite or emulator (same results either way)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`] - Catalog lookup, search, upsert, resolution
//! - [`TabRepository`] - Tab lifecycle, totals, detail
//! - [`LineItemRepository`] - Adding and removing items
//! - [`SaleRepository`] - Sale history and purges
//! - [`ReportRepository`] - Dashboard figures
//! - [`AdminRepository`] - Snapshot export and wipe
//!
//! [`Command`]: crate::store::Command
//! [`Query`]: crate::store::Query
//! [`Store`]: crate::Store

pub mod admin;
pub mod line_item;
pub mod product;
pub mod report;
pub mod sale;
pub mod tab;

pub use admin::{AdminRepository, StoreSnapshot};
pub use line_item::LineItemRepository;
pub use product::ProductRepository;
pub use report::ReportRepository;
pub use sale::SaleRepository;
pub use tab::TabRepository;

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use crate::config::DbConfig;
    use crate::schema::ensure_schema;
    use crate::store::{MemoryStore, SqliteStore};
    use crate::Store;

    /// Native SQLite `:memory:` store.
    pub async fn native_store() -> Store {
        Store::open(DbConfig::in_memory()).await.unwrap()
    }

    /// Emulated store.
    pub async fn emulated_store() -> Store {
        Store::open(DbConfig::emulated()).await.unwrap()
    }

    /// One store per backend, for scenarios that must behave identically.
    pub async fn both_backends() -> Vec<Store> {
        vec![native_store().await, emulated_store().await]
    }

    /// One store per backend, each opened over a tab row that predates
    /// the status column being filled.
    pub async fn legacy_backends() -> Vec<Store> {
        let sqlite = SqliteStore::open(&DbConfig::in_memory()).await.unwrap();
        sqlx::query(
            "CREATE TABLE tabs (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT, status TEXT)",
        )
        .execute(sqlite.pool())
        .await
        .unwrap();
        sqlx::query("INSERT INTO tabs (name, status) VALUES ('Mesa Velha', NULL)")
            .execute(sqlite.pool())
            .await
            .unwrap();

        let memory = MemoryStore::new();
        ensure_schema(&memory).await.unwrap();
        memory.insert_legacy_tab("Mesa Velha").unwrap();

        vec![
            Store::with_backend(Arc::new(sqlite)),
            Store::with_backend(Arc::new(memory)),
        ]
    }
}
