//! # comanda-db: Data Layer for Comanda
//!
//! Opens the store, brings its schema up to date and exposes the typed
//! repositories screens work with. SQLite (through sqlx) is the native
//! engine; when it can't be opened an in-memory emulator answers the same
//! statements the same way.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Comanda Data Flow                                │
//! │                                                                         │
//! │  Screen (tabs list, tab detail, products, history)                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    comanda-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐   ┌───────────────┐   ┌───────────────┐   │   │
//! │  │   │ Repositories  │──►│    Store      │──►│    Schema     │   │   │
//! │  │   │ products/tabs │   │ (context.rs)  │   │ (bootstrap    │   │   │
//! │  │   │ items/sales   │   │ OnceCell      │   │  once)        │   │   │
//! │  │   └───────────────┘   └───────┬───────┘   └───────────────┘   │   │
//! │  │                               │ Command / Query                │   │
//! │  │                 ┌─────────────┴─────────────┐                  │   │
//! │  │                 ▼                           ▼                  │   │
//! │  │         ┌───────────────┐           ┌───────────────┐          │   │
//! │  │         │  SqliteStore  │           │  MemoryStore  │          │   │
//! │  │         │  kitutes.db   │           │  (fallback)   │          │   │
//! │  │         └───────────────┘           └───────────────┘          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - Store configuration and backend preference
//! - [`context`] - The shared [`Store`] handle
//! - [`error`] - Store error types
//! - [`schema`] - Idempotent additive schema bootstrap
//! - [`store`] - Backend trait, statement intents, SQLite and emulator
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use comanda_core::{NewLineItem, ProductInput};
//! use comanda_db::{DbConfig, Store};
//!
//! let store = Store::open(DbConfig::new("kitutes.db")).await?;
//!
//! store.products().upsert(ProductInput::new("Coxinha", 350)).await?;
//! let tab = store.tabs().create("Mesa 4").await?;
//! store.line_items().add(NewLineItem::new(tab, "cox", 2)).await?;
//!
//! assert_eq!(store.tabs().total(tab).await?.to_string(), "7.00");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod context;
pub mod error;
pub mod repository;
pub mod schema;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{BackendPreference, DbConfig};
pub use context::Store;
pub use error::{DbError, DbResult, Severity};
pub use schema::SchemaSnapshot;
pub use store::{BackendKind, Command, Query, Row, RunOutcome};

// Repository re-exports for convenience
pub use repository::{
    AdminRepository, LineItemRepository, ProductRepository, ReportRepository, SaleRepository,
    StoreSnapshot, TabRepository,
};
