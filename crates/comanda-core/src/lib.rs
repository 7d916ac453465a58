//! # comanda-core: Pure Domain Logic for Comanda
//!
//! Everything the data layer needs to reason about tabs, products and sales
//! without touching a store: entity types, integer money, input validation,
//! name folding, product reference resolution and report math.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Comanda Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Screens (external)                           │   │
//! │  │   Tabs list ──► Tab detail ──► Products ──► History ──► Export  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ repository calls                       │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 comanda-db (Store + repositories)               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ comanda-core (THIS CRATE) ★                     │   │
//! │  │   types • money • validation • resolve • summary                │   │
//! │  │   NO I/O • NO DATABASE • PURE FUNCTIONS                         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Ids and entities (Product, Tab, LineItem, SaleRecord)
//! - [`money`] - Money type with integer arithmetic
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//! - [`resolve`] - Name folding and product reference resolution
//! - [`summary`] - Tab totals, dashboard and daily sales summaries
//!
//! ## Example Usage
//!
//! ```rust
//! use comanda_core::money::Money;
//!
//! let coxinha = Money::from_cents(350);
//! let line = coxinha.checked_mul(2);
//! assert_eq!(line.map(|m| m.cents()), Some(700));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod resolve;
pub mod summary;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use resolve::{fold_name, resolve_product};
pub use summary::{daily_totals, tab_total, DailyTotal, DashboardSummary, ProductTally};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default database file name, in the device's private storage.
pub const DEFAULT_DB_FILE: &str = "kitutes.db";

/// Maximum quantity of a single line item.
///
/// ## Business Reason
/// Catches typos like 100 instead of 10 on a busy counter.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum unit price in cents (1,000,000.00).
///
/// `MAX_PRICE_CENTS * MAX_ITEM_QUANTITY` is about 1e11, so sums of millions
/// of lines stay far below `i64::MAX`.
pub const MAX_PRICE_CENTS: i64 = 100_000_000;

/// Maximum length of product and tab names.
pub const MAX_NAME_LENGTH: usize = 120;

/// Maximum length of a line item note.
pub const MAX_NOTE_LENGTH: usize = 500;

/// Number of products listed in the dashboard ranking.
pub const TOP_PRODUCTS_LIMIT: usize = 5;
