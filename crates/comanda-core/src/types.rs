//! # Domain Types
//!
//! Core domain types used throughout Comanda.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │       Tab       │   │   SaleRecord    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │   │  id             │   │  day            │       │
//! │  │  name           │◄┐ │  name           │   │  tab_name       │       │
//! │  │  price_cents    │ │ │  status         │   │  product_name   │       │
//! │  └─────────────────┘ │ └────────▲────────┘   │  unit_price     │       │
//! │                      │          │ tab_id     └─────────────────┘       │
//! │                      │ ┌────────┴────────┐                              │
//! │          product_id? └─│    LineItem     │  unit price frozen at insert │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Opaque Identity
//! Ids are newtypes over the store's row id. They can be displayed, parsed
//! and compared for equality, but carry no ordering or arithmetic.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;

// =============================================================================
// Identifiers
// =============================================================================

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
        #[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
        #[cfg_attr(feature = "sqlx", sqlx(transparent))]
        #[serde(transparent)]
        #[ts(export)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw row id handed out by a store.
            #[inline]
            pub const fn from_raw(raw: i64) -> Self {
                $name(raw)
            }

            /// Returns the raw row id, for storage layers only.
            #[inline]
            pub const fn raw(&self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<i64>()
                    .map($name)
                    .map_err(|_| ValidationError::InvalidFormat {
                        field: $field.to_string(),
                        reason: format!("'{}' is not an id", s.trim()),
                    })
            }
        }
    };
}

define_id!(
    /// Product identifier.
    ProductId,
    "product id"
);
define_id!(
    /// Tab identifier.
    TabId,
    "tab id"
);
define_id!(
    /// Line item identifier.
    LineItemId,
    "line item id"
);
define_id!(
    /// Sale record identifier.
    SaleRecordId,
    "sale record id"
);

// =============================================================================
// Product
// =============================================================================

/// A catalog entry with its current unit price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Product {
    pub id: ProductId,

    /// Display name, unique under case/diacritic folding.
    pub name: String,

    /// Current unit price in cents.
    pub price_cents: i64,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

/// Input for creating or updating a catalog entry.
///
/// Without `id` the product is matched by folded name: an existing entry gets
/// the new price, otherwise a new entry is created. With `id` that entry is
/// renamed and repriced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductInput {
    pub id: Option<ProductId>,
    pub name: String,
    pub price_cents: i64,
}

impl ProductInput {
    pub fn new(name: impl Into<String>, price_cents: i64) -> Self {
        ProductInput {
            id: None,
            name: name.into(),
            price_cents,
        }
    }

    pub fn with_id(mut self, id: ProductId) -> Self {
        self.id = Some(id);
        self
    }
}

// =============================================================================
// Tab Status
// =============================================================================

/// Lifecycle of a tab: created open, closed exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum TabStatus {
    Open,
    Closed,
}

impl TabStatus {
    /// Value stored in the `status` column.
    pub const fn as_str(&self) -> &'static str {
        match self {
            TabStatus::Open => "open",
            TabStatus::Closed => "closed",
        }
    }
}

impl Default for TabStatus {
    fn default() -> Self {
        TabStatus::Open
    }
}

impl fmt::Display for TabStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TabStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(TabStatus::Open),
            "closed" => Ok(TabStatus::Closed),
            other => Err(ValidationError::InvalidFormat {
                field: "status".to_string(),
                reason: format!("unknown tab status '{}'", other),
            }),
        }
    }
}

// =============================================================================
// Tab
// =============================================================================

/// A running order for a customer or table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Tab {
    pub id: TabId,
    pub name: String,
    pub status: TabStatus,
    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Tab {
    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == TabStatus::Open
    }
}

// =============================================================================
// Line Item
// =============================================================================

/// One product-quantity entry within a tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineItem {
    pub id: LineItemId,
    pub tab_id: TabId,

    /// Catalog entry at insert time. Dangles if the product is deleted.
    pub product_id: Option<ProductId>,

    /// Product name at insert time.
    pub product_name: String,

    pub quantity: i64,

    /// Unit price copied from the product when the item was added.
    pub unit_price_cents: i64,

    pub note: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl LineItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// `quantity × unit_price`, or `AmountOverflow`.
    pub fn line_total(&self) -> CoreResult<Money> {
        self.unit_price()
            .checked_mul(self.quantity)
            .ok_or_else(|| CoreError::AmountOverflow {
                context: format!("line item {}", self.id),
            })
    }
}

/// Request to add a line item to a tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewLineItem {
    pub tab_id: TabId,

    /// Product id, exact name, or an unambiguous prefix of either.
    pub product_ref: String,

    pub quantity: i64,

    /// Overrides the catalog price for this item only.
    pub unit_price_cents: Option<i64>,

    pub note: Option<String>,
}

impl NewLineItem {
    pub fn new(tab_id: TabId, product_ref: impl Into<String>, quantity: i64) -> Self {
        NewLineItem {
            tab_id,
            product_ref: product_ref.into(),
            quantity,
            unit_price_cents: None,
            note: None,
        }
    }

    pub fn with_price(mut self, unit_price_cents: i64) -> Self {
        self.unit_price_cents = Some(unit_price_cents);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

// =============================================================================
// Sale Record
// =============================================================================

/// Immutable record of a sold line, written when a tab is finalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleRecord {
    pub id: SaleRecordId,
    #[ts(as = "String")]
    pub day: NaiveDate,
    pub tab_name: String,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    #[ts(as = "String")]
    pub recorded_at: DateTime<Utc>,
}

impl SaleRecord {
    pub fn line_total(&self) -> CoreResult<Money> {
        Money::from_cents(self.unit_price_cents)
            .checked_mul(self.quantity)
            .ok_or_else(|| CoreError::AmountOverflow {
                context: format!("sale record {}", self.id),
            })
    }
}

// =============================================================================
// Aggregates
// =============================================================================

/// A tab with its items and recomputed total, as the detail screen shows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TabDetail {
    pub tab: Tab,
    pub items: Vec<LineItem>,
    pub total: Money,
}
