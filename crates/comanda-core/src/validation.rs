//! # Validation Module
//!
//! Input validation for values that reach the store.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Screen forms (external)                                      │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Repositories (comanda-db)                                    │
//! │  └── THIS MODULE: names, quantities, prices, notes                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Store                                                        │
//! │  └── NOT NULL / defaults from the schema manager                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Validators return the trimmed value where trimming matters, so callers
//! store exactly what was checked.

use crate::error::ValidationError;
use crate::{MAX_ITEM_QUANTITY, MAX_NAME_LENGTH, MAX_NOTE_LENGTH, MAX_PRICE_CENTS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

fn validate_name(field: &str, name: &str) -> ValidationResult<String> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LENGTH,
        });
    }

    Ok(name.to_string())
}

/// Validates a product name and returns it trimmed.
///
/// ## Example
/// ```rust
/// use comanda_core::validation::validate_product_name;
///
/// assert_eq!(validate_product_name("  Coxinha ").unwrap(), "Coxinha");
/// assert!(validate_product_name("").is_err());
/// ```
pub fn validate_product_name(name: &str) -> ValidationResult<String> {
    validate_name("product name", name)
}

/// Validates a tab name (customer or table) and returns it trimmed.
pub fn validate_tab_name(name: &str) -> ValidationResult<String> {
    validate_name("tab name", name)
}

/// Validates an optional note; blank notes become `None`.
pub fn validate_note(note: Option<&str>) -> ValidationResult<Option<String>> {
    let Some(note) = note.map(str::trim).filter(|n| !n.is_empty()) else {
        return Ok(None);
    };

    if note.chars().count() > MAX_NOTE_LENGTH {
        return Err(ValidationError::TooLong {
            field: "note".to_string(),
            max: MAX_NOTE_LENGTH,
        });
    }

    Ok(Some(note.to_string()))
}

/// Validates a product reference typed on the tab detail screen.
pub fn validate_product_ref(reference: &str) -> ValidationResult<String> {
    let reference = reference.trim();

    if reference.is_empty() {
        return Err(ValidationError::Required {
            field: "product".to_string(),
        });
    }

    Ok(reference.to_string())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity value.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in cents.
///
/// ## Rules
/// - Must be non-negative (>= 0)
/// - Zero is allowed (courtesy items)
/// - Must not exceed MAX_PRICE_CENTS
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if !(0..=MAX_PRICE_CENTS).contains(&cents) {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: MAX_PRICE_CENTS,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
