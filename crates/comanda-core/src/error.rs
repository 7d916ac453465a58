//! # Error Types
//!
//! Domain-specific error types for comanda-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  comanda-core errors (this file)                                       │
//! │  ├── CoreError        - Expected domain outcomes (not system faults)   │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  comanda-db errors (separate crate)                                    │
//! │  └── DbError          - Store failures, wraps CoreError                │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → screen message          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
///
/// Every variant is a normal branch for the caller: a screen shows the
/// message and lets the user correct the input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// No product matches the reference.
    ///
    /// ## When This Occurs
    /// - Typed name doesn't exist in the catalog
    /// - Product was deleted after the screen loaded
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// The reference matches several products by prefix.
    ///
    /// ## User Workflow
    /// ```text
    /// Catalog: "Coxinha", "Coxinha Grande"
    ///      │
    ///      ▼
    /// add item "Cox"
    ///      │
    ///      ▼
    /// AmbiguousReference { reference: "Cox", candidates: [..2 names..] }
    ///      │
    ///      ▼
    /// UI asks the user to pick one
    /// ```
    #[error("'{reference}' matches more than one product: {}", candidates.join(", "))]
    AmbiguousReference {
        reference: String,
        candidates: Vec<String>,
    },

    /// The tab is already closed and cannot change anymore.
    #[error("Tab {tab_id} is closed")]
    TabNotOpen { tab_id: String },

    /// Item quantity exceeds maximum allowed.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// A total no longer fits in cents.
    ///
    /// Prices and quantities are bounded on input, so this only shows up
    /// for rows written outside the repositories.
    #[error("Amount overflow while computing {context}")]
    AmountOverflow { context: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g. unparseable price).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ambiguous_message_lists_candidates() {
        let err = CoreError::AmbiguousReference {
            reference: "Cox".to_string(),
            candidates: vec!["Coxinha".to_string(), "Coxinha Grande".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "'Cox' matches more than one product: Coxinha, Coxinha Grande"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "name".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.to_string(), "Validation error: name is required");
    }
}
