//! # Error Types
//!
//! Domain-specific error types for abono-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  abono-core errors (this file)                                         │
//! │  ├── ValidationError  - Malformed input, rejected before the store      │
//! │  ├── ConflictError    - Business-rule violations                       │
//! │  └── CoreError        - Wrapper used by pure rule functions            │
//! │                                                                         │
//! │  abono-db errors (separate crate)                                      │
//! │  └── DbError          - Database failures + Conflict(ConflictError)    │
//! │                                                                         │
//! │  abono-ledger errors                                                   │
//! │  └── LedgerError      - Validation | NotFound | Conflict | Internal    │
//! │                                                                         │
//! │  Flow: ValidationError/ConflictError → DbError → LedgerError           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::money::Money;
use crate::types::{ProductState, SaleType};

// =============================================================================
// Core Error
// =============================================================================

/// Errors produced by the pure rule functions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// Input did not pass validation.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A business rule was violated.
    #[error(transparent)]
    Conflict(#[from] ConflictError),
}

// =============================================================================
// Conflict Error
// =============================================================================

/// Business-rule violations.
///
/// Every variant maps to the `Conflict` error kind at the ledger boundary.
/// Variants carry enough context for a caller to explain the refusal.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConflictError {
    /// Another sale of the same type already uses this card number.
    #[error("Card number '{card_number}' is already used by another {sale_type} sale")]
    DuplicateCardNumber {
        sale_type: SaleType,
        card_number: String,
    },

    /// The product is not available for a new claim.
    ///
    /// ## When This Occurs
    /// - Product is `Claimed` by an open sale
    /// - Product is `Closed` (terminal)
    #[error("Product {product_id} is {state}, it cannot be claimed")]
    ProductUnavailable {
        product_id: String,
        state: ProductState,
    },

    /// The product is linked to a sale other than the one being edited.
    #[error("Product {product_id} is already linked to {sale_type} sale {sale_id}")]
    ProductClaimed {
        product_id: String,
        sale_type: SaleType,
        sale_id: String,
    },

    /// The customer exists but is inactive.
    #[error("Customer {0} is inactive")]
    CustomerInactive(String),

    /// Initial installment is larger than the product price.
    #[error("Initial installment {initial} exceeds product price {price}")]
    InitialInstallmentExceedsPrice { initial: Money, price: Money },

    /// An installment amount is zero or negative.
    #[error("Installment amount must be positive, got {0}")]
    NonPositiveAmount(Money),

    /// An installment is larger than the remaining balance.
    #[error("Installment amount {amount} exceeds remaining balance {remaining}")]
    AmountExceedsBalance { amount: Money, remaining: Money },

    /// A balance mutation would leave the balance below zero.
    #[error("Balance would become negative ({would_be})")]
    NegativeBalance { would_be: Money },

    /// The credit sale is already finalized.
    #[error("Credit sale {0} is finalized")]
    SaleFinalized(String),

    /// The sale already has more installments than the operation allows.
    #[error("Credit sale {sale_id} has {count} installments, only the seed installment may exist")]
    TooManyInstallments { sale_id: String, count: i64 },

    /// Installment #1 can only change through the sale itself.
    #[error("Installment 1 is the initial installment, edit the sale instead")]
    FirstInstallmentLocked,

    /// The requested installment is outside the editable trailing window.
    #[error("Installment {requested} cannot be edited, only installments {first_editable}..={last} are editable")]
    InstallmentNotEditable {
        requested: i64,
        first_editable: i64,
        last: i64,
    },

    /// A cash sale's product is already closed.
    #[error("Cash sale {0} is already closed")]
    CashSaleClosed(String),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Raised before any transaction opens.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
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

    /// Invalid format (e.g., invalid UUID, invalid date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
