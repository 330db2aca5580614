//! # abono-core: Pure Business Logic for the Sale Ledger
//!
//! Everything in this crate is deterministic and free of I/O: record types,
//! integer money, input validation and the balance/state rules that the
//! ledger applies inside its transactions.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Abono Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  abono-ledger (SaleLedger)                      │   │
//! │  │   create/update/delete sales, register/update installments      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ abono-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │   rules   │  │ validation│  │   │
//! │  │   │  Product  │  │   Money   │  │  balance  │  │   input   │  │   │
//! │  │   │ CreditSale│  │           │  │  states   │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    abono-db (Database Layer)                    │   │
//! │  │       SQLite queries, migrations, guard, balance, journal       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Records (Product, CreditSale, CashSale, InstallmentEntry, ...)
//! - [`money`] - Money type with integer arithmetic
//! - [`error`] - Validation and conflict errors
//! - [`validation`] - Input validation run before any transaction opens
//! - [`rules`] - Balance arithmetic and lifecycle rules
//!
//! ## Example Usage
//!
//! ```rust
//! use abono_core::money::Money;
//! use abono_core::rules::initial_balance;
//!
//! let price = Money::from_cents(100_000);
//! let initial = Money::from_cents(20_000);
//!
//! assert_eq!(initial_balance(price, initial).unwrap().cents(), 80_000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod rules;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{ConflictError, CoreError, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Sequence number of the seed installment recorded with every credit sale.
pub const FIRST_INSTALLMENT: i64 = 1;

/// Default maximum card number length.
///
/// Card numbers are the printed number of the customer's payment card
/// (the paper card, not a bank card). Overridable through `LedgerConfig`.
pub const DEFAULT_MAX_CARD_NUMBER_LEN: usize = 20;
