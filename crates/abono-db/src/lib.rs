//! # abono-db: Database Layer for the Sale Ledger
//!
//! This crate provides database access for the sale ledger.
//! It uses SQLite for storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Abono Data Flow                                  │
//! │                                                                         │
//! │  SaleLedger::register_installment                                      │
//! │       │  tx = pool.begin()                                             │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     abono-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐   ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │   │  Components  │  │   │
//! │  │   │   (pool.rs)   │    │                │   │  (tx-scoped) │  │   │
//! │  │   │               │    │ ProductCatalog │   │ Guard        │  │   │
//! │  │   │ SqlitePool    │◄───│ UserDirectory  │   │ Balance      │  │   │
//! │  │   │ Migrations    │    │ CreditSaleRepo │   │ Journal      │  │   │
//! │  │   │               │    │ CashSaleRepo   │   │              │  │   │
//! │  │   └───────────────┘    └────────────────┘   └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Transactions
//!
//! Every transaction-scoped function takes `&mut Tx<'_>`. The caller opens
//! the transaction, calls a `lock` function first, and commits. Nothing in
//! this crate commits on its own.
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Catalog, directory, sales, guard, balance, journal
//!
//! ## Usage
//!
//! ```rust,ignore
//! use abono_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/abono.db")).await?;
//!
//! let product = db.products().find_by_reference("TV-0042").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

#[cfg(test)]
mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::balance::BalanceTracker;
pub use repository::cash_sale::CashSaleRepository;
pub use repository::credit_sale::CreditSaleRepository;
pub use repository::guard::ConsistencyGuard;
pub use repository::installment::InstallmentJournal;
pub use repository::product::ProductCatalog;
pub use repository::user::UserDirectory;

/// The transaction handle threaded through every mutating call.
pub type Tx<'c> = sqlx::Transaction<'c, sqlx::Sqlite>;
