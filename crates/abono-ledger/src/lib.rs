//! # abono-ledger: Credit/Cash Sale Ledger
//!
//! The operations a caller performs on sales: create, update and delete
//! credit and cash sales, register and correct installments, and read
//! sales back with their balances.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sale Ledger Architecture                         │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                   SaleLedger (Main Orchestrator)                 │  │
//! │  │                                                                  │  │
//! │  │  One transaction per mutating operation                         │  │
//! │  │  Touch lock first, then checks, then writes                     │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │ConsistencyGuard│  │ BalanceTracker │  │  InstallmentJournal    │    │
//! │  │                │  │                │  │                        │    │
//! │  │ One sale per   │  │ One remaining  │  │ Sequences 1..N         │    │
//! │  │ product        │  │ balance per    │  │ balance_before         │    │
//! │  │ Unique cards   │  │ credit sale    │  │ snapshots              │    │
//! │  └────────────────┘  └────────────────┘  └────────────────────────┘    │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐                                │
//! │  │ ProductCatalog │  │ UserDirectory  │   collaborators (abono-db)     │
//! │  │ Pending/Claimed│  │ customers and  │                                │
//! │  │ /Closed        │  │ administrators │                                │
//! │  └────────────────┘  └────────────────┘                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`ledger`] - `SaleLedger` orchestrator
//! - [`config`] - `abono.toml` and `ABONO_*` overrides
//! - [`error`] - `LedgerError` and its serializable report
//! - [`telemetry`] - tracing subscriber setup
//!
//! ## Example
//! ```rust,ignore
//! use abono_ledger::{LedgerConfig, SaleLedger};
//!
//! abono_ledger::telemetry::init_tracing();
//!
//! let config = LedgerConfig::load(None)?;
//! let ledger = SaleLedger::open(&config).await?;
//!
//! let summary = ledger.create_credit_sale(input).await?;
//! let receipt = ledger.register_installment(&summary.sale.id, payment).await?;
//! if receipt.finalized {
//!     println!("Paid off");
//! }
//! ```

pub mod config;
pub mod error;
pub mod ledger;
pub mod telemetry;

pub use config::{CashSaleProductState, ConfigError, DatabaseSettings, LedgerConfig, LedgerSettings};
pub use error::{ErrorKind, ErrorReport, LedgerError, LedgerResult};
pub use ledger::SaleLedger;
