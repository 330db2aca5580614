//! # Repository Module
//!
//! Database access for the sale ledger.
//!
//! ## Two Kinds of Access
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Pool-scoped repositories (hold a SqlitePool)                          │
//! │  ├── ProductCatalog        lookups, insert                             │
//! │  ├── UserDirectory         customer/admin lookups                      │
//! │  ├── CreditSaleRepository  get, summary, list, installments            │
//! │  └── CashSaleRepository    get, summary, list                          │
//! │                                                                         │
//! │  Transaction-scoped components (take &mut Tx)                          │
//! │  ├── ConsistencyGuard      product claims, card uniqueness             │
//! │  ├── BalanceTracker        running balance, never negative             │
//! │  └── InstallmentJournal    append / replace trailing entries           │
//! │                                                                         │
//! │  Repositories also expose `lock`/`insert`/`update`/`delete` on a Tx     │
//! │  for the rows they own.                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod balance;
pub mod cash_sale;
pub mod credit_sale;
pub mod guard;
pub mod installment;
pub mod product;
pub mod user;
