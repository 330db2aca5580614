//! # Domain Types
//!
//! Records and states shared by every layer of the sale ledger.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │   CreditSale    │   │ InstallmentEntry│       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │◄──│  product_id     │◄──│  credit_sale_id │       │
//! │  │  reference      │   │  card_number    │   │  sequence 1..N  │       │
//! │  │  price_cents    │   │  initial_balance│   │  amount_cents   │       │
//! │  │  state          │   │  status         │   │  balance_before │       │
//! │  └─────────────────┘   └────────┬────────┘   └─────────────────┘       │
//! │          ▲                      │ 1:1                                   │
//! │          │             ┌────────▼────────┐   ┌─────────────────┐       │
//! │  ┌───────┴─────────┐   │ RunningBalance  │   │      User       │       │
//! │  │    CashSale     │   │  remaining      │   │  Customer/Admin │       │
//! │  │  card_number    │   └─────────────────┘   │  Active/Inactive│       │
//! │  └─────────────────┘                         └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Product Lifecycle
//! ```text
//!   Pending ──create sale──► Claimed ──balance reaches 0──► Closed
//!      ▲                        │
//!      └──────delete sale───────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (product reference, card number, username) - human-readable

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Product State
// =============================================================================

/// Lifecycle flag of a physical product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum ProductState {
    /// Available for a new sale.
    Pending,
    /// Assigned to exactly one open sale.
    Claimed,
    /// Terminal. The sale that closed it is fully paid.
    Closed,
}

impl ProductState {
    /// Only pending products may be claimed by a new sale.
    #[inline]
    pub const fn is_available(&self) -> bool {
        matches!(self, ProductState::Pending)
    }

    /// Lowercase storage/display name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ProductState::Pending => "pending",
            ProductState::Claimed => "claimed",
            ProductState::Closed => "closed",
        }
    }
}

impl Default for ProductState {
    fn default() -> Self {
        ProductState::Pending
    }
}

impl fmt::Display for ProductState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Sale Type
// =============================================================================

/// Which sale table a record lives in. Card numbers are unique per type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum SaleType {
    Credit,
    Cash,
}

impl fmt::Display for SaleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaleType::Credit => f.write_str("credit"),
            SaleType::Cash => f.write_str("cash"),
        }
    }
}

// =============================================================================
// Credit Sale Status
// =============================================================================

/// Status of a credit sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum CreditSaleStatus {
    /// Balance outstanding, installments accepted.
    Active,
    /// Balance reached zero. No further edits.
    Finalized,
}

impl Default for CreditSaleStatus {
    fn default() -> Self {
        CreditSaleStatus::Active
    }
}

// =============================================================================
// Users
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Customer,
    Administrator,
}

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
}

/// A customer or an administrator.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct User {
    pub id: String,
    /// Login name, unique.
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    /// Identification document number.
    pub identification: String,
    pub role: UserRole,
    pub status: UserStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl User {
    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    /// "First Last", used in listings.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

// =============================================================================
// Product
// =============================================================================

/// A physical product that can be sold once.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Business key printed on the tag.
    pub reference: String,

    /// Display name.
    pub name: String,

    pub brand: String,

    /// Cost in cents (what the shop paid).
    pub cost_cents: i64,

    /// Sale price in cents.
    pub price_cents: i64,

    /// Lifecycle flag. Only the sale ledger changes it.
    pub state: ProductState,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the sale price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Returns the cost as a Money type.
    #[inline]
    pub fn cost(&self) -> Money {
        Money::from_cents(self.cost_cents)
    }
}

// =============================================================================
// Credit Sale
// =============================================================================

/// A sale paid off through installments.
///
/// Created atomically together with installment #1 and its running balance.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CreditSale {
    pub id: String,
    /// Unique among credit sales.
    pub card_number: String,
    #[ts(as = "String")]
    pub sale_date: NaiveDate,
    /// Paid at the counter. Also recorded as installment #1.
    pub initial_installment_cents: i64,
    pub customer_id: String,
    pub product_id: String,
    pub admin_id: String,
    /// Product price minus the initial installment, at create/update time.
    pub initial_balance_cents: i64,
    pub status: CreditSaleStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl CreditSale {
    #[inline]
    pub fn initial_installment(&self) -> Money {
        Money::from_cents(self.initial_installment_cents)
    }

    #[inline]
    pub fn initial_balance(&self) -> Money {
        Money::from_cents(self.initial_balance_cents)
    }

    #[inline]
    pub fn is_finalized(&self) -> bool {
        self.status == CreditSaleStatus::Finalized
    }
}

// =============================================================================
// Cash Sale
// =============================================================================

/// A sale paid in full at the counter. Has no balance.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CashSale {
    pub id: String,
    /// Unique among cash sales. May repeat a credit sale's card number.
    pub card_number: String,
    #[ts(as = "String")]
    pub sale_date: NaiveDate,
    pub customer_id: String,
    pub product_id: String,
    pub admin_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Running Balance
// =============================================================================

/// Outstanding balance of one credit sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct RunningBalance {
    pub credit_sale_id: String,
    pub remaining_cents: i64,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl RunningBalance {
    #[inline]
    pub fn remaining(&self) -> Money {
        Money::from_cents(self.remaining_cents)
    }
}

// =============================================================================
// Installment Entry
// =============================================================================

/// One payment against a credit sale.
///
/// Uses snapshot pattern: `balance_before_cents` freezes the remaining
/// balance at the moment the entry was recorded.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InstallmentEntry {
    pub id: String,
    pub credit_sale_id: String,
    /// 1-based, contiguous. #1 is the initial installment.
    pub sequence: i64,
    pub amount_cents: i64,
    #[ts(as = "String")]
    pub paid_on: NaiveDate,
    pub balance_before_cents: i64,
    pub admin_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl InstallmentEntry {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    #[inline]
    pub fn balance_before(&self) -> Money {
        Money::from_cents(self.balance_before_cents)
    }

    /// Balance right after this entry was applied.
    ///
    /// The seed entry does not reduce the balance: its amount is already
    /// subtracted from the price to form the initial balance.
    pub fn balance_after(&self) -> Money {
        if self.sequence == crate::FIRST_INSTALLMENT {
            self.balance_before()
        } else {
            self.balance_before() - self.amount()
        }
    }
}

// =============================================================================
// Summaries (operation results)
// =============================================================================

/// A credit sale with its current balance and installment count.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CreditSaleSummary {
    pub sale: CreditSale,
    pub remaining_cents: i64,
    pub installment_count: i64,
    pub product_state: ProductState,
}

impl CreditSaleSummary {
    #[inline]
    pub fn remaining(&self) -> Money {
        Money::from_cents(self.remaining_cents)
    }
}

/// Result of registering or editing an installment.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InstallmentReceipt {
    pub entry: InstallmentEntry,
    pub remaining_cents: i64,
    /// True when this payment brought the balance to zero.
    pub finalized: bool,
}

impl InstallmentReceipt {
    #[inline]
    pub fn remaining(&self) -> Money {
        Money::from_cents(self.remaining_cents)
    }
}

/// A cash sale with the state its product ended in.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CashSaleSummary {
    pub sale: CashSale,
    pub product_state: ProductState,
}

/// Returned by both delete operations.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReleasedSale {
    pub sale_id: String,
    pub sale_type: SaleType,
    /// The product now back in `Pending`.
    pub product_id: String,
}

/// Listing row for credit sales.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CreditSaleOverview {
    pub id: String,
    pub card_number: String,
    #[ts(as = "String")]
    pub sale_date: NaiveDate,
    pub status: CreditSaleStatus,
    pub customer_id: String,
    pub customer_name: String,
    pub product_id: String,
    pub product_name: String,
    pub product_state: ProductState,
    pub price_cents: i64,
    pub remaining_cents: i64,
}

/// Listing row for cash sales.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CashSaleOverview {
    pub id: String,
    pub card_number: String,
    #[ts(as = "String")]
    pub sale_date: NaiveDate,
    pub customer_id: String,
    pub customer_name: String,
    pub product_id: String,
    pub product_name: String,
    pub product_state: ProductState,
    pub price_cents: i64,
}

// =============================================================================
// Inputs
// =============================================================================

/// Input for `CreateCreditSale`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCreditSale {
    pub card_number: String,
    pub sale_date: NaiveDate,
    pub initial_installment: Money,
    pub customer_id: String,
    pub product_id: String,
    pub admin_id: String,
}

/// Input for `UpdateCreditSale`. The administrator is not editable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditSaleUpdate {
    pub card_number: String,
    pub sale_date: NaiveDate,
    pub initial_installment: Money,
    pub customer_id: String,
    pub product_id: String,
}

/// Input for `CreateCashSale`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCashSale {
    pub card_number: String,
    pub sale_date: NaiveDate,
    pub customer_id: String,
    pub product_id: String,
    pub admin_id: String,
}

/// Input for `UpdateCashSale`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashSaleUpdate {
    pub card_number: String,
    pub sale_date: NaiveDate,
    pub customer_id: String,
    pub product_id: String,
}

/// Input for `RegisterInstallment`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInstallment {
    pub amount: Money,
    pub paid_on: NaiveDate,
    pub admin_id: String,
}

/// Input for `UpdateInstallment`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallmentUpdate {
    pub sequence: i64,
    pub amount: Money,
    pub paid_on: NaiveDate,
}

/// Catalog insert, used by seeding and tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub reference: String,
    pub name: String,
    pub brand: String,
    pub cost: Money,
    pub price: Money,
}

/// Directory insert, used by seeding and tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub identification: String,
    pub role: UserRole,
    pub status: UserStatus,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(sequence: i64, amount: i64, before: i64) -> InstallmentEntry {
        let now = Utc::now();
        InstallmentEntry {
            id: "e".to_string(),
            credit_sale_id: "s".to_string(),
            sequence,
            amount_cents: amount,
            paid_on: now.date_naive(),
            balance_before_cents: before,
            admin_id: "a".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_product_state_availability() {
        assert!(ProductState::Pending.is_available());
        assert!(!ProductState::Claimed.is_available());
        assert!(!ProductState::Closed.is_available());
        assert_eq!(ProductState::default(), ProductState::Pending);
    }

    #[test]
    fn test_state_serde_names() {
        assert_eq!(serde_json::to_string(&ProductState::Claimed).unwrap(), "\"claimed\"");
        assert_eq!(
            serde_json::to_string(&CreditSaleStatus::Finalized).unwrap(),
            "\"finalized\""
        );
        assert_eq!(SaleType::Cash.to_string(), "cash");
    }

    #[test]
    fn test_seed_entry_does_not_reduce_balance() {
        assert_eq!(entry(1, 20_000, 80_000).balance_after().cents(), 80_000);
        assert_eq!(entry(2, 30_000, 80_000).balance_after().cents(), 50_000);
    }
}
