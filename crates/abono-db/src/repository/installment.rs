//! # Installment Journal
//!
//! The ordered payment entries of a credit sale.
//!
//! ## Editing Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  seq   amount   balance_before                                          │
//! │  ───   ──────   ──────────────                                          │
//! │   1     200         800      ← seed, edited only through the sale      │
//! │   2     300         800                                                 │
//! │   3     300         500      ← editable when window = 2                │
//! │   4     100         200      ← always editable (last)                  │
//! │                                                                         │
//! │  append_next:  seq = max + 1, balance_before = remaining               │
//! │  replace_last: delta = old - new applied to the balance;               │
//! │                later snapshots shift by the same delta                 │
//! │  Entries are never deleted one by one.                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{NaiveDate, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::balance::BalanceTracker;
use crate::Tx;
use abono_core::rules::{self, BalanceChange};
use abono_core::{InstallmentEntry, Money, FIRST_INSTALLMENT};

const ENTRY_COLUMNS: &str = "id, credit_sale_id, sequence, amount_cents, paid_on, \
     balance_before_cents, admin_id, created_at, updated_at";

/// Transaction-scoped operations on installment entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstallmentJournal;

impl InstallmentJournal {
    /// Records installment #1.
    ///
    /// The seed amount is already folded into `initial_balance`, so the
    /// balance is not touched here.
    pub async fn append_first(
        tx: &mut Tx<'_>,
        credit_sale_id: &str,
        amount: Money,
        paid_on: NaiveDate,
        admin_id: &str,
        initial_balance: Money,
    ) -> DbResult<InstallmentEntry> {
        let now = Utc::now();
        let entry = InstallmentEntry {
            id: Uuid::new_v4().to_string(),
            credit_sale_id: credit_sale_id.to_string(),
            sequence: FIRST_INSTALLMENT,
            amount_cents: amount.cents(),
            paid_on,
            balance_before_cents: initial_balance.cents(),
            admin_id: admin_id.to_string(),
            created_at: now,
            updated_at: now,
        };

        Self::insert(tx, &entry).await?;
        Ok(entry)
    }

    /// Records the next installment and takes it off the balance.
    ///
    /// ## Returns
    /// * `Err(DbError::Conflict)` - amount not positive, or above what is owed
    pub async fn append_next(
        tx: &mut Tx<'_>,
        credit_sale_id: &str,
        amount: Money,
        paid_on: NaiveDate,
        admin_id: &str,
    ) -> DbResult<(InstallmentEntry, BalanceChange)> {
        let remaining = BalanceTracker::current_remaining(tx, credit_sale_id).await?;
        rules::check_installment(amount, remaining)?;

        let last = Self::max_sequence(tx, credit_sale_id).await?;
        let now = Utc::now();
        let entry = InstallmentEntry {
            id: Uuid::new_v4().to_string(),
            credit_sale_id: credit_sale_id.to_string(),
            sequence: last + 1,
            amount_cents: amount.cents(),
            paid_on,
            balance_before_cents: remaining.cents(),
            admin_id: admin_id.to_string(),
            created_at: now,
            updated_at: now,
        };

        Self::insert(tx, &entry).await?;
        let change = BalanceTracker::apply(tx, credit_sale_id, -amount).await?;

        Ok((entry, change))
    }

    /// Replaces an entry inside the editable trailing window.
    ///
    /// `window = 1` allows only the last entry.
    pub async fn replace_last(
        tx: &mut Tx<'_>,
        credit_sale_id: &str,
        new_amount: Money,
        new_paid_on: NaiveDate,
        requested_sequence: i64,
        window: u32,
    ) -> DbResult<(InstallmentEntry, BalanceChange)> {
        let last = Self::max_sequence(tx, credit_sale_id).await?;
        rules::check_editable(requested_sequence, last, window)?;

        let mut entry = Self::get(tx, credit_sale_id, requested_sequence).await?;
        rules::replacement_balance(entry.balance_before(), new_amount)?;

        let delta = rules::replacement_delta(entry.amount(), new_amount);

        // Balance first: a refusal here leaves every row untouched.
        let change = BalanceTracker::apply(tx, credit_sale_id, delta).await?;

        debug!(
            credit_sale_id = %credit_sale_id,
            sequence = requested_sequence,
            old = %entry.amount(),
            new = %new_amount,
            "Replacing installment"
        );

        let now = Utc::now();
        sqlx::query(
            "UPDATE installments SET amount_cents = ?3, paid_on = ?4, updated_at = ?5 \
             WHERE credit_sale_id = ?1 AND sequence = ?2",
        )
        .bind(credit_sale_id)
        .bind(requested_sequence)
        .bind(new_amount.cents())
        .bind(new_paid_on)
        .bind(now)
        .execute(&mut **tx)
        .await?;

        if requested_sequence < last && !delta.is_zero() {
            sqlx::query(
                "UPDATE installments SET balance_before_cents = balance_before_cents + ?3 \
                 WHERE credit_sale_id = ?1 AND sequence > ?2",
            )
            .bind(credit_sale_id)
            .bind(requested_sequence)
            .bind(delta.cents())
            .execute(&mut **tx)
            .await?;
        }

        entry.amount_cents = new_amount.cents();
        entry.paid_on = new_paid_on;
        entry.updated_at = now;

        Ok((entry, change))
    }

    /// Rewrites the seed entry after the sale itself was edited.
    pub async fn replace_first(
        tx: &mut Tx<'_>,
        credit_sale_id: &str,
        amount: Money,
        paid_on: NaiveDate,
        initial_balance: Money,
    ) -> DbResult<InstallmentEntry> {
        debug!(credit_sale_id = %credit_sale_id, amount = %amount, "Replacing seed installment");

        let result = sqlx::query(
            "UPDATE installments SET amount_cents = ?3, paid_on = ?4, balance_before_cents = ?5, \
             updated_at = ?6 WHERE credit_sale_id = ?1 AND sequence = ?2",
        )
        .bind(credit_sale_id)
        .bind(FIRST_INSTALLMENT)
        .bind(amount.cents())
        .bind(paid_on)
        .bind(initial_balance.cents())
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Installment", format!("{credit_sale_id}#1")));
        }

        Self::get(tx, credit_sale_id, FIRST_INSTALLMENT).await
    }

    pub async fn count(tx: &mut Tx<'_>, credit_sale_id: &str) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM installments WHERE credit_sale_id = ?1")
                .bind(credit_sale_id)
                .fetch_one(&mut **tx)
                .await?;

        Ok(count)
    }

    /// Newest entry, if any.
    pub async fn last(tx: &mut Tx<'_>, credit_sale_id: &str) -> DbResult<Option<InstallmentEntry>> {
        let entry = sqlx::query_as::<_, InstallmentEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM installments WHERE credit_sale_id = ?1 \
             ORDER BY sequence DESC LIMIT 1"
        ))
        .bind(credit_sale_id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(entry)
    }

    pub async fn history(tx: &mut Tx<'_>, credit_sale_id: &str) -> DbResult<Vec<InstallmentEntry>> {
        let entries = sqlx::query_as::<_, InstallmentEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM installments WHERE credit_sale_id = ?1 ORDER BY sequence"
        ))
        .bind(credit_sale_id)
        .fetch_all(&mut **tx)
        .await?;

        Ok(entries)
    }

    async fn get(tx: &mut Tx<'_>, credit_sale_id: &str, sequence: i64) -> DbResult<InstallmentEntry> {
        sqlx::query_as::<_, InstallmentEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM installments WHERE credit_sale_id = ?1 AND sequence = ?2"
        ))
        .bind(credit_sale_id)
        .bind(sequence)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| DbError::not_found("Installment", format!("{credit_sale_id}#{sequence}")))
    }

    async fn max_sequence(tx: &mut Tx<'_>, credit_sale_id: &str) -> DbResult<i64> {
        let max: Option<i64> =
            sqlx::query_scalar("SELECT MAX(sequence) FROM installments WHERE credit_sale_id = ?1")
                .bind(credit_sale_id)
                .fetch_one(&mut **tx)
                .await?;

        max.ok_or_else(|| DbError::not_found("Installment", format!("{credit_sale_id}#1")))
    }

    async fn insert(tx: &mut Tx<'_>, entry: &InstallmentEntry) -> DbResult<()> {
        debug!(
            credit_sale_id = %entry.credit_sale_id,
            sequence = entry.sequence,
            amount_cents = entry.amount_cents,
            "Inserting installment"
        );

        sqlx::query(
            r#"
            INSERT INTO installments (
                id, credit_sale_id, sequence, amount_cents, paid_on,
                balance_before_cents, admin_id, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.credit_sale_id)
        .bind(entry.sequence)
        .bind(entry.amount_cents)
        .bind(entry.paid_on)
        .bind(entry.balance_before_cents)
        .bind(&entry.admin_id)
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
