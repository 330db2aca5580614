//! # Balance Tracker
//!
//! Owns the single `running_balances` row of each credit sale.
//!
//! ## Apply Under Lock
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  tx A                              tx B                                 │
//! │  ────                              ────                                 │
//! │  lock(sale)  ── write lock held    lock(sale)  ── waits (busy_timeout) │
//! │  read 600                               .                               │
//! │  600 - 500 = 100 ✓                      .                               │
//! │  write 100                              .                               │
//! │  commit      ── lock released      ── acquires lock                    │
//! │                                    read 100                             │
//! │                                    100 - 500 < 0 → Conflict            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::Tx;
use abono_core::rules::{self, BalanceChange};
use abono_core::Money;

/// Transaction-scoped operations on running balances.
#[derive(Debug, Clone, Copy, Default)]
pub struct BalanceTracker;

impl BalanceTracker {
    /// Creates the balance row for a new credit sale.
    pub async fn initialize(tx: &mut Tx<'_>, credit_sale_id: &str, initial: Money) -> DbResult<()> {
        debug!(credit_sale_id = %credit_sale_id, initial = %initial, "Initializing balance");

        rules::apply_delta(Money::zero(), initial)?;

        sqlx::query(
            r#"
            INSERT INTO running_balances (credit_sale_id, remaining_cents, updated_at)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(credit_sale_id)
        .bind(initial.cents())
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Resets the balance after the sale's price or initial installment changed.
    pub async fn reinitialize(tx: &mut Tx<'_>, credit_sale_id: &str, initial: Money) -> DbResult<()> {
        debug!(credit_sale_id = %credit_sale_id, initial = %initial, "Reinitializing balance");

        rules::apply_delta(Money::zero(), initial)?;
        Self::write(tx, credit_sale_id, initial).await
    }

    /// Takes the write lock through the balance row.
    ///
    /// Must be the first statement of the transaction. A missing row means
    /// the credit sale does not exist.
    pub async fn lock(tx: &mut Tx<'_>, credit_sale_id: &str) -> DbResult<()> {
        debug!(credit_sale_id = %credit_sale_id, "Locking balance");

        let result = sqlx::query(
            "UPDATE running_balances SET lock_version = lock_version + 1 WHERE credit_sale_id = ?1",
        )
        .bind(credit_sale_id)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("CreditSale", credit_sale_id));
        }

        Ok(())
    }

    /// Adds `delta` to the balance.
    ///
    /// ## Returns
    /// * `Ok(change)` - `change.reaches_zero` drives finalization
    /// * `Err(DbError::Conflict)` - the balance would go negative, nothing written
    pub async fn apply(tx: &mut Tx<'_>, credit_sale_id: &str, delta: Money) -> DbResult<BalanceChange> {
        let current = Self::current_remaining(tx, credit_sale_id).await?;
        let change = rules::apply_delta(current, delta)?;

        debug!(
            credit_sale_id = %credit_sale_id,
            current = %current,
            delta = %delta,
            remaining = %change.remaining,
            "Applying balance delta"
        );

        Self::write(tx, credit_sale_id, change.remaining).await?;
        Ok(change)
    }

    pub async fn current_remaining(tx: &mut Tx<'_>, credit_sale_id: &str) -> DbResult<Money> {
        let cents: i64 = sqlx::query_scalar(
            "SELECT remaining_cents FROM running_balances WHERE credit_sale_id = ?1",
        )
        .bind(credit_sale_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| DbError::not_found("CreditSale", credit_sale_id))?;

        Ok(Money::from_cents(cents))
    }

    async fn write(tx: &mut Tx<'_>, credit_sale_id: &str, remaining: Money) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE running_balances SET remaining_cents = ?2, updated_at = ?3 WHERE credit_sale_id = ?1",
        )
        .bind(credit_sale_id)
        .bind(remaining.cents())
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("CreditSale", credit_sale_id));
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::credit_sale::CreditSaleRepository;
    use crate::testing::fixture;
    use abono_core::{ConflictError, CreditSale, CreditSaleStatus};
    use uuid::Uuid;

    async fn sale_with_balance(fx: &crate::testing::Fixture, remaining: i64) -> String {
        let now = Utc::now();
        let sale = CreditSale {
            id: Uuid::new_v4().to_string(),
            card_number: "77".to_string(),
            sale_date: now.date_naive(),
            initial_installment_cents: 0,
            customer_id: fx.customer.id.clone(),
            product_id: fx.product.id.clone(),
            admin_id: fx.admin.id.clone(),
            initial_balance_cents: remaining,
            status: CreditSaleStatus::Active,
            created_at: now,
            updated_at: now,
        };

        let mut tx = fx.db.pool().begin().await.unwrap();
        CreditSaleRepository::insert(&mut tx, &sale).await.unwrap();
        BalanceTracker::initialize(&mut tx, &sale.id, Money::from_cents(remaining))
            .await
            .unwrap();
        tx.commit().await.unwrap();
        sale.id
    }

    #[tokio::test]
    async fn test_apply_reports_zero() {
        let fx = fixture().await;
        let id = sale_with_balance(&fx, 600).await;

        let mut tx = fx.db.pool().begin().await.unwrap();
        BalanceTracker::lock(&mut tx, &id).await.unwrap();

        let change = BalanceTracker::apply(&mut tx, &id, Money::from_cents(-500)).await.unwrap();
        assert_eq!(change.remaining, Money::from_cents(100));
        assert!(!change.reaches_zero);

        let change = BalanceTracker::apply(&mut tx, &id, Money::from_cents(-100)).await.unwrap();
        assert!(change.reaches_zero);
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_negative_balance_is_refused() {
        let fx = fixture().await;
        let id = sale_with_balance(&fx, 600).await;

        let mut tx = fx.db.pool().begin().await.unwrap();
        BalanceTracker::lock(&mut tx, &id).await.unwrap();
        let err = BalanceTracker::apply(&mut tx, &id, Money::from_cents(-601))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict(ConflictError::NegativeBalance { .. })));
        assert_eq!(
            BalanceTracker::current_remaining(&mut tx, &id).await.unwrap(),
            Money::from_cents(600)
        );
    }

    #[tokio::test]
    async fn test_reinitialize_and_missing_row() {
        let fx = fixture().await;
        let id = sale_with_balance(&fx, 600).await;

        let mut tx = fx.db.pool().begin().await.unwrap();
        BalanceTracker::lock(&mut tx, &id).await.unwrap();
        BalanceTracker::reinitialize(&mut tx, &id, Money::from_cents(900)).await.unwrap();
        assert_eq!(
            BalanceTracker::current_remaining(&mut tx, &id).await.unwrap(),
            Money::from_cents(900)
        );
        assert!(BalanceTracker::reinitialize(&mut tx, &id, Money::from_cents(-1)).await.is_err());
        assert!(matches!(
            BalanceTracker::lock(&mut tx, "missing").await,
            Err(DbError::NotFound { .. })
        ));
    }
}
