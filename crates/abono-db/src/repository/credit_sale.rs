//! # Credit Sale Repository
//!
//! Rows of `credit_sales`, plus the read models that join them with their
//! balance, installments, product and customer.
//!
//! ## Row Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  insert ──► status = active                                            │
//! │    │                                                                    │
//! │    ├── update   (only while the seed installment is the only entry)    │
//! │    ├── set_status(finalized)  when the balance reaches zero            │
//! │    └── delete   (cascades to running_balances and installments)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::balance::BalanceTracker;
use crate::repository::installment::InstallmentJournal;
use crate::Tx;
use abono_core::{
    CreditSale, CreditSaleOverview, CreditSaleStatus, CreditSaleSummary, InstallmentEntry,
    ProductState,
};

const SALE_COLUMNS: &str = "id, card_number, sale_date, initial_installment_cents, customer_id, \
     product_id, admin_id, initial_balance_cents, status, created_at, updated_at";

async fn fetch_sale<'e, E>(executor: E, id: &str) -> DbResult<Option<CreditSale>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sale = sqlx::query_as::<_, CreditSale>(&format!(
        "SELECT {SALE_COLUMNS} FROM credit_sales WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await?;

    Ok(sale)
}

/// Repository for credit sales.
#[derive(Debug, Clone)]
pub struct CreditSaleRepository {
    pool: SqlitePool,
}

impl CreditSaleRepository {
    /// Creates a new CreditSaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CreditSaleRepository { pool }
    }

    /// Gets a credit sale by its ID.
    pub async fn find_by_id(&self, id: &str) -> DbResult<Option<CreditSale>> {
        fetch_sale(&self.pool, id).await
    }

    /// Gets a sale with its remaining balance and installment count.
    ///
    /// Reads inside one transaction so the three values agree.
    pub async fn summary(&self, id: &str) -> DbResult<CreditSaleSummary> {
        let mut tx = self.pool.begin().await?;
        let summary = Self::summary_in(&mut tx, id).await?;
        tx.commit().await?;
        Ok(summary)
    }

    /// Lists all credit sales with product, customer and balance.
    ///
    /// Newest sale date first.
    pub async fn list(&self) -> DbResult<Vec<CreditSaleOverview>> {
        let rows = sqlx::query_as::<_, CreditSaleOverview>(
            r#"
            SELECT
                s.id,
                s.card_number,
                s.sale_date,
                s.status,
                s.customer_id,
                u.first_name || ' ' || u.last_name AS customer_name,
                s.product_id,
                p.name AS product_name,
                p.state AS product_state,
                p.price_cents,
                b.remaining_cents
            FROM credit_sales s
            JOIN users u ON u.id = s.customer_id
            JOIN products p ON p.id = s.product_id
            JOIN running_balances b ON b.credit_sale_id = s.id
            ORDER BY s.sale_date DESC, s.created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Installment history, ordered by sequence.
    pub async fn installments(&self, id: &str) -> DbResult<Vec<InstallmentEntry>> {
        let mut tx = self.pool.begin().await?;
        if fetch_sale(&mut *tx, id).await?.is_none() {
            return Err(DbError::not_found("CreditSale", id));
        }
        let entries = InstallmentJournal::history(&mut tx, id).await?;
        tx.commit().await?;
        Ok(entries)
    }

    // =========================================================================
    // Transaction-scoped operations
    // =========================================================================

    /// Takes the write lock through the sale row.
    pub async fn lock(tx: &mut Tx<'_>, id: &str) -> DbResult<()> {
        debug!(id = %id, "Locking credit sale");

        let result =
            sqlx::query("UPDATE credit_sales SET lock_version = lock_version + 1 WHERE id = ?1")
                .bind(id)
                .execute(&mut **tx)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("CreditSale", id));
        }

        Ok(())
    }

    pub async fn get(tx: &mut Tx<'_>, id: &str) -> DbResult<CreditSale> {
        fetch_sale(&mut **tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("CreditSale", id))
    }

    /// Summary as seen by the transaction, before or after commit.
    pub async fn summary_in(tx: &mut Tx<'_>, id: &str) -> DbResult<CreditSaleSummary> {
        let sale = Self::get(tx, id).await?;
        let remaining = BalanceTracker::current_remaining(tx, id).await?;
        let installment_count = InstallmentJournal::count(tx, id).await?;

        let product_state: ProductState =
            sqlx::query_scalar("SELECT state FROM products WHERE id = ?1")
                .bind(&sale.product_id)
                .fetch_optional(&mut **tx)
                .await?
                .ok_or_else(|| DbError::not_found("Product", &sale.product_id))?;

        Ok(CreditSaleSummary {
            sale,
            remaining_cents: remaining.cents(),
            installment_count,
            product_state,
        })
    }

    pub async fn insert(tx: &mut Tx<'_>, sale: &CreditSale) -> DbResult<()> {
        debug!(id = %sale.id, card_number = %sale.card_number, "Inserting credit sale");

        sqlx::query(
            r#"
            INSERT INTO credit_sales (
                id, card_number, sale_date, initial_installment_cents,
                customer_id, product_id, admin_id, initial_balance_cents,
                status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.card_number)
        .bind(sale.sale_date)
        .bind(sale.initial_installment_cents)
        .bind(&sale.customer_id)
        .bind(&sale.product_id)
        .bind(&sale.admin_id)
        .bind(sale.initial_balance_cents)
        .bind(sale.status)
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Rewrites the editable columns. The administrator never changes.
    pub async fn update(tx: &mut Tx<'_>, sale: &CreditSale) -> DbResult<()> {
        debug!(id = %sale.id, "Updating credit sale");

        let result = sqlx::query(
            r#"
            UPDATE credit_sales SET
                card_number = ?2,
                sale_date = ?3,
                initial_installment_cents = ?4,
                customer_id = ?5,
                product_id = ?6,
                initial_balance_cents = ?7,
                status = ?8,
                updated_at = ?9
            WHERE id = ?1
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.card_number)
        .bind(sale.sale_date)
        .bind(sale.initial_installment_cents)
        .bind(&sale.customer_id)
        .bind(&sale.product_id)
        .bind(sale.initial_balance_cents)
        .bind(sale.status)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("CreditSale", &sale.id));
        }

        Ok(())
    }

    pub async fn set_status(tx: &mut Tx<'_>, id: &str, status: CreditSaleStatus) -> DbResult<()> {
        debug!(id = %id, status = ?status, "Setting credit sale status");

        sqlx::query("UPDATE credit_sales SET status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(status)
            .bind(Utc::now())
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    /// Deletes the sale. Balance and installments go with it.
    pub async fn delete(tx: &mut Tx<'_>, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting credit sale");

        let result = sqlx::query("DELETE FROM credit_sales WHERE id = ?1")
            .bind(id)
            .execute(&mut **tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("CreditSale", id));
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
    use crate::testing::fixture;
    use abono_core::Money;
    use uuid::Uuid;

    fn sale_for(product_id: &str, customer_id: &str, admin_id: &str) -> CreditSale {
        let now = Utc::now();
        CreditSale {
            id: Uuid::new_v4().to_string(),
            card_number: "1042".to_string(),
            sale_date: now.date_naive(),
            initial_installment_cents: 20_000,
            customer_id: customer_id.to_string(),
            product_id: product_id.to_string(),
            admin_id: admin_id.to_string(),
            initial_balance_cents: 80_000,
            status: CreditSaleStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_summary_and_cascade_delete() {
        let fx = fixture().await;
        let sale = sale_for(&fx.product.id, &fx.customer.id, &fx.admin.id);

        let mut tx = fx.db.pool().begin().await.unwrap();
        CreditSaleRepository::insert(&mut tx, &sale).await.unwrap();
        BalanceTracker::initialize(&mut tx, &sale.id, Money::from_cents(80_000))
            .await
            .unwrap();
        InstallmentJournal::append_first(
            &mut tx,
            &sale.id,
            Money::from_cents(20_000),
            sale.sale_date,
            &fx.admin.id,
            Money::from_cents(80_000),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let summary = fx.db.credit_sales().summary(&sale.id).await.unwrap();
        assert_eq!(summary.remaining_cents, 80_000);
        assert_eq!(summary.installment_count, 1);
        assert_eq!(summary.product_state, ProductState::Pending);

        let rows = fx.db.credit_sales().list().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].customer_name, "Ana carla");
        assert_eq!(rows[0].remaining_cents, 80_000);

        let mut tx = fx.db.pool().begin().await.unwrap();
        CreditSaleRepository::lock(&mut tx, &sale.id).await.unwrap();
        CreditSaleRepository::delete(&mut tx, &sale.id).await.unwrap();
        assert_eq!(InstallmentJournal::count(&mut tx, &sale.id).await.unwrap(), 0);
        tx.commit().await.unwrap();

        assert!(fx.db.credit_sales().find_by_id(&sale.id).await.unwrap().is_none());
        assert!(matches!(
            fx.db.credit_sales().installments(&sale.id).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_product_claimed_twice_hits_unique_index() {
        let fx = fixture().await;
        let first = sale_for(&fx.product.id, &fx.customer.id, &fx.admin.id);
        let mut second = sale_for(&fx.product.id, &fx.customer.id, &fx.admin.id);
        second.card_number = "2000".to_string();

        let mut tx = fx.db.pool().begin().await.unwrap();
        CreditSaleRepository::insert(&mut tx, &first).await.unwrap();
        let err = CreditSaleRepository::insert(&mut tx, &second).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref field, .. } if field.contains("product_id")));
    }

    #[tokio::test]
    async fn test_lock_missing_sale() {
        let fx = fixture().await;
        let mut tx = fx.db.pool().begin().await.unwrap();

        assert!(matches!(
            CreditSaleRepository::lock(&mut tx, "missing").await,
            Err(DbError::NotFound { .. })
        ));
    }
}
