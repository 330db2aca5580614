//! # Cash Sale Repository
//!
//! Rows of `cash_sales`. A cash sale has no balance and no installments;
//! its only effect on the catalog is the product state.

use chrono::Utc;
use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::Tx;
use abono_core::{CashSale, CashSaleOverview, CashSaleSummary, ProductState};

const SALE_COLUMNS: &str =
    "id, card_number, sale_date, customer_id, product_id, admin_id, created_at, updated_at";

async fn fetch_sale<'e, E>(executor: E, id: &str) -> DbResult<Option<CashSale>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sale = sqlx::query_as::<_, CashSale>(&format!(
        "SELECT {SALE_COLUMNS} FROM cash_sales WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await?;

    Ok(sale)
}

/// Repository for cash sales.
#[derive(Debug, Clone)]
pub struct CashSaleRepository {
    pool: SqlitePool,
}

impl CashSaleRepository {
    /// Creates a new CashSaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CashSaleRepository { pool }
    }

    pub async fn find_by_id(&self, id: &str) -> DbResult<Option<CashSale>> {
        fetch_sale(&self.pool, id).await
    }

    /// Sale plus the state of its product.
    pub async fn summary(&self, id: &str) -> DbResult<CashSaleSummary> {
        let mut tx = self.pool.begin().await?;
        let summary = Self::summary_in(&mut tx, id).await?;
        tx.commit().await?;
        Ok(summary)
    }

    /// Lists all cash sales, newest sale date first.
    pub async fn list(&self) -> DbResult<Vec<CashSaleOverview>> {
        let rows = sqlx::query_as::<_, CashSaleOverview>(
            r#"
            SELECT
                s.id,
                s.card_number,
                s.sale_date,
                s.customer_id,
                u.first_name || ' ' || u.last_name AS customer_name,
                s.product_id,
                p.name AS product_name,
                p.state AS product_state,
                p.price_cents
            FROM cash_sales s
            JOIN users u ON u.id = s.customer_id
            JOIN products p ON p.id = s.product_id
            ORDER BY s.sale_date DESC, s.created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    // =========================================================================
    // Transaction-scoped operations
    // =========================================================================

    /// Takes the write lock through the sale row.
    pub async fn lock(tx: &mut Tx<'_>, id: &str) -> DbResult<()> {
        debug!(id = %id, "Locking cash sale");

        let result =
            sqlx::query("UPDATE cash_sales SET lock_version = lock_version + 1 WHERE id = ?1")
                .bind(id)
                .execute(&mut **tx)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("CashSale", id));
        }

        Ok(())
    }

    pub async fn get(tx: &mut Tx<'_>, id: &str) -> DbResult<CashSale> {
        fetch_sale(&mut **tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("CashSale", id))
    }

    pub async fn summary_in(tx: &mut Tx<'_>, id: &str) -> DbResult<CashSaleSummary> {
        let sale = Self::get(tx, id).await?;

        let product_state: ProductState =
            sqlx::query_scalar("SELECT state FROM products WHERE id = ?1")
                .bind(&sale.product_id)
                .fetch_optional(&mut **tx)
                .await?
                .ok_or_else(|| DbError::not_found("Product", &sale.product_id))?;

        Ok(CashSaleSummary {
            sale,
            product_state,
        })
    }

    pub async fn insert(tx: &mut Tx<'_>, sale: &CashSale) -> DbResult<()> {
        debug!(id = %sale.id, card_number = %sale.card_number, "Inserting cash sale");

        sqlx::query(
            r#"
            INSERT INTO cash_sales (
                id, card_number, sale_date, customer_id, product_id,
                admin_id, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.card_number)
        .bind(sale.sale_date)
        .bind(&sale.customer_id)
        .bind(&sale.product_id)
        .bind(&sale.admin_id)
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    pub async fn update(tx: &mut Tx<'_>, sale: &CashSale) -> DbResult<()> {
        debug!(id = %sale.id, "Updating cash sale");

        let result = sqlx::query(
            r#"
            UPDATE cash_sales SET
                card_number = ?2,
                sale_date = ?3,
                customer_id = ?4,
                product_id = ?5,
                updated_at = ?6
            WHERE id = ?1
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.card_number)
        .bind(sale.sale_date)
        .bind(&sale.customer_id)
        .bind(&sale.product_id)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("CashSale", &sale.id));
        }

        Ok(())
    }

    pub async fn delete(tx: &mut Tx<'_>, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting cash sale");

        let result = sqlx::query("DELETE FROM cash_sales WHERE id = ?1")
            .bind(id)
            .execute(&mut **tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("CashSale", id));
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
    use crate::repository::product::ProductCatalog;
    use crate::testing::fixture;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_insert_update_list_delete() {
        let fx = fixture().await;
        let now = Utc::now();
        let mut sale = CashSale {
            id: Uuid::new_v4().to_string(),
            card_number: "C-9".to_string(),
            sale_date: now.date_naive(),
            customer_id: fx.customer.id.clone(),
            product_id: fx.product.id.clone(),
            admin_id: fx.admin.id.clone(),
            created_at: now,
            updated_at: now,
        };

        let mut tx = fx.db.pool().begin().await.unwrap();
        CashSaleRepository::insert(&mut tx, &sale).await.unwrap();
        ProductCatalog::set_state(&mut tx, &fx.product.id, ProductState::Closed)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let summary = fx.db.cash_sales().summary(&sale.id).await.unwrap();
        assert_eq!(summary.product_state, ProductState::Closed);

        sale.card_number = "C-10".to_string();
        let mut tx = fx.db.pool().begin().await.unwrap();
        CashSaleRepository::lock(&mut tx, &sale.id).await.unwrap();
        CashSaleRepository::update(&mut tx, &sale).await.unwrap();
        tx.commit().await.unwrap();

        let rows = fx.db.cash_sales().list().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].card_number, "C-10");
        assert_eq!(rows[0].product_state, ProductState::Closed);

        let mut tx = fx.db.pool().begin().await.unwrap();
        CashSaleRepository::delete(&mut tx, &sale.id).await.unwrap();
        tx.commit().await.unwrap();
        assert!(fx.db.cash_sales().find_by_id(&sale.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_sale() {
        let fx = fixture().await;
        assert!(matches!(
            fx.db.cash_sales().summary("missing").await,
            Err(DbError::NotFound { .. })
        ));
    }
}
