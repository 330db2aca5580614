//! # Consistency Guard
//!
//! Cross-table checks that no single table can enforce on its own:
//!
//! - a product is claimed by at most one sale, credit XOR cash
//! - card numbers are unique within each sale type
//!
//! Both run inside the caller's transaction after the write lock is held,
//! so a check that passes stays true until commit. The UNIQUE indexes on
//! `card_number` and `product_id` catch the same cases inside one table;
//! the guard turns them into conflicts before the insert is attempted and
//! covers the credit/cash combination.

use tracing::debug;

use crate::error::DbResult;
use crate::repository::product::ProductCatalog;
use crate::Tx;
use abono_core::{ConflictError, Product, SaleType};

/// Transaction-scoped uniqueness checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsistencyGuard;

impl ConsistencyGuard {
    /// Fails if the product is claimed by any sale other than `exclude_sale_id`,
    /// or if it is not `Pending` and does not already belong to that sale.
    ///
    /// ## Returns
    /// The product, read under the lock.
    pub async fn check_product_available(
        tx: &mut Tx<'_>,
        product_id: &str,
        exclude_sale_id: Option<&str>,
    ) -> DbResult<Product> {
        let product = ProductCatalog::get(tx, product_id).await?;

        if let Some((sale_type, sale_id)) = Self::claiming_sale(tx, product_id).await? {
            if Some(sale_id.as_str()) == exclude_sale_id {
                // The sale being edited keeps its own product.
                return Ok(product);
            }

            debug!(product_id = %product_id, sale_id = %sale_id, "Product already claimed");
            return Err(ConflictError::ProductClaimed {
                product_id: product_id.to_string(),
                sale_type,
                sale_id,
            }
            .into());
        }

        if !product.state.is_available() {
            return Err(ConflictError::ProductUnavailable {
                product_id: product_id.to_string(),
                state: product.state,
            }
            .into());
        }

        Ok(product)
    }

    /// Fails if another sale of `sale_type` already uses `card_number`.
    pub async fn check_card_unique(
        tx: &mut Tx<'_>,
        card_number: &str,
        sale_type: SaleType,
        exclude_sale_id: Option<&str>,
    ) -> DbResult<()> {
        let sql = match sale_type {
            SaleType::Credit => "SELECT id FROM credit_sales WHERE card_number = ?1",
            SaleType::Cash => "SELECT id FROM cash_sales WHERE card_number = ?1",
        };

        let existing: Option<String> = sqlx::query_scalar(sql)
            .bind(card_number)
            .fetch_optional(&mut **tx)
            .await?;

        match existing {
            Some(id) if Some(id.as_str()) != exclude_sale_id => {
                Err(ConflictError::DuplicateCardNumber {
                    sale_type,
                    card_number: card_number.to_string(),
                }
                .into())
            }
            _ => Ok(()),
        }
    }

    /// The sale currently linked to the product, of either type.
    async fn claiming_sale(tx: &mut Tx<'_>, product_id: &str) -> DbResult<Option<(SaleType, String)>> {
        let credit: Option<String> =
            sqlx::query_scalar("SELECT id FROM credit_sales WHERE product_id = ?1")
                .bind(product_id)
                .fetch_optional(&mut **tx)
                .await?;
        if let Some(id) = credit {
            return Ok(Some((SaleType::Credit, id)));
        }

        let cash: Option<String> =
            sqlx::query_scalar("SELECT id FROM cash_sales WHERE product_id = ?1")
                .bind(product_id)
                .fetch_optional(&mut **tx)
                .await?;

        Ok(cash.map(|id| (SaleType::Cash, id)))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::repository::cash_sale::CashSaleRepository;
    use crate::testing::{fixture, product};
    use abono_core::{CashSale, ProductState};
    use chrono::Utc;
    use uuid::Uuid;

    fn cash_sale(fx: &crate::testing::Fixture, card: &str) -> CashSale {
        let now = Utc::now();
        CashSale {
            id: Uuid::new_v4().to_string(),
            card_number: card.to_string(),
            sale_date: now.date_naive(),
            customer_id: fx.customer.id.clone(),
            product_id: fx.product.id.clone(),
            admin_id: fx.admin.id.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_pending_product_is_available() {
        let fx = fixture().await;
        let mut tx = fx.db.pool().begin().await.unwrap();

        let p = ConsistencyGuard::check_product_available(&mut tx, &fx.product.id, None)
            .await
            .unwrap();
        assert_eq!(p.id, fx.product.id);
    }

    #[tokio::test]
    async fn test_claimed_by_cash_sale() {
        let fx = fixture().await;
        let sale = cash_sale(&fx, "500");

        let mut tx = fx.db.pool().begin().await.unwrap();
        CashSaleRepository::insert(&mut tx, &sale).await.unwrap();
        ProductCatalog::set_state(&mut tx, &fx.product.id, ProductState::Closed)
            .await
            .unwrap();

        let err = ConsistencyGuard::check_product_available(&mut tx, &fx.product.id, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Conflict(ConflictError::ProductClaimed { sale_type: SaleType::Cash, .. })
        ));

        // The owning sale may keep its product even though it is closed.
        assert!(ConsistencyGuard::check_product_available(&mut tx, &fx.product.id, Some(&sale.id))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_closed_product_without_sale_is_unavailable() {
        let fx = fixture().await;
        let other = fx.db.products().insert(&product("FRIDGE-1", 50_000)).await.unwrap();

        let mut tx = fx.db.pool().begin().await.unwrap();
        ProductCatalog::set_state(&mut tx, &other.id, ProductState::Closed)
            .await
            .unwrap();

        assert!(matches!(
            ConsistencyGuard::check_product_available(&mut tx, &other.id, Some("another-sale")).await,
            Err(DbError::Conflict(ConflictError::ProductUnavailable { state: ProductState::Closed, .. }))
        ));
    }

    #[tokio::test]
    async fn test_card_numbers_are_per_type() {
        let fx = fixture().await;
        let sale = cash_sale(&fx, "1042");

        let mut tx = fx.db.pool().begin().await.unwrap();
        CashSaleRepository::insert(&mut tx, &sale).await.unwrap();

        assert!(matches!(
            ConsistencyGuard::check_card_unique(&mut tx, "1042", SaleType::Cash, None).await,
            Err(DbError::Conflict(ConflictError::DuplicateCardNumber { .. }))
        ));
        ConsistencyGuard::check_card_unique(&mut tx, "1042", SaleType::Cash, Some(&sale.id))
            .await
            .unwrap();
        ConsistencyGuard::check_card_unique(&mut tx, "1042", SaleType::Credit, None)
            .await
            .unwrap();
    }
}
