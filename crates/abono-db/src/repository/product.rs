//! # Product Catalog
//!
//! Database operations for products.
//!
//! ## Key Operations
//! - Lookup by id or business reference
//! - Insert (seeding and tests)
//! - Lifecycle state changes, only from inside a ledger transaction
//!
//! ## Lifecycle Writes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Pool-scoped (&self)              Transaction-scoped (tx)               │
//! │  ─────────────────────            ────────────────────────             │
//! │  find_by_id                       lock       ← first statement         │
//! │  find_by_reference                get        ← reads the locked row    │
//! │  list                             set_state  ← Pending/Claimed/Closed  │
//! │  insert                                                                │
//! │  count / count_by_state                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::Tx;
use abono_core::{NewProduct, Product, ProductState};

const PRODUCT_COLUMNS: &str =
    "id, reference, name, brand, cost_cents, price_cents, state, created_at, updated_at";

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let catalog = ProductCatalog::new(pool);
///
/// let product = catalog.find_by_reference("TV-0042").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductCatalog {
    pool: SqlitePool,
}

impl ProductCatalog {
    /// Creates a new ProductCatalog.
    pub fn new(pool: SqlitePool) -> Self {
        ProductCatalog { pool }
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn find_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a product by its business reference.
    pub async fn find_by_reference(&self, reference: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE reference = ?1"
        ))
        .bind(reference.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Lists products, optionally filtered by state, ordered by reference.
    pub async fn list(&self, state: Option<ProductState>) -> DbResult<Vec<Product>> {
        let products = match state {
            Some(state) => {
                sqlx::query_as::<_, Product>(&format!(
                    "SELECT {PRODUCT_COLUMNS} FROM products WHERE state = ?1 ORDER BY reference"
                ))
                .bind(state)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Product>(&format!(
                    "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY reference"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(products)
    }

    /// Inserts a new product in `Pending` state.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - reference already exists
    pub async fn insert(&self, input: &NewProduct) -> DbResult<Product> {
        debug!(reference = %input.reference, "Inserting product");

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            reference: input.reference.trim().to_string(),
            name: input.name.trim().to_string(),
            brand: input.brand.trim().to_string(),
            cost_cents: input.cost.cents(),
            price_cents: input.price.cents(),
            state: ProductState::Pending,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO products (
                id, reference, name, brand, cost_cents, price_cents,
                state, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&product.id)
        .bind(&product.reference)
        .bind(&product.name)
        .bind(&product.brand)
        .bind(product.cost_cents)
        .bind(product.price_cents)
        .bind(product.state)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
                field,
                value: product.reference.clone(),
            },
            other => other,
        })?;

        Ok(product)
    }

    /// Total number of products.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Counts products in a given state.
    pub async fn count_by_state(&self, state: ProductState) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE state = ?1")
            .bind(state)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // =========================================================================
    // Transaction-scoped operations
    // =========================================================================

    /// Takes the write lock through the product row.
    ///
    /// Must be the first statement of the transaction. Zero rows touched
    /// means the product does not exist.
    pub async fn lock(tx: &mut Tx<'_>, id: &str) -> DbResult<()> {
        debug!(id = %id, "Locking product");

        let result = sqlx::query("UPDATE products SET lock_version = lock_version + 1 WHERE id = ?1")
            .bind(id)
            .execute(&mut **tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Reads a product inside the transaction.
    pub async fn get(tx: &mut Tx<'_>, id: &str) -> DbResult<Product> {
        sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Sets the lifecycle flag.
    pub async fn set_state(tx: &mut Tx<'_>, id: &str, state: ProductState) -> DbResult<()> {
        debug!(id = %id, state = %state, "Setting product state");

        let result = sqlx::query("UPDATE products SET state = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(state)
            .bind(Utc::now())
            .execute(&mut **tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
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
    use crate::pool::{Database, DbConfig};
    use crate::testing::tv;
    use abono_core::Money;

    #[tokio::test]
    async fn test_insert_and_find() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.products();

        let inserted = catalog.insert(&tv()).await.unwrap();
        assert_eq!(inserted.state, ProductState::Pending);

        let by_id = catalog.find_by_id(&inserted.id).await.unwrap().unwrap();
        assert_eq!(by_id.reference, "TV-0042");
        assert_eq!(by_id.price(), Money::from_cents(100_000));

        let by_ref = catalog.find_by_reference(" TV-0042 ").await.unwrap();
        assert_eq!(by_ref.map(|p| p.id), Some(inserted.id));
        assert!(catalog.find_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_reference() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products().insert(&tv()).await.unwrap();

        let err = db.products().insert(&tv()).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref value, .. } if value == "TV-0042"));
    }

    #[tokio::test]
    async fn test_lock_and_set_state() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db.products().insert(&tv()).await.unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        ProductCatalog::lock(&mut tx, &product.id).await.unwrap();
        ProductCatalog::set_state(&mut tx, &product.id, ProductState::Claimed)
            .await
            .unwrap();
        assert_eq!(
            ProductCatalog::get(&mut tx, &product.id).await.unwrap().state,
            ProductState::Claimed
        );
        tx.commit().await.unwrap();

        assert_eq!(db.products().count_by_state(ProductState::Claimed).await.unwrap(), 1);
        assert_eq!(db.products().count().await.unwrap(), 1);
        assert_eq!(
            db.products().list(Some(ProductState::Pending)).await.unwrap().len(),
            0
        );
    }

    #[tokio::test]
    async fn test_lock_missing_product() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db.pool().begin().await.unwrap();

        let err = ProductCatalog::lock(&mut tx, "missing").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
