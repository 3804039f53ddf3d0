//! # Product Repository
//!
//! The slice of the catalog the stock engine needs: products exist before
//! batches are received, and their `min_stock` drives low-stock alerts.

use chrono::Utc;
use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use apotheca_core::validation::validate_product;
use apotheca_core::{CoreError, Product};

const PRODUCT_COLUMNS: &str = r#"
    id, name, category, unit, min_stock, unit_price_cents, is_active, created_at, updated_at
"#;

/// Loads an active product or fails with `ProductNotFound`.
pub(crate) async fn require_active<'e, E>(executor: E, id: &str) -> DbResult<Product>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1 AND is_active = 1");
    sqlx::query_as::<_, Product>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| CoreError::ProductNotFound(id.to_string()).into())
}

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID, active or not.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Gets an active product or fails with `ProductNotFound`.
    pub async fn require(&self, id: &str) -> DbResult<Product> {
        require_active(&self.pool, id).await
    }

    /// Lists active products ordered by name.
    pub async fn list_active(&self) -> DbResult<Vec<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active = 1 ORDER BY name");
        let products = sqlx::query_as::<_, Product>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    /// Inserts a new product after validating it.
    ///
    /// ## Returns
    /// * `Ok(Product)` - Inserted product
    /// * `Err(DbError::UniqueViolation)` - ID already exists
    pub async fn insert(&self, product: &Product) -> DbResult<Product> {
        validate_product(product).map_err(CoreError::from)?;
        debug!(id = %product.id, name = %product.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, category, unit, min_stock, unit_price_cents,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.category)
        .bind(&product.unit)
        .bind(product.min_stock)
        .bind(product.unit_price_cents)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product.clone())
    }

    /// Changes the low-stock threshold.
    pub async fn set_min_stock(&self, id: &str, min_stock: i64) -> DbResult<()> {
        apotheca_core::validation::validate_min_stock(min_stock).map_err(CoreError::from)?;
        debug!(id = %id, min_stock, "Updating min stock");

        let result = sqlx::query(
            "UPDATE products SET min_stock = ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(min_stock)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Soft-deletes a product; its batches and ledger stay for history.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Soft-deleting product");

        let result = sqlx::query("UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Counts active products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// Helper to generate a new product ID.
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}

/// Builds a product with fresh id and timestamps.
pub fn new_product(
    name: &str,
    category: &str,
    unit: &str,
    min_stock: i64,
    unit_price_cents: i64,
) -> Product {
    let now = Utc::now();
    Product {
        id: generate_product_id(),
        name: name.to_string(),
        category: category.to_string(),
        unit: unit.to_string(),
        min_stock,
        unit_price_cents,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}
