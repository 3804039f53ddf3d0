//! # Stock Repository
//!
//! Aggregate stock queries and FEFO issuance.
//!
//! ## Issuance Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  issue_order(lines)                                                     │
//! │     │                                                                   │
//! │     ├── validate + merge lines per product                             │
//! │     ├── lock products (sorted order)                                   │
//! │     │                                                                   │
//! │     └── attempt (bounded by transaction timeout, backoff between)      │
//! │           BEGIN IMMEDIATE                                               │
//! │           for each line: load active batches, plan FEFO                │
//! │               └── InsufficientStock? → ROLLBACK, nothing written       │
//! │           for each allocation:                                         │
//! │               UPDATE ... WHERE remaining >= qty                        │
//! │               └── 0 rows? → ROLLBACK, ConcurrentModification → retry   │
//! │               INSERT movement (issuance, out)                          │
//! │           COMMIT, invalidate alert cache                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, instrument, warn};

use super::batch::active_for_product;
use super::movement;
use super::product::require_active;
use super::begin_write;
use crate::cache::AlertCache;
use crate::config::InventoryConfig;
use crate::error::{DbError, DbResult};
use crate::locks::ProductLocks;
use apotheca_core::validation::{validate_actor, validate_quantity};
use apotheca_core::{
    stock, Allocation, Batch, CoreError, LineAllocation, NewMovement, OrderLine, Product,
    ProductStock, StockAlerts, ValidationError, MAX_LINE_QUANTITY,
};

/// Repository for aggregate stock and issuance.
#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
    config: InventoryConfig,
    cache: AlertCache,
    locks: ProductLocks,
}

impl StockRepository {
    /// Creates a new StockRepository.
    ///
    /// `cache` and `locks` must be the database-wide instances so every
    /// repository handle sees the same critical sections.
    pub fn new(
        pool: SqlitePool,
        config: InventoryConfig,
        cache: AlertCache,
        locks: ProductLocks,
    ) -> Self {
        StockRepository {
            pool,
            config,
            cache,
            locks,
        }
    }

    // =========================================================================
    // Aggregate view
    // =========================================================================

    async fn snapshot(&self, product_id: &str) -> DbResult<(Product, Vec<Batch>)> {
        let product = require_active(&self.pool, product_id).await?;
        let batches = active_for_product(&self.pool, product_id).await?;
        Ok((product, batches))
    }

    /// Sum of remaining quantities; 0 for a product with no batches.
    pub async fn total_stock(&self, product_id: &str) -> DbResult<i64> {
        let (_, batches) = self.snapshot(product_id).await?;
        Ok(stock::total_stock(&batches))
    }

    /// Earliest expiry among batches that still hold stock.
    pub async fn nearest_expiry(&self, product_id: &str) -> DbResult<Option<NaiveDate>> {
        let (_, batches) = self.snapshot(product_id).await?;
        Ok(stock::nearest_expiry(&batches))
    }

    /// Total at or below the product's `min_stock`.
    pub async fn is_low_stock(&self, product_id: &str) -> DbResult<bool> {
        let (product, batches) = self.snapshot(product_id).await?;
        Ok(stock::is_low_stock(stock::total_stock(&batches), product.min_stock))
    }

    /// Some active batch expires within `[today, today + days]`.
    pub async fn is_expiring_within(
        &self,
        product_id: &str,
        today: NaiveDate,
        days: u32,
    ) -> DbResult<bool> {
        let (_, batches) = self.snapshot(product_id).await?;
        Ok(stock::is_expiring_within(&batches, today, days))
    }

    /// Some active batch is already past its expiry date.
    pub async fn is_expired(&self, product_id: &str, today: NaiveDate) -> DbResult<bool> {
        let (_, batches) = self.snapshot(product_id).await?;
        Ok(stock::is_expired(&batches, today))
    }

    /// Full summary for one product, using the configured expiring window.
    pub async fn summary(&self, product_id: &str, today: NaiveDate) -> DbResult<ProductStock> {
        let (product, batches) = self.snapshot(product_id).await?;
        Ok(stock::summarize(
            &product,
            &batches,
            today,
            self.config.expiring_window_days,
        ))
    }

    /// Dashboard alerts for `today`, served from the alert cache when fresh.
    pub async fn alerts(&self, today: NaiveDate) -> DbResult<StockAlerts> {
        self.cache
            .get_or_load(today, || self.load_alerts(today))
            .await
    }

    async fn load_alerts(&self, today: NaiveDate) -> DbResult<StockAlerts> {
        debug!(%today, "Scanning stock for alerts");

        let products: Vec<Product> = sqlx::query_as(
            r#"
            SELECT id, name, category, unit, min_stock, unit_price_cents,
                   is_active, created_at, updated_at
            FROM products
            WHERE is_active = 1
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let batches: Vec<Batch> = sqlx::query_as(
            r#"
            SELECT b.id, b.product_id, b.batch_code, b.remaining, b.expiry_date,
                   b.created_at, b.updated_at
            FROM batches b
            JOIN products p ON p.id = b.product_id
            WHERE p.is_active = 1 AND b.remaining > 0
            ORDER BY b.expiry_date, b.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut by_product: HashMap<String, Vec<Batch>> = HashMap::new();
        for batch in batches {
            by_product
                .entry(batch.product_id.clone())
                .or_default()
                .push(batch);
        }

        let window = self.config.expiring_window_days;
        let summaries = products.iter().map(|product| {
            let batches = by_product.get(&product.id).map(Vec::as_slice).unwrap_or(&[]);
            stock::summarize(product, batches, today, window)
        });

        let alerts = stock::build_alerts(summaries, today);
        info!(
            %today,
            low_stock = alerts.low_stock.len(),
            expiring = alerts.expiring.len(),
            expired = alerts.expired.len(),
            "Stock alerts computed"
        );

        Ok(alerts)
    }

    // =========================================================================
    // Issuance
    // =========================================================================

    /// Issues `quantity` units of one product, earliest expiry first.
    ///
    /// ## Returns
    /// The per-batch allocations, summing to exactly `quantity`.
    ///
    /// ## Errors
    /// * `InvalidQuantity` - `quantity <= 0`
    /// * `InsufficientStock` - Not enough stock; nothing was changed
    /// * `ConcurrentModification` - Still conflicting after all retries
    #[instrument(skip(self))]
    pub async fn issue(
        &self,
        product_id: &str,
        quantity: i64,
        reference: Option<&str>,
        actor: &str,
    ) -> DbResult<Vec<Allocation>> {
        let lines = [OrderLine::new(product_id, quantity)];
        let mut issued = self.issue_order(&lines, reference, actor).await?;
        Ok(issued.pop().map(|line| line.allocations).unwrap_or_default())
    }

    /// Issues every line of an order in one transaction, or none of them.
    ///
    /// Lines for the same product are merged first. Results come back one per
    /// product in product-id order.
    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn issue_order(
        &self,
        lines: &[OrderLine],
        reference: Option<&str>,
        actor: &str,
    ) -> DbResult<Vec<LineAllocation>> {
        if lines.is_empty() {
            return Err(CoreError::EmptyOrder.into());
        }
        validate_actor(actor).map_err(CoreError::from)?;
        let merged = merge_lines(lines)?;

        let _guards = self
            .locks
            .lock_many(merged.iter().map(|line| line.product_id.as_str()))
            .await;

        let attempts = self.config.issue_retry_attempts.max(1);
        let deadline = self.config.transaction_timeout();
        let mut attempt = 1;

        loop {
            let result = match tokio::time::timeout(
                deadline,
                self.try_issue(&merged, reference, actor),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(DbError::Timeout {
                    operation: "stock issuance".to_string(),
                    after_ms: deadline.as_millis() as u64,
                }),
            };

            match result {
                Ok(issued) => {
                    self.cache.invalidate().await;
                    info!(
                        products = issued.len(),
                        units = issued
                            .iter()
                            .map(|line| stock::allocated_total(&line.allocations))
                            .sum::<i64>(),
                        attempt,
                        "Stock issued"
                    );
                    return Ok(issued);
                }
                Err(err) if err.is_retryable() && attempt < attempts => {
                    let backoff = self.config.retry_backoff(attempt);
                    warn!(
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "Issuance conflicted, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => {
                    if let Some(CoreError::InsufficientStock {
                        product_id,
                        available,
                        requested,
                    }) = err.as_domain()
                    {
                        warn!(%product_id, available, requested, "Issuance rejected");
                    }
                    return Err(err);
                }
            }
        }
    }

    async fn try_issue(
        &self,
        lines: &[OrderLine],
        reference: Option<&str>,
        actor: &str,
    ) -> DbResult<Vec<LineAllocation>> {
        let mut tx = begin_write(&self.pool).await?;

        // Plan every line before the first write.
        let mut planned = Vec::with_capacity(lines.len());
        for line in lines {
            require_active(&mut *tx, &line.product_id).await?;
            let batches = active_for_product(&mut *tx, &line.product_id).await?;
            let allocations = stock::plan_fefo(&line.product_id, &batches, line.quantity)?;
            planned.push(LineAllocation {
                product_id: line.product_id.clone(),
                allocations,
            });
        }

        if let Err(err) = apply_allocations(&mut tx, &planned, reference, actor).await {
            tx.rollback().await?;
            return Err(err);
        }

        tx.commit().await?;
        Ok(planned)
    }
}

/// Decrements every planned batch and appends its issuance movement.
///
/// Each decrement is guarded on the stored quantity. A batch that no longer
/// covers its allocation fails the whole call with `ConcurrentModification`;
/// the caller must roll back so earlier decrements are discarded.
async fn apply_allocations(
    conn: &mut SqliteConnection,
    planned: &[LineAllocation],
    reference: Option<&str>,
    actor: &str,
) -> DbResult<()> {
    let now = Utc::now();
    for line in planned {
        for allocation in &line.allocations {
            let updated = sqlx::query(
                r#"
                UPDATE batches
                SET remaining = remaining - ?2, updated_at = ?3
                WHERE id = ?1 AND remaining >= ?2
                "#,
            )
            .bind(allocation.batch_id)
            .bind(allocation.quantity)
            .bind(now)
            .execute(&mut *conn)
            .await?;

            if updated.rows_affected() != 1 {
                debug!(batch_id = allocation.batch_id, "Batch changed under the plan");
                return Err(CoreError::ConcurrentModification {
                    product_id: line.product_id.clone(),
                }
                .into());
            }

            let entry = NewMovement::issuance(&line.product_id, allocation, reference, actor);
            movement::append(&mut *conn, &entry).await?;
        }
    }

    Ok(())
}

/// Validates quantities and folds lines for the same product together.
fn merge_lines(lines: &[OrderLine]) -> DbResult<Vec<OrderLine>> {
    let mut merged: BTreeMap<&str, i64> = BTreeMap::new();
    for line in lines {
        validate_quantity(line.quantity)?;
        let total = merged.entry(line.product_id.as_str()).or_insert(0);
        *total += line.quantity;
        if *total > MAX_LINE_QUANTITY {
            return Err(CoreError::from(ValidationError::OutOfRange {
                field: "quantity".to_string(),
                min: 1,
                max: MAX_LINE_QUANTITY,
            })
            .into());
        }
    }

    Ok(merged
        .into_iter()
        .map(|(product_id, quantity)| OrderLine::new(product_id, quantity))
        .collect())
}
