//! # Batch Repository
//!
//! The batch store: receiving, adjusting, deleting and listing batches.
//!
//! ## Batch Lifecycle
//! ```text
//! receive ──► Active (remaining > 0) ──issue/adjust──► Exhausted (remaining = 0)
//!                  ▲                                        │
//!                  └──────────── adjust(+n) ────────────────┤
//!                                                           ▼
//!                                                  delete ──► gone
//! ```
//!
//! Batches are never removed while they hold stock, so a delete never loses
//! units that the ledger still accounts for.

use chrono::{NaiveDate, Utc};
use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::{debug, info};

use super::movement;
use super::product::require_active;
use super::begin_write;
use crate::cache::AlertCache;
use crate::error::DbResult;
use apotheca_core::validation::{
    validate_actor, validate_adjustment_delta, validate_batch_code, validate_quantity,
};
use apotheca_core::{Batch, CoreError, NewMovement, ValidationError};

const BATCH_COLUMNS: &str = r#"
    id, product_id, batch_code, remaining, expiry_date, created_at, updated_at
"#;

/// Active batches of a product in FEFO order (expiry, then insertion).
pub(crate) async fn active_for_product<'e, E>(executor: E, product_id: &str) -> DbResult<Vec<Batch>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        r#"
        SELECT {BATCH_COLUMNS}
        FROM batches
        WHERE product_id = ?1 AND remaining > 0
        ORDER BY expiry_date, id
        "#
    );
    let batches = sqlx::query_as::<_, Batch>(&sql)
        .bind(product_id)
        .fetch_all(executor)
        .await?;

    Ok(batches)
}

async fn fetch_batch<'e, E>(executor: E, batch_id: i64) -> DbResult<Option<Batch>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {BATCH_COLUMNS} FROM batches WHERE id = ?1");
    let batch = sqlx::query_as::<_, Batch>(&sql)
        .bind(batch_id)
        .fetch_optional(executor)
        .await?;

    Ok(batch)
}

/// Repository for batch database operations.
#[derive(Debug, Clone)]
pub struct BatchRepository {
    pool: SqlitePool,
    cache: AlertCache,
}

impl BatchRepository {
    /// Creates a new BatchRepository sharing the database's alert cache.
    pub fn new(pool: SqlitePool, cache: AlertCache) -> Self {
        BatchRepository { pool, cache }
    }

    /// Receives a new batch and records the receipt movement.
    ///
    /// ## Rules
    /// - `quantity` must be > 0
    /// - The product must exist and be active
    /// - Batch row and receipt movement commit together
    pub async fn receive(
        &self,
        product_id: &str,
        quantity: i64,
        expiry_date: NaiveDate,
        batch_code: Option<&str>,
        actor: &str,
    ) -> DbResult<Batch> {
        validate_quantity(quantity)?;
        validate_actor(actor).map_err(CoreError::from)?;
        if let Some(code) = batch_code {
            validate_batch_code(code).map_err(CoreError::from)?;
        }

        let mut tx = begin_write(&self.pool).await?;
        require_active(&mut *tx, product_id).await?;

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO batches (
                product_id, batch_code, remaining, expiry_date, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            "#,
        )
        .bind(product_id)
        .bind(batch_code)
        .bind(quantity)
        .bind(expiry_date)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let batch = Batch {
            id: result.last_insert_rowid(),
            product_id: product_id.to_string(),
            batch_code: batch_code.map(str::to_string),
            remaining: quantity,
            expiry_date,
            created_at: now,
            updated_at: now,
        };

        movement::append(&mut *tx, &NewMovement::receipt(&batch, actor)).await?;
        tx.commit().await?;
        self.cache.invalidate().await;

        info!(
            batch_id = batch.id,
            product_id = %product_id,
            quantity,
            expiry = %expiry_date,
            "Batch received"
        );

        Ok(batch)
    }

    /// Adds a signed delta to a batch's remaining quantity.
    ///
    /// A zero delta changes nothing and records nothing.
    ///
    /// ## Errors
    /// * `Validation` - `|delta|` exceeds the per-line quantity cap
    /// * `BatchNotFound` - No batch with this id
    /// * `NegativeStock` - The delta would take `remaining` below zero
    pub async fn adjust(
        &self,
        batch_id: i64,
        delta: i64,
        note: Option<&str>,
        actor: &str,
    ) -> DbResult<Batch> {
        validate_actor(actor).map_err(CoreError::from)?;
        validate_adjustment_delta(delta).map_err(CoreError::from)?;

        let mut tx = begin_write(&self.pool).await?;
        let batch = fetch_batch(&mut *tx, batch_id)
            .await?
            .ok_or(CoreError::BatchNotFound(batch_id))?;

        if delta == 0 {
            tx.rollback().await?;
            return Ok(batch);
        }

        let Some(target) = batch.remaining.checked_add(delta) else {
            tx.rollback().await?;
            return Err(CoreError::from(ValidationError::OutOfRange {
                field: "remaining".to_string(),
                min: 0,
                max: i64::MAX,
            })
            .into());
        };

        // The guard re-checks against the stored value, not the one read above.
        let now = Utc::now();
        let updated = sqlx::query(
            r#"
            UPDATE batches
            SET remaining = remaining + ?2, updated_at = ?3
            WHERE id = ?1 AND remaining + ?2 >= 0
            "#,
        )
        .bind(batch_id)
        .bind(delta)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() != 1 {
            tx.rollback().await?;
            return Err(CoreError::NegativeStock {
                batch_id,
                remaining: batch.remaining,
                delta,
            }
            .into());
        }

        let adjusted = Batch {
            remaining: target,
            updated_at: now,
            ..batch
        };

        movement::append(&mut *tx, &NewMovement::adjustment(&adjusted, delta, note, actor)).await?;
        tx.commit().await?;
        self.cache.invalidate().await;

        info!(batch_id, delta, remaining = adjusted.remaining, "Batch adjusted");

        Ok(adjusted)
    }

    /// Deletes an exhausted batch. Its ledger rows are kept.
    pub async fn delete(&self, batch_id: i64) -> DbResult<()> {
        debug!(batch_id, "Deleting batch");

        let result = sqlx::query("DELETE FROM batches WHERE id = ?1 AND remaining = 0")
            .bind(batch_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 1 {
            self.cache.invalidate().await;
            info!(batch_id, "Batch deleted");
            return Ok(());
        }

        match fetch_batch(&self.pool, batch_id).await? {
            Some(batch) => Err(CoreError::NonEmptyBatch {
                batch_id,
                remaining: batch.remaining,
            }
            .into()),
            None => Err(CoreError::BatchNotFound(batch_id).into()),
        }
    }

    /// Gets a batch by its ID.
    pub async fn get_by_id(&self, batch_id: i64) -> DbResult<Option<Batch>> {
        fetch_batch(&self.pool, batch_id).await
    }

    /// All batches of a product, exhausted ones included, in FEFO order.
    pub async fn list_for_product(&self, product_id: &str) -> DbResult<Vec<Batch>> {
        let sql = format!(
            r#"
            SELECT {BATCH_COLUMNS}
            FROM batches
            WHERE product_id = ?1
            ORDER BY expiry_date, id
            "#
        );
        let batches = sqlx::query_as::<_, Batch>(&sql)
            .bind(product_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(batches)
    }

    /// Batches still holding stock, in the order issuance would consume them.
    pub async fn active_for_product(&self, product_id: &str) -> DbResult<Vec<Batch>> {
        active_for_product(&self.pool, product_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::product::new_product;
    use crate::{Database, DbConfig, DbError};
    use apotheca_core::{MovementKind, StockDirection};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn setup() -> (Database, String) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = new_product("Amoxicillin 250mg", "Antibiotic", "capsule", 10, 45);
        db.products().insert(&product).await.unwrap();
        (db, product.id)
    }

    #[tokio::test]
    async fn test_receive_records_receipt() {
        let (db, pid) = setup().await;

        let batch = db
            .batches()
            .receive(&pid, 50, date(2026, 3, 1), Some("LOT-A1"), "clerk")
            .await
            .unwrap();

        assert_eq!(batch.remaining, 50);
        let movements = db.movements().for_batch(batch.id).await.unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].kind, MovementKind::Receipt);
        assert_eq!(movements[0].direction, StockDirection::In);
        assert_eq!(movements[0].quantity, 50);
        assert_eq!(movements[0].reference.as_deref(), Some("LOT-A1"));
    }

    #[tokio::test]
    async fn test_receive_rejects_bad_input() {
        let (db, pid) = setup().await;

        let err = db
            .batches()
            .receive(&pid, 0, date(2026, 3, 1), None, "clerk")
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_domain(),
            Some(CoreError::InvalidQuantity { quantity: 0 })
        ));

        let err = db
            .batches()
            .receive("missing", 5, date(2026, 3, 1), None, "clerk")
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::ProductNotFound(_))));

        assert!(db.batches().list_for_product(&pid).await.unwrap().is_empty());
        assert!(db.movements().for_product("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_adjust_negative_beyond_remaining_fails() {
        let (db, pid) = setup().await;
        let batch = db
            .batches()
            .receive(&pid, 4, date(2026, 3, 1), None, "clerk")
            .await
            .unwrap();

        let err = db.batches().adjust(batch.id, -5, None, "clerk").await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::NegativeStock {
                remaining: 4,
                delta: -5,
                ..
            })
        ));

        let stored = db.batches().get_by_id(batch.id).await.unwrap().unwrap();
        assert_eq!(stored.remaining, 4);
        assert_eq!(db.movements().for_batch(batch.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_adjust_records_signed_movement() {
        let (db, pid) = setup().await;
        let batch = db
            .batches()
            .receive(&pid, 10, date(2026, 3, 1), None, "clerk")
            .await
            .unwrap();

        let after = db
            .batches()
            .adjust(batch.id, -3, Some("damaged strip"), "manager")
            .await
            .unwrap();
        assert_eq!(after.remaining, 7);

        let movements = db.movements().for_batch(batch.id).await.unwrap();
        let last = movements.last().unwrap();
        assert_eq!(last.kind, MovementKind::Adjustment);
        assert_eq!(last.signed_quantity(), -3);
        assert_eq!(last.actor, "manager");
    }

    #[tokio::test]
    async fn test_adjust_rejects_unbounded_delta() {
        let (db, pid) = setup().await;
        let batch = db
            .batches()
            .receive(&pid, 10, date(2026, 3, 1), None, "clerk")
            .await
            .unwrap();

        for delta in [i64::MAX, i64::MIN, apotheca_core::MAX_LINE_QUANTITY + 1] {
            let err = db.batches().adjust(batch.id, delta, None, "clerk").await.unwrap_err();
            assert!(
                matches!(err.as_domain(), Some(CoreError::Validation(_))),
                "delta {delta} gave {err:?}"
            );
        }

        let stored = db.batches().get_by_id(batch.id).await.unwrap().unwrap();
        assert_eq!(stored.remaining, 10);
        assert_eq!(db.movements().for_batch(batch.id).await.unwrap().len(), 1);

        // The largest allowed delta still goes through.
        let topped = db
            .batches()
            .adjust(batch.id, apotheca_core::MAX_LINE_QUANTITY, None, "clerk")
            .await
            .unwrap();
        assert_eq!(topped.remaining, 10 + apotheca_core::MAX_LINE_QUANTITY);
    }

    #[tokio::test]
    async fn test_zero_adjust_is_noop() {
        let (db, pid) = setup().await;
        let batch = db
            .batches()
            .receive(&pid, 10, date(2026, 3, 1), None, "clerk")
            .await
            .unwrap();

        let same = db.batches().adjust(batch.id, 0, None, "clerk").await.unwrap();
        assert_eq!(same.remaining, 10);
        assert_eq!(db.movements().for_batch(batch.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_adjust_unknown_batch() {
        let (db, _) = setup().await;
        let err = db.batches().adjust(999, 1, None, "clerk").await.unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::BatchNotFound(999))));
    }

    #[tokio::test]
    async fn test_delete_only_when_empty() {
        let (db, pid) = setup().await;
        let batch = db
            .batches()
            .receive(&pid, 2, date(2026, 3, 1), None, "clerk")
            .await
            .unwrap();

        let err = db.batches().delete(batch.id).await.unwrap_err();
        assert!(matches!(
            err.as_domain(),
            Some(CoreError::NonEmptyBatch { remaining: 2, .. })
        ));

        db.batches().adjust(batch.id, -2, None, "clerk").await.unwrap();
        db.batches().delete(batch.id).await.unwrap();

        assert!(db.batches().get_by_id(batch.id).await.unwrap().is_none());
        // Ledger survives the batch.
        assert_eq!(db.movements().for_batch(batch.id).await.unwrap().len(), 2);

        let err = db.batches().delete(batch.id).await.unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::BatchNotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_writers_wait_for_the_write_lock() {
        let path = std::env::temp_dir().join(format!("apotheca-{}.db", uuid::Uuid::new_v4()));
        let db = Database::new(DbConfig::new(&path).max_connections(4))
            .await
            .unwrap();
        let product = new_product("Cetirizine 10mg", "Antihistamine", "tablet", 0, 15);
        db.products().insert(&product).await.unwrap();
        let batch = db
            .batches()
            .receive(&product.id, 10, date(2026, 3, 1), None, "clerk")
            .await
            .unwrap();

        // Hold the write lock while two read-then-write calls start.
        let holder = begin_write(db.pool()).await.unwrap();
        let adjust = {
            let batches = db.batches();
            tokio::spawn(async move { batches.adjust(batch.id, -4, None, "clerk").await })
        };
        let receive = {
            let batches = db.batches();
            let pid = product.id.clone();
            tokio::spawn(async move {
                batches.receive(&pid, 6, date(2026, 9, 1), None, "clerk").await
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(150)).await;
        holder.commit().await.unwrap();

        adjust.await.unwrap().unwrap();
        receive.await.unwrap().unwrap();

        let total: i64 = db
            .batches()
            .list_for_product(&product.id)
            .await
            .unwrap()
            .iter()
            .map(|b| b.remaining)
            .sum();
        assert_eq!(total, 12);
        assert_eq!(db.movements().net_change(&product.id).await.unwrap(), 12);

        db.close().await;
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_listing_order_and_exhausted_visibility() {
        let (db, pid) = setup().await;
        let late = db
            .batches()
            .receive(&pid, 5, date(2026, 6, 1), None, "clerk")
            .await
            .unwrap();
        let early = db
            .batches()
            .receive(&pid, 5, date(2026, 2, 1), None, "clerk")
            .await
            .unwrap();
        db.batches().adjust(early.id, -5, None, "clerk").await.unwrap();

        let all = db.batches().list_for_product(&pid).await.unwrap();
        assert_eq!(all.iter().map(|b| b.id).collect::<Vec<_>>(), vec![early.id, late.id]);

        let active = db.batches().active_for_product(&pid).await.unwrap();
        assert_eq!(active.iter().map(|b| b.id).collect::<Vec<_>>(), vec![late.id]);
    }
}
