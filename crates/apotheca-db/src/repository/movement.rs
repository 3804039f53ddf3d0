//! # Movement Repository
//!
//! The append-only stock ledger.
//!
//! ## Ledger Guarantees
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every quantity change is written in the SAME transaction as its       │
//! │  ledger row:                                                            │
//! │                                                                         │
//! │    receive  → INSERT batch      + INSERT movement (receipt, in)        │
//! │    adjust   → UPDATE remaining  + INSERT movement (adjustment, in/out) │
//! │    issue    → UPDATE remaining  + INSERT movement (issuance, out)      │
//! │               (one row per batch touched)                              │
//! │                                                                         │
//! │  Rows are never updated or deleted, so for any product:                │
//! │    Σ signed movement quantities == Σ batch remaining                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use apotheca_core::{Movement, MovementKind, NewMovement};

const MOVEMENT_COLUMNS: &str = r#"
    id, product_id, batch_id, kind, direction, quantity, reference, actor, created_at
"#;

/// Appends one ledger row using any executor (pool or open transaction).
pub(crate) async fn append<'e, E>(executor: E, movement: &NewMovement) -> DbResult<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    debug!(
        product_id = %movement.product_id,
        batch_id = ?movement.batch_id,
        kind = ?movement.kind,
        quantity = movement.quantity,
        "Appending stock movement"
    );

    let result = sqlx::query(
        r#"
        INSERT INTO stock_movements (
            product_id, batch_id, kind, direction, quantity, reference, actor, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&movement.product_id)
    .bind(movement.batch_id)
    .bind(movement.kind)
    .bind(movement.direction)
    .bind(movement.quantity)
    .bind(&movement.reference)
    .bind(&movement.actor)
    .bind(Utc::now())
    .execute(executor)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Repository for reading and appending stock movements.
#[derive(Debug, Clone)]
pub struct MovementRepository {
    pool: SqlitePool,
}

impl MovementRepository {
    /// Creates a new MovementRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MovementRepository { pool }
    }

    /// Appends a standalone movement, e.g. an aggregate adjustment with no batch.
    ///
    /// Quantities must be positive; the direction carries the sign.
    pub async fn record(&self, movement: &NewMovement) -> DbResult<Movement> {
        apotheca_core::validation::validate_quantity(movement.quantity)?;
        let id = append(&self.pool, movement).await?;
        self.get_by_id(id).await
    }

    async fn get_by_id(&self, id: i64) -> DbResult<Movement> {
        let sql = format!("SELECT {MOVEMENT_COLUMNS} FROM stock_movements WHERE id = ?1");
        let movement = sqlx::query_as::<_, Movement>(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(movement)
    }

    /// Movements of one product, oldest first.
    pub async fn for_product(&self, product_id: &str) -> DbResult<Vec<Movement>> {
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements WHERE product_id = ?1 ORDER BY id"
        );
        let movements = sqlx::query_as::<_, Movement>(&sql)
            .bind(product_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(movements)
    }

    /// Movements of one batch, oldest first. Survives batch deletion.
    pub async fn for_batch(&self, batch_id: i64) -> DbResult<Vec<Movement>> {
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements WHERE batch_id = ?1 ORDER BY id"
        );
        let movements = sqlx::query_as::<_, Movement>(&sql)
            .bind(batch_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(movements)
    }

    /// Total units ever issued for a product, rebuilt from the ledger.
    pub async fn issued_total(&self, product_id: &str) -> DbResult<i64> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(quantity), 0)
            FROM stock_movements
            WHERE product_id = ?1 AND kind = ?2
            "#,
        )
        .bind(product_id)
        .bind(MovementKind::Issuance)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    /// Net signed change for a product across the whole ledger.
    pub async fn net_change(&self, product_id: &str) -> DbResult<i64> {
        let net: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(CASE direction WHEN 'in' THEN quantity ELSE -quantity END), 0)
            FROM stock_movements
            WHERE product_id = ?1
            "#,
        )
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(net)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::product::new_product;
    use crate::{Database, DbConfig};
    use apotheca_core::{CoreError, StockDirection};
    use chrono::NaiveDate;

    async fn setup() -> (Database, String) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = new_product("Diclofenac Gel", "Topical", "tube", 3, 350);
        db.products().insert(&product).await.unwrap();
        (db, product.id)
    }

    #[tokio::test]
    async fn test_record_aggregate_adjustment() {
        let (db, pid) = setup().await;

        let entry = NewMovement {
            product_id: pid.clone(),
            batch_id: None,
            kind: MovementKind::Adjustment,
            direction: StockDirection::Out,
            quantity: 2,
            reference: Some("stock take".to_string()),
            actor: "manager".to_string(),
        };
        let stored = db.movements().record(&entry).await.unwrap();

        assert!(stored.id > 0);
        assert_eq!(stored.batch_id, None);
        assert_eq!(stored.signed_quantity(), -2);
        assert_eq!(db.movements().net_change(&pid).await.unwrap(), -2);
    }

    #[tokio::test]
    async fn test_record_rejects_zero_quantity() {
        let (db, pid) = setup().await;

        let entry = NewMovement {
            product_id: pid.clone(),
            batch_id: None,
            kind: MovementKind::Adjustment,
            direction: StockDirection::In,
            quantity: 0,
            reference: None,
            actor: "manager".to_string(),
        };
        let err = db.movements().record(&entry).await.unwrap_err();

        assert!(matches!(err.as_domain(), Some(CoreError::InvalidQuantity { .. })));
        assert!(db.movements().for_product(&pid).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_is_ordered_and_scoped() {
        let (db, pid) = setup().await;
        let expiry = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();

        let first = db.batches().receive(&pid, 10, expiry, None, "clerk").await.unwrap();
        let second = db.batches().receive(&pid, 4, expiry, None, "clerk").await.unwrap();
        db.stock().issue(&pid, 12, Some("SALE-3"), "cashier").await.unwrap();

        let history = db.movements().for_product(&pid).await.unwrap();
        let kinds: Vec<_> = history.iter().map(|m| m.kind).collect();
        assert_eq!(
            kinds,
            vec![
                MovementKind::Receipt,
                MovementKind::Receipt,
                MovementKind::Issuance,
                MovementKind::Issuance,
            ]
        );
        assert!(history.windows(2).all(|w| w[0].id < w[1].id));

        // Same expiry: the earlier receipt is drained first.
        let second_history = db.movements().for_batch(second.id).await.unwrap();
        assert_eq!(second_history.last().unwrap().quantity, 2);
        assert_eq!(db.movements().for_batch(first.id).await.unwrap().len(), 2);
        assert_eq!(db.movements().issued_total(&pid).await.unwrap(), 12);
    }
}
