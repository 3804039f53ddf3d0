//! # Domain Types
//!
//! Core domain types used throughout Apotheca POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐  1:N  ┌─────────────────┐  1:N  ┌──────────────┐ │
//! │  │    Product      │──────►│     Batch       │──────►│   Movement   │ │
//! │  │  ─────────────  │       │  ─────────────  │       │  ──────────  │ │
//! │  │  id (UUID)      │       │  id (i64, seq)  │       │  kind        │ │
//! │  │  name           │       │  batch_code     │       │  direction   │ │
//! │  │  min_stock      │       │  remaining      │       │  quantity>0  │ │
//! │  │  unit_price     │       │  expiry_date    │       │  actor       │ │
//! │  └─────────────────┘       └─────────────────┘       └──────────────┘ │
//! │                                                                         │
//! │  Derived (never stored): ProductStock, StockAlerts, Allocation          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Batch ids are database sequence numbers, so ordering by id is insertion
//! order. The FEFO planner relies on that for expiry ties.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Product
// =============================================================================

/// A sellable medicine.
///
/// The stock engine only reads products; catalog management owns writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name, e.g. "Paracetamol 500mg".
    pub name: String,

    /// Category, e.g. "Analgesic".
    pub category: String,

    /// Unit of measure, e.g. "tablet", "bottle".
    pub unit: String,

    /// Low-stock threshold. Always >= 0.
    pub min_stock: i64,

    /// Unit price in cents.
    pub unit_price_cents: i64,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Batch
// =============================================================================

/// Lifecycle state of a batch.
///
/// ```text
/// ACTIVE (remaining > 0) ──issue/adjust──► EXHAUSTED (remaining == 0)
///      ▲                                        │
///      └──────────── positive adjust ───────────┤
///                                               ▼
///                                     DELETED (row removed)
/// ```
///
/// A deleted batch has no row left to load, so only the first two states
/// are ever returned by [`Batch::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    Active,
    Exhausted,
}

/// A quantity-bearing lot of a product sharing one expiry date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Batch {
    /// Sequence id (insertion order).
    pub id: i64,

    /// Owning product.
    pub product_id: String,

    /// Supplier lot label, if printed on the pack.
    pub batch_code: Option<String>,

    /// Remaining units. Never negative.
    pub remaining: i64,

    /// Last day the lot may be dispensed.
    pub expiry_date: NaiveDate,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Batch {
    /// Returns the lifecycle state derived from `remaining`.
    pub fn state(&self) -> BatchState {
        if self.remaining > 0 {
            BatchState::Active
        } else {
            BatchState::Exhausted
        }
    }

    /// True while the batch still holds stock.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.remaining > 0
    }

    /// Active and past its expiry date.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.is_active() && self.expiry_date < today
    }

    /// Active and expiring in `[today, today + days]`.
    ///
    /// A horizon past the last representable date is unbounded.
    pub fn expires_within(&self, today: NaiveDate, days: u32) -> bool {
        if !self.is_active() || self.expiry_date < today {
            return false;
        }
        match today.checked_add_days(Days::new(u64::from(days))) {
            Some(horizon) => self.expiry_date <= horizon,
            None => true,
        }
    }
}

// =============================================================================
// Movement Ledger
// =============================================================================

/// What caused a stock change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// New batch received from a supplier.
    Receipt,
    /// Units taken by a sale (FEFO).
    Issuance,
    /// Manual correction (count, breakage, write-off).
    Adjustment,
}

/// Whether a movement added or removed units.
///
/// Movement quantities are always positive; direction carries the sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum StockDirection {
    In,
    Out,
}

/// One append-only ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Movement {
    pub id: i64,
    pub product_id: String,
    /// Nullable for aggregate adjustments.
    pub batch_id: Option<i64>,
    pub kind: MovementKind,
    pub direction: StockDirection,
    /// Always > 0.
    pub quantity: i64,
    /// Free-text reference: sale number, supplier invoice, reason.
    pub reference: Option<String>,
    /// Who performed the change.
    pub actor: String,
    pub created_at: DateTime<Utc>,
}

impl Movement {
    /// Quantity with the direction applied (+ for in, - for out).
    pub fn signed_quantity(&self) -> i64 {
        match self.direction {
            StockDirection::In => self.quantity,
            StockDirection::Out => -self.quantity,
        }
    }
}

/// A movement about to be appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMovement {
    pub product_id: String,
    pub batch_id: Option<i64>,
    pub kind: MovementKind,
    pub direction: StockDirection,
    pub quantity: i64,
    pub reference: Option<String>,
    pub actor: String,
}

impl NewMovement {
    /// Receipt of a new batch.
    pub fn receipt(batch: &Batch, actor: &str) -> Self {
        NewMovement {
            product_id: batch.product_id.clone(),
            batch_id: Some(batch.id),
            kind: MovementKind::Receipt,
            direction: StockDirection::In,
            quantity: batch.remaining,
            reference: batch.batch_code.clone(),
            actor: actor.to_string(),
        }
    }

    /// FEFO issuance from one batch.
    pub fn issuance(
        product_id: &str,
        allocation: &Allocation,
        reference: Option<&str>,
        actor: &str,
    ) -> Self {
        NewMovement {
            product_id: product_id.to_string(),
            batch_id: Some(allocation.batch_id),
            kind: MovementKind::Issuance,
            direction: StockDirection::Out,
            quantity: allocation.quantity,
            reference: reference.map(str::to_string),
            actor: actor.to_string(),
        }
    }

    /// Manual adjustment by a signed, non-zero delta.
    pub fn adjustment(batch: &Batch, delta: i64, note: Option<&str>, actor: &str) -> Self {
        NewMovement {
            product_id: batch.product_id.clone(),
            batch_id: Some(batch.id),
            kind: MovementKind::Adjustment,
            direction: if delta >= 0 {
                StockDirection::In
            } else {
                StockDirection::Out
            },
            quantity: delta.abs(),
            reference: note.map(str::to_string),
            actor: actor.to_string(),
        }
    }
}

// =============================================================================
// Issuance
// =============================================================================

/// Units taken from one batch by a single issuance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub batch_id: i64,
    pub quantity: i64,
}

/// One product line of an order to issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: String,
    pub quantity: i64,
}

impl OrderLine {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        OrderLine {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// Allocations made for one product of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineAllocation {
    pub product_id: String,
    pub allocations: Vec<Allocation>,
}

// =============================================================================
// Aggregate Stock View
// =============================================================================

/// Per-product stock summary for stock screens and dashboards.
///
/// The three flags are independent: a medicine can be low on stock and
/// expiring at the same time, and the dashboard shows both badges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductStock {
    pub product_id: String,
    pub name: String,
    pub total: i64,
    pub min_stock: i64,
    pub nearest_expiry: Option<NaiveDate>,
    pub low_stock: bool,
    pub expiring_soon: bool,
    pub expired: bool,
}

/// Dashboard alert lists for one day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAlerts {
    pub generated_for: Option<NaiveDate>,
    pub low_stock: Vec<ProductStock>,
    pub expiring: Vec<ProductStock>,
    pub expired: Vec<ProductStock>,
}

impl StockAlerts {
    /// Total number of badges across all lists.
    pub fn alert_count(&self) -> usize {
        self.low_stock.len() + self.expiring.len() + self.expired.len()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(remaining: i64, expiry: (i32, u32, u32)) -> Batch {
        Batch {
            id: 1,
            product_id: "p1".to_string(),
            batch_code: Some("LOT-1".to_string()),
            remaining,
            expiry_date: NaiveDate::from_ymd_opt(expiry.0, expiry.1, expiry.2).unwrap(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_batch_state() {
        assert_eq!(batch(5, (2025, 1, 10)).state(), BatchState::Active);
        assert_eq!(batch(0, (2025, 1, 10)).state(), BatchState::Exhausted);
    }

    #[test]
    fn test_huge_expiry_window_does_not_overflow() {
        let today = day(2025, 1, 1);
        assert!(batch(1, (2030, 6, 1)).expires_within(today, u32::MAX));
        assert!(!batch(1, (2024, 12, 31)).expires_within(today, u32::MAX));
        assert!(!batch(0, (2030, 6, 1)).expires_within(today, u32::MAX));

        // Window running off the end of the calendar.
        let mut at_end = batch(1, (2025, 1, 1));
        at_end.expiry_date = NaiveDate::MAX;
        let near_end = NaiveDate::MAX.pred_opt().unwrap();
        assert!(at_end.expires_within(near_end, 30));
    }

    #[test]
    fn test_expiry_window_is_inclusive() {
        let today = day(2025, 1, 1);
        assert!(batch(1, (2025, 1, 1)).expires_within(today, 30));
        assert!(batch(1, (2025, 1, 31)).expires_within(today, 30));
        assert!(!batch(1, (2025, 2, 1)).expires_within(today, 30));
        // Already expired is not "expiring"
        assert!(!batch(1, (2024, 12, 31)).expires_within(today, 30));
    }

    #[test]
    fn test_exhausted_batch_never_flags() {
        let today = day(2025, 1, 1);
        let b = batch(0, (2024, 6, 1));
        assert!(!b.is_expired(today));
        assert!(!b.expires_within(today, 365));
    }

    #[test]
    fn test_adjustment_movement_direction() {
        let b = batch(5, (2025, 1, 10));
        let down = NewMovement::adjustment(&b, -3, Some("breakage"), "alice");
        assert_eq!(down.direction, StockDirection::Out);
        assert_eq!(down.quantity, 3);

        let up = NewMovement::adjustment(&b, 4, None, "alice");
        assert_eq!(up.direction, StockDirection::In);
        assert_eq!(up.quantity, 4);
    }

    #[test]
    fn test_movement_kind_serializes_snake_case() {
        let json = serde_json::to_string(&MovementKind::Issuance).unwrap();
        assert_eq!(json, "\"issuance\"");
    }
}
