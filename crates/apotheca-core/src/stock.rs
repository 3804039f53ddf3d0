//! # Stock Module
//!
//! Pure FEFO allocation planning and aggregate stock calculations.
//!
//! ## FEFO Walk
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  issue(X, 7)                                                           │
//! │                                                                         │
//! │  Active batches sorted by (expiry_date, id):                           │
//! │                                                                         │
//! │    B1  remaining 5   expires 2025-01-10   take min(5, 7) = 5  → need 2 │
//! │    B2  remaining 10  expires 2025-02-01   take min(10, 2) = 2 → need 0 │
//! │    B3  remaining 4   expires 2025-06-01   (untouched)                  │
//! │                                                                         │
//! │  Plan: [(B1, 5), (B2, 2)]                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The planner never mutates anything. The database layer applies the plan
//! inside one transaction and rejects it if any batch moved underneath.

use chrono::NaiveDate;

use crate::error::{CoreError, CoreResult};
use crate::types::{Allocation, Batch, Product, ProductStock, StockAlerts};

// =============================================================================
// FEFO Planner
// =============================================================================

/// Orders batches first-expired-first-out, ties by id (insertion order).
pub fn sort_fefo(batches: &mut [Batch]) {
    batches.sort_by(|a, b| {
        a.expiry_date
            .cmp(&b.expiry_date)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Plans a FEFO issuance of `quantity` units from `batches`.
///
/// ## Rules
/// - `quantity` must be > 0
/// - Exhausted batches are ignored
/// - The total available is checked before any allocation is produced,
///   so a failed plan never describes a partial issuance
///
/// ## Returns
/// Allocations in walk order; their quantities sum to exactly `quantity`.
pub fn plan_fefo(product_id: &str, batches: &[Batch], quantity: i64) -> CoreResult<Vec<Allocation>> {
    if quantity <= 0 {
        return Err(CoreError::invalid_quantity(quantity));
    }

    let mut active: Vec<Batch> = batches.iter().filter(|b| b.is_active()).cloned().collect();
    sort_fefo(&mut active);

    let available = total_stock(&active);
    if available < quantity {
        return Err(CoreError::InsufficientStock {
            product_id: product_id.to_string(),
            available,
            requested: quantity,
        });
    }

    let mut needed = quantity;
    let mut plan = Vec::new();
    for batch in &active {
        if needed == 0 {
            break;
        }
        let take = batch.remaining.min(needed);
        plan.push(Allocation {
            batch_id: batch.id,
            quantity: take,
        });
        needed -= take;
    }

    Ok(plan)
}

/// Sum of an allocation plan.
pub fn allocated_total(plan: &[Allocation]) -> i64 {
    plan.iter().map(|a| a.quantity).sum()
}

// =============================================================================
// Aggregate View
// =============================================================================

/// Sum of remaining quantities; 0 when there are no batches.
pub fn total_stock(batches: &[Batch]) -> i64 {
    batches.iter().map(|b| b.remaining.max(0)).sum()
}

/// Earliest expiry among batches that still hold stock.
pub fn nearest_expiry(batches: &[Batch]) -> Option<NaiveDate> {
    batches
        .iter()
        .filter(|b| b.is_active())
        .map(|b| b.expiry_date)
        .min()
}

/// Low stock means at or below the threshold.
#[inline]
pub fn is_low_stock(total: i64, min_stock: i64) -> bool {
    total <= min_stock
}

/// Any active batch expires in `[today, today + days]`.
pub fn is_expiring_within(batches: &[Batch], today: NaiveDate, days: u32) -> bool {
    batches.iter().any(|b| b.expires_within(today, days))
}

/// Any active batch is past its expiry date.
pub fn is_expired(batches: &[Batch], today: NaiveDate) -> bool {
    batches.iter().any(|b| b.is_expired(today))
}

/// Builds the stock summary for one product.
///
/// `batches` must all belong to `product`.
pub fn summarize(
    product: &Product,
    batches: &[Batch],
    today: NaiveDate,
    expiring_window_days: u32,
) -> ProductStock {
    let total = total_stock(batches);
    ProductStock {
        product_id: product.id.clone(),
        name: product.name.clone(),
        total,
        min_stock: product.min_stock,
        nearest_expiry: nearest_expiry(batches),
        low_stock: is_low_stock(total, product.min_stock),
        expiring_soon: is_expiring_within(batches, today, expiring_window_days),
        expired: is_expired(batches, today),
    }
}

/// Sorts summaries into the three dashboard lists.
///
/// A product appears in every list whose flag it carries.
pub fn build_alerts(summaries: impl IntoIterator<Item = ProductStock>, today: NaiveDate) -> StockAlerts {
    let mut alerts = StockAlerts {
        generated_for: Some(today),
        ..StockAlerts::default()
    };

    for summary in summaries {
        if summary.low_stock {
            alerts.low_stock.push(summary.clone());
        }
        if summary.expiring_soon {
            alerts.expiring.push(summary.clone());
        }
        if summary.expired {
            alerts.expired.push(summary);
        }
    }

    alerts.expiring.sort_by_key(|s| s.nearest_expiry);
    alerts
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn batch(id: i64, remaining: i64, expiry: NaiveDate) -> Batch {
        Batch {
            id,
            product_id: "X".to_string(),
            batch_code: None,
            remaining,
            expiry_date: expiry,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn product(min_stock: i64) -> Product {
        Product {
            id: "X".to_string(),
            name: "Amoxicillin 500mg".to_string(),
            category: "Antibiotic".to_string(),
            unit: "capsule".to_string(),
            min_stock,
            unit_price_cents: 250,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn scenario_batches() -> Vec<Batch> {
        vec![
            batch(2, 10, day(2025, 2, 1)),
            batch(1, 5, day(2025, 1, 10)),
        ]
    }

    #[test]
    fn test_plan_spans_batches_in_expiry_order() {
        let plan = plan_fefo("X", &scenario_batches(), 7).unwrap();
        assert_eq!(
            plan,
            vec![
                Allocation { batch_id: 1, quantity: 5 },
                Allocation { batch_id: 2, quantity: 2 },
            ]
        );
    }

    #[test]
    fn test_plan_rejects_more_than_available() {
        let err = plan_fefo("X", &scenario_batches(), 20).unwrap_err();
        match err {
            CoreError::InsufficientStock { available, requested, .. } => {
                assert_eq!(available, 15);
                assert_eq!(requested, 20);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_plan_exact_total_drains_everything() {
        let plan = plan_fefo("X", &scenario_batches(), 15).unwrap();
        assert_eq!(allocated_total(&plan), 15);
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn test_single_covering_batch_only_touches_that_batch() {
        let plan = plan_fefo("X", &scenario_batches(), 3).unwrap();
        assert_eq!(plan, vec![Allocation { batch_id: 1, quantity: 3 }]);
    }

    #[test]
    fn test_expiry_ties_break_by_insertion_order() {
        let same_day = day(2025, 3, 1);
        let batches = vec![batch(9, 4, same_day), batch(3, 4, same_day)];
        let plan = plan_fefo("X", &batches, 6).unwrap();
        assert_eq!(plan[0], Allocation { batch_id: 3, quantity: 4 });
        assert_eq!(plan[1], Allocation { batch_id: 9, quantity: 2 });
    }

    #[test]
    fn test_exhausted_batches_are_skipped() {
        let batches = vec![batch(1, 0, day(2024, 1, 1)), batch(2, 5, day(2025, 1, 1))];
        let plan = plan_fefo("X", &batches, 2).unwrap();
        assert_eq!(plan, vec![Allocation { batch_id: 2, quantity: 2 }]);
    }

    #[test]
    fn test_non_positive_quantity_rejected() {
        assert!(matches!(
            plan_fefo("X", &scenario_batches(), 0),
            Err(CoreError::InvalidQuantity { quantity: 0 })
        ));
        assert!(matches!(
            plan_fefo("X", &scenario_batches(), -3),
            Err(CoreError::InvalidQuantity { quantity: -3 })
        ));
    }

    #[test]
    fn test_every_quantity_is_allocated_exactly_and_fefo() {
        let batches = vec![
            batch(1, 3, day(2025, 5, 1)),
            batch(2, 7, day(2025, 1, 1)),
            batch(3, 2, day(2025, 3, 1)),
        ];
        for q in 1..=12 {
            let plan = plan_fefo("X", &batches, q).unwrap();
            assert_eq!(allocated_total(&plan), q);
            // Every batch except the last one in the plan is fully drained
            for alloc in &plan[..plan.len() - 1] {
                let source = batches.iter().find(|b| b.id == alloc.batch_id).unwrap();
                assert_eq!(alloc.quantity, source.remaining);
            }
            // Walk order follows expiry
            let expiries: Vec<_> = plan
                .iter()
                .map(|a| batches.iter().find(|b| b.id == a.batch_id).unwrap().expiry_date)
                .collect();
            assert!(expiries.windows(2).all(|w| w[0] <= w[1]));
        }
        assert!(plan_fefo("X", &batches, 13).is_err());
    }

    #[test]
    fn test_aggregates_without_batches() {
        assert_eq!(total_stock(&[]), 0);
        assert_eq!(nearest_expiry(&[]), None);
        // Scenario 3: no batches, min_stock > 0 is low
        assert!(is_low_stock(0, 5));
        assert!(is_low_stock(0, 0));
    }

    #[test]
    fn test_nearest_expiry_ignores_exhausted() {
        let batches = vec![batch(1, 0, day(2024, 1, 1)), batch(2, 5, day(2025, 6, 1))];
        assert_eq!(nearest_expiry(&batches), Some(day(2025, 6, 1)));
    }

    #[test]
    fn test_summary_flags_are_independent() {
        let today = day(2025, 1, 1);
        let batches = vec![batch(1, 2, day(2025, 1, 15)), batch(2, 1, day(2024, 12, 1))];
        let summary = summarize(&product(10), &batches, today, 30);
        assert_eq!(summary.total, 3);
        assert!(summary.low_stock);
        assert!(summary.expiring_soon);
        assert!(summary.expired);
        assert_eq!(summary.nearest_expiry, Some(day(2024, 12, 1)));

        let alerts = build_alerts(vec![summary], today);
        assert_eq!(alerts.alert_count(), 3);
        assert_eq!(alerts.generated_for, Some(today));
    }
}
