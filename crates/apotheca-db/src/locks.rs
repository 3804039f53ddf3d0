//! # Product Locks
//!
//! In-process critical sections for issuance, one per product.
//!
//! ## Why Both a Lock and a Guarded UPDATE?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  issue(P, 7) on task A            issue(P, 5) on task B                │
//! │       │                                │                                │
//! │  lock(P) ✓                        lock(P) … waits                      │
//! │  read batches, plan, decrement         │                                │
//! │  commit, unlock(P) ───────────────► lock(P) ✓                          │
//! │                                   read batches (sees A's writes)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The lock serializes issuers inside this process. The guarded
//! `UPDATE ... WHERE remaining >= ?` in the issuer still catches writers the
//! lock cannot see (another process on the same database file) and turns them
//! into `ConcurrentModification` instead of a negative balance.
//!
//! Issuance on different products never contends. A product's slot is
//! dropped from the registry once its last guard goes and nobody is waiting,
//! so the map only holds products with an issuance in flight.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Registry = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

fn lock_registry(registry: &Registry) -> MutexGuard<'_, HashMap<String, Arc<AsyncMutex<()>>>> {
    match registry.lock() {
        Ok(map) => map,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Registry of per-product async mutexes.
#[derive(Debug, Clone, Default)]
pub struct ProductLocks {
    inner: Registry,
}

/// Held for the duration of one product's critical section.
///
/// Dropping it releases the product and evicts the slot if it is idle.
#[derive(Debug)]
pub struct ProductGuard {
    guard: Option<OwnedMutexGuard<()>>,
    registry: Registry,
    product_id: String,
}

impl ProductGuard {
    pub fn product_id(&self) -> &str {
        &self.product_id
    }
}

impl Drop for ProductGuard {
    fn drop(&mut self) {
        // Release first so this guard's own Arc no longer counts.
        drop(self.guard.take());

        let mut map = lock_registry(&self.registry);
        let idle = map
            .get(&self.product_id)
            .is_some_and(|slot| Arc::strong_count(slot) == 1);
        if idle {
            map.remove(&self.product_id);
        }
    }
}

impl ProductLocks {
    pub fn new() -> Self {
        ProductLocks::default()
    }

    fn slot(&self, product_id: &str) -> Arc<AsyncMutex<()>> {
        // The registry mutex is only held for the map lookup, never across an await.
        let mut map = lock_registry(&self.inner);
        map.entry(product_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Waits for exclusive access to one product.
    pub async fn lock(&self, product_id: &str) -> ProductGuard {
        let guard = self.slot(product_id).lock_owned().await;
        ProductGuard {
            guard: Some(guard),
            registry: Arc::clone(&self.inner),
            product_id: product_id.to_string(),
        }
    }

    /// Locks several products in sorted, de-duplicated order.
    ///
    /// Every caller acquires in the same order, so two orders sharing
    /// products cannot deadlock.
    pub async fn lock_many<'a>(
        &self,
        product_ids: impl IntoIterator<Item = &'a str>,
    ) -> Vec<ProductGuard> {
        let mut ids: Vec<&str> = product_ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();

        let mut guards = Vec::with_capacity(ids.len());
        for id in ids {
            guards.push(self.lock(id).await);
        }
        guards
    }

    /// Number of products currently locked or waited on.
    pub fn len(&self) -> usize {
        lock_registry(&self.inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_product_is_exclusive() {
        let locks = ProductLocks::new();
        let guard = locks.lock("p1").await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.lock("p1").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn test_different_products_do_not_contend() {
        let locks = ProductLocks::new();
        let _a = locks.lock("p1").await;
        let _b = tokio::time::timeout(Duration::from_millis(100), locks.lock("p2"))
            .await
            .expect("p2 must not wait on p1");
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_lock_many_dedups() {
        let locks = ProductLocks::new();
        let guards = locks.lock_many(["b", "a", "b"]).await;
        assert_eq!(guards.len(), 2);
        assert_eq!(guards[0].product_id(), "a");
        assert_eq!(guards[1].product_id(), "b");
    }

    #[tokio::test]
    async fn test_released_slots_are_evicted() {
        let locks = ProductLocks::new();
        for n in 0..1_000 {
            let _guard = locks.lock(&format!("product-{n}")).await;
        }
        assert!(locks.is_empty());

        let guards = locks.lock_many(["x", "y"]).await;
        assert_eq!(locks.len(), 2);
        drop(guards);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_slot_survives_while_waited_on() {
        let locks = ProductLocks::new();
        let first = locks.lock("p1").await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.lock("p1").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        // The waiter still references the slot, so it stays registered.
        drop(first);
        assert_eq!(locks.len(), 1);

        waiter.await.unwrap();
        assert!(locks.is_empty());
    }
}
