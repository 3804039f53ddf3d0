//! # Alert Cache
//!
//! Read-through cache for dashboard stock alerts.
//!
//! The alert scan touches every product, so the dashboard serves a cached
//! copy for a bounded time. The cache is an explicit value handed to the
//! [`StockRepository`](crate::StockRepository), never process-global, and
//! [`AlertCache::disabled`] turns it off for tests.
//!
//! ```text
//! alerts(today) ──► entry for `today` still fresh? ──yes──► cached copy
//!                         │ no
//!                         ▼
//!                   load() ──► store(today, expires_at) ──► fresh copy
//! ```
//!
//! Any stock mutation calls [`AlertCache::invalidate`].

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use apotheca_core::StockAlerts;
use chrono::NaiveDate;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::DbResult;

#[derive(Debug, Clone)]
struct CacheEntry {
    day: NaiveDate,
    alerts: StockAlerts,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_fresh_for(&self, day: NaiveDate) -> bool {
        self.day == day && Instant::now() < self.expires_at
    }
}

/// Shared, TTL-bounded cache of one day's alerts.
///
/// Cloning shares the same underlying entry.
#[derive(Debug, Clone)]
pub struct AlertCache {
    ttl: Option<Duration>,
    entry: Arc<RwLock<Option<CacheEntry>>>,
}

impl AlertCache {
    /// Cache with the given lifetime; `None` disables caching.
    pub fn new(ttl: Option<Duration>) -> Self {
        AlertCache {
            ttl: ttl.filter(|d| !d.is_zero()),
            entry: Arc::new(RwLock::new(None)),
        }
    }

    /// Always calls through to the loader.
    pub fn disabled() -> Self {
        AlertCache::new(None)
    }

    pub fn is_enabled(&self) -> bool {
        self.ttl.is_some()
    }

    /// Returns the cached alerts for `day`, or runs `load` and caches the result.
    ///
    /// Loader errors are returned as-is and nothing is cached.
    pub async fn get_or_load<F, Fut>(&self, day: NaiveDate, load: F) -> DbResult<StockAlerts>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = DbResult<StockAlerts>>,
    {
        let Some(ttl) = self.ttl else {
            return load().await;
        };

        if let Some(entry) = self.entry.read().await.as_ref() {
            if entry.is_fresh_for(day) {
                debug!(%day, "Alert cache hit");
                return Ok(entry.alerts.clone());
            }
        }

        debug!(%day, "Alert cache miss");
        let alerts = load().await?;

        *self.entry.write().await = Some(CacheEntry {
            day,
            alerts: alerts.clone(),
            expires_at: Instant::now() + ttl,
        });

        Ok(alerts)
    }

    /// Drops the cached entry.
    pub async fn invalidate(&self) {
        if self.is_enabled() {
            *self.entry.write().await = None;
        }
    }
}

impl Default for AlertCache {
    fn default() -> Self {
        AlertCache::disabled()
    }
}
