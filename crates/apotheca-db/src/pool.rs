//! # Database Pool Management
//!
//! Connection pool creation and configuration for SQLite.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Connection Pool                           │
//! │                                                                         │
//! │  DbConfig::new(path).inventory(cfg) ← Pool + stock engine settings     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await ← Create pool + run migrations            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                           │
//! │  │  SqlitePool   AlertCache   ProductLocks │  (shared by all handles)  │
//! │  └─────────────────────────────────────────┘                           │
//! │       │                                                                 │
//! │       ├──► db.products()   catalog rows                                │
//! │       ├──► db.batches()    receive / adjust / delete                   │
//! │       ├──► db.movements()  ledger reads                                │
//! │       └──► db.stock()      aggregates, alerts, FEFO issuance           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Writers
//! The file runs in WAL mode so alert scans and stock reads never wait on an
//! issuance. Writers still take turns: each write transaction starts with
//! `BEGIN IMMEDIATE` and waits up to `busy_timeout` for the write lock.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::cache::AlertCache;
use crate::config::InventoryConfig;
use crate::error::{DbError, DbResult};
use crate::locks::ProductLocks;
use crate::migrations;
use crate::repository::{BatchRepository, MovementRepository, ProductRepository, StockRepository};

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/path/to/apotheca.db")
///     .max_connections(5)
///     .inventory(InventoryConfig::load(None)?);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Default: 5
    pub max_connections: u32,

    pub min_connections: u32,

    /// Pool acquire timeout. Default: 30 seconds
    pub connect_timeout: Duration,

    pub idle_timeout: Duration,

    /// How long a writer waits for another writer's lock. Default: 5 seconds
    pub busy_timeout: Duration,

    pub run_migrations: bool,

    /// Stock engine settings (alert window, cache, retries, timeouts).
    pub inventory: InventoryConfig,
}

impl DbConfig {
    /// Configuration for a database file, created on first open.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
            inventory: InventoryConfig::default(),
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets how long a writer waits on a locked database.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Sets the stock engine settings.
    pub fn inventory(mut self, inventory: InventoryConfig) -> Self {
        self.inventory = inventory;
        self
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// The alert cache is off so every `alerts()` call sees fresh data.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1, // In-memory requires single connection
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
            inventory: InventoryConfig {
                alert_cache_ttl_secs: 0,
                ..InventoryConfig::default()
            },
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle providing repository access.
///
/// Cloning is cheap; clones share the pool, the alert cache and the
/// product locks, so issuance from any clone is serialized per product.
///
/// ## Usage
/// ```rust,ignore
/// let db = Database::new(DbConfig::new("./apotheca.db")).await?;
/// let batch = db.batches().receive(&product_id, 100, expiry, Some("LOT-7"), "clerk").await?;
/// let plan = db.stock().issue(&product_id, 12, Some("SALE-42"), "cashier").await?;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    /// The SQLite connection pool.
    pool: SqlitePool,

    /// Stock engine settings.
    inventory: InventoryConfig,

    /// Dashboard alert cache, invalidated by every stock mutation.
    alert_cache: AlertCache,

    /// Per-product issuance locks.
    locks: ProductLocks,
}

impl Database {
    /// Opens the pool and applies pending migrations.
    ///
    /// Fails with `DbError::Config` before touching the file when the
    /// inventory settings are out of range.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        config.inventory.validate()?;

        info!(
            path = %config.database_path.display(),
            "Initializing database connection"
        );

        let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());

        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            // A crash may lose the last commit but never corrupts the ledger.
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout)
            .create_if_missing(true);

        debug!("Connection options configured");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        let db = Database {
            pool,
            alert_cache: AlertCache::new(config.inventory.alert_cache_ttl()),
            inventory: config.inventory,
            locks: ProductLocks::new(),
        };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Applies pending schema migrations. Safe to call repeatedly.
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Running database migrations");
        migrations::run_migrations(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// Raw pool access. Quantity changes must still go through the repositories.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Stock engine settings in effect.
    pub fn inventory_config(&self) -> &InventoryConfig {
        &self.inventory
    }

    /// Returns the product repository.
    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone())
    }

    /// Returns the batch repository.
    pub fn batches(&self) -> BatchRepository {
        BatchRepository::new(self.pool.clone(), self.alert_cache.clone())
    }

    /// Returns the movement (ledger) repository.
    pub fn movements(&self) -> MovementRepository {
        MovementRepository::new(self.pool.clone())
    }

    /// Returns the stock repository.
    pub fn stock(&self) -> StockRepository {
        StockRepository::new(
            self.pool.clone(),
            self.inventory.clone(),
            self.alert_cache.clone(),
            self.locks.clone(),
        )
    }

    /// Closes the pool; later repository calls fail.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }

    /// True when the database answers a trivial query.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database() {
        let config = DbConfig::in_memory();
        let db = Database::new(config).await.unwrap();

        assert!(db.health_check().await);
    }

    #[tokio::test]
    async fn test_config_builder() {
        let config = DbConfig::new("/tmp/apotheca-test.db")
            .max_connections(10)
            .min_connections(2)
            .busy_timeout(Duration::from_millis(750));

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.busy_timeout, Duration::from_millis(750));
        assert_eq!(config.inventory, InventoryConfig::default());
    }

    #[tokio::test]
    async fn test_in_memory_disables_alert_cache() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert_eq!(db.inventory_config().alert_cache_ttl(), None);
        assert!(!db.alert_cache.is_enabled());
    }

    #[tokio::test]
    async fn test_clones_share_locks() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let other = db.clone();

        let guard = db.locks.lock("p1").await;
        assert_eq!(other.locks.len(), 1);
        drop(guard);
        assert!(other.locks.is_empty());
    }

    #[tokio::test]
    async fn test_out_of_range_inventory_is_rejected_on_open() {
        let config = DbConfig::in_memory().inventory(InventoryConfig {
            expiring_window_days: u32::MAX,
            ..InventoryConfig::default()
        });

        let err = Database::new(config).await.unwrap_err();
        assert!(matches!(err, DbError::Config(_)));
    }
}
