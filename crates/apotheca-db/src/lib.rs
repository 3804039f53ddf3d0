//! # apotheca-db: Stock Storage for Apotheca POS
//!
//! SQLite persistence for medicine batches, the stock ledger and FEFO
//! issuance, built on sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Apotheca POS Data Flow                             │
//! │                                                                         │
//! │  Checkout / stock screen / dashboard                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   apotheca-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │  │   │
//! │  │   │               │    │ ProductRepo    │    │ 001_init.sql │  │   │
//! │  │   │ SqlitePool    │◄───│ BatchRepo      │    │              │  │   │
//! │  │   │ AlertCache    │    │ MovementRepo   │    │              │  │   │
//! │  │   │ ProductLocks  │    │ StockRepo      │    │              │  │   │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`config`] - Stock engine settings (TOML + environment)
//! - [`cache`] - Dashboard alert cache
//! - [`locks`] - Per-product issuance locks
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Product, batch, movement and stock repositories
//!
//! ## Usage
//!
//! ```rust,ignore
//! use apotheca_db::{Database, DbConfig, InventoryConfig};
//!
//! let config = DbConfig::new("path/to/apotheca.db").inventory(InventoryConfig::load(None)?);
//! let db = Database::new(config).await?;
//!
//! db.batches().receive(&product_id, 100, expiry, Some("LOT-7"), "clerk").await?;
//! let plan = db.stock().issue(&product_id, 12, Some("SALE-42"), "cashier").await?;
//! let alerts = db.stock().alerts(today).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cache;
pub mod config;
pub mod error;
pub mod locks;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use cache::AlertCache;
pub use config::InventoryConfig;
pub use error::{DbError, DbResult};
pub use locks::ProductLocks;
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::{BatchRepository, MovementRepository, ProductRepository, StockRepository};
