//! # Repository Module
//!
//! Database repositories for the stock engine.
//!
//! ## Repository Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  db.products()   ProductRepository   catalog rows, min_stock           │
//! │  db.batches()    BatchRepository     receive / adjust / delete / list  │
//! │  db.movements()  MovementRepository  append-only ledger                │
//! │  db.stock()      StockRepository     totals, alerts, FEFO issuance     │
//! │                                                                         │
//! │  Writes that change quantities go through batches() or stock(); both   │
//! │  append the ledger row inside the same transaction.                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Write transactions open with `BEGIN IMMEDIATE`. A deferred transaction
//! that reads first and then writes cannot wait out another writer under WAL:
//! SQLite fails its upgrade with `SQLITE_BUSY` straight away. Taking the write
//! lock up front lets `busy_timeout` queue writers instead.

use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::error::DbResult;

pub mod batch;
pub mod movement;
pub mod product;
pub mod stock;

pub use batch::BatchRepository;
pub use movement::MovementRepository;
pub use product::ProductRepository;
pub use stock::StockRepository;

/// Opens a transaction holding the database write lock from its first statement.
pub(crate) async fn begin_write(pool: &SqlitePool) -> DbResult<Transaction<'static, Sqlite>> {
    let tx = pool.begin_with("BEGIN IMMEDIATE").await?;
    Ok(tx)
}
