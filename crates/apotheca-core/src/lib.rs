//! # apotheca-core: Pure Stock Logic for Apotheca POS
//!
//! Batch-based pharmacy stock rules as pure functions with zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Apotheca POS Architecture                         │
//! │                                                                         │
//! │  Checkout ─┐   Stock screens ─┐   Dashboard ─┐                          │
//! │            ▼                  ▼              ▼                          │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  apotheca-db (Database Layer)                   │   │
//! │  │   BatchRepository · MovementRepository · StockRepository       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ uses                                   │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ apotheca-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   stock   │  │   cart    │  │ validation│  │   │
//! │  │   │  Batch    │  │  FEFO     │  │  id→qty   │  │   rules   │  │   │
//! │  │   │  Movement │  │  totals   │  │           │  │           │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Batch, Movement, ...)
//! - [`stock`] - FEFO planner and aggregate stock view
//! - [`cart`] - Transient product → quantity cart
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use apotheca_core::stock::plan_fefo;
//! use apotheca_core::{Allocation, Batch};
//! use chrono::{NaiveDate, Utc};
//!
//! let batch = |id, remaining, day| Batch {
//!     id,
//!     product_id: "X".to_string(),
//!     batch_code: None,
//!     remaining,
//!     expiry_date: NaiveDate::from_ymd_opt(2025, 1, day).unwrap(),
//!     created_at: Utc::now(),
//!     updated_at: Utc::now(),
//! };
//!
//! let plan = plan_fefo("X", &[batch(2, 10, 20), batch(1, 5, 10)], 7).unwrap();
//! assert_eq!(plan[0], Allocation { batch_id: 1, quantity: 5 });
//! assert_eq!(plan[1], Allocation { batch_id: 2, quantity: 2 });
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod stock;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::Cart;
pub use error::{CoreError, CoreResult, ValidationError};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Largest quantity accepted for one receipt, issuance or cart line.
///
/// Catches typos such as 10000 instead of 100 at the counter.
pub const MAX_LINE_QUANTITY: i64 = 100_000;

/// Default "expiring soon" window used by the dashboard.
pub const DEFAULT_EXPIRING_WINDOW_DAYS: u32 = 30;

/// Widest configurable "expiring soon" window (ten years).
pub const MAX_EXPIRING_WINDOW_DAYS: u32 = 3_650;
