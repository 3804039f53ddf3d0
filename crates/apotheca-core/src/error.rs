//! # Error Types
//!
//! Domain-specific error types for apotheca-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  apotheca-core errors (this file)                                      │
//! │  ├── CoreError        - Stock rule violations                          │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  apotheca-db errors (separate crate)                                   │
//! │  └── DbError          - Wraps CoreError + database failures            │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → caller                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Recoverability
//! | Variant                  | Caller action                               |
//! |--------------------------|---------------------------------------------|
//! | `InsufficientStock`      | Reject the sale, show available quantity    |
//! | `ConcurrentModification` | Retry the whole `issue` call                |
//! | `NegativeStock`          | Data-integrity / programming error          |
//! | `NonEmptyBatch`          | Adjust the batch to zero first              |
//! | `BatchNotFound`          | Stale id from the caller                    |

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Stock rule violations.
///
/// None of these are fatal: each one rejects a single operation and leaves
/// the stored quantities exactly as they were before the call.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A quantity that must be positive was zero or negative.
    #[error("Invalid quantity: {quantity} (must be greater than zero)")]
    InvalidQuantity { quantity: i64 },

    /// Requested issuance exceeds the total remaining across all batches.
    ///
    /// ## User Workflow
    /// ```text
    /// Checkout line: Amoxicillin 500mg × 20
    ///      │
    ///      ▼
    /// Active batches: B1=5, B2=10  (total 15)
    ///      │
    ///      ▼
    /// InsufficientStock { available: 15, requested: 20 }
    ///      │
    ///      ▼
    /// Sale rejected, no batch touched
    /// ```
    #[error("Insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// An adjustment would take a batch below zero.
    #[error("Batch {batch_id} cannot go negative: remaining {remaining}, delta {delta}")]
    NegativeStock {
        batch_id: i64,
        remaining: i64,
        delta: i64,
    },

    /// Only exhausted batches may be deleted.
    #[error("Batch {batch_id} still holds {remaining} units and cannot be deleted")]
    NonEmptyBatch { batch_id: i64, remaining: i64 },

    /// Batch id is unknown.
    #[error("Batch not found: {0}")]
    BatchNotFound(i64),

    /// Product id is unknown.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Another issuance changed the selected batches mid-walk.
    ///
    /// The whole operation was rolled back; retrying is safe.
    #[error("Stock for product {product_id} changed concurrently, retry the operation")]
    ConcurrentModification { product_id: String },

    /// An order with no lines was submitted for issuance.
    #[error("Order has no lines to issue")]
    EmptyOrder,

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Shorthand for [`CoreError::InvalidQuantity`].
    pub fn invalid_quantity(quantity: i64) -> Self {
        CoreError::InvalidQuantity { quantity }
    }

    /// True when retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::ConcurrentModification { .. })
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any stock rule runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid UUID, bad batch code).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
