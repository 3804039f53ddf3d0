//! # Validation Module
//!
//! Input validation for stock operations and catalog records.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: THIS MODULE                                                  │
//! │  ├── Quantities, thresholds, prices                                    │
//! │  └── Names, batch codes, actors                                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Stock rules (stock.rs / repositories)                        │
//! │  ├── InsufficientStock, NegativeStock, NonEmptyBatch                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (remaining >= 0)                                            │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use apotheca_core::validation::{validate_batch_code, validate_min_stock};
//!
//! validate_min_stock(10).unwrap();
//! validate_batch_code("LOT-2025-01").unwrap();
//! ```

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::Product;
use crate::MAX_LINE_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

fn validate_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Product name: required, at most 200 characters.
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    validate_text("name", name, 200)
}

/// Category and unit labels: required, at most 50 characters.
pub fn validate_label(field: &str, value: &str) -> ValidationResult<()> {
    validate_text(field, value, 50)
}

/// Who performed a stock change: required, at most 100 characters.
pub fn validate_actor(actor: &str) -> ValidationResult<()> {
    validate_text("actor", actor, 100)
}

/// Validates a supplier lot label.
///
/// ## Rules
/// - 1 to 50 characters
/// - Letters, digits, `-`, `_`, `/` and `.` only
///
/// ## Example
/// ```rust
/// use apotheca_core::validation::validate_batch_code;
///
/// assert!(validate_batch_code("AMX/2025.01").is_ok());
/// assert!(validate_batch_code("has space").is_err());
/// ```
pub fn validate_batch_code(code: &str) -> ValidationResult<()> {
    validate_text("batch_code", code, 50)?;

    if !code
        .trim()
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '/' | '.'))
    {
        return Err(ValidationError::InvalidFormat {
            field: "batch_code".to_string(),
            reason: "must contain only letters, numbers, '-', '_', '/' and '.'".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Quantity for receipts and issuance.
///
/// Non-positive values surface as [`CoreError::InvalidQuantity`], the kind
/// callers match on.
pub fn validate_quantity(quantity: i64) -> CoreResult<()> {
    if quantity <= 0 {
        return Err(CoreError::invalid_quantity(quantity));
    }

    if quantity > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        }
        .into());
    }

    Ok(())
}

/// Signed delta for a manual batch adjustment.
///
/// Bounded like a receipt so the stored quantity cannot overflow.
pub fn validate_adjustment_delta(delta: i64) -> ValidationResult<()> {
    if !(-MAX_LINE_QUANTITY..=MAX_LINE_QUANTITY).contains(&delta) {
        return Err(ValidationError::OutOfRange {
            field: "delta".to_string(),
            min: -MAX_LINE_QUANTITY,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Minimum-stock threshold must be >= 0.
pub fn validate_min_stock(min_stock: i64) -> ValidationResult<()> {
    if min_stock < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "min_stock".to_string(),
        });
    }

    Ok(())
}

/// Price in cents must be >= 0 (free samples are allowed).
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "unit_price".to_string(),
        });
    }

    Ok(())
}

/// Validates a UUID string.
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

/// Validates every field of a product before it is stored.
pub fn validate_product(product: &Product) -> ValidationResult<()> {
    validate_uuid("id", &product.id)?;
    validate_product_name(&product.name)?;
    validate_label("category", &product.category)?;
    validate_label("unit", &product.unit)?;
    validate_min_stock(product.min_stock)?;
    validate_price_cents(product.unit_price_cents)?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_batch_code() {
        assert!(validate_batch_code("LOT-1").is_ok());
        assert!(validate_batch_code("AMX/2025.01_b").is_ok());

        assert!(validate_batch_code("").is_err());
        assert!(validate_batch_code("lot 1").is_err());
        assert!(validate_batch_code(&"A".repeat(51)).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_LINE_QUANTITY).is_ok());

        assert!(matches!(
            validate_quantity(0),
            Err(CoreError::InvalidQuantity { quantity: 0 })
        ));
        assert!(matches!(
            validate_quantity(-3),
            Err(CoreError::InvalidQuantity { quantity: -3 })
        ));
        assert!(matches!(
            validate_quantity(MAX_LINE_QUANTITY + 1),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_adjustment_delta() {
        assert!(validate_adjustment_delta(0).is_ok());
        assert!(validate_adjustment_delta(-MAX_LINE_QUANTITY).is_ok());
        assert!(validate_adjustment_delta(MAX_LINE_QUANTITY).is_ok());
        assert!(validate_adjustment_delta(MAX_LINE_QUANTITY + 1).is_err());
        assert!(validate_adjustment_delta(i64::MAX).is_err());
        assert!(validate_adjustment_delta(i64::MIN).is_err());
    }

    #[test]
    fn test_validate_min_stock() {
        assert!(validate_min_stock(0).is_ok());
        assert!(validate_min_stock(25).is_ok());
        assert!(validate_min_stock(-1).is_err());
    }

    #[test]
    fn test_validate_labels_and_actor() {
        assert!(validate_label("unit", "tablet").is_ok());
        assert!(validate_label("unit", "  ").is_err());
        assert!(validate_actor("pharmacist-01").is_ok());
        assert!(validate_actor("").is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("id", "").is_err());
        assert!(validate_uuid("id", "not-a-uuid").is_err());
    }
}
