//! # Cart
//!
//! A shopping cart is a plain product id → quantity mapping. It carries no
//! stock guarantees: stock is only checked when the cart is turned into order
//! lines and issued.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::OrderLine;
use crate::MAX_LINE_QUANTITY;

/// Transient cart keyed by product id.
///
/// ## Invariants
/// - Every stored quantity is in `1..=MAX_LINE_QUANTITY`
/// - Setting a quantity to 0 removes the line
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: BTreeMap<String, i64>,
}

impl Cart {
    pub fn new() -> Self {
        Cart::default()
    }

    /// Adds units, merging with an existing line.
    pub fn add(&mut self, product_id: &str, quantity: i64) -> CoreResult<()> {
        if quantity <= 0 {
            return Err(CoreError::invalid_quantity(quantity));
        }
        let current = self.lines.get(product_id).copied().unwrap_or(0);
        let merged = current + quantity;
        if merged > MAX_LINE_QUANTITY {
            return Err(CoreError::invalid_quantity(merged));
        }
        self.lines.insert(product_id.to_string(), merged);
        Ok(())
    }

    /// Replaces the quantity of a line; 0 removes it.
    pub fn set(&mut self, product_id: &str, quantity: i64) -> CoreResult<()> {
        if quantity == 0 {
            self.lines.remove(product_id);
            return Ok(());
        }
        if !(1..=MAX_LINE_QUANTITY).contains(&quantity) {
            return Err(CoreError::invalid_quantity(quantity));
        }
        self.lines.insert(product_id.to_string(), quantity);
        Ok(())
    }

    pub fn remove(&mut self, product_id: &str) -> bool {
        self.lines.remove(product_id).is_some()
    }

    pub fn quantity_of(&self, product_id: &str) -> i64 {
        self.lines.get(product_id).copied().unwrap_or(0)
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of distinct products.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Order lines in product id order, ready for issuance.
    pub fn to_order_lines(&self) -> Vec<OrderLine> {
        self.lines
            .iter()
            .map(|(id, qty)| OrderLine::new(id.clone(), *qty))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_merges_lines() {
        let mut cart = Cart::new();
        cart.add("para", 2).unwrap();
        cart.add("para", 3).unwrap();
        cart.add("amox", 1).unwrap();

        assert_eq!(cart.quantity_of("para"), 5);
        assert_eq!(cart.line_count(), 2);
    }

    #[test]
    fn test_set_zero_removes_line() {
        let mut cart = Cart::new();
        cart.add("para", 2).unwrap();
        cart.set("para", 0).unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_rejects_bad_quantities() {
        let mut cart = Cart::new();
        assert!(cart.add("para", 0).is_err());
        assert!(cart.set("para", -1).is_err());
        assert!(cart.add("para", MAX_LINE_QUANTITY + 1).is_err());
        assert!(cart.is_empty());
    }

    #[test]
    fn test_order_lines_are_sorted_by_product() {
        let mut cart = Cart::new();
        cart.add("zinc", 1).unwrap();
        cart.add("amox", 4).unwrap();
        let lines = cart.to_order_lines();
        assert_eq!(lines[0], OrderLine::new("amox", 4));
        assert_eq!(lines[1], OrderLine::new("zinc", 1));
    }
}
