//! Validation utilities for Agroledger
//!
//! Boundary checks applied before any persistent write.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::Buyer;

/// A validation failure tied to a specific input field
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

// ============================================================================
// General Validations
// ============================================================================

/// Largest quantity, price or amount accepted from a caller.
///
/// Keeps every product and sum the models derive well inside `Decimal`'s range.
pub const MAX_AMOUNT: u64 = 1_000_000_000_000;

/// Validate a quantity, price or amount: not negative and at most [`MAX_AMOUNT`]
pub fn validate_amount(field: &str, value: Decimal) -> Result<(), FieldError> {
    if value < Decimal::ZERO {
        return Err(FieldError::new(field, "must not be negative"));
    }
    if value > Decimal::from(MAX_AMOUNT) {
        return Err(FieldError::new(
            field,
            format!("must not exceed {}", MAX_AMOUNT),
        ));
    }
    Ok(())
}

/// Validate a required descriptive text field
pub fn validate_required_text(field: &str, value: &str) -> Result<(), FieldError> {
    if value.trim().is_empty() {
        return Err(FieldError::new(field, "is required"));
    }
    Ok(())
}

// ============================================================================
// Sale Validations
// ============================================================================

/// Validate a sale's buyer list.
///
/// Each buyer is checked individually before any totals are computed.
pub fn validate_buyers(buyers: &[Buyer]) -> Result<(), FieldError> {
    if buyers.is_empty() {
        return Err(FieldError::new("buyers", "at least one buyer is required"));
    }

    for (i, buyer) in buyers.iter().enumerate() {
        validate_required_text(&format!("buyers[{}].name", i), &buyer.name)?;
        validate_amount(&format!("buyers[{}].quantity", i), buyer.quantity)?;
        validate_amount(&format!("buyers[{}].amount_paid", i), buyer.amount_paid)?;
    }
    Ok(())
}

// ============================================================================
// Notarization Validations
// ============================================================================

/// Convert a live value into the ledger's integral representation
pub fn to_ledger_units(field: &str, value: Decimal) -> Result<u64, FieldError> {
    if !value.fract().is_zero() {
        return Err(FieldError::new(
            field,
            "must be a whole number to be notarized",
        ));
    }
    value
        .to_u64()
        .ok_or_else(|| FieldError::new(field, "is out of range for the ledger"))
}

/// Check an item may be notarized and return the `(price, quantity)` pair
/// to submit
pub fn validate_publishable(
    price_per_unit: Decimal,
    quantity: Decimal,
) -> Result<(u64, u64), FieldError> {
    if price_per_unit <= Decimal::ZERO {
        return Err(FieldError::new(
            "price_per_unit",
            "must be greater than zero to publish",
        ));
    }
    if quantity <= Decimal::ZERO {
        return Err(FieldError::new(
            "quantity",
            "must be greater than zero to publish",
        ));
    }

    let price = to_ledger_units("price_per_unit", price_per_unit)?;
    let quantity = to_ledger_units("quantity", quantity)?;
    Ok((price, quantity))
}
