//! Validation utilities shared by the workflow services and request bodies

use rust_decimal::Decimal;
use validator::ValidationError;

// ============================================================================
// Business Validations
// ============================================================================

/// Quantities and prices must be strictly positive
pub fn validate_positive(value: Decimal) -> Result<(), &'static str> {
    if value <= Decimal::ZERO {
        return Err("Value must be greater than zero");
    }
    Ok(())
}

/// Decimal places stored for quantities
pub const QUANTITY_SCALE: u32 = 3;
/// Decimal places stored for unit prices
pub const PRICE_SCALE: u32 = 2;

/// Reject values with more decimal places than the column stores
pub fn validate_scale(value: Decimal, max_scale: u32) -> Result<(), &'static str> {
    if value.normalize().scale() > max_scale {
        return Err("Value has too many decimal places");
    }
    Ok(())
}

/// Required free text must contain something other than whitespace
pub fn validate_required_text(value: &str) -> Result<(), &'static str> {
    if value.trim().is_empty() {
        return Err("Value is required");
    }
    Ok(())
}

/// Phone numbers: digits with optional leading '+', spaces and dashes allowed
pub fn validate_phone(phone: &str) -> Result<(), &'static str> {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    let allowed = phone
        .chars()
        .enumerate()
        .all(|(i, c)| c.is_ascii_digit() || c == ' ' || c == '-' || (i == 0 && c == '+'));
    if !allowed {
        return Err("Phone number contains invalid characters");
    }
    if digits.len() < 6 || digits.len() > 15 {
        return Err("Phone number must contain between 6 and 15 digits");
    }
    Ok(())
}

/// Trim optional text, turning blank strings into `None`
pub fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ============================================================================
// `validator` Adapters
// ============================================================================

pub fn positive_decimal(value: &Decimal) -> Result<(), ValidationError> {
    validate_positive(*value).map_err(|msg| {
        let mut err = ValidationError::new("positive");
        err.message = Some(msg.into());
        err
    })
}

pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    validate_required_text(value).map_err(|msg| {
        let mut err = ValidationError::new("required");
        err.message = Some(msg.into());
        err
    })
}

pub fn phone_number(value: &str) -> Result<(), ValidationError> {
    validate_phone(value).map_err(|msg| {
        let mut err = ValidationError::new("phone");
        err.message = Some(msg.into());
        err
    })
}
