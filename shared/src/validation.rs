//! Validation utilities for filter input

use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::{FilterKey, FilterSet};

/// Tolerance applied around a thickness filter value
pub fn thickness_tolerance() -> Decimal {
    Decimal::new(1, 1)
}

/// Errors raised by filter validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("filter `{key}` expects a number, got `{value}`")]
    InvalidNumber { key: FilterKey, value: String },

    #[error("filter `{key}` must not be negative")]
    Negative { key: FilterKey },

    #[error("unknown filter `{0}`")]
    UnknownKey(String),
}

/// Parse a numeric filter value the way the inventory query does
pub fn parse_dimension(value: &str) -> Option<Decimal> {
    let parsed: f64 = value.trim().parse().ok()?;
    if !parsed.is_finite() {
        return None;
    }
    Decimal::try_from(parsed).ok()
}

/// Check numeric filters; text filters are always valid.
///
/// Invalid numeric filters are skipped by the query rather than rejected, so
/// this only exists to flag them next to the input.
pub fn validate_filters(filters: &FilterSet) -> Result<(), FilterError> {
    for (key, value) in filters.active().filter(|(key, _)| key.is_numeric()) {
        let number = parse_dimension(value).ok_or_else(|| FilterError::InvalidNumber {
            key,
            value: value.to_string(),
        })?;
        if number < Decimal::ZERO {
            return Err(FilterError::Negative { key });
        }
    }
    Ok(())
}
