//! Helpers for reading values out of server records
//!
//! The server encodes "no value" as `false` for every field type, so a plain
//! serde derive cannot tell an empty char field from a missing one.

use rust_decimal::Decimal;
use serde_json::Value;

/// Read a char/selection field, mapping `false`, `null` and blank strings to `None`
pub fn field_str(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Read a numeric field as a `Decimal`
pub fn field_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Decimal::from(i))
            } else {
                n.as_f64().and_then(|f| Decimal::try_from(f).ok())
            }
        }
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Read a positive integer identifier
pub fn field_id(value: &Value) -> Option<i64> {
    value.as_i64().filter(|id| *id > 0)
}

/// Look up `key` in a record, returning `Value::Null` when absent
pub fn record_field<'a>(record: &'a Value, key: &str) -> &'a Value {
    record.get(key).unwrap_or(&Value::Null)
}
