// Lenient readers for loosely-typed report fields.

use serde_json::Value;

/// Reads a field used as a map key (interface name, radio phy). Non-string scalars are
/// stringified; null counts as absent.
pub(crate) fn key_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Reads an unsigned counter or channel number. Accepts unsigned integers, non-negative floats
/// (truncated) and numeric strings.
pub(crate) fn unsigned(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
