//! Lenient JSON helpers shared by the source translators.
//!
//! Upstream services are inconsistent about whether ids, scores and prices
//! arrive as JSON strings (`"39"`, `"1.95"`) or native numbers. These helpers
//! accept both.

use serde_json::Value;

/// Render an id-like value (string or number) as a string.
#[inline]
pub fn id_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse a JSON value (string or number) as `f64`.
#[inline]
pub fn parse_str_f64(v: Option<&Value>) -> Option<f64> {
    let v = v?;
    if let Some(s) = v.as_str() {
        s.trim().parse().ok()
    } else {
        v.as_f64()
    }
}

/// Parse a JSON value (string or number) as `i64`.
#[inline]
pub fn parse_str_i64(v: Option<&Value>) -> Option<i64> {
    let v = v?;
    if let Some(s) = v.as_str() {
        s.trim().parse().ok()
    } else {
        v.as_i64()
    }
}

/// Parse a named field on a JSON object as `f64` (string or number).
#[inline]
pub fn parse_f64_field(v: &Value, key: &str) -> Option<f64> {
    parse_str_f64(v.get(key))
}

/// A named string field, if present and non-empty.
#[inline]
pub fn str_field<'a>(v: &'a Value, key: &str) -> Option<&'a str> {
    v.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ids_from_strings_and_numbers() {
        assert_eq!(id_string(&json!("39")), Some("39".into()));
        assert_eq!(id_string(&json!(39)), Some("39".into()));
        assert_eq!(id_string(&json!("")), None);
        assert_eq!(id_string(&json!(null)), None);
    }

    #[test]
    fn numbers_from_strings_and_numbers() {
        let v = json!({"a": "1.95", "b": 2.5, "c": "x", "n": "3"});
        assert_eq!(parse_f64_field(&v, "a"), Some(1.95));
        assert_eq!(parse_f64_field(&v, "b"), Some(2.5));
        assert_eq!(parse_f64_field(&v, "c"), None);
        assert_eq!(parse_str_i64(v.get("n")), Some(3));
        assert_eq!(parse_str_i64(v.get("missing")), None);
    }
}
