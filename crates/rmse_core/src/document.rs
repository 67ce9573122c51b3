//! Helpers for the loosely typed save document.
//!
//! The engine serializes dense arrays either as plain JSON arrays or wrapped
//! in an object tagged with [`DENSE_ARRAY_TAG`]; every access to such an array
//! goes through [`dense_array`] or [`dense_array_mut`].

use serde_json::{Number, Value};

pub const DENSE_ARRAY_TAG: &str = "@a";

pub fn dense_array<'a>(parent: &'a Value, field: &str) -> Option<&'a Vec<Value>> {
    match parent.get(field)? {
        Value::Array(items) => Some(items),
        Value::Object(map) => map.get(DENSE_ARRAY_TAG)?.as_array(),
        _ => None,
    }
}

pub fn dense_array_mut<'a>(parent: &'a mut Value, field: &str) -> Option<&'a mut Vec<Value>> {
    match parent.get_mut(field)? {
        Value::Array(items) => Some(items),
        Value::Object(map) => map.get_mut(DENSE_ARRAY_TAG)?.as_array_mut(),
        _ => None,
    }
}

/// Reads an integer id from a number or a numeric string.
pub fn parse_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Boolean conversion with the engine's scripting rules: null, `false`, zero,
/// NaN and the empty string are false, everything else is true.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Stores integral values as integers so quantities keep their original shape.
pub fn number_value(value: f64) -> Option<Value> {
    if !value.is_finite() {
        return None;
    }
    if value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
        return Some(Value::Number(Number::from(value as i64)));
    }
    Number::from_f64(value).map(Value::Number)
}

/// Plain rendering of a leaf value: strings unquoted, null as empty.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{dense_array, dense_array_mut, number_value, parse_id, truthy};

    #[test]
    fn reads_plain_and_tagged_arrays() {
        let doc = json!({
            "plain": {"_data": [null, 1, 2]},
            "tagged": {"_data": {"@c": 4, "@a": [null, true]}},
            "other": {"_data": 5},
        });
        assert_eq!(dense_array(&doc["plain"], "_data").map(Vec::len), Some(3));
        assert_eq!(dense_array(&doc["tagged"], "_data").map(Vec::len), Some(2));
        assert!(dense_array(&doc["other"], "_data").is_none());
        assert!(dense_array(&doc["plain"], "_missing").is_none());
    }

    #[test]
    fn writes_through_tagged_array() {
        let mut doc = json!({"switches": {"_data": {"@a": [null, false]}}});
        dense_array_mut(&mut doc["switches"], "_data")
            .expect("tagged array should resolve")
            .push(json!(true));
        assert_eq!(doc, json!({"switches": {"_data": {"@a": [null, false, true]}}}));
    }

    #[test]
    fn ids_accept_numbers_and_numeric_strings() {
        assert_eq!(parse_id(&json!(7)), Some(7));
        assert_eq!(parse_id(&json!("12")), Some(12));
        assert_eq!(parse_id(&json!(3.0)), Some(3));
        assert_eq!(parse_id(&json!("abc")), None);
        assert_eq!(parse_id(&json!(null)), None);
    }

    #[test]
    fn truthiness_follows_script_rules() {
        assert!(!truthy(&json!(null)));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!("")));
        assert!(truthy(&json!("0")));
        assert!(truthy(&json!(2)));
        assert!(truthy(&json!([])));
    }

    #[test]
    fn integral_numbers_stay_integers() {
        assert_eq!(number_value(250.0), Some(json!(250)));
        assert_eq!(number_value(-3.0), Some(json!(-3)));
        assert_eq!(number_value(1.5), Some(json!(1.5)));
        assert_eq!(number_value(f64::NAN), None);
    }
}
