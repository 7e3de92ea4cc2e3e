//! Order-independent structural keys for recommendation payloads
//!
//! Two payloads that differ only in object key order map to the same key.

use serde_json::{Map, Value};

/// Rebuild a value with every object's keys sorted
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                if let Some(v) = map.get(key) {
                    sorted.insert(key.clone(), canonicalize(v));
                }
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Hex digest of the canonical JSON encoding
pub fn canonical_key(value: &Value) -> String {
    let canonical = canonicalize(value).to_string();
    blake3::hash(canonical.as_bytes()).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_order_is_ignored() {
        let a = json!({"action": "scale", "params": {"min": 1, "max": 4}});
        let b = json!({"params": {"max": 4, "min": 1}, "action": "scale"});
        assert_eq!(canonical_key(&a), canonical_key(&b));
    }

    #[test]
    fn test_array_order_matters() {
        assert_ne!(canonical_key(&json!([1, 2])), canonical_key(&json!([2, 1])));
        assert_ne!(canonical_key(&json!("1")), canonical_key(&json!(1)));
    }

    #[test]
    fn test_nested_arrays_of_objects() {
        let a = json!([{"b": 1, "a": 2}]);
        assert_eq!(canonicalize(&a).to_string(), r#"[{"a":2,"b":1}]"#);
    }
}
