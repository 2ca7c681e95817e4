//! Content hashing for duplicate detection.
//!
//! Record hashes are SHA-256 over a canonical JSON rendering with object
//! keys sorted at every level, so the hash is stable under key order and
//! identical across input formats.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Serialize a JSON value with object keys sorted recursively.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// SHA-256 hex digest of a record's canonical JSON.
pub fn content_hash(record: &Value) -> String {
    sha256_hex(canonical_json(record).as_bytes())
}

/// SHA-256 hex digest of raw bytes (whole-file hashing).
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_sorts_keys_recursively() {
        let value = json!({"b": {"d": 1, "c": [2, {"f": 3, "e": 4}]}, "a": true});
        assert_eq!(
            canonical_json(&value),
            r#"{"a":true,"b":{"c":[2,{"e":4,"f":3}],"d":1}}"#
        );
    }

    #[test]
    fn hash_is_order_independent() {
        let a = json!({"x": 1, "y": "two"});
        let b = json!({"y": "two", "x": 1});
        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn hash_distinguishes_content() {
        assert_ne!(content_hash(&json!({"x": 1})), content_hash(&json!({"x": 2})));
    }

    #[test]
    fn sha256_hex_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
