//! NodeClass configuration hash used for drift detection
//!
//! The hash is computed over a canonical JSON form of the value:
//! - object keys are sorted
//! - arrays are treated as unordered sets (elements are sorted by their
//!   canonical encoding)
//! - zero values (`null`, `false`, `0`, `""`, `[]`, `{}`) are dropped
//!
//! Dropping zero values means an explicitly set `rootDiskSize: 0` hashes the
//! same as an unset one.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

/// Format version of [`ConfigHash`]; bumping it invalidates recorded hashes
pub const NODE_CLASS_HASH_VERSION: &str = "v1";

/// Version-tagged configuration hash
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigHash {
    pub version: &'static str,
    pub value: String,
}

impl ConfigHash {
    /// Hash any serializable value in canonical form
    pub fn of<T: Serialize>(value: &T) -> Self {
        // string-keyed model types always serialize
        let json = serde_json::to_value(value).unwrap_or_default();
        let canonical = canonical_json(&json).unwrap_or_default();

        let digest = Sha256::digest(canonical.as_bytes());
        Self {
            version: NODE_CLASS_HASH_VERSION,
            value: hex::encode(&digest[..16]),
        }
    }
}

impl fmt::Display for ConfigHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// Canonical encoding of `value`, or `None` for zero values
pub fn canonical_json(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::Array(items) => {
            let mut elems: Vec<String> = items.iter().filter_map(canonical_json).collect();
            if elems.is_empty() {
                return None;
            }
            elems.sort();
            Some(format!("[{}]", elems.join(",")))
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();

            let fields: Vec<String> = keys
                .into_iter()
                .filter_map(|k| {
                    let v = canonical_json(&map[k])?;
                    Some(format!("{}:{}", Value::String(k.clone()), v))
                })
                .collect();
            if fields.is_empty() {
                return None;
            }
            Some(format!("{{{}}}", fields.join(",")))
        }
        scalar => Some(scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodeclass::{NodeClassSpec, SelectorTerm, TemplateSelectorTerm};
    use serde_json::json;

    fn base_spec() -> NodeClassSpec {
        NodeClassSpec {
            zone: "zone-1".to_string(),
            network_selector_terms: vec![
                SelectorTerm::by_name("net-a"),
                SelectorTerm::by_tag("env", "prod"),
            ],
            template_selector_terms: vec![TemplateSelectorTerm::by_name("ubuntu-22.04")],
            ..Default::default()
        }
    }

    #[test]
    fn test_hash_ignores_list_order() {
        let a = base_spec();
        let mut b = base_spec();
        b.network_selector_terms.reverse();

        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn test_hash_changes_with_content() {
        let a = base_spec();
        let mut b = base_spec();
        b.zone = "zone-2".to_string();

        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_hash_ignores_zero_values() {
        let a = base_spec();
        let mut b = base_spec();
        b.root_disk_size = Some(0);
        b.user_data = Some(String::new());

        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn test_hash_is_version_tagged() {
        let hash = base_spec().hash();
        assert_eq!(hash.version, NODE_CLASS_HASH_VERSION);
        assert_eq!(hash.value.len(), 32);
    }

    #[test]
    fn test_canonical_json_drops_zero_values() {
        let value = json!({"b": 1, "a": "", "c": [], "d": {"e": false}, "f": null});
        assert_eq!(canonical_json(&value).as_deref(), Some(r#"{"b":1}"#));
        assert_eq!(canonical_json(&json!({"x": 0})), None);
    }

    #[test]
    fn test_canonical_json_sorts_arrays() {
        let a = canonical_json(&json!(["b", "a", "c"]));
        let b = canonical_json(&json!(["c", "b", "a"]));
        assert_eq!(a, b);
    }
}
