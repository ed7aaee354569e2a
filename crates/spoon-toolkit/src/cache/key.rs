//! Cache key construction.
//!
//! A key is the operation name plus a canonical encoding of the arguments
//! that affect the result. Object keys are sorted at every depth, so
//! `{"a":1,"b":2}` and `{"b":2,"a":1}` collide on purpose. Volatile
//! top-level fields (request ids, timestamps) are dropped before encoding.
//! No other normalization happens here: lowercasing addresses and similar
//! domain rules belong to the operation.

use serde_json::Value;
use std::fmt;
use std::fmt::Write as _;

/// Top-level argument fields excluded from keys by default.
pub const DEFAULT_IGNORED_FIELDS: &[&str] = &["request_id", "timestamp", "nonce", "trace_id"];

/// Which argument fields take part in a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPolicy {
    ignored_fields: Vec<String>,
}

impl Default for KeyPolicy {
    fn default() -> Self {
        Self {
            ignored_fields: DEFAULT_IGNORED_FIELDS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }
}

impl KeyPolicy {
    /// A policy that keeps every field.
    pub fn keep_all() -> Self {
        Self {
            ignored_fields: Vec::new(),
        }
    }

    /// Also exclude `field` from keys.
    pub fn ignore(mut self, field: impl Into<String>) -> Self {
        self.ignored_fields.push(field.into());
        self
    }

    pub fn ignored_fields(&self) -> &[String] {
        &self.ignored_fields
    }

    fn is_ignored(&self, field: &str) -> bool {
        self.ignored_fields.iter().any(|f| f == field)
    }
}

/// Opaque, deterministic identifier of one logical call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    operation: String,
    canonical_args: String,
}

impl CacheKey {
    /// Build a key with the default [`KeyPolicy`].
    pub fn new(operation: &str, args: &Value) -> Self {
        Self::with_policy(operation, args, &KeyPolicy::default())
    }

    pub fn with_policy(operation: &str, args: &Value, policy: &KeyPolicy) -> Self {
        let mut canonical_args = String::new();
        match args {
            Value::Object(map) => {
                let mut fields: Vec<_> = map
                    .iter()
                    .filter(|(k, _)| !policy.is_ignored(k))
                    .collect();
                fields.sort_by(|a, b| a.0.cmp(b.0));
                write_object(&mut canonical_args, fields);
            }
            other => write_canonical(&mut canonical_args, other),
        }
        Self {
            operation: operation.to_string(),
            canonical_args,
        }
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Short fingerprint for log lines (FNV-1a over the full key).
    pub fn fingerprint(&self) -> u64 {
        let mut hash: u64 = 0xcbf29ce484222325;
        for byte in self
            .operation
            .as_bytes()
            .iter()
            .chain(b"\0")
            .chain(self.canonical_args.as_bytes())
        {
            hash ^= *byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        hash
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.operation, self.canonical_args)
    }
}

fn write_canonical(out: &mut String, value: &Value) {
    match value {
        Value::Object(map) => {
            let mut fields: Vec<_> = map.iter().collect();
            fields.sort_by(|a, b| a.0.cmp(b.0));
            write_object(out, fields);
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(out, item);
            }
            out.push(']');
        }
        // Scalars use serde_json's own encoding, which escapes strings.
        scalar => {
            let _ = write!(out, "{scalar}");
        }
    }
}

fn write_object(out: &mut String, fields: Vec<(&String, &Value)>) {
    out.push('{');
    for (i, (k, v)) in fields.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "{}:", Value::String(k.clone()));
        write_canonical(out, v);
    }
    out.push('}');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn order_independent() {
        let a = CacheKey::new("op", &json!({"a": 1, "b": 2}));
        let b = CacheKey::new("op", &json!({"b": 2, "a": 1}));
        assert_eq!(a, b);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn nested_objects_sorted() {
        let a = CacheKey::new("op", &json!({"filter": {"x": 1, "y": [{"q": 1, "p": 2}]}}));
        let b = CacheKey::new("op", &json!({"filter": {"y": [{"p": 2, "q": 1}], "x": 1}}));
        assert_eq!(a, b);
    }

    #[test]
    fn array_order_matters() {
        let a = CacheKey::new("op", &json!({"ids": [1, 2]}));
        let b = CacheKey::new("op", &json!({"ids": [2, 1]}));
        assert_ne!(a, b);
    }

    #[test]
    fn operation_name_separates_keys() {
        let args = json!({"address": "0xabc"});
        assert_ne!(CacheKey::new("token_security", &args), CacheKey::new("address_security", &args));
    }

    #[test]
    fn volatile_fields_ignored() {
        let a = CacheKey::new("op", &json!({"chain": "1", "request_id": "r-1", "timestamp": 1}));
        let b = CacheKey::new("op", &json!({"chain": "1", "request_id": "r-2"}));
        assert_eq!(a, b);
    }

    #[test]
    fn keep_all_policy_includes_volatile_fields() {
        let policy = KeyPolicy::keep_all();
        let a = CacheKey::with_policy("op", &json!({"request_id": "r-1"}), &policy);
        let b = CacheKey::with_policy("op", &json!({"request_id": "r-2"}), &policy);
        assert_ne!(a, b);
    }

    #[test]
    fn custom_ignored_field() {
        let policy = KeyPolicy::default().ignore("page_token");
        let a = CacheKey::with_policy("op", &json!({"q": "x", "page_token": "abc"}), &policy);
        let b = CacheKey::with_policy("op", &json!({"q": "x"}), &policy);
        assert_eq!(a, b);
    }

    #[test]
    fn no_domain_normalization() {
        let a = CacheKey::new("op", &json!({"address": "0xABC"}));
        let b = CacheKey::new("op", &json!({"address": "0xabc"}));
        assert_ne!(a, b);
    }

    #[test]
    fn string_escaping_prevents_collisions() {
        let a = CacheKey::new("op", &json!({"a": "1,\"b\":2"}));
        let b = CacheKey::new("op", &json!({"a": "1", "b": 2}));
        assert_ne!(a, b);
    }

    #[test]
    fn display_is_readable() {
        let key = CacheKey::new("op", &json!({"b": true, "a": null}));
        assert_eq!(key.to_string(), r#"op:{"a":null,"b":true}"#);
    }
}
