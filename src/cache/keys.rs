//! Cache key derivation.
//!
//! A key is `<prefix><identity>:<scope>:<digest>` where the digest is the
//! first 128 bits of a SHA-256 over the identity, scope, canonical parameter
//! JSON and the sorted tag set. The readable head lets glob patterns target
//! a query kind or a single tenant; the digest distinguishes parameter sets.

use serde_json::Value;
use sha2::{Digest, Sha256};

const NO_SCOPE: &str = "_";
const DIGEST_BYTES: usize = 16;

/// Builds namespaced keys and patterns for one cache instance.
#[derive(Debug, Clone)]
pub struct KeyBuilder {
    prefix: String,
}

impl KeyBuilder {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Derive the key for a query. Pure: equal inputs (object key order and
    /// tag order ignored) always produce the same string.
    pub fn key(&self, identity: &str, scope: Option<&str>, params: &Value, tags: &[String]) -> String {
        let scope = scope.unwrap_or(NO_SCOPE);
        format!(
            "{}{identity}:{scope}:{}",
            self.prefix,
            digest(identity, scope, params, tags)
        )
    }

    /// Prepend the namespace to a caller-supplied key or glob unless it is
    /// already there.
    pub fn qualify(&self, raw: &str) -> String {
        if raw.starts_with(&self.prefix) {
            raw.to_string()
        } else {
            format!("{}{raw}", self.prefix)
        }
    }
}

fn digest(identity: &str, scope: &str, params: &Value, tags: &[String]) -> String {
    let mut sorted: Vec<&str> = tags.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();

    let mut hasher = Sha256::new();
    hasher.update(identity.as_bytes());
    hasher.update(b"\n");
    hasher.update(scope.as_bytes());
    hasher.update(b"\n");
    hasher.update(canonical_json(params).as_bytes());
    hasher.update(b"\n");
    hasher.update(sorted.join(",").as_bytes());
    let full = hasher.finalize();
    hex::encode(&full.as_slice()[..DIGEST_BYTES])
}

/// Serialize with object keys in lexicographic order at every depth.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (index, (key, inner)) in entries.into_iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(inner, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (index, inner) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_canonical(inner, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
