//! Ballast-Anchor: Operation Context
//!
//! An open, string-keyed attribute map describing one operation attempt.
//! There is no fixed schema: risk inference and constraint predicates
//! consult the keys they care about and ignore the rest.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Attribute map for a single operation attempt.
///
/// Well-known keys consumed by the anchor's risk inference:
/// `risk_level`, `is_external`, `involves_phi`, `is_destructive`,
/// `is_write`, `path`, `resource`, `url`, `user_id`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Context {
    /// Key-value pairs describing the operation
    #[serde(flatten)]
    pub data: HashMap<String, serde_json::Value>,
}

impl Context {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fluent insertion for building contexts inline.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Insert a key-value pair.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.data.insert(key.into(), value.into());
    }

    /// Raw value lookup.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Boolean lookup; absent or non-boolean keys read as `false`.
    pub fn get_bool(&self, key: &str) -> bool {
        self.data.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
    }

    /// String lookup; `None` for absent or non-string values.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }

    /// Does the context contain this key at all?
    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }
}

impl<K, V> FromIterator<(K, V)> for Context
where
    K: Into<String>,
    V: Into<serde_json::Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            data: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_builder() {
        let ctx = Context::new()
            .with("path", "/data/x.json")
            .with("is_write", true);

        assert_eq!(ctx.get_str("path"), Some("/data/x.json"));
        assert!(ctx.get_bool("is_write"));
        assert!(!ctx.get_bool("is_external"));
    }

    #[test]
    fn test_non_bool_reads_as_false() {
        let ctx = Context::new().with("is_external", "yes");
        assert!(!ctx.get_bool("is_external"));
    }

    #[test]
    fn test_from_iter() {
        let ctx: Context = [("resource", "db.users"), ("user_id", "u-1")]
            .into_iter()
            .collect();
        assert_eq!(ctx.get_str("resource"), Some("db.users"));
        assert!(ctx.contains("user_id"));
    }
}
