//! Structured store keys
//!
//! Rows are addressed by a set of named fields such as
//! `{project, logical-cloud-name}`. A key whose trailing field is empty is a
//! list query: it matches every row that carries the same fields with equal
//! non-empty values.

use crate::error::StoreError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Field map addressing one row (or, with empty fields, a set of rows).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreKey {
    fields: BTreeMap<String, String>,
}

impl StoreKey {
    /// Create an empty key
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field to the key
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Build a key from any struct that serializes to a flat map of strings.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidKey`] when the value is not a flat object
    /// of string fields.
    pub fn from_serializable<K: Serialize>(key: &K) -> Result<Self, StoreError> {
        let serde_json::Value::Object(map) = serde_json::to_value(key)? else {
            return Err(StoreError::InvalidKey("key must serialize to an object".to_string()));
        };

        let mut fields = BTreeMap::new();
        for (field, value) in map {
            let value = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Null => String::new(),
                other => {
                    return Err(StoreError::InvalidKey(format!(
                        "field '{field}' is not a string: {other}"
                    )));
                }
            };
            fields.insert(field, value);
        }
        Ok(Self { fields })
    }

    /// Value of a single field
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// A key with any empty field selects a set of rows.
    #[must_use]
    pub fn is_list_query(&self) -> bool {
        self.fields.values().any(String::is_empty)
    }

    /// Whether `row` is selected by this key.
    ///
    /// Exact keys select only the identical row. List keys select every row
    /// that has at least the same fields and agrees on the non-empty ones.
    #[must_use]
    pub fn selects(&self, row: &StoreKey) -> bool {
        if !self.is_list_query() {
            return self == row;
        }
        self.fields.iter().all(|(field, value)| match row.fields.get(field) {
            Some(v) => value.is_empty() || v == value,
            None => false,
        })
    }

    /// Whether `other` lives strictly below this key.
    #[must_use]
    pub fn is_ancestor_of(&self, other: &StoreKey) -> bool {
        other.fields.len() > self.fields.len()
            && self
                .fields
                .iter()
                .all(|(field, value)| other.fields.get(field) == Some(value))
    }

    /// Deterministic string form, used as the row identity.
    #[must_use]
    pub fn canonical(&self) -> String {
        let mut out = String::from("{");
        for (i, (field, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(field);
            out.push(':');
            out.push_str(value);
        }
        out.push('}');
        out
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct ClusterKey<'a> {
        project: &'a str,
        #[serde(rename = "logical-cloud-name")]
        logical_cloud_name: &'a str,
        #[serde(rename = "clname")]
        cluster_reference: &'a str,
    }

    #[test]
    fn test_from_serializable_uses_renamed_fields() {
        let key = StoreKey::from_serializable(&ClusterKey {
            project: "p",
            logical_cloud_name: "lc",
            cluster_reference: "c1",
        })
        .unwrap();

        assert_eq!(key.get("logical-cloud-name"), Some("lc"));
        assert_eq!(key.get("clname"), Some("c1"));
        assert!(!key.is_list_query());
    }

    #[test]
    fn test_canonical_is_order_independent() {
        let a = StoreKey::new().with("project", "p").with("logical-cloud-name", "lc");
        let b = StoreKey::new().with("logical-cloud-name", "lc").with("project", "p");
        assert_eq!(a.canonical(), b.canonical());
    }

    #[test]
    fn test_list_query_selects_siblings_only() {
        let query = StoreKey::new()
            .with("project", "p")
            .with("logical-cloud-name", "lc")
            .with("clname", "");
        let c1 = StoreKey::new()
            .with("project", "p")
            .with("logical-cloud-name", "lc")
            .with("clname", "c1");
        let other_lc = StoreKey::new()
            .with("project", "p")
            .with("logical-cloud-name", "other")
            .with("clname", "c1");
        let quota = StoreKey::new()
            .with("project", "p")
            .with("logical-cloud-name", "lc")
            .with("qname", "q1");

        assert!(query.selects(&c1));
        assert!(!query.selects(&other_lc));
        assert!(!query.selects(&quota));
    }

    #[test]
    fn test_ancestor() {
        let lc = StoreKey::new().with("project", "p").with("logical-cloud-name", "lc");
        let child = lc.clone().with("qname", "q");
        assert!(lc.is_ancestor_of(&child));
        assert!(!child.is_ancestor_of(&lc));
        assert!(!lc.is_ancestor_of(&lc));
    }

    #[test]
    fn test_non_string_field_rejected() {
        #[derive(Serialize)]
        struct Bad {
            port: u16,
        }
        let err = StoreKey::from_serializable(&Bad { port: 1 }).unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)));
    }
}
