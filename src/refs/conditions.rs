//! Extra equality conditions narrowing which target documents count
//!
//! A condition value is either fixed at install time or computed from the
//! document being validated. Resolution is a flat pass over the map.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::schema::Document;

/// Condition value computed from the validating document
pub type ComputeFn = Arc<dyn Fn(&Document) -> Value + Send + Sync>;

/// A single condition value
#[derive(Clone)]
pub enum ConditionValue {
    /// Fixed value
    Literal(Value),
    /// Evaluated against the document at validation time
    Computed(ComputeFn),
}

impl ConditionValue {
    /// Wrap a per-document computation
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&Document) -> Value + Send + Sync + 'static,
    {
        ConditionValue::Computed(Arc::new(f))
    }

    /// Produce the concrete value for a document
    pub fn resolve(&self, document: &Document) -> Value {
        match self {
            ConditionValue::Literal(value) => value.clone(),
            ConditionValue::Computed(compute) => compute(document),
        }
    }
}

impl fmt::Debug for ConditionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionValue::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            ConditionValue::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl From<Value> for ConditionValue {
    fn from(value: Value) -> Self {
        ConditionValue::Literal(value)
    }
}

/// Field name to condition value, as declared on a reference
#[derive(Debug, Clone, Default)]
pub struct Conditions {
    entries: BTreeMap<String, ConditionValue>,
}

/// Conditions with every computed value substituted
pub type ResolvedConditions = BTreeMap<String, Value>;

impl Conditions {
    /// No extra conditions
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a condition
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<ConditionValue>) {
        self.entries.insert(field.into(), value.into());
    }

    /// Snapshot the conditions for one validation attempt
    pub fn resolve(&self, document: &Document) -> ResolvedConditions {
        self.entries
            .iter()
            .map(|(field, value)| (field.clone(), value.resolve(document)))
            .collect()
    }
}

impl From<BTreeMap<String, Value>> for Conditions {
    fn from(literals: BTreeMap<String, Value>) -> Self {
        Self {
            entries: literals
                .into_iter()
                .map(|(field, value)| (field, ConditionValue::Literal(value)))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_mixes_literal_and_computed() {
        let mut conditions = Conditions::new();
        conditions.insert("active", json!(true));
        conditions.insert(
            "tier",
            ConditionValue::computed(|doc| {
                if doc.get("premium") == Some(&json!(true)) {
                    json!("gold")
                } else {
                    json!("basic")
                }
            }),
        );

        let premium = Document::new(json!({"premium": true}));
        let resolved = conditions.resolve(&premium);
        assert_eq!(resolved.get("active"), Some(&json!(true)));
        assert_eq!(resolved.get("tier"), Some(&json!("gold")));

        let plain = Document::new(json!({}));
        assert_eq!(conditions.resolve(&plain).get("tier"), Some(&json!("basic")));
    }

    #[test]
    fn test_from_literal_map() {
        let mut literals = BTreeMap::new();
        literals.insert("kind".to_string(), json!("admin"));
        let conditions = Conditions::from(literals);

        let resolved = conditions.resolve(&Document::new(json!({})));
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved["kind"], json!("admin"));
    }
}
