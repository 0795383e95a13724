//! Collection query interface required by the reference validator
//!
//! A `Connection` hands out named `Collection` handles; a collection only
//! needs to count documents matching a flat equality / set-membership filter,
//! optionally bound to an in-flight session.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::QueryResult;

pub mod memory;

pub use memory::MemoryConnection;

/// Transaction/session handle bound to a document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Session(pub Uuid);

impl Session {
    /// Create a fresh session identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Predicate applied to a single document field
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Field equals the value
    Eq(Value),
    /// Field equals any of the values
    In(Vec<Value>),
}

impl Predicate {
    /// Test a document field value against this predicate.
    ///
    /// Array-valued fields match when any element matches.
    pub fn matches(&self, field: Option<&Value>) -> bool {
        let Some(field) = field else {
            return match self {
                Predicate::Eq(expected) => expected.is_null(),
                Predicate::In(values) => values.iter().any(Value::is_null),
            };
        };

        let hit = |candidate: &Value| match self {
            Predicate::Eq(expected) => candidate == expected,
            Predicate::In(values) => values.contains(candidate),
        };

        match field {
            Value::Array(items) => hit(field) || items.iter().any(hit),
            other => hit(other),
        }
    }
}

/// Conjunction of per-field predicates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, Predicate)>,
}

impl Filter {
    /// Create an empty filter (matches everything)
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field == value`
    pub fn equals(mut self, field: impl Into<String>, value: Value) -> Self {
        self.clauses.push((field.into(), Predicate::Eq(value)));
        self
    }

    /// Require `field in values`
    pub fn is_in(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.clauses.push((field.into(), Predicate::In(values)));
        self
    }

    /// Test a whole document against every clause
    pub fn matches(&self, document: &Value) -> bool {
        self.clauses
            .iter()
            .all(|(field, predicate)| predicate.matches(lookup_path(document, field)))
    }
}

/// Resolve a dotted path inside a JSON value
pub fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// A named collection that can count matching documents
pub trait Collection: Send + Sync {
    /// Collection name
    fn name(&self) -> &str;

    /// Count documents matching `filter`, reading through `session` when given
    fn count_documents<'a>(
        &'a self,
        filter: &'a Filter,
        session: Option<&'a Session>,
    ) -> BoxFuture<'a, QueryResult<u64>>;
}

/// Source of collection handles
pub trait Connection: Send + Sync {
    /// Resolve a collection by name
    fn collection(&self, name: &str) -> QueryResult<Arc<dyn Collection>>;
}
