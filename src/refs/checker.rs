//! Existence checks: one count query per validation event
//!
//! A scalar reference is valid when exactly one target document matches. An
//! array reference is valid when the number of matching target documents
//! equals the number of references queried. A mixed array is simply invalid;
//! which element failed is not reported.

use serde_json::Value;
use std::collections::HashSet;

use super::conditions::ResolvedConditions;
use super::options::ID_FIELD;
use crate::error::QueryResult;
use crate::store::{Collection, Filter, Session};

/// Reduce a populated sub-document to its identity; other values pass through
pub fn reference_identity(value: &Value) -> &Value {
    match value {
        Value::Object(map) => map.get(ID_FIELD).unwrap_or(value),
        _ => value,
    }
}

/// Identities of `values` with duplicates removed, first occurrence kept
pub fn distinct_identities(values: &[Value]) -> Vec<Value> {
    let mut seen = HashSet::new();
    values
        .iter()
        .map(reference_identity)
        .filter(|identity| seen.insert(identity.to_string()))
        .cloned()
        .collect()
}

/// Check a single reference. Absent values are valid.
pub async fn check_scalar(
    collection: &dyn Collection,
    key_field: &str,
    value: Option<&Value>,
    conditions: &ResolvedConditions,
    session: Option<&Session>,
) -> QueryResult<bool> {
    let Some(value) = value.filter(|v| !v.is_null()) else {
        return Ok(true);
    };

    let filter = with_conditions(
        Filter::new().equals(key_field, reference_identity(value).clone()),
        conditions,
    );
    count_matches(collection, &filter, 1, session).await
}

/// Check an array of references. Absent or empty arrays are valid.
///
/// Null elements are kept and counted; they never match a target document,
/// so an array holding one is invalid. With `allow_duplicates` the expected count is the number of distinct
/// references; otherwise it is the raw array length, so repeated references
/// make the field invalid.
pub async fn check_array(
    collection: &dyn Collection,
    key_field: &str,
    values: Option<&Value>,
    conditions: &ResolvedConditions,
    allow_duplicates: bool,
    session: Option<&Session>,
) -> QueryResult<bool> {
    let values = as_elements(values);
    if values.is_empty() {
        return Ok(true);
    }

    let retained: Vec<Value> = if allow_duplicates {
        distinct_identities(&values)
    } else {
        values.iter().map(|v| reference_identity(v).clone()).collect()
    };
    let expected = retained.len() as u64;

    let filter = with_conditions(Filter::new().is_in(key_field, retained), conditions);
    count_matches(collection, &filter, expected, session).await
}

/// Whether a field value holds nothing to check
pub(crate) fn is_empty_reference(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}

fn as_elements(values: Option<&Value>) -> Vec<Value> {
    match values {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(single) => vec![single.clone()],
    }
}

fn with_conditions(filter: Filter, conditions: &ResolvedConditions) -> Filter {
    conditions
        .iter()
        .fold(filter, |filter, (field, value)| filter.equals(field.as_str(), value.clone()))
}

async fn count_matches(
    collection: &dyn Collection,
    filter: &Filter,
    expected: u64,
    session: Option<&Session>,
) -> QueryResult<bool> {
    tracing::debug!(
        collection = collection.name(),
        expected,
        in_session = session.is_some(),
        "counting referenced documents"
    );

    match collection.count_documents(filter, session).await {
        Ok(count) => Ok(count == expected),
        Err(err) => {
            tracing::warn!(
                collection = collection.name(),
                error = %err,
                "reference count query failed"
            );
            Err(err)
        }
    }
}
