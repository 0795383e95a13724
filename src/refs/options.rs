//! Reference metadata declared on schema fields
//!
//! `RefOptions` is the declaration as written; `ReferenceDescriptor` is the
//! normalised, immutable form computed once per field at install time.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use super::conditions::{ConditionValue, Conditions};
use crate::error::{InstallError, InstallResult};
use crate::schema::Document;

/// Identity field used when no foreign field is declared
pub const ID_FIELD: &str = "_id";

/// Computes the target collection name from the validating document
pub type ResolverFn = Arc<dyn Fn(&Document) -> Option<String> + Send + Sync>;

/// Reference declaration attached to a field or an array element type
#[derive(Clone, Default)]
pub struct RefOptions {
    /// Static target collection name
    pub model: Option<String>,
    /// Per-document target resolver
    pub resolver: Option<ResolverFn>,
    /// Path of a field holding the target collection name
    pub ref_path: Option<String>,
    /// Field in the target collection matched against the value
    pub foreign_field: Option<String>,
    /// Extra equality conditions on target documents
    pub conditions: Conditions,
}

impl RefOptions {
    /// Reference into a fixed collection
    pub fn to(model: impl Into<String>) -> Self {
        Self {
            model: Some(model.into()),
            ..Self::default()
        }
    }

    /// Reference whose collection is computed from the document
    pub fn resolved_by<F>(resolver: F) -> Self
    where
        F: Fn(&Document) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            resolver: Some(Arc::new(resolver)),
            ..Self::default()
        }
    }

    /// Reference whose collection name is read from another field
    pub fn from_path(path: impl Into<String>) -> Self {
        Self {
            ref_path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Match against `field` instead of the identity field
    pub fn foreign_field(mut self, field: impl Into<String>) -> Self {
        self.foreign_field = Some(field.into());
        self
    }

    /// Require `field == value` on the target document
    pub fn condition(mut self, field: impl Into<String>, value: Value) -> Self {
        self.conditions.insert(field, value);
        self
    }

    /// Require `field == f(document)` on the target document
    pub fn computed_condition<F>(mut self, field: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Document) -> Value + Send + Sync + 'static,
    {
        self.conditions.insert(field, ConditionValue::computed(f));
        self
    }

    /// Normalise into a target strategy; `Ok(None)` when no target is declared
    pub fn strategy(&self, path: &str) -> InstallResult<Option<TargetStrategy>> {
        let declared = [
            self.model.is_some(),
            self.resolver.is_some(),
            self.ref_path.is_some(),
        ];
        if declared.iter().filter(|set| **set).count() > 1 {
            return Err(InstallError::ConflictingTargets {
                path: path.to_string(),
            });
        }

        let strategy = if let Some(model) = &self.model {
            Some(TargetStrategy::Static(model.clone()))
        } else if let Some(resolver) = &self.resolver {
            Some(TargetStrategy::Resolver(resolver.clone()))
        } else {
            self.ref_path.clone().map(TargetStrategy::Path)
        };
        Ok(strategy)
    }
}

impl fmt::Debug for RefOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefOptions")
            .field("model", &self.model)
            .field("resolver", &self.resolver.as_ref().map(|_| ".."))
            .field("ref_path", &self.ref_path)
            .field("foreign_field", &self.foreign_field)
            .field("conditions", &self.conditions)
            .finish()
    }
}

/// How the target collection is located
#[derive(Clone)]
pub enum TargetStrategy {
    /// Fixed collection name
    Static(String),
    /// Computed from the document
    Resolver(ResolverFn),
    /// Read from a field of the document
    Path(String),
}

impl TargetStrategy {
    /// Resolve the collection name for a document
    pub fn resolve(&self, document: &Document) -> Option<String> {
        match self {
            TargetStrategy::Static(name) => Some(name.clone()),
            TargetStrategy::Resolver(resolver) => resolver(document),
            TargetStrategy::Path(path) => document.get_str(path).map(str::to_string),
        }
    }
}

impl fmt::Debug for TargetStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetStrategy::Static(name) => f.debug_tuple("Static").field(name).finish(),
            TargetStrategy::Resolver(_) => f.write_str("Resolver(..)"),
            TargetStrategy::Path(path) => f.debug_tuple("Path").field(path).finish(),
        }
    }
}

/// Whether a field holds one reference or many
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// One value
    Scalar,
    /// Array of values
    Array,
}

/// Normalised reference metadata for one field
#[derive(Debug, Clone)]
pub struct ReferenceDescriptor {
    /// Field path within its schema
    pub path: String,
    /// Scalar or array
    pub cardinality: Cardinality,
    /// Target collection strategy
    pub target: TargetStrategy,
    /// Field matched in the target collection
    pub key_field: String,
    /// Declared conditions, unresolved
    pub conditions: Conditions,
}

impl ReferenceDescriptor {
    /// Build a descriptor from a declaration; `Ok(None)` when it names no target
    pub fn from_options(
        path: &str,
        cardinality: Cardinality,
        options: &RefOptions,
    ) -> InstallResult<Option<Self>> {
        let Some(target) = options.strategy(path)? else {
            return Ok(None);
        };

        Ok(Some(Self {
            path: path.to_string(),
            cardinality,
            target,
            key_field: options
                .foreign_field
                .clone()
                .unwrap_or_else(|| ID_FIELD.to_string()),
            conditions: options.conditions.clone(),
        }))
    }
}
