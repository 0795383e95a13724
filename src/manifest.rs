//! JSON manifests describing schemas, store contents and a document
//!
//! Used by the CLI to validate a document without writing code. Manifests
//! can express static targets, `ref_path` targets, foreign fields and literal
//! conditions; computed conditions and resolver functions are code-only.

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use crate::error::ValidateResult;
use crate::refs::{Conditions, RefOptions, RefValidator, ValidatorConfig};
use crate::schema::{Document, FieldDef, FieldKind, Schema, SchemaId, SchemaRegistry};
use crate::store::MemoryConnection;

/// Declared type of a manifest field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSpecKind {
    /// Plain value
    #[default]
    Scalar,
    /// Array (of sub-documents when `schema` is set)
    Array,
    /// Embedded sub-document; requires `schema`
    Embedded,
}

/// Reference declaration in a manifest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RefSpec {
    /// Static target collection
    #[serde(default)]
    pub model: Option<String>,
    /// Field holding the target collection name
    #[serde(default)]
    pub ref_path: Option<String>,
    /// Field matched in the target collection
    #[serde(default)]
    pub foreign_field: Option<String>,
    /// Literal equality conditions
    #[serde(default)]
    pub conditions: BTreeMap<String, Value>,
}

impl RefSpec {
    fn to_options(&self) -> RefOptions {
        RefOptions {
            model: self.model.clone(),
            resolver: None,
            ref_path: self.ref_path.clone(),
            foreign_field: self.foreign_field.clone(),
            conditions: Conditions::from(self.conditions.clone()),
        }
    }
}

/// Field declaration in a manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field path
    pub path: String,
    /// Declared type
    #[serde(default)]
    pub kind: FieldSpecKind,
    /// Name of the embedded schema, for embedded fields and sub-document arrays
    #[serde(default)]
    pub schema: Option<String>,
    /// Reference declared on the field
    #[serde(default, rename = "ref")]
    pub reference: Option<RefSpec>,
    /// Reference declared on the array element type
    #[serde(default)]
    pub element_ref: Option<RefSpec>,
}

/// A complete validation scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Validator configuration
    #[serde(default)]
    pub config: ValidatorConfig,
    /// Store contents by collection name
    #[serde(default)]
    pub collections: BTreeMap<String, Vec<Value>>,
    /// Schemas by name
    pub schemas: BTreeMap<String, Vec<FieldSpec>>,
    /// Name of the schema the document belongs to
    pub root: String,
    /// The document to validate
    pub document: Value,
}

/// A manifest turned into live objects
pub struct Scenario {
    /// Registry with validators installed on the root schema
    pub registry: SchemaRegistry,
    /// Root schema handle
    pub root: SchemaId,
    /// Store seeded from the manifest
    pub connection: MemoryConnection,
    /// Installed validator
    pub validator: RefValidator,
    /// Document to validate
    pub document: Document,
}

impl Scenario {
    /// Validate the manifest document
    pub async fn validate(&self) -> ValidateResult<()> {
        self.registry.validate(self.root, &self.document).await
    }
}

impl Manifest {
    /// Parse a manifest from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Failed to parse manifest")
    }

    /// Build the registry, store and document, installing validators on `root`
    pub fn build(&self) -> Result<Scenario> {
        if !self.document.is_object() {
            bail!("Manifest document must be a JSON object, got {}", self.document);
        }

        let connection = MemoryConnection::new();
        for (name, documents) in &self.collections {
            connection.create_collection(name);
            for document in documents {
                connection.insert(name, document.clone());
            }
        }

        let mut registry = SchemaRegistry::new(Arc::new(connection.clone()));
        let ids: HashMap<&str, SchemaId> = self
            .schemas
            .keys()
            .map(|name| (name.as_str(), registry.reserve()))
            .collect();

        for (name, fields) in &self.schemas {
            let mut schema = Schema::new();
            for spec in fields {
                schema.add_field(field_from_spec(name, spec, &ids)?);
            }
            registry.define(ids[name.as_str()], schema);
        }

        let root = *ids
            .get(self.root.as_str())
            .ok_or_else(|| anyhow!("Root schema '{}' is not declared", self.root))?;

        let validator = RefValidator::new(self.config.clone());
        let attached = validator
            .install(&mut registry, root)
            .with_context(|| format!("Failed to install validators on '{}'", self.root))?;
        tracing::debug!(root = %self.root, attached, "manifest scenario built");

        Ok(Scenario {
            registry,
            root,
            connection,
            validator,
            document: Document::new(self.document.clone()),
        })
    }
}

fn field_from_spec(
    schema: &str,
    spec: &FieldSpec,
    ids: &HashMap<&str, SchemaId>,
) -> Result<FieldDef> {
    let embedded = match &spec.schema {
        Some(name) => Some(*ids.get(name.as_str()).ok_or_else(|| {
            anyhow!(
                "Field '{}.{}' embeds unknown schema '{}'",
                schema,
                spec.path,
                name
            )
        })?),
        None => None,
    };

    let kind = match (spec.kind, embedded) {
        (FieldSpecKind::Scalar, _) => FieldKind::Scalar,
        (FieldSpecKind::Embedded, Some(id)) => FieldKind::Embedded(id),
        (FieldSpecKind::Embedded, None) => {
            bail!("Embedded field '{}.{}' needs a schema", schema, spec.path)
        }
        (FieldSpecKind::Array, Some(id)) => FieldKind::array_of(id),
        (FieldSpecKind::Array, None) => match &spec.element_ref {
            Some(element) => FieldKind::array_of_refs(element.to_options()),
            None => FieldKind::array(),
        },
    };

    let mut field = FieldDef::new(spec.path.clone(), kind);
    if let Some(reference) = &spec.reference {
        field = field.with_reference(reference.to_options());
    }
    Ok(field)
}

/// Load a manifest from disk
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest: {:?}", path))?;
    Manifest::from_json(&text)
}
