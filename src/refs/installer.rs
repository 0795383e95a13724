//! Schema walk that turns reference declarations into field validators
//!
//! Each schema is visited at most once per install, tracked by `SchemaId`, so
//! schemas that embed themselves terminate. Validators attached to a schema
//! apply to every sub-document of that schema, at any depth.

use futures::future::BoxFuture;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::checker::{check_array, check_scalar, is_empty_reference};
use super::options::{Cardinality, ReferenceDescriptor};
use crate::error::{InstallError, InstallResult, QueryError, QueryResult};
use crate::schema::{
    ElementKind, FieldCheck, FieldContext, FieldDef, FieldKind, FieldValidator, SchemaId,
    SchemaRegistry,
};
use crate::store::Connection;

/// Settings shared by every validator attached during one install
#[derive(Clone)]
pub(crate) struct InstallContext {
    pub message: String,
    pub connection: Arc<dyn Connection>,
    pub enabled: Arc<AtomicBool>,
}

/// Install reference validators on `schema` and every sub-schema it embeds.
///
/// `allow_duplicates` applies to the top-level schema only; embedded schemas
/// are installed with duplicates disallowed. Returns the number of validators
/// attached.
pub(crate) fn install(
    registry: &mut SchemaRegistry,
    schema: SchemaId,
    ctx: &InstallContext,
    allow_duplicates: bool,
) -> InstallResult<usize> {
    let mut visited = HashSet::new();
    install_schema(registry, schema, ctx, allow_duplicates, &mut visited)
}

fn install_schema(
    registry: &mut SchemaRegistry,
    schema: SchemaId,
    ctx: &InstallContext,
    allow_duplicates: bool,
    visited: &mut HashSet<SchemaId>,
) -> InstallResult<usize> {
    if !visited.insert(schema) {
        return Ok(0);
    }

    let fields = registry
        .get(schema)
        .ok_or(InstallError::UnknownSchema(schema))?
        .fields()
        .to_vec();

    let mut attached = 0;
    for field in &fields {
        if let Some(sub) = field.kind.embedded_schema() {
            if !visited.contains(&sub) {
                attached += install_schema(registry, sub, ctx, false, visited)?;
            }
        }

        let Some(descriptor) = describe(field)? else {
            continue;
        };

        tracing::debug!(
            schema = %schema,
            path = %descriptor.path,
            cardinality = ?descriptor.cardinality,
            target = ?descriptor.target,
            "attaching reference validator"
        );

        let check = ReferenceCheck {
            descriptor,
            connection: ctx.connection.clone(),
            enabled: ctx.enabled.clone(),
            allow_duplicates,
        };
        let validator = FieldValidator {
            message: ctx.message.clone(),
            check: Arc::new(check),
        };

        if let Some(target) = registry.get_mut(schema) {
            if target.add_validator(&field.path, validator) {
                attached += 1;
            }
        }
    }

    Ok(attached)
}

/// Reference descriptor for a field, preferring the field's own declaration
/// over its element type's
fn describe(field: &FieldDef) -> InstallResult<Option<ReferenceDescriptor>> {
    let cardinality = if field.kind.is_array() {
        Cardinality::Array
    } else {
        Cardinality::Scalar
    };

    if let Some(options) = &field.reference {
        if let Some(descriptor) = ReferenceDescriptor::from_options(&field.path, cardinality, options)? {
            return Ok(Some(descriptor));
        }
    }

    match &field.kind {
        FieldKind::Array(ElementKind::Scalar {
            reference: Some(options),
        }) => ReferenceDescriptor::from_options(&field.path, cardinality, options),
        _ => Ok(None),
    }
}

/// Field check verifying that the referenced documents exist
pub(crate) struct ReferenceCheck {
    descriptor: ReferenceDescriptor,
    connection: Arc<dyn Connection>,
    enabled: Arc<AtomicBool>,
    allow_duplicates: bool,
}

impl ReferenceCheck {
    async fn run(&self, ctx: FieldContext<'_>) -> QueryResult<bool> {
        let document = ctx.document;

        if !document.is_modified(ctx.path) {
            tracing::trace!(path = ctx.path, "reference unchanged, skipping");
            return Ok(true);
        }

        // Toggling while a check is in flight is unordered with this read.
        if !self.enabled.load(Ordering::SeqCst) {
            tracing::trace!(path = ctx.path, "reference validation disabled, skipping");
            return Ok(true);
        }

        if is_empty_reference(ctx.value) {
            return Ok(true);
        }

        let conditions = self.descriptor.conditions.resolve(document);

        let name = self.descriptor.target.resolve(document).ok_or_else(|| {
            QueryError::UnresolvedCollection {
                path: self.descriptor.path.clone(),
            }
        })?;
        let collection = self.connection.collection(&name)?;
        let key_field = self.descriptor.key_field.as_str();

        match self.descriptor.cardinality {
            Cardinality::Scalar => {
                check_scalar(
                    collection.as_ref(),
                    key_field,
                    ctx.value,
                    &conditions,
                    document.session(),
                )
                .await
            }
            Cardinality::Array => {
                check_array(
                    collection.as_ref(),
                    key_field,
                    ctx.value,
                    &conditions,
                    self.allow_duplicates,
                    document.session(),
                )
                .await
            }
        }
    }
}

impl FieldCheck for ReferenceCheck {
    fn check<'a>(&'a self, ctx: FieldContext<'a>) -> BoxFuture<'a, QueryResult<bool>> {
        Box::pin(self.run(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refs::RefOptions;
    use crate::schema::Schema;
    use crate::store::MemoryConnection;

    fn context() -> InstallContext {
        InstallContext {
            message: "{PATH} references a non existing ID".to_string(),
            connection: Arc::new(MemoryConnection::new()),
            enabled: Arc::new(AtomicBool::new(true)),
        }
    }

    fn validators_on(registry: &SchemaRegistry, schema: SchemaId, path: &str) -> usize {
        registry
            .get(schema)
            .and_then(|s| s.get(path))
            .map_or(0, |f| f.validators.len())
    }

    #[test]
    fn test_only_reference_fields_get_validators() {
        let mut registry = SchemaRegistry::new(Arc::new(MemoryConnection::new()));
        let id = registry.register(
            Schema::new()
                .field(FieldDef::new("name", FieldKind::Scalar))
                .field(FieldDef::new("owner", FieldKind::Scalar).with_reference(RefOptions::to("users")))
                .field(FieldDef::new("tags", FieldKind::array_of_refs(RefOptions::to("tags"))))
                .field(FieldDef::new("labels", FieldKind::array())),
        );

        let attached = install(&mut registry, id, &context(), false).unwrap();
        assert_eq!(attached, 2);
        assert_eq!(validators_on(&registry, id, "name"), 0);
        assert_eq!(validators_on(&registry, id, "owner"), 1);
        assert_eq!(validators_on(&registry, id, "tags"), 1);
        assert_eq!(validators_on(&registry, id, "labels"), 0);
    }

    #[test]
    fn test_element_reference_classified_as_array() {
        let field = FieldDef::new("tags", FieldKind::array_of_refs(RefOptions::to("tags")));
        let descriptor = describe(&field).unwrap().unwrap();
        assert_eq!(descriptor.cardinality, Cardinality::Array);

        let direct = FieldDef::new("tags", FieldKind::array()).with_reference(RefOptions::to("tags"));
        assert_eq!(describe(&direct).unwrap().unwrap().cardinality, Cardinality::Array);
    }

    #[test]
    fn test_self_embedding_schema_installs_once() {
        let mut registry = SchemaRegistry::new(Arc::new(MemoryConnection::new()));
        let node = registry.reserve();
        registry.define(
            node,
            Schema::new()
                .field(FieldDef::new("owner", FieldKind::Scalar).with_reference(RefOptions::to("users")))
                .field(FieldDef::new("child", FieldKind::Embedded(node)))
                .field(FieldDef::new("children", FieldKind::array_of(node))),
        );

        let attached = install(&mut registry, node, &context(), false).unwrap();
        assert_eq!(attached, 1);
        assert_eq!(validators_on(&registry, node, "owner"), 1);
    }

    #[test]
    fn test_shared_sub_schema_installed_once() {
        let mut registry = SchemaRegistry::new(Arc::new(MemoryConnection::new()));
        let address = registry.register(
            Schema::new()
                .field(FieldDef::new("city", FieldKind::Scalar).with_reference(RefOptions::to("cities"))),
        );
        let person = registry.register(
            Schema::new()
                .field(FieldDef::new("home", FieldKind::Embedded(address)))
                .field(FieldDef::new("work", FieldKind::Embedded(address))),
        );

        assert_eq!(install(&mut registry, person, &context(), false).unwrap(), 1);
        assert_eq!(validators_on(&registry, address, "city"), 1);
    }

    #[test]
    fn test_conflicting_declaration_fails_install() {
        let mut registry = SchemaRegistry::new(Arc::new(MemoryConnection::new()));
        let mut options = RefOptions::to("users");
        options.ref_path = Some("kind".to_string());
        let id = registry.register(
            Schema::new().field(FieldDef::new("owner", FieldKind::Scalar).with_reference(options)),
        );

        let err = install(&mut registry, id, &context(), false).unwrap_err();
        assert!(matches!(err, InstallError::ConflictingTargets { .. }));
    }

    #[test]
    fn test_unknown_schema() {
        let mut registry = SchemaRegistry::new(Arc::new(MemoryConnection::new()));
        let stray = SchemaRegistry::new(Arc::new(MemoryConnection::new())).reserve();
        let err = install(&mut registry, stray, &context(), false).unwrap_err();
        assert!(matches!(err, InstallError::UnknownSchema(id) if id == stray));
    }
}
