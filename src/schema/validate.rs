//! Document validation driver
//!
//! Runs every attached field validator of a schema, descending into embedded
//! sub-documents and arrays of sub-documents. Fields of one document are
//! checked concurrently; errors are keyed by full dotted path.

use futures::future::{BoxFuture, join_all};
use serde_json::Value;

use super::{Document, ElementKind, FieldContext, FieldDef, FieldKind, SchemaId, SchemaRegistry};
use crate::error::{ValidateError, ValidateResult, ValidationErrors};

impl SchemaRegistry {
    /// Validate a document against a registered schema.
    ///
    /// Field failures come back as `ValidateError::Invalid`; a failed query
    /// aborts with `ValidateError::Query` and no verdict.
    pub async fn validate(&self, id: SchemaId, document: &Document) -> ValidateResult<()> {
        let errors = self.collect_errors(id, document, String::new()).await?;
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidateError::Invalid(errors))
        }
    }

    fn collect_errors<'a>(
        &'a self,
        id: SchemaId,
        document: &'a Document,
        prefix: String,
    ) -> BoxFuture<'a, ValidateResult<ValidationErrors>> {
        Box::pin(async move {
            let schema = self.get(id).ok_or(ValidateError::UnknownSchema(id))?;

            let pending = schema
                .fields()
                .iter()
                .map(|field| self.validate_field(field, document, &prefix));

            let mut errors = ValidationErrors::new();
            for outcome in join_all(pending).await {
                errors.extend(outcome?);
            }
            Ok(errors)
        })
    }

    async fn validate_field(
        &self,
        field: &FieldDef,
        document: &Document,
        prefix: &str,
    ) -> ValidateResult<ValidationErrors> {
        let full_path = format!("{}{}", prefix, field.path);
        let value = document.get(&field.path).filter(|v| !v.is_null());
        let mut errors = ValidationErrors::new();

        for validator in &field.validators {
            let ctx = FieldContext {
                document,
                path: &field.path,
                value,
            };
            if !validator.check.check(ctx).await? {
                errors.push(full_path.clone(), validator.render(&full_path));
                break;
            }
        }

        match &field.kind {
            FieldKind::Embedded(sub) => {
                if let Some(child) = document.sub_document(&field.path) {
                    let nested = self
                        .collect_errors(*sub, &child, format!("{}.", full_path))
                        .await?;
                    errors.extend(nested);
                }
            }
            FieldKind::Array(ElementKind::Embedded(sub)) => {
                let len = value.and_then(Value::as_array).map_or(0, Vec::len);
                for index in 0..len {
                    let element = format!("{}.{}", field.path, index);
                    if let Some(child) = document.sub_document(&element) {
                        let nested = self
                            .collect_errors(*sub, &child, format!("{}.{}.", full_path, index))
                            .await?;
                        errors.extend(nested);
                    }
                }
            }
            _ => {}
        }

        Ok(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{QueryError, QueryResult};
    use crate::schema::{FieldCheck, FieldValidator, Schema};
    use crate::store::MemoryConnection;
    use serde_json::json;
    use std::sync::Arc;

    /// Fails when the value equals the configured sentinel
    struct Rejects(Value);

    impl FieldCheck for Rejects {
        fn check<'a>(&'a self, ctx: FieldContext<'a>) -> BoxFuture<'a, QueryResult<bool>> {
            Box::pin(async move { Ok(ctx.value != Some(&self.0)) })
        }
    }

    struct Broken;

    impl FieldCheck for Broken {
        fn check<'a>(&'a self, _ctx: FieldContext<'a>) -> BoxFuture<'a, QueryResult<bool>> {
            Box::pin(async { Err(QueryError::Backend("boom".to_string())) })
        }
    }

    fn rejecting(value: Value) -> FieldValidator {
        FieldValidator {
            message: "{PATH} rejected".to_string(),
            check: Arc::new(Rejects(value)),
        }
    }

    fn registry() -> SchemaRegistry {
        SchemaRegistry::new(Arc::new(MemoryConnection::new()))
    }

    #[tokio::test]
    async fn test_nested_errors_use_full_paths() {
        let mut registry = registry();
        let node = registry.reserve();
        let mut schema = Schema::new()
            .field(FieldDef::new("value", FieldKind::Scalar))
            .field(FieldDef::new("children", FieldKind::array_of(node)));
        schema.add_validator("value", rejecting(json!("bad")));
        registry.define(node, schema);

        let doc = Document::new(json!({
            "value": "ok",
            "children": [
                {"value": "ok"},
                {"value": "ok", "children": [{"value": "bad"}]}
            ]
        }));

        let err = registry.validate(node, &doc).await.unwrap_err();
        let errors = err.validation_errors().unwrap();
        assert_eq!(errors.paths(), vec!["children.1.children.0.value"]);
        assert_eq!(
            errors.get("children.1.children.0.value").unwrap().message,
            "children.1.children.0.value rejected"
        );
    }

    #[tokio::test]
    async fn test_query_failure_is_not_a_verdict() {
        let mut registry = registry();
        let mut schema = Schema::new().field(FieldDef::new("value", FieldKind::Scalar));
        schema.add_validator(
            "value",
            FieldValidator {
                message: "never rendered".to_string(),
                check: Arc::new(Broken),
            },
        );
        let id = registry.register(schema);

        let err = registry
            .validate(id, &Document::new(json!({"value": 1})))
            .await
            .unwrap_err();
        assert!(matches!(err, ValidateError::Query(QueryError::Backend(ref m)) if m == "boom"));
    }

    #[tokio::test]
    async fn test_unknown_schema() {
        let registry = registry();
        let other = registry_id();
        let err = registry
            .validate(other, &Document::new(json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, ValidateError::UnknownSchema(id) if id == other));
    }

    fn registry_id() -> SchemaId {
        registry().reserve()
    }
}
