//! Self-embedding schemas
//!
//! Installing on a schema that embeds itself must terminate, and the
//! validators it attaches must apply at every nesting depth.

use refguard::refs::{RefOptions, RefValidator, ValidatorConfig};
use refguard::schema::{Document, FieldDef, FieldKind, Schema, SchemaId, SchemaRegistry};
use refguard::store::MemoryConnection;
use serde_json::json;
use std::sync::Arc;

fn store() -> MemoryConnection {
    let conn = MemoryConnection::new();
    for id in 1..=3 {
        conn.insert("users", json!({"_id": id}));
    }
    conn
}

/// A comment that embeds a pinned comment and a list of replies, both comments
fn comment_registry(config: ValidatorConfig) -> (SchemaRegistry, SchemaId) {
    let mut registry = SchemaRegistry::new(Arc::new(store()));
    let comment = registry.reserve();
    registry.define(
        comment,
        Schema::new()
            .field(FieldDef::new("author", FieldKind::Scalar).with_reference(RefOptions::to("users")))
            .field(FieldDef::new("mentions", FieldKind::array_of_refs(RefOptions::to("users"))))
            .field(FieldDef::new("pinned", FieldKind::Embedded(comment)))
            .field(FieldDef::new("replies", FieldKind::array_of(comment))),
    );

    let attached = RefValidator::new(config).install(&mut registry, comment).unwrap();
    assert_eq!(attached, 2);
    (registry, comment)
}

#[tokio::test]
async fn references_checked_at_every_depth() {
    let (registry, comment) = comment_registry(ValidatorConfig::default());

    let valid = Document::new(json!({
        "author": 1,
        "pinned": {"author": 2, "replies": [{"author": 3}]},
        "replies": [
            {"author": 2, "replies": [{"author": 1, "mentions": [2, 3]}]}
        ]
    }));
    assert!(registry.validate(comment, &valid).await.is_ok());

    let deep_invalid = Document::new(json!({
        "author": 1,
        "pinned": {"author": 2, "replies": [{"author": 3, "mentions": [9]}]},
        "replies": [
            {"author": 2, "replies": [{"author": 1}, {"author": 8}]}
        ]
    }));
    let err = registry.validate(comment, &deep_invalid).await.unwrap_err();
    let errors = err.validation_errors().unwrap();
    assert_eq!(
        errors.paths(),
        vec!["pinned.replies.0.mentions", "replies.0.replies.1.author"]
    );
    assert_eq!(
        errors.get("replies.0.replies.1.author").unwrap().message,
        "replies.0.replies.1.author references a non existing ID"
    );
}

#[tokio::test]
async fn duplicate_tolerance_stays_at_top_level() {
    let config = ValidatorConfig {
        allow_duplicates: true,
        ..ValidatorConfig::default()
    };

    let mut registry = SchemaRegistry::new(Arc::new(store()));
    let reply = registry.register(
        Schema::new().field(FieldDef::new("mentions", FieldKind::array_of_refs(RefOptions::to("users")))),
    );
    let thread = registry.register(
        Schema::new()
            .field(FieldDef::new("mentions", FieldKind::array_of_refs(RefOptions::to("users"))))
            .field(FieldDef::new("replies", FieldKind::array_of(reply))),
    );
    RefValidator::new(config).install(&mut registry, thread).unwrap();

    let top_level = Document::new(json!({"mentions": [1, 1]}));
    assert!(registry.validate(thread, &top_level).await.is_ok());

    let nested = Document::new(json!({"replies": [{"mentions": [1, 1]}]}));
    let err = registry.validate(thread, &nested).await.unwrap_err();
    assert_eq!(err.validation_errors().unwrap().paths(), vec!["replies.0.mentions"]);
}

#[tokio::test]
async fn nested_change_tracking_skips_untouched_branches() {
    let conn = store();
    let mut registry = SchemaRegistry::new(Arc::new(conn.clone()));
    let comment = registry.reserve();
    registry.define(
        comment,
        Schema::new()
            .field(FieldDef::new("author", FieldKind::Scalar).with_reference(RefOptions::to("users")))
            .field(FieldDef::new("replies", FieldKind::array_of(comment))),
    );
    RefValidator::new(ValidatorConfig::default())
        .install(&mut registry, comment)
        .unwrap();

    let mut doc = Document::persisted(json!({
        "author": 1,
        "replies": [{"author": 2}, {"author": 3}]
    }));
    doc.set("replies.1.author", json!(7));

    let err = registry.validate(comment, &doc).await.unwrap_err();
    assert_eq!(err.validation_errors().unwrap().paths(), vec!["replies.1.author"]);
    assert_eq!(conn.query_count(), 1);
}
