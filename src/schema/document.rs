//! Document instances with change tracking
//!
//! A document is a JSON object plus the set of paths changed since it was
//! last persisted. Newly created documents count as entirely modified.

use serde_json::{Map, Value};
use std::collections::BTreeSet;

use crate::store::{Session, lookup_path};

#[derive(Debug, Clone, PartialEq, Eq)]
enum ChangeState {
    /// Never persisted, or wholly replaced: every path is modified
    All,
    /// Persisted; only these paths were set since
    Tracked(BTreeSet<String>),
}

/// A document being created, updated or validated
#[derive(Debug, Clone)]
pub struct Document {
    root: Value,
    changes: ChangeState,
    session: Option<Session>,
}

impl Document {
    /// A new, unsaved document
    ///
    /// Non-object input yields an empty document; callers taking untrusted
    /// input should reject it first.
    pub fn new(fields: Value) -> Self {
        Self {
            root: into_object(fields),
            changes: ChangeState::All,
            session: None,
        }
    }

    /// A document loaded from storage, with no pending changes
    pub fn persisted(fields: Value) -> Self {
        Self {
            root: into_object(fields),
            changes: ChangeState::Tracked(BTreeSet::new()),
            session: None,
        }
    }

    /// Bind the document to a session (builder form)
    pub fn with_session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    /// Session the document is part of, if any
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Whether the document has never been persisted
    pub fn is_new(&self) -> bool {
        self.changes == ChangeState::All
    }

    /// Read a dotted path
    pub fn get(&self, path: &str) -> Option<&Value> {
        lookup_path(&self.root, path)
    }

    /// Read a dotted path as a string
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    /// Write a dotted path, creating intermediate objects, and mark it modified
    pub fn set(&mut self, path: &str, value: Value) {
        let segments: Vec<&str> = path.split('.').collect();
        write_path(&mut self.root, &segments, value);

        if let ChangeState::Tracked(paths) = &mut self.changes {
            paths.insert(path.to_string());
        }
    }

    /// Whether a path (or anything above or below it) changed since the last save
    pub fn is_modified(&self, path: &str) -> bool {
        match &self.changes {
            ChangeState::All => true,
            ChangeState::Tracked(paths) => paths.iter().any(|changed| {
                changed == path || is_descendant(changed, path) || is_descendant(path, changed)
            }),
        }
    }

    /// Forget pending changes, as after a successful save
    pub fn mark_persisted(&mut self) {
        self.changes = ChangeState::Tracked(BTreeSet::new());
    }

    /// View of an embedded object at `path`, with change state translated
    ///
    /// Returns `None` if the value at `path` is not an object. The view shares
    /// this document's session.
    pub fn sub_document(&self, path: &str) -> Option<Document> {
        let value = self.get(path)?;
        if !value.is_object() {
            return None;
        }

        let changes = match &self.changes {
            ChangeState::All => ChangeState::All,
            ChangeState::Tracked(paths) => {
                if paths.iter().any(|changed| changed == path || is_descendant(path, changed)) {
                    ChangeState::All
                } else {
                    let prefix = format!("{}.", path);
                    ChangeState::Tracked(
                        paths
                            .iter()
                            .filter_map(|changed| changed.strip_prefix(&prefix))
                            .map(str::to_string)
                            .collect(),
                    )
                }
            }
        };

        Some(Document {
            root: value.clone(),
            changes,
            session: self.session.clone(),
        })
    }
}

fn write_path(target: &mut Value, segments: &[&str], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *target = value;
        return;
    };

    if let Value::Array(items) = target {
        if let Some(slot) = head.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
            write_path(slot, rest, value);
            return;
        }
    }

    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(map) = target {
        let slot = map.entry(head.to_string()).or_insert(Value::Null);
        write_path(slot, rest, value);
    }
}

/// `child` lies strictly below `ancestor` in the dotted hierarchy
fn is_descendant(child: &str, ancestor: &str) -> bool {
    child
        .strip_prefix(ancestor)
        .is_some_and(|rest| rest.starts_with('.'))
}

fn into_object(fields: Value) -> Value {
    match fields {
        Value::Object(_) => fields,
        _ => Value::Object(Map::new()),
    }
}
