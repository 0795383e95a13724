//! In-memory connection backed by JSON documents
//!
//! Used by the test suites and the CLI. Supports session-staged inserts
//! (visible only to queries bound to the same session until committed), a
//! query counter, and an availability switch for simulating outages.

use futures::future::{self, BoxFuture};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::{Collection, Connection, Filter, Session};
use crate::error::{QueryError, QueryResult};

#[derive(Default)]
struct StoreState {
    committed: HashMap<String, Vec<Value>>,
    staged: HashMap<Session, HashMap<String, Vec<Value>>>,
}

struct Shared {
    state: RwLock<StoreState>,
    available: AtomicBool,
    queries: AtomicUsize,
}

/// Cloneable in-memory connection; clones share the same data
#[derive(Clone)]
pub struct MemoryConnection {
    shared: Arc<Shared>,
}

impl MemoryConnection {
    /// Create an empty, available connection
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(StoreState::default()),
                available: AtomicBool::new(true),
                queries: AtomicUsize::new(0),
            }),
        }
    }

    /// Declare a collection so it resolves even while empty
    pub fn create_collection(&self, name: &str) {
        self.shared
            .state
            .write()
            .committed
            .entry(name.to_string())
            .or_default();
    }

    /// Insert a committed document
    pub fn insert(&self, collection: &str, document: Value) {
        self.shared
            .state
            .write()
            .committed
            .entry(collection.to_string())
            .or_default()
            .push(document);
    }

    /// Stage a document inside a session
    pub fn insert_in_session(&self, session: &Session, collection: &str, document: Value) {
        let mut state = self.shared.state.write();
        state.committed.entry(collection.to_string()).or_default();
        state
            .staged
            .entry(session.clone())
            .or_default()
            .entry(collection.to_string())
            .or_default()
            .push(document);
    }

    /// Publish everything staged in a session
    pub fn commit(&self, session: &Session) {
        let mut state = self.shared.state.write();
        if let Some(staged) = state.staged.remove(session) {
            for (collection, documents) in staged {
                state
                    .committed
                    .entry(collection)
                    .or_default()
                    .extend(documents);
            }
        }
    }

    /// Drop everything staged in a session
    pub fn abort(&self, session: &Session) {
        self.shared.state.write().staged.remove(session);
    }

    /// Toggle whether queries succeed
    pub fn set_available(&self, available: bool) {
        self.shared.available.store(available, Ordering::SeqCst);
    }

    /// Number of count queries executed so far
    pub fn query_count(&self) -> usize {
        self.shared.queries.load(Ordering::SeqCst)
    }

    fn count(&self, collection: &str, filter: &Filter, session: Option<&Session>) -> QueryResult<u64> {
        self.shared.queries.fetch_add(1, Ordering::SeqCst);

        if !self.shared.available.load(Ordering::SeqCst) {
            return Err(QueryError::Unavailable(
                "in-memory store is offline".to_string(),
            ));
        }

        let state = self.shared.state.read();
        let committed = state
            .committed
            .get(collection)
            .ok_or_else(|| QueryError::UnknownCollection(collection.to_string()))?;

        let staged = session
            .and_then(|session| state.staged.get(session))
            .and_then(|collections| collections.get(collection))
            .map(|documents| documents.as_slice())
            .unwrap_or_default();

        let matched = committed
            .iter()
            .chain(staged.iter())
            .filter(|document| filter.matches(document))
            .count();

        Ok(matched as u64)
    }
}

impl Default for MemoryConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl Connection for MemoryConnection {
    fn collection(&self, name: &str) -> QueryResult<Arc<dyn Collection>> {
        Ok(Arc::new(MemoryCollection {
            name: name.to_string(),
            connection: self.clone(),
        }))
    }
}

/// Collection handle into a `MemoryConnection`
pub struct MemoryCollection {
    name: String,
    connection: MemoryConnection,
}

impl Collection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn count_documents<'a>(
        &'a self,
        filter: &'a Filter,
        session: Option<&'a Session>,
    ) -> BoxFuture<'a, QueryResult<u64>> {
        Box::pin(future::ready(self.connection.count(&self.name, filter, session)))
    }
}
