//! Reference existence validation
//!
//! `RefValidator` walks a schema once, attaching a validator to every field
//! that declares a reference to another collection. At validation time each
//! changed reference costs exactly one count query.
//!
//! The validator can be switched off and on (e.g. while loading fixtures)
//! without touching the installed schema hooks. The switch is a plain atomic
//! flag: flipping it while a validation pass is in flight races with that
//! pass's decision to skip, and the outcome of that race is unspecified.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::InstallResult;
use crate::schema::{SchemaId, SchemaRegistry};
use crate::store::Connection;

pub mod checker;
pub mod conditions;
mod installer;
pub mod options;

pub use conditions::{ConditionValue, Conditions, ResolvedConditions};
pub use options::{Cardinality, RefOptions, ReferenceDescriptor, TargetStrategy, ID_FIELD};

/// Default failure message
pub const DEFAULT_MESSAGE: &str = "{PATH} references a non existing ID";

/// Configuration for a reference validator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Failure message template; `{PATH}` is replaced with the field path
    pub message: String,

    /// Count repeated array references once (top-level schema only)
    pub allow_duplicates: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            message: DEFAULT_MESSAGE.to_string(),
            allow_duplicates: false,
        }
    }
}

/// Toggleable reference validator
///
/// Clones share the same on/off switch.
#[derive(Clone)]
pub struct RefValidator {
    config: ValidatorConfig,
    connection: Option<Arc<dyn Connection>>,
    enabled: Arc<AtomicBool>,
}

impl RefValidator {
    /// Create an enabled validator
    pub fn new(config: ValidatorConfig) -> Self {
        Self {
            config,
            connection: None,
            enabled: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Query `connection` instead of the registry's default
    pub fn with_connection(mut self, connection: Arc<dyn Connection>) -> Self {
        self.connection = Some(connection);
        self
    }

    /// Resume checking references
    pub fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
        tracing::info!("reference validation enabled");
    }

    /// Make every reference check pass without querying
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
        tracing::info!("reference validation disabled");
    }

    /// Whether checks currently run
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Attach validators to `schema` and its embedded schemas.
    ///
    /// Returns the number of validators attached.
    pub fn install(&self, registry: &mut SchemaRegistry, schema: SchemaId) -> InstallResult<usize> {
        let ctx = installer::InstallContext {
            message: self.config.message.clone(),
            connection: self
                .connection
                .clone()
                .unwrap_or_else(|| registry.connection().clone()),
            enabled: self.enabled.clone(),
        };
        installer::install(registry, schema, &ctx, self.config.allow_duplicates)
    }

    /// Install function bound to this validator
    pub fn installer(&self) -> impl Fn(&mut SchemaRegistry, SchemaId) -> InstallResult<usize> + use<> {
        let validator = self.clone();
        move |registry: &mut SchemaRegistry, schema: SchemaId| validator.install(registry, schema)
    }
}
