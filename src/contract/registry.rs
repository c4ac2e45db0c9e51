//! Source compilers.
//!
//! Turning raw source into a callable transition is a plugin problem: a
//! [`SourceCompiler`] accepts the source formats it understands and
//! produces an isolated [`StateTransition`] instance per load. The crate
//! ships [`NativeCompiler`], which resolves the normalized entry token of
//! a source against a process-local registry of Rust handler factories;
//! consumers add their own compilers for other content types.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;

use crate::core::protocol;

use super::handler::StateTransition;
use super::source::ContractSource;

#[derive(Debug, Error)]
#[error("{reason}")]
pub struct CompileError {
    pub reason: String,
}

impl CompileError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

pub trait SourceCompiler: Send + Sync {
    /// Whether this compiler understands `source`.
    fn supports(&self, source: &ContractSource) -> bool;

    /// Build a fresh handler instance for `source`. Instances are never
    /// reused across contract ids.
    fn compile(&self, source: &ContractSource) -> Result<Box<dyn StateTransition>, CompileError>;
}

/// First-match-wins set of compilers.
#[derive(Clone, Default)]
pub struct CompilerSet {
    compilers: Vec<Arc<dyn SourceCompiler>>,
}

impl CompilerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard set: just the native-handler compiler over `registry`.
    pub fn standard(registry: Arc<NativeRegistry>) -> Self {
        let mut set = Self::new();
        set.push(Arc::new(NativeCompiler::new(registry)));
        set
    }

    pub fn push(&mut self, compiler: Arc<dyn SourceCompiler>) {
        self.compilers.push(compiler);
    }

    /// The first compiler claiming `source`, or `None` when the format is
    /// unsupported.
    pub fn find(&self, source: &ContractSource) -> Option<&Arc<dyn SourceCompiler>> {
        self.compilers.iter().find(|c| c.supports(source))
    }
}

/// Factory producing a fresh handler from a claimed source.
pub type HandlerFactory =
    Arc<dyn Fn(&ContractSource) -> Result<Box<dyn StateTransition>, CompileError> + Send + Sync>;

/// Process-local registry of native Rust handlers, keyed by entry token.
#[derive(Default)]
pub struct NativeRegistry {
    factories: RwLock<HashMap<String, HandlerFactory>>,
}

impl NativeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `entry`. Re-registering an entry replaces
    /// the previous factory.
    pub fn register<F>(&self, entry: impl Into<String>, factory: F)
    where
        F: Fn(&ContractSource) -> Result<Box<dyn StateTransition>, CompileError>
            + Send
            + Sync
            + 'static,
    {
        self.factories
            .write()
            .expect("registry lock poisoned")
            .insert(entry.into(), Arc::new(factory));
    }

    fn resolve(&self, entry: &str) -> Option<HandlerFactory> {
        self.factories
            .read()
            .expect("registry lock poisoned")
            .get(entry)
            .cloned()
    }
}

/// Compiles `application/x.native-handler` sources by entry lookup.
pub struct NativeCompiler {
    registry: Arc<NativeRegistry>,
}

impl NativeCompiler {
    pub fn new(registry: Arc<NativeRegistry>) -> Self {
        Self { registry }
    }
}

impl SourceCompiler for NativeCompiler {
    fn supports(&self, source: &ContractSource) -> bool {
        source.content_type.as_deref() == Some(protocol::CONTENT_TYPE_NATIVE)
    }

    fn compile(&self, source: &ContractSource) -> Result<Box<dyn StateTransition>, CompileError> {
        let entry = source.entry();
        let factory = self.registry.resolve(&entry).ok_or_else(|| {
            CompileError::new(format!("no native handler registered for entry {:?}", entry))
        })?;
        factory(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::handler::{Interaction, TransitionError, TransitionOutcome};
    use crate::contract::CallContext;
    use crate::core::TxId;
    use serde_json::Value;

    fn noop_handler(
        _ctx: &CallContext<'_>,
        state: Value,
        _interaction: &Interaction,
    ) -> Result<TransitionOutcome, TransitionError> {
        Ok(TransitionOutcome::with_state(state))
    }

    fn source(text: &str, content_type: Option<&str>) -> ContractSource {
        ContractSource {
            tx_id: TxId::parse("uhE-QeYS8i4pmUtnxQyHD7dzXFNaJ9oMK-IM-QPNY6M").unwrap(),
            text: text.to_string(),
            content_type: content_type.map(str::to_string),
        }
    }

    #[test]
    fn native_compiler_resolves_registered_entry() {
        let registry = Arc::new(NativeRegistry::new());
        registry.register("noop", |_source| Ok(Box::new(noop_handler) as Box<dyn StateTransition>));

        let set = CompilerSet::standard(registry);
        let src = source(
            "module.exports = noop;",
            Some(protocol::CONTENT_TYPE_NATIVE),
        );
        let compiler = set.find(&src).expect("native source should be claimed");
        assert!(compiler.compile(&src).is_ok());
    }

    #[test]
    fn unknown_entry_is_a_compile_error() {
        let set = CompilerSet::standard(Arc::new(NativeRegistry::new()));
        let src = source("ghost", Some(protocol::CONTENT_TYPE_NATIVE));
        let compiler = set.find(&src).unwrap();
        assert!(compiler.compile(&src).is_err());
    }

    #[test]
    fn unsupported_content_type_is_unclaimed() {
        let set = CompilerSet::standard(Arc::new(NativeRegistry::new()));
        assert!(set.find(&source("x", Some("application/javascript"))).is_none());
        assert!(set.find(&source("x", None)).is_none());
    }
}
