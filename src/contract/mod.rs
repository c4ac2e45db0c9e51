//! Contract resolution and handler construction.
//!
//! A contract is a ledger transaction pointing at a source transaction.
//! Loading it resolves both, normalizes the source, and hands it to a
//! compiler that produces the callable state transition. Each execution
//! binds a fresh [`CallContext`]; nothing is shared across contract ids
//! or source versions.

pub mod context;
pub mod handler;
pub mod loader;
pub mod registry;
pub mod source;

pub use context::{ActiveCall, CallContext, ForeignStateReader, PendingCall, ReadScope};
pub use handler::{contract_assert, Interaction, StateTransition, TransitionError, TransitionOutcome};
pub use loader::{load_contract, ContractDescriptor, LoadError, LoadedContract};
pub use registry::{CompileError, CompilerSet, NativeCompiler, NativeRegistry, SourceCompiler};
pub use source::{normalize_source, ContractSource};
