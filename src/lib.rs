//! Deterministic replay client for ledger-hosted contracts.
//!
//! weft derives the state of a contract by fetching every interaction
//! record that references it from an append-only ledger, ordering the
//! records by a ledger-derived sort key, and folding a state-transition
//! handler over them. The ledger settles only order and existence; the
//! state itself is recomputed locally, so any two clients running the
//! same fold produce byte-identical results.

#![forbid(unsafe_code)]

pub mod config;
pub mod contract;
pub mod core;
pub mod error;
pub mod execute;
pub mod gateway;
pub mod replay;
pub mod telemetry;
pub mod test_harness;

pub use error::{Error, Transience};
pub type Result<T> = std::result::Result<T, Error>;

// Re-export the types most callers touch.
pub use crate::config::Config;
pub use crate::contract::{
    contract_assert, CallContext, ContractDescriptor, Interaction, StateTransition,
    TransitionError, TransitionOutcome,
};
pub use crate::core::{
    Address, BlockId, BlockRef, InteractionRecord, ReplayState, SortKey, Tags, TxId, ValidityMap,
    Winston,
};
pub use crate::execute::ExecutionResult;
pub use crate::gateway::{Gateway, HttpGateway};
pub use crate::replay::{Client, ReplayOptions, ReplayOutput};
