//! The state-transition interface contract code implements.
//!
//! This is the explicit-context rendition of the handler shape: instead
//! of ambient globals, a handler receives the per-call [`CallContext`]
//! and the parsed interaction, and signals business-rule rejections with
//! the distinguished [`TransitionError::Rejected`] kind.

use serde_json::Value;
use thiserror::Error;

use crate::core::Address;

use super::context::CallContext;

/// The parsed call handed to a handler for one fold step.
#[derive(Clone, Debug)]
pub struct Interaction {
    pub input: Value,
    pub caller: Address,
}

/// What a transition returns: a new state, a caller-visible result, or
/// both. Declaring neither is a contract bug and classifies as a fault.
#[derive(Clone, Debug, Default)]
pub struct TransitionOutcome {
    pub state: Option<Value>,
    pub result: Option<Value>,
}

impl TransitionOutcome {
    pub fn with_state(state: Value) -> Self {
        Self {
            state: Some(state),
            result: None,
        }
    }

    pub fn with_result(result: Value) -> Self {
        Self {
            state: None,
            result: Some(result),
        }
    }
}

#[derive(Debug, Error)]
pub enum TransitionError {
    /// The distinguished business-rule rejection. The step rolls back,
    /// the record is marked invalid, and the replay continues.
    #[error("{0}")]
    Rejected(String),

    /// Anything else that went wrong inside the handler. Same rollback
    /// treatment, but logged loudly: it points at a contract bug rather
    /// than expected user error.
    #[error("{0}")]
    Fault(String),
}

impl From<serde_json::Error> for TransitionError {
    fn from(e: serde_json::Error) -> Self {
        TransitionError::Fault(e.to_string())
    }
}

/// Raise [`TransitionError::Rejected`] when `condition` is false.
pub fn contract_assert(condition: bool, message: impl Into<String>) -> Result<(), TransitionError> {
    if condition {
        Ok(())
    } else {
        Err(TransitionError::Rejected(message.into()))
    }
}

/// A contract's state transition. Implementations are owned by one
/// contract/source-version pair, invoked through `&self`, and must not
/// keep mutable state across invocations.
pub trait StateTransition: Send + Sync {
    fn transition(
        &self,
        ctx: &CallContext<'_>,
        state: Value,
        interaction: &Interaction,
    ) -> Result<TransitionOutcome, TransitionError>;
}

impl<F> StateTransition for F
where
    F: Fn(&CallContext<'_>, Value, &Interaction) -> Result<TransitionOutcome, TransitionError>
        + Send
        + Sync,
{
    fn transition(
        &self,
        ctx: &CallContext<'_>,
        state: Value,
        interaction: &Interaction,
    ) -> Result<TransitionOutcome, TransitionError> {
        self(ctx, state, interaction)
    }
}
