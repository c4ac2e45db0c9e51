//! Single-interaction execution and outcome classification.

use std::panic::{self, AssertUnwindSafe};

use serde_json::Value;

use crate::contract::{CallContext, Interaction, StateTransition, TransitionError};

/// The classified outcome of one interaction attempt. On anything but
/// `Ok` the caller's state is untouched; classification is final, there
/// are no retries at this layer.
#[derive(Clone, Debug)]
pub enum ExecutionResult {
    Ok {
        state: Value,
        result: Option<Value>,
    },
    /// Intentional business-rule rejection raised by contract code.
    Rejected { message: String },
    /// Unexpected failure inside the transition: a bug, not user error.
    Faulted { trace: String },
}

impl ExecutionResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, ExecutionResult::Ok { .. })
    }

    /// The caller-visible result value, when the attempt produced one.
    pub fn result(&self) -> Option<&Value> {
        match self {
            ExecutionResult::Ok { result, .. } => result.as_ref(),
            _ => None,
        }
    }
}

/// Invoke `handler` once against a deep copy of `state`.
///
/// The handler owns its copy outright; whatever it does to it on a
/// failing path cannot leak back into the caller's state. Panics are
/// contained and classified as faults, the same as any non-rejection
/// error.
pub fn execute_interaction(
    handler: &dyn StateTransition,
    ctx: &CallContext<'_>,
    interaction: &Interaction,
    state: &Value,
) -> ExecutionResult {
    let copy = state.clone();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        handler.transition(ctx, copy, interaction)
    }));

    match outcome {
        Ok(Ok(outcome)) => {
            if outcome.state.is_none() && outcome.result.is_none() {
                return ExecutionResult::Faulted {
                    trace: "transition declared neither state nor result".into(),
                };
            }
            ExecutionResult::Ok {
                state: outcome.state.unwrap_or_else(|| state.clone()),
                result: outcome.result,
            }
        }
        Ok(Err(TransitionError::Rejected(message))) => ExecutionResult::Rejected { message },
        Ok(Err(err)) => ExecutionResult::Faulted {
            trace: err.to_string(),
        },
        Err(payload) => ExecutionResult::Faulted {
            trace: panic_message(payload),
        },
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("handler panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("handler panicked: {s}")
    } else {
        "handler panicked".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::contract::{
        contract_assert, ActiveCall, ContractDescriptor, ReadScope, TransitionOutcome,
    };
    use crate::core::ReplayState;
    use crate::test_harness::{fixtures, NullReader};

    fn run(
        handler: impl StateTransition,
        state: Value,
        input: Value,
    ) -> (ExecutionResult, Value) {
        let descriptor = ContractDescriptor {
            id: fixtures::tx_id(1),
            src_tx_id: fixtures::tx_id(2),
            owner: fixtures::address("owner"),
            min_fee: None,
            init_state: ReplayState::new(json!({})),
        };
        let record = fixtures::interaction_record(fixtures::tx_id(3), "caller", 7, json!({}));
        let reader = NullReader;
        let scope = ReadScope::root(descriptor.id.clone(), 4);
        let ctx = CallContext::new(&descriptor, ActiveCall::Confirmed(&record), &reader, &scope);
        let interaction = Interaction {
            input,
            caller: fixtures::address("caller"),
        };
        let result = execute_interaction(&handler, &ctx, &interaction, &state);
        (result, state)
    }

    fn returns_new_state(
        _ctx: &CallContext<'_>,
        _state: Value,
        _interaction: &Interaction,
    ) -> Result<TransitionOutcome, TransitionError> {
        Ok(TransitionOutcome::with_state(json!({ "n": 1 })))
    }

    fn scribbles_then_returns_result(
        _ctx: &CallContext<'_>,
        mut state: Value,
        _interaction: &Interaction,
    ) -> Result<TransitionOutcome, TransitionError> {
        // Scribble on the copy, then only declare a result.
        state["n"] = json!(99);
        Ok(TransitionOutcome::with_result(json!("answer")))
    }

    fn declares_nothing(
        _ctx: &CallContext<'_>,
        _state: Value,
        _interaction: &Interaction,
    ) -> Result<TransitionOutcome, TransitionError> {
        Ok(TransitionOutcome::default())
    }

    fn rejects(
        _ctx: &CallContext<'_>,
        _state: Value,
        _interaction: &Interaction,
    ) -> Result<TransitionOutcome, TransitionError> {
        contract_assert(false, "insufficient funds")?;
        Ok(TransitionOutcome::default())
    }

    fn panics(
        _ctx: &CallContext<'_>,
        _state: Value,
        _interaction: &Interaction,
    ) -> Result<TransitionOutcome, TransitionError> {
        panic!("boom")
    }

    #[test]
    fn ok_with_state_replaces_state() {
        let (result, _before) = run(returns_new_state, json!({ "n": 0 }), json!({}));
        match result {
            ExecutionResult::Ok { state, result } => {
                assert_eq!(state, json!({ "n": 1 }));
                assert!(result.is_none());
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn ok_with_only_result_keeps_prior_state() {
        let (result, before) = run(scribbles_then_returns_result, json!({ "n": 0 }), json!({}));
        match result {
            ExecutionResult::Ok { state, result } => {
                assert_eq!(state, before);
                assert_eq!(result, Some(json!("answer")));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn empty_outcome_is_a_fault() {
        let (result, _) = run(declares_nothing, json!({}), json!({}));
        assert!(matches!(result, ExecutionResult::Faulted { .. }));
    }

    #[test]
    fn rejection_is_classified_with_its_message() {
        let (result, _) = run(rejects, json!({}), json!({}));
        match result {
            ExecutionResult::Rejected { message } => assert_eq!(message, "insufficient funds"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn panic_is_contained_as_a_fault() {
        let (result, _) = run(panics, json!({}), json!({}));
        match result {
            ExecutionResult::Faulted { trace } => assert!(trace.contains("boom")),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
