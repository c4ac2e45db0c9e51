//! The per-call execution context.
//!
//! A context exists only while a call is active, so "no active
//! transaction" is unrepresentable: handlers receive `&CallContext` as an
//! argument and there is nothing to reach for outside a call. The active
//! call is either a confirmed interaction record under replay or a
//! synthesized pending call during a dry run.

use serde_json::Value;

use crate::core::{Address, BlockRef, InteractionRecord, Tags, TxId, Winston};
use crate::replay::ReplayError;

use super::loader::ContractDescriptor;

/// A synthesized, not-yet-confirmed call used by dry runs.
#[derive(Clone, Debug)]
pub struct PendingCall {
    pub id: TxId,
    pub caller: Address,
    pub recipient: Option<Address>,
    pub tags: Tags,
    pub fee: Winston,
    pub quantity: Winston,
}

/// The record under processing, confirmed or pending.
#[derive(Clone, Copy, Debug)]
pub enum ActiveCall<'a> {
    Confirmed(&'a InteractionRecord),
    Pending(&'a PendingCall),
}

/// Recursion guard threaded through foreign-state reads: the chain of
/// contract ids currently being replayed on this call path, plus the
/// configured depth limit.
#[derive(Clone, Debug)]
pub struct ReadScope {
    chain: Vec<TxId>,
    max_depth: usize,
}

impl ReadScope {
    pub fn root(contract: TxId, max_depth: usize) -> Self {
        Self {
            chain: vec![contract],
            max_depth,
        }
    }

    /// Extend the chain with `next`, rejecting cycles and over-deep
    /// chains. Truncating instead of rejecting would let two clients
    /// observe different foreign states, so both cases are fatal.
    pub fn enter(&self, next: &TxId) -> Result<Self, ReplayError> {
        if self.chain.contains(next) {
            let mut chain = self.chain.clone();
            chain.push(next.clone());
            return Err(ReplayError::ForeignReadCycle { chain });
        }
        if self.chain.len() >= self.max_depth {
            return Err(ReplayError::ForeignReadDepth {
                limit: self.max_depth,
            });
        }
        let mut chain = self.chain.clone();
        chain.push(next.clone());
        Ok(Self {
            chain,
            max_depth: self.max_depth,
        })
    }

    pub fn chain(&self) -> &[TxId] {
        &self.chain
    }
}

/// Recursive read of another contract's state, height-bounded. `None`
/// means "latest" and is only valid for pending calls.
pub trait ForeignStateReader {
    fn read_foreign_state(
        &self,
        contract: &TxId,
        height: Option<u64>,
        scope: &ReadScope,
    ) -> crate::Result<Value>;
}

/// Everything a running handler may observe about its execution.
pub struct CallContext<'a> {
    descriptor: &'a ContractDescriptor,
    call: ActiveCall<'a>,
    reader: &'a dyn ForeignStateReader,
    scope: &'a ReadScope,
}

impl<'a> CallContext<'a> {
    pub fn new(
        descriptor: &'a ContractDescriptor,
        call: ActiveCall<'a>,
        reader: &'a dyn ForeignStateReader,
        scope: &'a ReadScope,
    ) -> Self {
        Self {
            descriptor,
            call,
            reader,
            scope,
        }
    }

    pub fn contract_id(&self) -> &TxId {
        &self.descriptor.id
    }

    pub fn src_tx_id(&self) -> &TxId {
        &self.descriptor.src_tx_id
    }

    pub fn contract_owner(&self) -> &Address {
        &self.descriptor.owner
    }

    /// Id of the active record.
    pub fn record_id(&self) -> &TxId {
        match self.call {
            ActiveCall::Confirmed(r) => &r.id,
            ActiveCall::Pending(p) => &p.id,
        }
    }

    pub fn caller(&self) -> &Address {
        match self.call {
            ActiveCall::Confirmed(r) => &r.owner,
            ActiveCall::Pending(p) => &p.caller,
        }
    }

    pub fn recipient(&self) -> Option<&Address> {
        match self.call {
            ActiveCall::Confirmed(r) => r.recipient.as_ref(),
            ActiveCall::Pending(p) => p.recipient.as_ref(),
        }
    }

    pub fn tags(&self) -> &Tags {
        match self.call {
            ActiveCall::Confirmed(r) => &r.tags,
            ActiveCall::Pending(p) => &p.tags,
        }
    }

    pub fn fee(&self) -> &Winston {
        match self.call {
            ActiveCall::Confirmed(r) => &r.fee,
            ActiveCall::Pending(p) => &p.fee,
        }
    }

    pub fn quantity(&self) -> &Winston {
        match self.call {
            ActiveCall::Confirmed(r) => &r.quantity,
            ActiveCall::Pending(p) => &p.quantity,
        }
    }

    /// The confirmed block of the active record; `None` while dry-running
    /// a pending call.
    pub fn block(&self) -> Option<&BlockRef> {
        match self.call {
            ActiveCall::Confirmed(r) => Some(&r.block),
            ActiveCall::Pending(_) => None,
        }
    }

    /// Read another contract's state, bounded to the active record's
    /// block height (or latest for a pending call). The bound is what
    /// keeps recursive reads deterministic: every client replaying this
    /// record observes the foreign contract at the same height.
    pub fn read_foreign_state(&self, contract: &TxId) -> crate::Result<Value> {
        let height = self.block().map(|b| b.height);
        self.reader.read_foreign_state(contract, height, self.scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_harness::fixtures;

    #[test]
    fn scope_extends_the_chain() {
        let scope = ReadScope::root(fixtures::tx_id(1), 4);
        let entered = scope.enter(&fixtures::tx_id(2)).unwrap();
        assert_eq!(
            entered.chain(),
            &[fixtures::tx_id(1), fixtures::tx_id(2)][..]
        );
    }

    #[test]
    fn scope_rejects_cycles() {
        let scope = ReadScope::root(fixtures::tx_id(1), 4);
        let entered = scope.enter(&fixtures::tx_id(2)).unwrap();
        match entered.enter(&fixtures::tx_id(1)) {
            Err(ReplayError::ForeignReadCycle { chain }) => {
                assert_eq!(chain.first(), Some(&fixtures::tx_id(1)));
                assert_eq!(chain.last(), Some(&fixtures::tx_id(1)));
                assert_eq!(chain.len(), 3);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn scope_enforces_the_depth_limit() {
        let scope = ReadScope::root(fixtures::tx_id(1), 2);
        let entered = scope.enter(&fixtures::tx_id(2)).unwrap();
        assert!(matches!(
            entered.enter(&fixtures::tx_id(3)),
            Err(ReplayError::ForeignReadDepth { limit: 2 })
        ));
    }
}
