//! The replay engine.
//!
//! A replay derives a contract's state at a target height: resolve a
//! snapshot, fetch the missing log range, order it, fold the transition
//! over it, rebinding the handler when the state requests evolution, and
//! cache the result. Replay of one contract is strictly sequential (each
//! step's input is the previous step's output); parallelism is safe only
//! across contract ids and across the two prefetches that precede the
//! fold.

pub mod cache;

use std::collections::HashMap;
use std::panic;
use std::sync::{Arc, Mutex};
use std::thread;

use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::Config;
use crate::contract::{
    load_contract, ActiveCall, CallContext, CompilerSet, ForeignStateReader, Interaction,
    LoadError, LoadedContract, PendingCall, ReadScope,
};
use crate::core::identity::b64url_encode;
use crate::core::{protocol, SortKey};
use crate::core::{Address, InteractionRecord, ReplayState, Tags, TxId, ValidityMap, Winston};
use crate::execute::{execute_interaction, ExecutionResult};
use crate::gateway::{fetch_interactions, Gateway, HttpGateway};

pub use cache::{Snapshot, SnapshotCache};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReplayError {
    #[error("foreign-state read cycle: {}", format_chain(.chain))]
    ForeignReadCycle { chain: Vec<TxId> },

    #[error("foreign-state read depth exceeded (limit {limit})")]
    ForeignReadDepth { limit: usize },
}

fn format_chain(chain: &[TxId]) -> String {
    chain
        .iter()
        .map(TxId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[derive(Clone, Debug, Default)]
pub struct ReplayOptions {
    /// Target ledger height; defaults to the current chain head.
    pub height: Option<u64>,
    /// Return the per-record validity map alongside the state.
    pub with_validity: bool,
}

#[derive(Clone, Debug)]
pub struct ReplayOutput {
    /// The height the replay was bounded to.
    pub height: u64,
    pub state: Value,
    pub validity: Option<ValidityMap>,
}

struct Inner {
    height: u64,
    state: ReplayState,
    validity: ValidityMap,
    src_tx_id: TxId,
}

/// The replay client. `Send + Sync`; independent contracts may be
/// replayed from as many threads as the caller likes.
pub struct Client {
    gateway: Arc<dyn Gateway>,
    compilers: CompilerSet,
    cache: SnapshotCache,
    config: Config,
    loaded: Mutex<HashMap<(TxId, Option<TxId>), Arc<LoadedContract>>>,
}

impl Client {
    pub fn new(gateway: Arc<dyn Gateway>, compilers: CompilerSet, config: Config) -> Self {
        let cache = if !config.cache.enabled {
            SnapshotCache::disabled()
        } else {
            match &config.cache.dir {
                Some(dir) => SnapshotCache::persistent(dir.clone()),
                None => SnapshotCache::in_memory(),
            }
        };
        Self {
            gateway,
            compilers,
            cache,
            config,
            loaded: Mutex::new(HashMap::new()),
        }
    }

    /// Convenience constructor over the HTTP gateway in `config`.
    pub fn over_http(compilers: CompilerSet, config: Config) -> crate::Result<Self> {
        let gateway = HttpGateway::new(
            &config.gateway.url,
            std::time::Duration::from_millis(config.gateway.timeout_ms),
        )
        .map_err(crate::Error::from)?;
        Ok(Self::new(Arc::new(gateway), compilers, config))
    }

    /// Replay `contract` and return its state (optionally with the
    /// validity map). Either the full output is returned or the whole
    /// replay fails; there is no partial state.
    pub fn replay(&self, contract: &TxId, options: ReplayOptions) -> crate::Result<ReplayOutput> {
        let scope = ReadScope::root(contract.clone(), self.config.replay.max_read_depth);
        let inner = self.replay_scoped(contract, options.height, &scope)?;
        Ok(ReplayOutput {
            height: inner.height,
            state: inner.state.into_value(),
            validity: options.with_validity.then_some(inner.validity),
        })
    }

    /// Replay to `height` (default head) and return just the state.
    pub fn read_state(&self, contract: &TxId, height: Option<u64>) -> crate::Result<Value> {
        Ok(self
            .replay(
                contract,
                ReplayOptions {
                    height,
                    with_validity: false,
                },
            )?
            .state)
    }

    /// Execute `input` against the contract's latest state as a
    /// synthesized pending call, without confirming anything: the cache,
    /// the validity map and the ledger are untouched. The classified
    /// result carries the would-be state and any caller-visible result.
    pub fn dry_run(
        &self,
        contract: &TxId,
        input: Value,
        caller: Address,
        tags: Tags,
    ) -> crate::Result<ExecutionResult> {
        let scope = ReadScope::root(contract.clone(), self.config.replay.max_read_depth);
        let inner = self.replay_scoped(contract, None, &scope)?;
        let loaded = self
            .load_bound(contract, Some(&inner.src_tx_id))
            .map_err(crate::Error::from)?;

        let pending = PendingCall {
            id: synthesize_call_id(contract, &caller, inner.height, &input),
            caller: caller.clone(),
            recipient: None,
            tags,
            fee: Winston::zero(),
            quantity: Winston::zero(),
        };
        let interaction = Interaction { input, caller };
        let ctx = CallContext::new(
            &loaded.descriptor,
            ActiveCall::Pending(&pending),
            self,
            &scope,
        );
        Ok(execute_interaction(
            loaded.handler.as_ref(),
            &ctx,
            &interaction,
            inner.state.as_value(),
        ))
    }

    /// Memoized contract load: one descriptor per (contract, source)
    /// pair per client.
    fn load_bound(
        &self,
        contract: &TxId,
        src: Option<&TxId>,
    ) -> Result<Arc<LoadedContract>, LoadError> {
        let key = (contract.clone(), src.cloned());
        if let Some(found) = self.loaded.lock().expect("load cache poisoned").get(&key) {
            return Ok(found.clone());
        }
        let loaded = Arc::new(load_contract(
            self.gateway.as_ref(),
            &self.compilers,
            contract,
            src,
        )?);
        self.loaded
            .lock()
            .expect("load cache poisoned")
            .insert(key, loaded.clone());
        Ok(loaded)
    }

    fn replay_scoped(
        &self,
        contract: &TxId,
        height: Option<u64>,
        scope: &ReadScope,
    ) -> crate::Result<Inner> {
        let target = match height {
            Some(h) => h,
            None => self.gateway.head_height().map_err(crate::Error::from)?,
        };

        // Nested reads never touch the snapshot cache. A nested fold's
        // outcome can depend on the read chain (a cycle faults one step
        // here that a context-free replay of the same contract would
        // execute), so its snapshots are not context-free facts; and
        // consulting context-free snapshots from inside a chain would let
        // two clients with different cache contents derive different
        // states for the same root replay.
        let nested = scope.chain().len() > 1;
        let snapshot = if nested {
            None
        } else {
            self.cache.resolve(contract, target)
        };
        if let Some((cached_height, snap)) = &snapshot {
            if *cached_height == target {
                tracing::debug!(contract = %contract, height = target, "replay served from snapshot");
                return Ok(Inner {
                    height: target,
                    state: snap.state.clone(),
                    validity: snap.validity.clone(),
                    src_tx_id: snap.src_tx_id.clone(),
                });
            }
        }

        let (min_height, seed) = match snapshot {
            Some((cached_height, snap)) => (cached_height + 1, Some(snap)),
            None => (0, None),
        };
        let src_override = seed.as_ref().map(|snap| snap.src_tx_id.clone());

        // The descriptor load and the log fetch depend only on the
        // ledger, not on each other.
        let (loaded, fetched) = thread::scope(|s| {
            let load = s.spawn(|| self.load_bound(contract, src_override.as_ref()));
            let fetch = s.spawn(|| {
                fetch_interactions(
                    self.gateway.as_ref(),
                    contract,
                    min_height,
                    target,
                    self.config.gateway.page_size,
                )
            });
            (join(load), join(fetch))
        });
        let mut current = loaded.map_err(crate::Error::from)?;
        let records = fetched.map_err(crate::Error::from)?;

        let (mut state, mut validity) = match seed {
            Some(snap) => (snap.state, snap.validity),
            None => (current.descriptor.init_state.clone(), ValidityMap::new()),
        };

        let mut ordered: Vec<(SortKey, InteractionRecord)> = records
            .into_iter()
            .map(|record| (SortKey::for_record(&record), record))
            .collect();
        ordered.sort_by(|a, b| a.0.cmp(&b.0));

        tracing::debug!(
            contract = %contract,
            height = target,
            from = min_height,
            records = ordered.len(),
            "replaying interaction log"
        );

        for (_, record) in &ordered {
            match record.tags.unique(protocol::TAG_CONTRACT) {
                Ok(value) if value == contract.as_str() => {}
                Ok(value) => {
                    tracing::warn!(record = %record.id, value, "skipping record targeting a different contract");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(record = %record.id, error = %e, "skipping record with unusable contract tag");
                    continue;
                }
            }

            let payload = match record.input_payload() {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::warn!(record = %record.id, error = %e, "skipping record with unusable input tag");
                    continue;
                }
            };
            let input: Value = match serde_json::from_str(payload) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!(record = %record.id, error = %e, "skipping record with unparsable input");
                    continue;
                }
            };

            let interaction = Interaction {
                input,
                caller: record.owner.clone(),
            };
            let ctx = CallContext::new(
                &current.descriptor,
                ActiveCall::Confirmed(record),
                self,
                scope,
            );
            let result =
                execute_interaction(current.handler.as_ref(), &ctx, &interaction, state.as_value());

            match &result {
                ExecutionResult::Ok { .. } => {}
                ExecutionResult::Rejected { message } => {
                    tracing::warn!(record = %record.id, %message, "interaction rejected by contract");
                }
                ExecutionResult::Faulted { trace } => {
                    tracing::error!(record = %record.id, %trace, "interaction faulted");
                }
            }

            validity.push(record.id.clone(), result.is_ok());
            if let ExecutionResult::Ok {
                state: next_state, ..
            } = result
            {
                state = ReplayState::new(next_state);
            }

            // Evolution: rebind the handler for subsequent steps only.
            if let Some(next_src) = state.evolve_target() {
                if next_src != current.descriptor.src_tx_id && state.can_evolve() {
                    tracing::info!(
                        contract = %contract,
                        from = %current.descriptor.src_tx_id,
                        to = %next_src,
                        "evolving contract source"
                    );
                    current = self
                        .load_bound(contract, Some(&next_src))
                        .map_err(crate::Error::from)?;
                }
            }
        }

        if !nested {
            self.cache.store(
                contract,
                target,
                Snapshot {
                    state: state.clone(),
                    validity: validity.clone(),
                    src_tx_id: current.descriptor.src_tx_id.clone(),
                },
            );
        }

        Ok(Inner {
            height: target,
            state,
            validity,
            src_tx_id: current.descriptor.src_tx_id.clone(),
        })
    }
}

impl ForeignStateReader for Client {
    fn read_foreign_state(
        &self,
        contract: &TxId,
        height: Option<u64>,
        scope: &ReadScope,
    ) -> crate::Result<Value> {
        let scope = scope.enter(contract)?;
        let inner = self.replay_scoped(contract, height, &scope)?;
        Ok(inner.state.into_value())
    }
}

fn join<T>(handle: thread::ScopedJoinHandle<'_, T>) -> T {
    match handle.join() {
        Ok(value) => value,
        Err(payload) => panic::resume_unwind(payload),
    }
}

/// Deterministic id for a synthesized pending call.
fn synthesize_call_id(contract: &TxId, caller: &Address, height: u64, input: &Value) -> TxId {
    let mut hasher = Sha256::new();
    hasher.update(contract.as_str().as_bytes());
    hasher.update(caller.as_str().as_bytes());
    hasher.update(height.to_be_bytes());
    hasher.update(ReplayState::new(input.clone()).canonical_bytes());
    TxId::parse(b64url_encode(&hasher.finalize())).expect("32-byte digest encodes to a valid id")
}
