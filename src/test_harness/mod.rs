//! Deterministic in-process ledger simulator and stock handlers.
//!
//! Backs the crate's own test suites and is usable by downstream
//! consumers for theirs. Every identifier is derived with a hash so
//! repeated runs produce byte-identical ledgers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::config::Config;
use crate::contract::{
    contract_assert, CallContext, CompilerSet, ForeignStateReader, Interaction, NativeRegistry,
    ReadScope, StateTransition, TransitionError, TransitionOutcome,
};
use crate::core::identity::b64url_encode;
use crate::core::{
    protocol, Address, BlockId, BlockRef, InteractionRecord, Tag, Tags, TxId, Winston,
};
use crate::gateway::{Gateway, GatewayError, PageRequest, RecordEdge, RecordPage, TxHeader};
use crate::replay::Client;

/// Deterministic builders shared by unit tests.
pub mod fixtures {
    use super::*;

    pub fn tx_id(seed: u8) -> TxId {
        TxId::parse(b64url_encode(&Sha256::digest([b'x', seed]))).expect("digest encodes to an id")
    }

    pub fn address(name: &str) -> Address {
        Address::parse(b64url_encode(&Sha256::digest(name.as_bytes())))
            .expect("digest encodes to an address")
    }

    pub fn block_id(height: u64) -> BlockId {
        let digest = Sha256::digest(format!("block-{height}").as_bytes());
        let mut bytes = digest.to_vec();
        bytes.extend_from_slice(&digest[..16]);
        BlockId::parse(b64url_encode(&bytes)).expect("digest encodes to a block id")
    }

    pub fn interaction_record(
        id: TxId,
        caller: &str,
        height: u64,
        input: Value,
    ) -> InteractionRecord {
        InteractionRecord {
            id,
            owner: address(caller),
            recipient: None,
            tags: Tags::new(vec![Tag::new(
                protocol::TAG_INPUT,
                serde_json::to_string(&input).expect("input encodes"),
            )]),
            fee: Winston::new("1").expect("static amount"),
            quantity: Winston::zero(),
            block: BlockRef {
                height,
                id: block_id(height),
                timestamp: 1_600_000_000 + height,
            },
        }
    }
}

/// A reader for contexts whose handler performs no foreign reads.
pub struct NullReader;

impl ForeignStateReader for NullReader {
    fn read_foreign_state(
        &self,
        _contract: &TxId,
        _height: Option<u64>,
        _scope: &ReadScope,
    ) -> crate::Result<Value> {
        Ok(Value::Null)
    }
}

struct SimRecord {
    record: InteractionRecord,
    parent: Option<TxId>,
}

#[derive(Default)]
struct SimState {
    head: u64,
    headers: HashMap<TxId, TxHeader>,
    payloads: HashMap<TxId, Bytes>,
    records: Vec<SimRecord>,
    counter: u64,
    pages_served: usize,
}

/// In-memory ledger. Implements [`Gateway`] so a [`Client`] can replay
/// against it exactly as it would against the network.
#[derive(Default)]
pub struct SimLedger {
    inner: Mutex<SimState>,
}

impl SimLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_head(&self, height: u64) {
        self.lock().head = height;
    }

    /// How many query pages this ledger has served; lets tests observe
    /// pagination and cache behavior.
    pub fn pages_served(&self) -> usize {
        self.lock().pages_served
    }

    /// Store an arbitrary transaction; returns its generated id.
    pub fn put_tx(&self, owner: &Address, tags: Vec<Tag>, payload: &[u8]) -> TxId {
        let mut state = self.lock();
        let id = next_tx_id(&mut state);
        state.headers.insert(
            id.clone(),
            TxHeader {
                id: id.clone(),
                owner: owner.clone(),
                tags: Tags::new(tags),
            },
        );
        state
            .payloads
            .insert(id.clone(), Bytes::copy_from_slice(payload));
        id
    }

    /// Store a native-handler source transaction whose payload is
    /// `entry_text` (possibly wrapped by "tooling").
    pub fn put_source(&self, owner: &Address, entry_text: &str) -> TxId {
        self.put_tx(
            owner,
            vec![
                Tag::new(protocol::TAG_APP_NAME, protocol::APP_CONTRACT_SOURCE),
                Tag::new(protocol::TAG_CONTENT_TYPE, protocol::CONTENT_TYPE_NATIVE),
            ],
            entry_text.as_bytes(),
        )
    }

    /// Store a contract transaction carrying its initial state as its
    /// own payload.
    pub fn put_contract(&self, owner: &Address, src: &TxId, init_state: &Value) -> TxId {
        self.put_tx(
            owner,
            vec![
                Tag::new(protocol::TAG_APP_NAME, protocol::APP_CONTRACT),
                Tag::new(protocol::TAG_CONTRACT_SRC, src.as_str()),
            ],
            serde_json::to_string(init_state)
                .expect("state encodes")
                .as_bytes(),
        )
    }

    /// Contract variant with the initial state inline in a tag.
    pub fn put_contract_inline_state(
        &self,
        owner: &Address,
        src: &TxId,
        init_state: &Value,
    ) -> TxId {
        self.put_tx(
            owner,
            vec![
                Tag::new(protocol::TAG_APP_NAME, protocol::APP_CONTRACT),
                Tag::new(protocol::TAG_CONTRACT_SRC, src.as_str()),
                Tag::new(
                    protocol::TAG_INIT_STATE,
                    serde_json::to_string(init_state).expect("state encodes"),
                ),
            ],
            b"-",
        )
    }

    /// Contract variant pointing at a separate initial-state transaction.
    pub fn put_contract_state_tx(&self, owner: &Address, src: &TxId, init_state: &Value) -> TxId {
        let state_tx = self.put_tx(
            owner,
            vec![],
            serde_json::to_string(init_state)
                .expect("state encodes")
                .as_bytes(),
        );
        self.put_tx(
            owner,
            vec![
                Tag::new(protocol::TAG_APP_NAME, protocol::APP_CONTRACT),
                Tag::new(protocol::TAG_CONTRACT_SRC, src.as_str()),
                Tag::new(protocol::TAG_INIT_STATE_TX, state_tx.as_str()),
            ],
            b"-",
        )
    }

    /// Confirm an interaction record with the standard protocol tags.
    pub fn add_interaction(
        &self,
        contract: &TxId,
        caller: &Address,
        height: u64,
        input: &Value,
    ) -> TxId {
        self.add_interaction_with_tags(
            caller,
            height,
            vec![
                Tag::new(protocol::TAG_APP_NAME, protocol::APP_ACTION),
                Tag::new(protocol::TAG_CONTRACT, contract.as_str()),
                Tag::new(
                    protocol::TAG_INPUT,
                    serde_json::to_string(input).expect("input encodes"),
                ),
            ],
        )
    }

    /// Confirm an interaction record with caller-controlled tags, for
    /// malformed-shape scenarios.
    pub fn add_interaction_with_tags(&self, caller: &Address, height: u64, tags: Vec<Tag>) -> TxId {
        self.push_record(caller, height, tags, None)
    }

    /// Confirm a record that is a nested output of a bundled parent
    /// transaction; such records must never count.
    pub fn add_bundled_interaction(
        &self,
        contract: &TxId,
        caller: &Address,
        height: u64,
        input: &Value,
    ) -> TxId {
        let parent = fixtures::tx_id(0xbd);
        self.push_record(
            caller,
            height,
            vec![
                Tag::new(protocol::TAG_APP_NAME, protocol::APP_ACTION),
                Tag::new(protocol::TAG_CONTRACT, contract.as_str()),
                Tag::new(
                    protocol::TAG_INPUT,
                    serde_json::to_string(input).expect("input encodes"),
                ),
            ],
            Some(parent),
        )
    }

    fn push_record(
        &self,
        caller: &Address,
        height: u64,
        tags: Vec<Tag>,
        parent: Option<TxId>,
    ) -> TxId {
        let mut state = self.lock();
        let id = next_tx_id(&mut state);
        let record = InteractionRecord {
            id: id.clone(),
            owner: caller.clone(),
            recipient: None,
            tags: Tags::new(tags),
            fee: Winston::new("1").expect("static amount"),
            quantity: Winston::zero(),
            block: BlockRef {
                height,
                id: fixtures::block_id(height),
                timestamp: 1_600_000_000 + height,
            },
        };
        state.records.push(SimRecord { record, parent });
        state.head = state.head.max(height);
        id
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.inner.lock().expect("sim ledger lock poisoned")
    }
}

fn next_tx_id(state: &mut SimState) -> TxId {
    state.counter += 1;
    let digest = Sha256::digest(format!("tx-{}", state.counter).as_bytes());
    TxId::parse(b64url_encode(&digest)).expect("digest encodes to an id")
}

impl Gateway for SimLedger {
    fn head_height(&self) -> Result<u64, GatewayError> {
        Ok(self.lock().head)
    }

    fn transaction(&self, id: &TxId) -> Result<Option<TxHeader>, GatewayError> {
        Ok(self.lock().headers.get(id).cloned())
    }

    fn payload(&self, id: &TxId) -> Result<Bytes, GatewayError> {
        self.lock()
            .payloads
            .get(id)
            .cloned()
            .ok_or_else(|| GatewayError::Status {
                status: 404,
                url: format!("sim://{id}"),
            })
    }

    fn interactions_page(&self, request: &PageRequest) -> Result<RecordPage, GatewayError> {
        let mut state = self.lock();
        state.pages_served += 1;
        let state = &*state;
        let mut matching: Vec<&SimRecord> = state
            .records
            .iter()
            .filter(|entry| {
                let record = &entry.record;
                record.block.height >= request.min_height
                    && record.block.height <= request.max_height
                    && record
                        .tags
                        .all(protocol::TAG_APP_NAME)
                        .contains(&protocol::APP_ACTION)
                    && record
                        .tags
                        .all(protocol::TAG_CONTRACT)
                        .contains(&request.contract.as_str())
            })
            .collect();
        matching.sort_by_key(|entry| entry.record.block.height);

        let start = match &request.cursor {
            Some(cursor) => {
                cursor.parse::<usize>().map_err(|_| GatewayError::Protocol {
                    reason: format!("unknown cursor {cursor:?}"),
                })? + 1
            }
            None => 0,
        };
        let end = (start + request.page_size).min(matching.len());

        let edges = matching[start.min(end)..end]
            .iter()
            .enumerate()
            .map(|(offset, entry)| RecordEdge {
                cursor: (start + offset).to_string(),
                parent: entry.parent.as_ref().map(|p| p.as_str().to_string()),
                record: entry.record.clone(),
            })
            .collect();

        Ok(RecordPage {
            edges,
            has_next_page: end < matching.len(),
        })
    }
}

// ---------------------------------------------------------------------------
// Stock handlers

/// Entry token of the plain token handler.
pub const TOKEN_V1: &str = "token-v1";
/// Entry token of the "evolved" token handler (credits double).
pub const TOKEN_V2: &str = "token-v2";
/// Entry token of a handler that rejects every call.
pub const ALWAYS_REJECT: &str = "always-reject";
/// Entry token of a handler that declares neither state nor result.
pub const EMPTY_OUTCOME: &str = "empty-outcome";
/// Entry token of a handler that mirrors a foreign contract's state.
pub const MIRROR: &str = "mirror";

/// A registry with every stock handler registered.
pub fn standard_registry() -> Arc<NativeRegistry> {
    let registry = Arc::new(NativeRegistry::new());
    registry.register(TOKEN_V1, |_src| {
        Ok(Box::new(token_v1) as Box<dyn StateTransition>)
    });
    registry.register(TOKEN_V2, |_src| {
        Ok(Box::new(token_v2) as Box<dyn StateTransition>)
    });
    registry.register(ALWAYS_REJECT, |_src| {
        Ok(Box::new(always_reject) as Box<dyn StateTransition>)
    });
    registry.register(EMPTY_OUTCOME, |_src| {
        Ok(Box::new(empty_outcome) as Box<dyn StateTransition>)
    });
    registry.register(MIRROR, |_src| {
        Ok(Box::new(mirror) as Box<dyn StateTransition>)
    });
    registry
}

/// A client over `ledger` with the stock registry and default (in-memory
/// cache) configuration.
pub fn sim_client(ledger: Arc<SimLedger>) -> Client {
    sim_client_with(ledger, Config::default())
}

pub fn sim_client_with(ledger: Arc<SimLedger>, config: Config) -> Client {
    Client::new(ledger, CompilerSet::standard(standard_registry()), config)
}

fn token_transition(
    ctx: &CallContext<'_>,
    mut state: Value,
    interaction: &Interaction,
    credit_multiplier: u64,
) -> Result<TransitionOutcome, TransitionError> {
    let _ = ctx;
    let function = interaction.input["function"].as_str().unwrap_or_default();
    match function {
        "transfer" => {
            let target = interaction.input["target"].as_str();
            contract_assert(target.is_some(), "transfer requires a target")?;
            let target = target.expect("checked above").to_string();
            let qty = interaction.input["qty"].as_u64().unwrap_or(0);
            contract_assert(qty > 0, "transfer quantity must be positive")?;

            let caller = interaction.caller.as_str().to_string();
            let balances = state["balances"]
                .as_object_mut()
                .ok_or_else(|| TransitionError::Fault("state carries no balances".into()))?;
            let held = balances.get(&caller).and_then(Value::as_u64).unwrap_or(0);
            contract_assert(held >= qty, "insufficient funds")?;

            balances.insert(caller, json!(held - qty));
            let target_held = balances.get(&target).and_then(Value::as_u64).unwrap_or(0);
            balances.insert(target, json!(target_held + qty * credit_multiplier));
            Ok(TransitionOutcome::with_state(state))
        }
        "balance" => {
            let target = interaction.input["target"]
                .as_str()
                .unwrap_or(interaction.caller.as_str());
            let held = state["balances"][target].as_u64().unwrap_or(0);
            Ok(TransitionOutcome::with_result(json!({
                "target": target,
                "balance": held,
            })))
        }
        "evolve" => {
            let owner = state["owner"].as_str().unwrap_or_default().to_string();
            contract_assert(
                interaction.caller.as_str() == owner,
                "only the owner may evolve",
            )?;
            let value = interaction.input["value"].as_str();
            contract_assert(value.is_some(), "evolve requires a source id")?;
            state["evolve"] = json!(value.expect("checked above"));
            Ok(TransitionOutcome::with_state(state))
        }
        "clear-evolve" => {
            let owner = state["owner"].as_str().unwrap_or_default().to_string();
            contract_assert(
                interaction.caller.as_str() == owner,
                "only the owner may clear evolution",
            )?;
            state["evolve"] = Value::Null;
            Ok(TransitionOutcome::with_state(state))
        }
        other => Err(TransitionError::Rejected(format!(
            "unknown function {other:?}"
        ))),
    }
}

/// Plain token: `transfer`, `balance`, `evolve`.
pub fn token_v1(
    ctx: &CallContext<'_>,
    state: Value,
    interaction: &Interaction,
) -> Result<TransitionOutcome, TransitionError> {
    token_transition(ctx, state, interaction, 1)
}

/// Evolved token: identical surface, but transfers credit double.
pub fn token_v2(
    ctx: &CallContext<'_>,
    state: Value,
    interaction: &Interaction,
) -> Result<TransitionOutcome, TransitionError> {
    token_transition(ctx, state, interaction, 2)
}

pub fn always_reject(
    _ctx: &CallContext<'_>,
    _state: Value,
    _interaction: &Interaction,
) -> Result<TransitionOutcome, TransitionError> {
    Err(TransitionError::Rejected("rejected by contract".into()))
}

pub fn empty_outcome(
    _ctx: &CallContext<'_>,
    _state: Value,
    _interaction: &Interaction,
) -> Result<TransitionOutcome, TransitionError> {
    Ok(TransitionOutcome::default())
}

/// Reads the contract named by `input.contract` and stores what it saw
/// under `observed.<id>`.
pub fn mirror(
    ctx: &CallContext<'_>,
    mut state: Value,
    interaction: &Interaction,
) -> Result<TransitionOutcome, TransitionError> {
    let raw = interaction.input["contract"].as_str();
    contract_assert(raw.is_some(), "mirror requires a contract id")?;
    let target = TxId::parse(raw.expect("checked above"))
        .map_err(|e| TransitionError::Rejected(e.to_string()))?;

    let observed = ctx
        .read_foreign_state(&target)
        .map_err(|e| TransitionError::Fault(e.to_string()))?;

    if !state["observed"].is_object() {
        state["observed"] = json!({});
    }
    state["observed"][target.as_str()] = observed;
    Ok(TransitionOutcome::with_state(state))
}
