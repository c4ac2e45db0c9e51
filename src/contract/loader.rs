//! Contract resolution: descriptor, source, initial state, handler.

use thiserror::Error;

use crate::core::protocol;
use crate::core::{Address, ReplayState, TxId, Winston};
use crate::gateway::{Gateway, GatewayError};

use super::registry::CompilerSet;
use super::source::ContractSource;
use super::StateTransition;

/// Immutable per-contract facts, re-resolved only when evolution rebinds
/// the source.
#[derive(Clone, Debug)]
pub struct ContractDescriptor {
    pub id: TxId,
    pub src_tx_id: TxId,
    pub owner: Address,
    pub min_fee: Option<Winston>,
    pub init_state: ReplayState,
}

/// A descriptor together with its compiled transition.
pub struct LoadedContract {
    pub descriptor: ContractDescriptor,
    pub handler: Box<dyn StateTransition>,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoadError {
    #[error("contract {id} not found")]
    ContractNotFound { id: TxId },

    #[error("contract {id} declares no usable source: {reason}")]
    MissingSource { id: TxId, reason: String },

    #[error("source {src} for contract {id} not found")]
    SourceNotFound { id: TxId, src: TxId },

    #[error("source {src} is not valid UTF-8")]
    SourceEncoding { src: TxId },

    #[error("initial state reference on contract {id} is invalid: {reason}")]
    InitStateRef { id: TxId, reason: String },

    #[error("initial state for contract {id} is not valid UTF-8")]
    InitStateEncoding { id: TxId },

    #[error("unable to parse initial state for contract {id}: {source}")]
    InitState {
        id: TxId,
        #[source]
        source: serde_json::Error,
    },

    #[error("no compiler accepts source {src} (content type {content_type:?})")]
    UnsupportedSource {
        src: TxId,
        content_type: Option<String>,
    },

    #[error("compiling source {src} failed: {reason}")]
    Compile { src: TxId, reason: String },

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Resolve `id` into a loaded contract.
///
/// `src_override` takes precedence over the declared source tag; the
/// replay engine passes it when evolution rebinds the contract. Every
/// call compiles a fresh handler instance.
pub fn load_contract(
    gateway: &dyn Gateway,
    compilers: &CompilerSet,
    id: &TxId,
    src_override: Option<&TxId>,
) -> Result<LoadedContract, LoadError> {
    let header = gateway
        .transaction(id)?
        .ok_or_else(|| LoadError::ContractNotFound { id: id.clone() })?;

    let src_tx_id = match src_override {
        Some(src) => src.clone(),
        None => {
            let raw = header.tags.get(protocol::TAG_CONTRACT_SRC).ok_or_else(|| {
                LoadError::MissingSource {
                    id: id.clone(),
                    reason: format!("no {} tag", protocol::TAG_CONTRACT_SRC),
                }
            })?;
            TxId::parse(raw).map_err(|e| LoadError::MissingSource {
                id: id.clone(),
                reason: e.to_string(),
            })?
        }
    };

    let src_header =
        gateway
            .transaction(&src_tx_id)?
            .ok_or_else(|| LoadError::SourceNotFound {
                id: id.clone(),
                src: src_tx_id.clone(),
            })?;
    let src_payload = gateway.payload(&src_tx_id)?;
    let text = String::from_utf8(src_payload.to_vec()).map_err(|_| LoadError::SourceEncoding {
        src: src_tx_id.clone(),
    })?;

    let source = ContractSource {
        tx_id: src_tx_id.clone(),
        text,
        content_type: src_header
            .tags
            .get(protocol::TAG_CONTENT_TYPE)
            .map(str::to_string),
    };

    let init_text = resolve_init_state(gateway, id, &header.tags)?;
    let init_state = ReplayState::parse(&init_text).map_err(|e| LoadError::InitState {
        id: id.clone(),
        source: e,
    })?;

    let min_fee = match header.tags.get(protocol::TAG_MIN_FEE) {
        Some(raw) => match Winston::new(raw) {
            Ok(fee) => Some(fee),
            Err(_) => {
                tracing::warn!(contract = %id, raw, "ignoring malformed min-fee tag");
                None
            }
        },
        None => None,
    };

    let compiler =
        compilers
            .find(&source)
            .ok_or_else(|| LoadError::UnsupportedSource {
                src: src_tx_id.clone(),
                content_type: source.content_type.clone(),
            })?;
    let handler = compiler
        .compile(&source)
        .map_err(|e| LoadError::Compile {
            src: src_tx_id.clone(),
            reason: e.reason,
        })?;

    tracing::debug!(contract = %id, src = %src_tx_id, "contract loaded");

    Ok(LoadedContract {
        descriptor: ContractDescriptor {
            id: id.clone(),
            src_tx_id,
            owner: header.owner,
            min_fee,
            init_state,
        },
        handler,
    })
}

/// Initial state resolution order: inline `Init-State` tag, then a
/// referenced `Init-State-TX` payload, then the contract transaction's
/// own payload.
fn resolve_init_state(
    gateway: &dyn Gateway,
    id: &TxId,
    tags: &crate::core::Tags,
) -> Result<String, LoadError> {
    if let Some(inline) = tags.get(protocol::TAG_INIT_STATE) {
        return Ok(inline.to_string());
    }
    if let Some(raw) = tags.get(protocol::TAG_INIT_STATE_TX) {
        let state_tx = TxId::parse(raw).map_err(|e| LoadError::InitStateRef {
            id: id.clone(),
            reason: e.to_string(),
        })?;
        let payload = gateway.payload(&state_tx)?;
        return String::from_utf8(payload.to_vec())
            .map_err(|_| LoadError::InitStateEncoding { id: id.clone() });
    }
    let payload = gateway.payload(id)?;
    String::from_utf8(payload.to_vec()).map_err(|_| LoadError::InitStateEncoding { id: id.clone() })
}
