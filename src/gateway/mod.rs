//! The ledger boundary.
//!
//! Everything the replay engine needs from the ledger goes through the
//! [`Gateway`] trait: a paginated interaction-record query, transaction
//! header lookup, raw payload fetch, and the current chain head. The
//! production implementation is [`HttpGateway`]; tests run against the
//! in-memory simulator in `test_harness`.

pub mod http;
pub mod interactions;

use bytes::Bytes;
use thiserror::Error;

use crate::core::{InteractionRecord, Tags, TxId};
use crate::error::Transience;

pub use http::HttpGateway;
pub use interactions::fetch_interactions;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GatewayError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("gateway responded with status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("failed to decode gateway response from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("gateway protocol violation: {reason}")]
    Protocol { reason: String },
}

impl GatewayError {
    /// Whether retrying the same request may succeed. The engine itself
    /// never retries; this is advisory metadata for the caller's policy.
    pub fn transience(&self) -> Transience {
        match self {
            GatewayError::Transport { .. } => Transience::Retryable,
            GatewayError::Status { status, .. } => {
                if *status == 429 || *status >= 500 {
                    Transience::Retryable
                } else {
                    Transience::Permanent
                }
            }
            GatewayError::Decode { .. } | GatewayError::Protocol { .. } => Transience::Permanent,
        }
    }
}

/// Header fields of a stored transaction: enough to resolve a contract
/// without pulling its payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxHeader {
    pub id: TxId,
    pub owner: crate::core::Address,
    pub tags: Tags,
}

/// One page worth of interaction-record query.
#[derive(Clone, Debug)]
pub struct PageRequest {
    pub contract: TxId,
    pub min_height: u64,
    pub max_height: u64,
    pub page_size: usize,
    pub cursor: Option<String>,
}

#[derive(Clone, Debug)]
pub struct RecordEdge {
    pub cursor: String,
    /// Set when the record is a nested output of a bundled parent
    /// transaction; such records never count.
    pub parent: Option<String>,
    pub record: InteractionRecord,
}

#[derive(Clone, Debug, Default)]
pub struct RecordPage {
    pub edges: Vec<RecordEdge>,
    pub has_next_page: bool,
}

/// Read-side ledger operations. Implementations must be usable from
/// multiple threads; the engine runs its descriptor load and log fetch
/// concurrently.
pub trait Gateway: Send + Sync {
    /// Current confirmed chain height.
    fn head_height(&self) -> Result<u64, GatewayError>;

    /// Transaction header by id; `None` when the ledger has no such
    /// transaction.
    fn transaction(&self, id: &TxId) -> Result<Option<TxHeader>, GatewayError>;

    /// Raw payload bytes of a stored transaction.
    fn payload(&self, id: &TxId) -> Result<Bytes, GatewayError>;

    /// One page of the interaction-record query, filtered by the protocol
    /// action tag and the target contract, bounded to the request's block
    /// range, ascending by height.
    fn interactions_page(&self, request: &PageRequest) -> Result<RecordPage, GatewayError>;
}
