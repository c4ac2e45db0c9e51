//! Confirmed interaction records.

use serde::{Deserialize, Serialize};

use super::error::CoreError;
use super::identity::{Address, BlockId, TxId};
use super::protocol;
use super::tags::{TagError, Tags};

/// A ledger amount in the smallest unit, kept as the decimal string the
/// gateway returns. Amounts can exceed u64 and contracts compare or
/// display them rather than doing arithmetic on them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Winston(String);

impl Winston {
    pub fn new(s: impl Into<String>) -> Result<Self, CoreError> {
        let s = s.into();
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CoreError::InvalidAmount { raw: s });
        }
        Ok(Self(s))
    }

    pub fn zero() -> Self {
        Self("0".into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Winston {
    type Error = CoreError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Winston::new(s)
    }
}

impl From<Winston> for String {
    fn from(w: Winston) -> String {
        w.0
    }
}

/// The confirmed block an interaction record landed in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRef {
    pub height: u64,
    pub id: BlockId,
    pub timestamp: u64,
}

/// One confirmed ledger transaction representing a call into a contract.
///
/// Immutable once confirmed. Shape rules (exactly one `Input` tag, a
/// `Contract` tag naming the target) are checked at fold time, not here:
/// a malformed record is still part of the log, it just has no state
/// effect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub id: TxId,
    pub owner: Address,
    pub recipient: Option<Address>,
    pub tags: Tags,
    pub fee: Winston,
    pub quantity: Winston,
    pub block: BlockRef,
}

impl InteractionRecord {
    /// The unique `Input` tag payload, or why it is unusable.
    pub fn input_payload(&self) -> Result<&str, TagError> {
        self.tags.unique(protocol::TAG_INPUT)
    }
}
