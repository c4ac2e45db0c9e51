//! The ledger-derived total order over interaction records.
//!
//! `zero_pad(block_height, 12) ++ "," ++ hex(sha256(block_id ++ record_id))`
//!
//! Lexicographic comparison of the string form is the canonical order:
//! the padding width keeps numeric and lexicographic height order in
//! agreement for any realistic chain length, and the hash breaks ties
//! within a block as a pure function of ledger-confirmed data, so every
//! client derives the same sequence.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::identity::{BlockId, TxId};
use super::record::InteractionRecord;

const HEIGHT_PAD: usize = 12;

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SortKey(String);

impl SortKey {
    /// Derive the key for a record confirmed at `height` in `block_id`.
    ///
    /// Pure: inputs are already validated, there are no failure modes.
    pub fn of(height: u64, block_id: &BlockId, record_id: &TxId) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(block_id.to_bytes());
        hasher.update(record_id.to_bytes());
        let digest = hasher.finalize();
        Self(format!(
            "{:0width$},{}",
            height,
            hex::encode(digest),
            width = HEIGHT_PAD
        ))
    }

    pub fn for_record(record: &InteractionRecord) -> Self {
        Self::of(record.block.height, &record.block.id, &record.id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SortKey({})", self.0)
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
