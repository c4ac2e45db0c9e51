//! Ledger identifier atoms.
//!
//! TxId: content-addressed transaction id (contracts, sources, records)
//! BlockId: independent block hash
//! Address: wallet address derived from a transaction owner key
//!
//! All three are base64url strings on the wire. They are alphabet- and
//! length-checked at parse time so that decoding to raw bytes later (for
//! sort-key hashing) cannot fail.

use std::fmt;

use base64::alphabet::URL_SAFE;
use base64::engine::general_purpose::GeneralPurpose;
use base64::engine::{DecodePaddingMode, Engine, GeneralPurposeConfig};
use serde::{Deserialize, Serialize};

use super::error::{CoreError, InvalidId};

/// Shared base64url engine: no padding on encode, indifferent to padding
/// and non-canonical trailing bits on decode. Ledger gateways emit ids in
/// this lenient form.
pub(crate) const B64URL: GeneralPurpose = GeneralPurpose::new(
    &URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Transaction id length on the wire: 32 hashed bytes, base64url encoded.
pub const TX_ID_LEN: usize = 43;

/// Encode raw bytes the way the ledger renders ids.
pub fn b64url_encode(bytes: &[u8]) -> String {
    B64URL.encode(bytes)
}

fn is_b64url(s: &str) -> bool {
    s.bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// A transaction id: exactly 43 base64url characters.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TxId(String);

impl TxId {
    pub fn parse(s: impl Into<String>) -> Result<Self, CoreError> {
        let s = s.into();
        if s.len() != TX_ID_LEN {
            return Err(InvalidId::Tx {
                raw: s,
                reason: format!("must be {} characters", TX_ID_LEN),
            }
            .into());
        }
        if !is_b64url(&s) {
            return Err(InvalidId::Tx {
                raw: s,
                reason: "contains non-base64url character".into(),
            }
            .into());
        }
        Ok(Self(s))
    }

    /// Whether `s` would parse as a transaction id. Used for evolve-target
    /// screening without allocating an error.
    pub fn is_valid(s: &str) -> bool {
        s.len() == TX_ID_LEN && is_b64url(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Raw hashed bytes behind the id.
    pub fn to_bytes(&self) -> Vec<u8> {
        B64URL.decode(&self.0).expect("alphabet checked at parse")
    }
}

impl fmt::Debug for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxId({:?})", self.0)
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for TxId {
    type Error = CoreError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        TxId::parse(s)
    }
}

impl From<TxId> for String {
    fn from(id: TxId) -> String {
        id.0
    }
}

/// An independent block hash. The current ledger uses 64 characters but
/// clients must not hard-fail on other lengths; only the alphabet and a
/// decodable length are enforced.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlockId(String);

impl BlockId {
    pub fn parse(s: impl Into<String>) -> Result<Self, CoreError> {
        let s = s.into();
        if s.is_empty() {
            return Err(InvalidId::Block {
                raw: s,
                reason: "empty".into(),
            }
            .into());
        }
        if s.len() % 4 == 1 {
            return Err(InvalidId::Block {
                raw: s,
                reason: "length is not a valid base64url length".into(),
            }
            .into());
        }
        if !is_b64url(&s) {
            return Err(InvalidId::Block {
                raw: s,
                reason: "contains non-base64url character".into(),
            }
            .into());
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        B64URL.decode(&self.0).expect("alphabet checked at parse")
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({:?})", self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for BlockId {
    type Error = CoreError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        BlockId::parse(s)
    }
}

impl From<BlockId> for String {
    fn from(id: BlockId) -> String {
        id.0
    }
}

/// A wallet address. Same shape as a transaction id on the current ledger,
/// but only non-emptiness and the alphabet are enforced.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn parse(s: impl Into<String>) -> Result<Self, CoreError> {
        let s = s.into();
        if s.is_empty() {
            return Err(InvalidId::Address {
                raw: s,
                reason: "empty".into(),
            }
            .into());
        }
        if !is_b64url(&s) {
            return Err(InvalidId::Address {
                raw: s,
                reason: "contains non-base64url character".into(),
            }
            .into());
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({:?})", self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Address {
    type Error = CoreError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Address::parse(s)
    }
}

impl From<Address> for String {
    fn from(a: Address) -> String {
        a.0
    }
}
