//! Core domain error types.

use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CoreError {
    #[error(transparent)]
    InvalidId(#[from] InvalidId),

    #[error("amount {raw:?} is not a decimal integer")]
    InvalidAmount { raw: String },
}

/// Identifier parse failures, grouped by identifier kind.
#[derive(Debug, Error)]
pub enum InvalidId {
    #[error("invalid transaction id {raw:?}: {reason}")]
    Tx { raw: String, reason: String },

    #[error("invalid block id {raw:?}: {reason}")]
    Block { raw: String, reason: String },

    #[error("invalid address {raw:?}: {reason}")]
    Address { raw: String, reason: String },
}
