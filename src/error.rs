//! Crate-level error wrapper and retry-ability metadata.

use thiserror::Error;

use crate::config::ConfigError;
use crate::contract::LoadError;
use crate::core::CoreError;
use crate::gateway::GatewayError;
use crate::replay::ReplayError;

/// Whether retrying this operation may succeed.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Transience {
    /// Retry will never help without changing inputs/state.
    Permanent,
    /// Retry may help (transient outage, throttling).
    Retryable,
    /// Unknown if retry will help.
    Unknown,
}

impl Transience {
    pub fn is_retryable(self) -> bool {
        matches!(self, Transience::Retryable)
    }
}

/// Crate-level convenience error.
///
/// Not a "god error": it is a thin wrapper over canonical capability
/// errors.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Replay(#[from] ReplayError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// Retry-ability of the underlying failure. The engine never retries
    /// on its own; callers use this to drive their policy.
    pub fn transience(&self) -> Transience {
        match self {
            Error::Gateway(e) => e.transience(),
            Error::Load(LoadError::Gateway(e)) => e.transience(),
            Error::Core(_) | Error::Load(_) | Error::Replay(_) | Error::Config(_) => {
                Transience::Permanent
            }
        }
    }
}
