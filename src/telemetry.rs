//! Tracing subscriber initialization.
//!
//! The library itself only emits through `tracing` macros; installing a
//! subscriber is an explicit opt-in by the embedding application. The
//! filter comes from `WEFT_LOG` when set, else `default_filter`.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

pub const LOG_ENV_VAR: &str = "WEFT_LOG";

/// Install a compact fmt subscriber for this process. Returns false when
/// a global subscriber was already installed (the call is then a no-op).
pub fn init(default_filter: &str) -> bool {
    let filter =
        EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(default_filter));
    Registry::default()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init()
        .is_ok()
}
