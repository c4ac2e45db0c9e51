//! Client configuration.
//!
//! Defaults cover the public gateway; a TOML file can override them and
//! `WEFT_*` environment variables layer on top of whatever the file
//! said.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid {var} override: {reason}")]
    Override { var: String, reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub replay: ReplayConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL of the ledger gateway.
    pub url: String,
    /// Per-request timeout in milliseconds. No retries are layered on
    /// top; retry policy belongs to the caller.
    pub timeout_ms: u64,
    /// Records per query page. The gateway caps pages at 100.
    pub page_size: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: "https://arweave.net".into(),
            timeout_ms: 20_000,
            page_size: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Maximum depth of recursive foreign-state reads, counting the
    /// root contract.
    pub max_read_depth: usize,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self { max_read_depth: 16 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Directory for persisted snapshots; in-memory only when unset.
    pub dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
        }
    }
}

impl Config {
    /// Defaults, then the file at `path` (when given), then environment
    /// overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => read_file(path)?,
            None => Config::default(),
        };
        apply_env_overrides(&mut config)?;
        Ok(config)
    }
}

fn read_file(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

fn apply_env_overrides(config: &mut Config) -> Result<(), ConfigError> {
    if let Ok(url) = std::env::var("WEFT_GATEWAY_URL") {
        config.gateway.url = url;
    }
    if let Some(timeout) = parse_env("WEFT_GATEWAY_TIMEOUT_MS")? {
        config.gateway.timeout_ms = timeout;
    }
    if let Some(page_size) = parse_env("WEFT_PAGE_SIZE")? {
        config.gateway.page_size = page_size;
    }
    if let Some(depth) = parse_env("WEFT_MAX_READ_DEPTH")? {
        config.replay.max_read_depth = depth;
    }
    if let Some(enabled) = parse_env("WEFT_CACHE_ENABLED")? {
        config.cache.enabled = enabled;
    }
    if let Ok(dir) = std::env::var("WEFT_CACHE_DIR") {
        config.cache.dir = if dir.is_empty() {
            None
        } else {
            Some(PathBuf::from(dir))
        };
    }
    Ok(())
}

fn parse_env<T: std::str::FromStr>(var: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(var) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::Override {
                var: var.to_string(),
                reason: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_the_public_gateway() {
        let config = Config::default();
        assert_eq!(config.gateway.url, "https://arweave.net");
        assert_eq!(config.gateway.page_size, 100);
        assert!(config.cache.enabled);
        assert!(config.cache.dir.is_none());
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weft.toml");
        std::fs::write(
            &path,
            "[gateway]\nurl = \"http://localhost:1984\"\npage_size = 10\n\n[cache]\nenabled = false\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.gateway.url, "http://localhost:1984");
        assert_eq!(config.gateway.page_size, 10);
        assert!(!config.cache.enabled);
        // untouched sections keep their defaults
        assert_eq!(config.replay.max_read_depth, 16);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&dir.path().join("absent.toml"))).is_err());
    }
}
