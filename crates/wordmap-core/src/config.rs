//! Bridge configuration defaults and environment overrides.
//!
//! Every tunable has a constant default in [`defaults`] and a matching
//! environment variable in [`env_vars`]; [`BridgeConfig::from_env`] gathers
//! them into one value.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default values.
pub mod defaults {
    /// Number of words read on each poll, starting at address 0.
    pub const WORD_COUNT: usize = 15;
    /// Pause between the end of one poll and the start of the next.
    pub const POLL_INTERVAL_MS: u64 = 10;
    /// Prefix of the bus source name; the host name is appended.
    pub const SOURCE_PREFIX: &str = "wordmap";
}

/// Environment variable names.
pub mod env_vars {
    use super::defaults;

    pub const WORD_COUNT: &str = "WORDMAP_WORD_COUNT";
    pub const POLL_INTERVAL_MS: &str = "WORDMAP_POLL_INTERVAL_MS";
    pub const MODEL: &str = "WORDMAP_MODEL";
    pub const SOURCE: &str = "WORDMAP_SOURCE";

    /// Word count from the environment, or the default.
    pub fn word_count() -> usize {
        std::env::var(WORD_COUNT)
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|count| *count > 0)
            .unwrap_or(defaults::WORD_COUNT)
    }

    /// Poll interval from the environment, or the default.
    pub fn poll_interval_ms() -> u64 {
        std::env::var(POLL_INTERVAL_MS)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults::POLL_INTERVAL_MS)
    }

    /// Model file path, if one is configured.
    pub fn model() -> Option<String> {
        std::env::var(MODEL).ok().filter(|s| !s.trim().is_empty())
    }

    /// Bus source name from the environment.
    pub fn source() -> Option<String> {
        std::env::var(SOURCE).ok().filter(|s| !s.trim().is_empty())
    }
}

/// Build the default bus source name (`wordmap.<host>`).
///
/// Only the first label of a dotted host name is kept.
pub fn default_source(host: &str) -> String {
    let host = host.split('.').next().unwrap_or_default();
    let host = if host.is_empty() { "localhost" } else { host };
    format!("{}.{}", defaults::SOURCE_PREFIX, host)
}

/// Runtime configuration of the word bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Words read on each poll.
    #[serde(default = "default_word_count")]
    pub word_count: usize,
    /// Delay between polls in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Unit model file. Without one the bridge publishes raw words.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<PathBuf>,
    /// Source name used on the message bus.
    pub source: String,
}

fn default_word_count() -> usize {
    defaults::WORD_COUNT
}

fn default_poll_interval_ms() -> u64 {
    defaults::POLL_INTERVAL_MS
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            word_count: defaults::WORD_COUNT,
            poll_interval_ms: defaults::POLL_INTERVAL_MS,
            model: None,
            source: default_source("localhost"),
        }
    }
}

impl BridgeConfig {
    /// Load the configuration from `WORDMAP_*` environment variables.
    pub fn from_env() -> Self {
        let host = std::env::var("HOSTNAME").unwrap_or_default();
        Self {
            word_count: env_vars::word_count(),
            poll_interval_ms: env_vars::poll_interval_ms(),
            model: env_vars::model().map(PathBuf::from),
            source: env_vars::source().unwrap_or_else(|| default_source(&host)),
        }
    }

    pub fn with_word_count(mut self, word_count: usize) -> Self {
        self.word_count = word_count;
        self
    }

    pub fn with_model(mut self, model: impl Into<PathBuf>) -> Self {
        self.model = Some(model.into());
        self
    }
}
