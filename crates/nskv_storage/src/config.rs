//! Store configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// The embedded on-disk engines a store can be backed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// redb: copy-on-write B-tree, one table per namespace.
    #[default]
    Redb,
    /// sled: log-structured tree, one tree per namespace.
    Sled,
}

impl Engine {
    /// Returns the engine's name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Redb => "redb",
            Self::Sled => "sled",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown engine name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown engine: {0} (expected redb or sled)")]
pub struct ParseEngineError(String);

impl FromStr for Engine {
    type Err = ParseEngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "redb" | "bolt" | "btree" => Ok(Self::Redb),
            "sled" | "badger" | "lsm" => Ok(Self::Sled),
            _ => Err(ParseEngineError(s.to_string())),
        }
    }
}

/// Configuration for an on-disk store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the store's files.
    pub storage_path: PathBuf,

    /// Which engine backs the store.
    pub engine: Engine,

    /// Whether to create the directory on start if it doesn't exist.
    pub create_if_missing: bool,

    /// Engine cache size in bytes.
    pub cache_size_bytes: usize,

    /// How often sled flushes in the background (`None` = only on stop).
    pub flush_interval_ms: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("./data"),
            engine: Engine::default(),
            create_if_missing: true,
            cache_size_bytes: 64 * 1024 * 1024, // 64 MB
            flush_interval_ms: Some(500),
        }
    }
}

impl StoreConfig {
    /// Creates a configuration for `storage_path` with default values.
    #[must_use]
    pub fn new(storage_path: impl Into<PathBuf>) -> Self {
        Self {
            storage_path: storage_path.into(),
            ..Self::default()
        }
    }

    /// Sets the engine.
    #[must_use]
    pub const fn engine(mut self, engine: Engine) -> Self {
        self.engine = engine;
        self
    }

    /// Sets whether to create the directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets the engine cache size.
    #[must_use]
    pub const fn cache_size_bytes(mut self, bytes: usize) -> Self {
        self.cache_size_bytes = bytes;
        self
    }

    /// Sets the sled background flush interval.
    #[must_use]
    pub const fn flush_interval_ms(mut self, interval: Option<u64>) -> Self {
        self.flush_interval_ms = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.engine, Engine::Redb);
        assert!(config.create_if_missing);
        assert_eq!(config.flush_interval_ms, Some(500));
    }

    #[test]
    fn builder_pattern() {
        let config = StoreConfig::new("/tmp/chain")
            .engine(Engine::Sled)
            .create_if_missing(false)
            .cache_size_bytes(1024)
            .flush_interval_ms(None);

        assert_eq!(config.storage_path, PathBuf::from("/tmp/chain"));
        assert_eq!(config.engine, Engine::Sled);
        assert!(!config.create_if_missing);
        assert_eq!(config.cache_size_bytes, 1024);
        assert_eq!(config.flush_interval_ms, None);
    }

    #[test]
    fn engine_parses_aliases() {
        assert_eq!("redb".parse::<Engine>().unwrap(), Engine::Redb);
        assert_eq!("Bolt".parse::<Engine>().unwrap(), Engine::Redb);
        assert_eq!("SLED".parse::<Engine>().unwrap(), Engine::Sled);
        assert_eq!("badger".parse::<Engine>().unwrap(), Engine::Sled);
        assert!("rocksdb".parse::<Engine>().is_err());
    }

    #[test]
    fn engine_display_round_trips() {
        for engine in [Engine::Redb, Engine::Sled] {
            assert_eq!(engine.to_string().parse::<Engine>().unwrap(), engine);
        }
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: StoreConfig =
            serde_json::from_str(r#"{"storage_path": "/var/lib/node", "engine": "sled"}"#)
                .unwrap();
        assert_eq!(config.storage_path, PathBuf::from("/var/lib/node"));
        assert_eq!(config.engine, Engine::Sled);
        assert!(config.create_if_missing);
        assert_eq!(config.cache_size_bytes, 64 * 1024 * 1024);
    }
}
