//! Connection configuration.

use crate::error::SledError;
use ormsync_core::{ConnectionConfig, Value};
use std::path::PathBuf;

/// Settings for one sled database.
#[derive(Debug, Clone, PartialEq)]
pub struct SledConfig {
    /// Path to the database directory.
    pub path: PathBuf,

    /// Page cache capacity in bytes.
    pub cache_capacity: u64,

    /// Flush interval in milliseconds. None means flush only on request.
    pub flush_every_ms: Option<u64>,

    /// Enable zstd compression.
    pub compression: bool,

    /// Temporary database (deleted on drop).
    pub temporary: bool,
}

impl Default for SledConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./ormsync_data"),
            cache_capacity: 64 * 1024 * 1024, // 64MB
            flush_every_ms: Some(500),
            compression: false,
            temporary: false,
        }
    }
}

impl SledConfig {
    /// Create a configuration for the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Create a temporary configuration for testing.
    pub fn temporary() -> Self {
        Self {
            path: PathBuf::new(),
            temporary: true,
            ..Default::default()
        }
    }

    /// Read settings from connection options.
    ///
    /// Recognized keys: `path`, `temporary`, `cacheCapacity`,
    /// `flushEveryMs` and `compression`. A non-temporary connection must
    /// name a path.
    pub fn from_connection(config: &ConnectionConfig) -> Result<Self, SledError> {
        let temporary = bool_option(config, "temporary")?.unwrap_or(false);

        let mut sled_config = match config.get_str("path") {
            Some(path) => Self::new(path),
            None if temporary => Self::temporary(),
            None => return Err(SledError::Config("missing `path` option".to_string())),
        };
        sled_config.temporary = temporary;

        if let Some(capacity) = u64_option(config, "cacheCapacity")? {
            sled_config.cache_capacity = capacity;
        }
        if let Some(ms) = u64_option(config, "flushEveryMs")? {
            sled_config.flush_every_ms = Some(ms);
        }
        if let Some(compression) = bool_option(config, "compression")? {
            sled_config.compression = compression;
        }

        Ok(sled_config)
    }

    /// Convert to sled configuration.
    pub(crate) fn to_sled_config(&self) -> sled::Config {
        let mut config = sled::Config::new()
            .cache_capacity(self.cache_capacity)
            .use_compression(self.compression)
            .flush_every_ms(self.flush_every_ms);

        if self.temporary {
            config = config.temporary(true);
        } else {
            config = config.path(&self.path);
        }

        config
    }
}

fn bool_option(config: &ConnectionConfig, key: &str) -> Result<Option<bool>, SledError> {
    match config.options.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_bool()
            .map(Some)
            .ok_or_else(|| SledError::Config(format!("`{key}` must be a boolean"))),
    }
}

fn u64_option(config: &ConnectionConfig, key: &str) -> Result<Option<u64>, SledError> {
    match config.options.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(Some)
            .ok_or_else(|| SledError::Config(format!("`{key}` must be a non-negative integer"))),
    }
}
