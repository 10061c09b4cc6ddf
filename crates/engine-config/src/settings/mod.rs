use crate::{env::EnvManager, error::ConfigError};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use tracing::info;

pub const DEFAULT_BLOCK_SIZE: usize = 50_000;
pub const DEFAULT_BOUNDED_LIMIT: usize = 50_000;

pub const ENV_BLOCK_SIZE: &str = "SQLGRID_BLOCK_SIZE";
pub const ENV_BOUNDED_LIMIT: &str = "SQLGRID_BOUNDED_LIMIT";

/// Tuning knobs of the streaming table cache.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Rows per streamed block.
    pub block_size: usize,

    /// Row cap applied to queries fetched in one shot.
    pub bounded_limit: usize,

    /// Fraction through a block past which the next block is prefetched.
    pub prefetch_ahead: f64,

    /// Fraction through a block below which the previous block is prefetched.
    pub prefetch_behind: f64,

    /// Capacity of each change-notification subscription.
    pub notification_capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            bounded_limit: DEFAULT_BOUNDED_LIMIT,
            prefetch_ahead: 0.9,
            prefetch_behind: 0.1,
            notification_capacity: 1024,
        }
    }
}

impl CacheSettings {
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_bounded_limit(mut self, bounded_limit: usize) -> Self {
        self.bounded_limit = bounded_limit;
        self
    }

    /// Reads settings from a JSON file; missing keys take their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: CacheSettings =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        info!(path = %path.display(), "Loaded cache settings");
        settings.validate()
    }

    /// Applies `SQLGRID_BLOCK_SIZE` / `SQLGRID_BOUNDED_LIMIT` when set.
    pub fn with_env_overrides(mut self, env: &EnvManager) -> Result<Self, ConfigError> {
        if let Some(value) = env.get(ENV_BLOCK_SIZE) {
            self.block_size = parse_usize(ENV_BLOCK_SIZE, value)?;
        }
        if let Some(value) = env.get(ENV_BOUNDED_LIMIT) {
            self.bounded_limit = parse_usize(ENV_BOUNDED_LIMIT, value)?;
        }
        self.validate()
    }

    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.block_size == 0 {
            return Err(ConfigError::InvalidSettings(
                "block_size must be greater than zero".into(),
            ));
        }
        if self.bounded_limit == 0 {
            return Err(ConfigError::InvalidSettings(
                "bounded_limit must be greater than zero".into(),
            ));
        }
        if self.notification_capacity == 0 {
            return Err(ConfigError::InvalidSettings(
                "notification_capacity must be greater than zero".into(),
            ));
        }

        let in_unit = |v: f64| v > 0.0 && v < 1.0;
        if !in_unit(self.prefetch_ahead) || !in_unit(self.prefetch_behind) {
            return Err(ConfigError::InvalidSettings(
                "prefetch thresholds must lie strictly between 0 and 1".into(),
            ));
        }
        if self.prefetch_behind >= self.prefetch_ahead {
            return Err(ConfigError::InvalidSettings(
                "prefetch_behind must be below prefetch_ahead".into(),
            ));
        }

        Ok(self)
    }
}

fn parse_usize(var: &str, value: &str) -> Result<usize, ConfigError> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| ConfigError::InvalidEnv {
            var: var.to_string(),
            value: value.to_string(),
        })
}
