//! Cache configuration with layered loading.
//!
//! Loading precedence (highest wins):
//! 1. Environment variables (CACHE_SHIELD_*)
//! 2. TOML config file (if CACHE_SHIELD_CONFIG_FILE set)
//! 3. Built-in defaults

use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// key prefix for cached shop rows
pub const CACHE_SHOP_KEY: &str = "cache:shop:";
/// ttl for cached shop rows, 30 minutes
pub const CACHE_SHOP_TTL: Duration = Duration::from_secs(30 * 60);
/// ttl for the null marker, 2 minutes
pub const CACHE_NULL_TTL: Duration = Duration::from_secs(2 * 60);
/// ttl for a rebuild lease
pub const LOCK_TTL: Duration = Duration::from_secs(10);
pub const LOCK_PREFIX: &str = "lock:";
/// upper bound for any configured ttl, one year
pub const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);
pub const REBUILD_POOL_SIZE: usize = 10;

pub const ENV_PREFIX: &str = "CACHE_SHIELD_";
pub const ENV_CONFIG_FILE: &str = "CACHE_SHIELD_CONFIG_FILE";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Default ttl for values written by the passthrough strategy.
    #[serde(default = "default_value_ttl_secs")]
    pub value_ttl_secs: u64,

    /// Ttl of the null marker. Must be smaller than the value ttl.
    #[serde(default = "default_null_ttl_secs")]
    pub null_ttl_secs: u64,

    /// How long a rebuild lease lives if never released.
    #[serde(default = "default_lease_ttl_secs")]
    pub lease_ttl_secs: u64,

    #[serde(default = "default_pool_size")]
    pub rebuild_pool_size: usize,

    #[serde(default = "default_lock_prefix")]
    pub lock_prefix: String,
}

fn default_value_ttl_secs() -> u64 {
    CACHE_SHOP_TTL.as_secs()
}

fn default_null_ttl_secs() -> u64 {
    CACHE_NULL_TTL.as_secs()
}

fn default_lease_ttl_secs() -> u64 {
    LOCK_TTL.as_secs()
}

fn default_pool_size() -> usize {
    REBUILD_POOL_SIZE
}

fn default_lock_prefix() -> String {
    LOCK_PREFIX.to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            value_ttl_secs: default_value_ttl_secs(),
            null_ttl_secs: default_null_ttl_secs(),
            lease_ttl_secs: default_lease_ttl_secs(),
            rebuild_pool_size: default_pool_size(),
            lock_prefix: default_lock_prefix(),
        }
    }
}

impl CacheConfig {
    pub fn value_ttl(&self) -> Duration {
        Duration::from_secs(self.value_ttl_secs)
    }

    pub fn null_ttl(&self) -> Duration {
        Duration::from_secs(self.null_ttl_secs)
    }

    pub fn lease_ttl(&self) -> Duration {
        Duration::from_secs(self.lease_ttl_secs)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file or environment cannot be parsed,
    /// or if validation fails after loading.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var(ENV_CONFIG_FILE) {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).ignore(&["config_file"]));

        Self::extract(figment)
    }

    /// Load from a TOML string layered over the defaults.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let figment = Figment::from(Serialized::defaults(Self::default())).merge(Toml::string(toml));

        Self::extract(figment)
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment
            .extract()
            .map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rebuild_pool_size == 0 {
            return Err(invalid("rebuild_pool_size", "must be at least 1"));
        }
        if self.value_ttl_secs == 0 {
            return Err(invalid("value_ttl_secs", "must be greater than zero"));
        }
        if self.null_ttl_secs == 0 {
            return Err(invalid("null_ttl_secs", "must be greater than zero"));
        }
        if self.null_ttl_secs >= self.value_ttl_secs {
            return Err(invalid("null_ttl_secs", "must be smaller than value_ttl_secs"));
        }
        if self.lease_ttl_secs == 0 {
            return Err(invalid("lease_ttl_secs", "must be greater than zero"));
        }
        for (field, secs) in [
            ("value_ttl_secs", self.value_ttl_secs),
            ("null_ttl_secs", self.null_ttl_secs),
            ("lease_ttl_secs", self.lease_ttl_secs),
        ] {
            if secs > MAX_TTL.as_secs() {
                return Err(invalid(field, "must not exceed one year"));
            }
        }
        if self.lock_prefix.is_empty() {
            return Err(invalid("lock_prefix", "must not be empty"));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
