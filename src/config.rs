//! Configuration management for the querier
//!
//! TOML file support with environment variable overrides and defaults.
//!
//! ```toml
//! [querier]
//! gap_steps = 1
//!
//! [cache]
//! enabled = true
//! ttl_secs = 3600
//!
//! [monitoring]
//! log_level = "info"
//! ```

use crate::querier::gaps::{GapPolicy, DEFAULT_GAP_STEPS};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Range splitting behaviour
    #[serde(default)]
    pub querier: QuerierConfig,

    /// Result cache policy
    #[serde(default)]
    pub cache: CacheConfig,

    /// Logging
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

/// Range splitting configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuerierConfig {
    /// Cached samples further apart than this many steps leave a hole
    /// that is re-fetched
    #[serde(default = "default_gap_steps")]
    pub gap_steps: i64,
}

/// Result cache configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Use the result cache when one is wired in
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Retention of merged results written back to the cache
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitoringConfig {
    /// Log level (error, warn, info, debug, trace) used when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Include the event target in log lines
    #[serde(default = "default_true")]
    pub with_target: bool,
}

// Default value functions
fn default_gap_steps() -> i64 { DEFAULT_GAP_STEPS }
fn default_cache_ttl_secs() -> u64 { 3600 }
fn default_log_level() -> String { "info".to_string() }
fn default_true() -> bool { true }

impl Default for QuerierConfig {
    fn default() -> Self {
        Self {
            gap_steps: default_gap_steps(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            with_target: true,
        }
    }
}

impl QuerierConfig {
    /// Gap policy for the missing range detector
    pub fn gap_policy(&self) -> GapPolicy {
        GapPolicy::with_gap_steps(self.gap_steps)
    }
}

impl CacheConfig {
    /// Write-back TTL
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {}", path, e))?;

        toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config file {}: {}", path, e))
    }

    /// Load configuration with environment variable overrides
    pub fn from_file_with_env(path: &str) -> Result<Self, String> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from environment variables only
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        // Querier
        if let Ok(steps) = std::env::var("QUERIER_GAP_STEPS") {
            if let Ok(s) = steps.parse() {
                self.querier.gap_steps = s;
            }
        }

        // Cache
        if let Ok(enabled) = std::env::var("QUERIER_CACHE_ENABLED") {
            if let Ok(e) = enabled.parse() {
                self.cache.enabled = e;
            }
        }
        if let Ok(ttl) = std::env::var("QUERIER_CACHE_TTL_SECS") {
            if let Ok(t) = ttl.parse() {
                self.cache.ttl_secs = t;
            }
        }

        // Monitoring
        if let Ok(log_level) = std::env::var("RUST_LOG") {
            self.monitoring.log_level = log_level;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.querier.gap_steps < 1 {
            return Err("Gap steps must be >= 1".to_string());
        }

        if self.cache.enabled && self.cache.ttl_secs == 0 {
            return Err("Cache TTL must be > 0 when the cache is enabled".to_string());
        }

        if self.monitoring.log_level.trim().is_empty() {
            return Err("Log level cannot be empty".to_string());
        }

        Ok(())
    }

    /// Save configuration to TOML file
    pub fn save_to_file(&self, path: &str) -> Result<(), String> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        std::fs::write(path, contents)
            .map_err(|e| format!("Failed to write config file {}: {}", path, e))
    }
}
