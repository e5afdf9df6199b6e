use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ForgeError, Result};

/// Default build service endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://wave.seqera.io";

/// Default Tower (platform) API endpoint.
pub const DEFAULT_TOWER_ENDPOINT: &str = "https://api.cloud.seqera.io";

const MIB: u64 = 1024 * 1024;

/// Forge client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    /// Build service endpoint
    pub endpoint: String,

    /// Tower platform credentials forwarded with each request
    pub tower: TowerConfig,

    /// HTTP retry policy
    pub retry: RetryConfig,

    /// Completion polling policy
    pub poll: PollConfig,

    /// Layer size budgets
    pub limits: LayerLimits,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            tower: TowerConfig::default(),
            retry: RetryConfig::default(),
            poll: PollConfig::default(),
            limits: LayerLimits::default(),
        }
    }
}

impl ForgeConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ForgeError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let config: ForgeConfig = serde_yaml::from_str(&content).map_err(|e| {
            ForgeError::Config(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Default config file location (`~/.a3s/forge.yaml`), overridable
    /// through `A3S_FORGE_CONFIG`.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var("A3S_FORGE_CONFIG") {
            return PathBuf::from(path);
        }
        dirs::home_dir()
            .map(|h| h.join(".a3s"))
            .unwrap_or_else(|| PathBuf::from(".a3s"))
            .join("forge.yaml")
    }

    /// Load the default config file when present, otherwise the built-in defaults,
    /// then apply environment overrides.
    pub fn resolve() -> Result<Self> {
        let path = Self::default_path();
        let mut config = if path.exists() {
            tracing::debug!(path = %path.display(), "Loading forge config file");
            Self::load(&path)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply environment overrides using the given lookup function.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoint) = lookup("A3S_FORGE_ENDPOINT").or_else(|| lookup("WAVE_ENDPOINT")) {
            if !endpoint.trim().is_empty() {
                self.endpoint = endpoint;
            }
        }
        if let Some(endpoint) = lookup("TOWER_API_ENDPOINT") {
            self.tower.endpoint = Some(endpoint);
        }
        if let Some(token) = lookup("TOWER_ACCESS_TOKEN") {
            self.tower.access_token = Some(token);
        }
        if let Some(id) = lookup("TOWER_WORKSPACE_ID") {
            let parsed = id.trim().parse::<u64>().map_err(|_| {
                ForgeError::Config(format!(
                    "Invalid TOWER_WORKSPACE_ID - offending value: {}",
                    id
                ))
            })?;
            self.tower.workspace_id = Some(parsed);
        }
        Ok(())
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(ForgeError::Config("endpoint cannot be empty".to_string()));
        }
        self.retry.validate()?;
        self.poll.validate()?;
        Ok(())
    }
}

/// Tower platform settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TowerConfig {
    pub endpoint: Option<String>,
    pub access_token: Option<String>,
    pub workspace_id: Option<u64>,
}

impl Default for TowerConfig {
    fn default() -> Self {
        Self {
            endpoint: Some(DEFAULT_TOWER_ENDPOINT.to_string()),
            access_token: None,
            workspace_id: None,
        }
    }
}

/// Retry policy for build service calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Delay before the first retry, in milliseconds
    pub initial_delay_ms: u64,

    /// Upper bound for the exponential delay, in milliseconds
    pub max_delay_ms: u64,

    /// Total attempts including the first one
    pub max_attempts: u32,

    /// Multiplicative jitter factor in [0, 1]
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 150,
            max_delay_ms: 90_000,
            max_attempts: 5,
            jitter: 0.25,
        }
    }
}

impl RetryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(ForgeError::Config(
                "retry.max_attempts must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(ForgeError::Config(format!(
                "retry.jitter must be within [0, 1] - offending value: {}",
                self.jitter
            )));
        }
        if self.initial_delay_ms > self.max_delay_ms {
            return Err(ForgeError::Config(format!(
                "retry.initial_delay_ms ({}) cannot exceed retry.max_delay_ms ({})",
                self.initial_delay_ms, self.max_delay_ms
            )));
        }
        Ok(())
    }
}

/// Completion polling policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Pause between two status requests, in seconds
    pub interval_secs: u64,

    /// Default await timeout, in seconds
    pub timeout_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            timeout_secs: 15 * 60,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            return Err(ForgeError::Config(
                "poll.interval_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Compressed size budgets for layers, in bytes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerLimits {
    /// Build context layer
    pub context: u64,

    /// Each config layer
    pub layer: u64,

    /// Sum of all inline layers in one request (exclusive)
    pub aggregate: u64,
}

impl Default for LayerLimits {
    fn default() -> Self {
        Self {
            context: 5 * MIB,
            layer: MIB,
            aggregate: 10 * MIB,
        }
    }
}
