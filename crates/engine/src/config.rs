//! Monitor configuration.
//!
//! Loaded once at startup from a TOML (or `.json`) file and immutable for the
//! process lifetime. Secrets never live here; channels read them from the
//! environment.
//!
//! ```toml
//! [engine]
//! poll_interval_secs = 300
//!
//! [[sources]]
//! id = "swpc-mag"
//! format = "swpc_table"
//! url = "https://services.swpc.noaa.gov/products/solar-wind/mag-1-day.json"
//!
//! [[indices]]
//! name = "Bz"
//! unit = "nT"
//! source = "swpc-mag"
//! field = "bz_gsm"
//! stale_after_secs = 900
//! thresholds = [
//!     { level = "watch", boundary = -5.0, direction = "falling_bad" },
//!     { level = "warning", boundary = -10.0, direction = "falling_bad" },
//! ]
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::EngineOptions;
use crate::error::{ConfigError, RegistryError};
use crate::registry::{FieldSelector, IndexDefinition, IndexRegistry, Threshold};
use crate::source::SourceSpec;
use crate::units::{Unit, ValueFormat};

/// Top-level configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub sources: Vec<SourceSpec>,
    #[serde(default)]
    pub indices: Vec<IndexConfig>,
    #[serde(default)]
    pub notify: NotifySettings,
}

/// Scheduling and timeout settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Seconds between polling cycles.
    pub poll_interval_secs: u64,
    /// Per-index fetch budget in seconds.
    pub fetch_timeout_secs: u64,
    /// Per-alert dispatch budget in seconds.
    pub dispatch_timeout_secs: u64,
    /// Where the running monitor writes its status snapshot, if anywhere.
    pub status_file: Option<PathBuf>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 300,
            fetch_timeout_secs: 10,
            dispatch_timeout_secs: 30,
            status_file: None,
        }
    }
}

/// One `[[indices]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    pub name: String,
    pub unit: Unit,
    pub source: String,
    #[serde(flatten)]
    pub selector: FieldSelector,
    pub stale_after_secs: u64,
    #[serde(default)]
    pub thresholds: Vec<Threshold>,
    #[serde(default)]
    pub format: ValueFormat,
    #[serde(default = "default_precision")]
    pub precision: usize,
}

fn default_precision() -> usize {
    1
}

impl IndexConfig {
    /// Convert into a registry definition.
    #[must_use]
    pub fn to_definition(&self) -> IndexDefinition {
        let stale_after = i64::try_from(self.stale_after_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or_else(|| chrono::Duration::days(36_500));
        IndexDefinition {
            name: self.name.clone(),
            unit: self.unit,
            source: self.source.clone(),
            selector: self.selector.clone(),
            thresholds: self.thresholds.clone(),
            stale_after,
            format: self.format,
            precision: self.precision,
        }
    }
}

/// Notification routing. Credentials come from the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifySettings {
    /// Email recipients.
    pub email_recipients: Vec<String>,
    /// Sender address; defaults to the SMTP username.
    pub email_from: Option<String>,
    /// SMTP relay host.
    pub smtp_host: Option<String>,
    /// SMTP port (STARTTLS).
    pub smtp_port: Option<u16>,
    /// Telegram chat ids.
    pub telegram_chat_ids: Vec<String>,
}

impl MonitorConfig {
    /// Load from a file; `.json` files are parsed as JSON, anything else as TOML.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config = if path.extension().is_some_and(|ext| ext == "json") {
            Self::from_json_str(&content)?
        } else {
            Self::from_toml_str(&content)?
        };
        debug!(
            path = %path.display(),
            indices = config.indices.len(),
            sources = config.sources.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Parse and validate TOML.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate JSON.
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check settings and build the registry once to surface definition errors.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let engine = &self.engine;
        if engine.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "engine.poll_interval_secs must be positive".to_string(),
            ));
        }
        if engine.fetch_timeout_secs == 0 || engine.dispatch_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "engine timeouts must be positive".to_string(),
            ));
        }
        if self.indices.is_empty() {
            return Err(ConfigError::Invalid("no indices configured".to_string()));
        }
        self.registry()?;
        Ok(())
    }

    /// Build the index registry.
    pub fn registry(&self) -> Result<IndexRegistry, RegistryError> {
        IndexRegistry::new(
            self.sources.clone(),
            self.indices.iter().map(IndexConfig::to_definition).collect(),
        )
    }

    /// Engine timeouts.
    #[must_use]
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            fetch_timeout: Duration::from_secs(self.engine.fetch_timeout_secs),
            dispatch_timeout: Duration::from_secs(self.engine.dispatch_timeout_secs),
        }
    }

    /// Interval between polling cycles.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.engine.poll_interval_secs)
    }
}
