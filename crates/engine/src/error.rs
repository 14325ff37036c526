//! Error types for the risk assessment engine.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building or querying the index registry.
///
/// All of these are configuration or programmer errors and are fatal at
/// startup.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No index with this name is registered.
    #[error("Unknown index: {0}")]
    UnknownIndex(String),

    /// Two indices share the same name.
    #[error("Duplicate index: {0}")]
    DuplicateIndex(String),

    /// Two sources share the same id.
    #[error("Duplicate source: {0}")]
    DuplicateSource(String),

    /// An index references a source that was never declared.
    #[error("Index {index} references unknown source {source_id}")]
    UnknownSource { index: String, source_id: String },

    /// The index definition violates a structural invariant.
    #[error("Invalid definition for index {index}: {reason}")]
    InvalidDefinition { index: String, reason: String },
}

/// Errors raised while normalizing a raw sample into an observation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    /// The required numeric field is missing, non-numeric or otherwise unusable.
    #[error("Malformed sample for {index}: {reason}")]
    MalformedSample { index: String, reason: String },
}

impl IngestError {
    pub(crate) fn malformed(index: &str, reason: impl Into<String>) -> Self {
        Self::MalformedSample {
            index: index.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors returned by a [`SampleFetcher`](crate::SampleFetcher).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The fetch did not complete within the per-index budget.
    #[error("Fetch timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    /// Connection or protocol failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The upstream answered with a non-success status.
    #[error("Upstream returned {status}: {message}")]
    Status { status: u16, message: String },

    /// No source with this id is known to the fetcher.
    #[error("Unknown source: {0}")]
    UnknownSource(String),
}

/// Errors raised while loading the monitor configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML parse error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON parse error.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The indices or sources do not form a valid registry.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A setting is out of range.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
