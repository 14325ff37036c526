//! Fetch collaborator boundary.
//!
//! The engine never talks to the network itself. It asks a [`SampleFetcher`]
//! for the latest raw payload of a source and hands the result to the
//! ingestor.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FetchError;

/// Payload layout of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    /// SWPC product table: JSON array of arrays, first row is the header
    /// (`products/solar-wind/plasma-1-day.json`).
    SwpcTable,
    /// SWPC record list: JSON array of objects
    /// (`json/goes/primary/integral-protons-1-day.json`).
    SwpcRecords,
    /// Kyoto WDC realtime Dst text, whitespace separated
    /// `year month day hour value` rows.
    KyotoDst,
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SwpcTable => write!(f, "swpc_table"),
            Self::SwpcRecords => write!(f, "swpc_records"),
            Self::KyotoDst => write!(f, "kyoto_dst"),
        }
    }
}

/// A polled upstream endpoint. Several indices may share one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    /// Unique id referenced by index definitions.
    pub id: String,
    /// Payload layout.
    pub format: SourceFormat,
    /// Endpoint URL.
    pub url: String,
}

/// Raw payload as returned by the fetch collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSample {
    /// Id of the source this payload came from.
    pub source_id: String,
    /// Payload layout.
    pub format: SourceFormat,
    /// Undecoded body.
    pub body: String,
    /// When the fetch completed.
    pub fetched_at: DateTime<Utc>,
}

/// Trait for fetch collaborators (HTTP clients, fixtures, replay files).
#[async_trait]
pub trait SampleFetcher: Send + Sync {
    /// Get the name of this fetcher.
    fn name(&self) -> &'static str;

    /// Fetch the latest payload of `source`.
    ///
    /// Implementations may retry internally but must not block past the
    /// engine's fetch timeout; the engine cancels them when it elapses.
    async fn fetch_latest(&self, source: &SourceSpec) -> Result<RawSample, FetchError>;
}
