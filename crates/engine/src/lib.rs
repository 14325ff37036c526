//! Risk assessment engine for space-weather telemetry.
//!
//! This crate turns noisy, irregularly arriving observations of solar wind,
//! IMF and geomagnetic indices into a stable per-index risk level and a
//! deduplicated stream of alerts.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use swx_engine::{Dispatcher, Engine, MonitorConfig, SampleFetcher};
//!
//! # async fn run(fetcher: Arc<dyn SampleFetcher>, notifier: Arc<dyn Dispatcher>) -> anyhow::Result<()> {
//! let config = MonitorConfig::load(std::path::Path::new("swx-monitor.toml"))?;
//! let engine = Engine::new(config.registry()?, fetcher, notifier, config.engine_options());
//!
//! let report = engine.run_cycle().await;
//! for event in report.sent() {
//!     println!("{}", event.message);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`IndexRegistry`] holds the validated, read-only index catalog
//! - [`normalize`] turns a [`RawSample`] into an [`Observation`]
//! - [`classify`] / [`classify_missing`] map values to a [`RiskLevel`]
//! - [`EpisodeTracker`] applies hysteresis and at-most-once notification
//! - [`Engine`] runs polling cycles over the [`SampleFetcher`] and
//!   [`Dispatcher`] boundaries

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod alert;
pub mod classify;
pub mod config;
pub mod engine;
pub mod episode;
pub mod error;
pub mod ingest;
pub mod level;
pub mod registry;
pub mod source;
pub mod status;
pub mod units;

pub use alert::{AlertEvent, DispatchResult, Dispatcher};
pub use classify::{classify, classify_band, classify_missing};
pub use config::{EngineSettings, IndexConfig, MonitorConfig, NotifySettings};
pub use engine::{CycleReport, DispatchRecord, Engine, EngineOptions, IndexOutcome, IndexReport};
pub use episode::{Episode, EpisodeTracker};
pub use error::{ConfigError, FetchError, IngestError, RegistryError};
pub use ingest::{normalize, Observation};
pub use level::RiskLevel;
pub use registry::{Direction, FieldSelector, IndexDefinition, IndexRegistry, RowFilter, Threshold};
pub use source::{RawSample, SampleFetcher, SourceFormat, SourceSpec};
pub use status::{IndexStatus, StatusSnapshot};
pub use units::{Unit, ValueFormat};
