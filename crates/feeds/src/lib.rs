//! Fetch collaborators for the risk engine.
//!
//! The engine only knows the [`SampleFetcher`](swx_engine::SampleFetcher)
//! boundary. This crate provides the production implementation that pulls
//! the NOAA SWPC JSON products and the Kyoto WDC realtime Dst text over HTTP.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use swx_feeds::HttpFetcher;
//!
//! let fetcher = Arc::new(HttpFetcher::new()?);
//! ```

mod http;

pub use http::{HttpFetcher, DEFAULT_REQUEST_TIMEOUT, USER_AGENT};
