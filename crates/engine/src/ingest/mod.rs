//! Sample ingestor.
//!
//! Turns an already-fetched [`RawSample`] into a uniform [`Observation`]:
//! extracts the index's field from the source layout, converts it into the
//! index's canonical unit, and resolves the observation time. Network retries
//! are the fetch collaborator's business; the ingestor only validates.

mod formats;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::IngestError;
use crate::registry::IndexDefinition;
use crate::source::{RawSample, SourceFormat};

/// One normalized sample of one index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Index this sample belongs to.
    pub index_name: String,
    /// Value in the index's canonical unit.
    pub value: f64,
    /// Measurement time reported by the source, or `fetched_at` if absent.
    pub observed_at: DateTime<Utc>,
    /// When the payload was fetched.
    pub fetched_at: DateTime<Utc>,
}

impl Observation {
    /// Age of the measurement at `now`.
    #[must_use]
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.observed_at)
    }
}

/// Normalize `raw` into an observation of `def`.
///
/// Fails with [`IngestError::MalformedSample`] when the required numeric field
/// is missing, non-numeric, non-finite, or reported in an incompatible unit.
/// Callers handle the error per index and move on.
pub fn normalize(raw: &RawSample, def: &IndexDefinition) -> Result<Observation, IngestError> {
    let extracted = match raw.format {
        SourceFormat::SwpcTable => formats::swpc_table(&raw.body, &def.selector),
        SourceFormat::SwpcRecords => formats::swpc_records(&raw.body, &def.selector),
        SourceFormat::KyotoDst => formats::kyoto_dst(&raw.body),
    }
    .map_err(|reason| IngestError::malformed(&def.name, reason))?;

    let value = match def.selector.source_unit.as_deref() {
        Some(reported) => def
            .unit
            .convert_from(reported, extracted.value)
            .map_err(|reason| IngestError::malformed(&def.name, reason))?,
        None => extracted.value,
    };
    if !value.is_finite() {
        return Err(IngestError::malformed(&def.name, "value is not finite"));
    }

    let observed_at = match extracted.observed_at {
        // Upstream clocks running ahead of ours must not make a sample look
        // fresher than the fetch itself.
        Some(time) if time > raw.fetched_at => {
            debug!(
                index = %def.name,
                observed_at = %time,
                fetched_at = %raw.fetched_at,
                "Clamping future observation time"
            );
            raw.fetched_at
        }
        Some(time) => time,
        None => raw.fetched_at,
    };

    Ok(Observation {
        index_name: def.name.clone(),
        value,
        observed_at,
        fetched_at: raw.fetched_at,
    })
}
