//! Index registry: the immutable catalog of monitored indices.
//!
//! The registry is built once at startup, validated eagerly, and only ever
//! read afterwards. Every structural check on threshold bands happens here so
//! the classifier can stay infallible.

use std::collections::HashMap;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::RegistryError;
use crate::level::RiskLevel;
use crate::source::{SourceFormat, SourceSpec};
use crate::units::{Unit, ValueFormat};

/// Which side of a boundary is dangerous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Higher values are worse (speed, density, proton flux, Kp).
    RisingBad,
    /// Lower values are worse (southward Bz, Dst).
    FallingBad,
}

/// One threshold band of an index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    /// Level entered once the boundary is crossed.
    pub level: RiskLevel,
    /// Boundary value, inclusive on the unsafe side.
    pub boundary: f64,
    /// Which side of the boundary is unsafe.
    pub direction: Direction,
    /// Optional display label, e.g. `"S3 (Strong)"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Threshold {
    /// Create a band without a label.
    #[must_use]
    pub fn new(level: RiskLevel, boundary: f64, direction: Direction) -> Self {
        Self {
            level,
            boundary,
            direction,
            label: None,
        }
    }

    /// Attach a display label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Whether `value` lies on the unsafe side of this band's boundary.
    ///
    /// A value exactly on the boundary counts as breached.
    #[must_use]
    pub fn is_breached_by(&self, value: f64) -> bool {
        match self.direction {
            Direction::RisingBad => value >= self.boundary,
            Direction::FallingBad => value <= self.boundary,
        }
    }
}

/// Restricts record-list sources to rows whose `field` contains `contains`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowFilter {
    pub field: String,
    pub contains: String,
}

/// Where an index's value lives inside its source payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSelector {
    /// Column / key holding the numeric value. Ignored by Kyoto text sources.
    #[serde(default)]
    pub field: String,
    /// Column / key holding the observation time.
    #[serde(default = "default_time_field")]
    pub time_field: String,
    /// Unit the source reports the value in, when it differs from the index unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_unit: Option<String>,
    /// Row filter for record-list sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<RowFilter>,
}

fn default_time_field() -> String {
    "time_tag".to_string()
}

impl FieldSelector {
    /// Select `field` with the default time column.
    #[must_use]
    pub fn field(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            time_field: default_time_field(),
            source_unit: None,
            filter: None,
        }
    }
}

/// Immutable definition of a monitored index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDefinition {
    /// Unique key, e.g. `"Bz"`.
    pub name: String,
    /// Canonical unit.
    pub unit: Unit,
    /// Id of the source polled for this index.
    pub source: String,
    /// Location of the value inside the source payload.
    pub selector: FieldSelector,
    /// Ordered threshold bands, least severe first.
    pub thresholds: Vec<Threshold>,
    /// Age after which the last observation expires.
    pub stale_after: Duration,
    /// Display format.
    pub format: ValueFormat,
    /// Display precision.
    pub precision: usize,
}

impl IndexDefinition {
    /// Create a definition with default display settings.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        unit: Unit,
        source: impl Into<String>,
        selector: FieldSelector,
        thresholds: Vec<Threshold>,
        stale_after: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            unit,
            source: source.into(),
            selector,
            thresholds,
            stale_after,
            format: ValueFormat::default(),
            precision: 1,
        }
    }

    /// Render a value of this index for humans.
    #[must_use]
    pub fn render_value(&self, value: f64) -> String {
        self.format.render(value, self.precision, self.unit)
    }

    /// Check the structural invariants of the threshold bands.
    ///
    /// Bands must use band levels only, share one direction, have finite
    /// boundaries, and be strictly increasing in level with boundaries strictly
    /// monotonic in the unsafe direction. Together these guarantee that every
    /// value resolves to exactly one level.
    pub fn validate(&self) -> Result<(), RegistryError> {
        let invalid = |reason: String| RegistryError::InvalidDefinition {
            index: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty".to_string()));
        }
        if self.stale_after <= Duration::zero() {
            return Err(invalid("stale_after must be positive".to_string()));
        }

        for band in &self.thresholds {
            if !band.level.is_band() {
                return Err(invalid(format!(
                    "level {} cannot be used as a threshold band",
                    band.level
                )));
            }
            if !band.boundary.is_finite() {
                return Err(invalid(format!(
                    "boundary for {} is not finite",
                    band.level
                )));
            }
        }

        for pair in self.thresholds.windows(2) {
            let (lower, upper) = (&pair[0], &pair[1]);
            if lower.direction != upper.direction {
                return Err(invalid("all bands must share one direction".to_string()));
            }
            if lower.level >= upper.level {
                return Err(invalid(format!(
                    "band levels must strictly increase ({} then {})",
                    lower.level, upper.level
                )));
            }
            let monotonic = match lower.direction {
                Direction::RisingBad => lower.boundary < upper.boundary,
                Direction::FallingBad => lower.boundary > upper.boundary,
            };
            if !monotonic {
                return Err(invalid(format!(
                    "boundaries {} and {} overlap for direction {:?}",
                    lower.boundary, upper.boundary, lower.direction
                )));
            }
        }

        Ok(())
    }
}

/// Read-only catalog of index definitions and their sources.
#[derive(Debug, Clone, Default)]
pub struct IndexRegistry {
    definitions: Vec<IndexDefinition>,
    by_name: HashMap<String, usize>,
    sources: HashMap<String, SourceSpec>,
}

impl IndexRegistry {
    /// Build a registry, validating every definition and source reference.
    pub fn new(
        sources: Vec<SourceSpec>,
        definitions: Vec<IndexDefinition>,
    ) -> Result<Self, RegistryError> {
        let mut source_map = HashMap::with_capacity(sources.len());
        for source in sources {
            if source_map.contains_key(&source.id) {
                return Err(RegistryError::DuplicateSource(source.id));
            }
            source_map.insert(source.id.clone(), source);
        }

        let mut by_name = HashMap::with_capacity(definitions.len());
        for (position, definition) in definitions.iter().enumerate() {
            definition.validate()?;
            let Some(source) = source_map.get(&definition.source) else {
                return Err(RegistryError::UnknownSource {
                    index: definition.name.clone(),
                    source_id: definition.source.clone(),
                });
            };
            if source.format != SourceFormat::KyotoDst && definition.selector.field.is_empty() {
                return Err(RegistryError::InvalidDefinition {
                    index: definition.name.clone(),
                    reason: format!("source {} requires a field", source.id),
                });
            }
            if by_name.insert(definition.name.clone(), position).is_some() {
                return Err(RegistryError::DuplicateIndex(definition.name.clone()));
            }
        }

        debug!(
            indices = definitions.len(),
            sources = source_map.len(),
            "Index registry loaded"
        );

        Ok(Self {
            definitions,
            by_name,
            sources: source_map,
        })
    }

    /// Look up an index by name.
    pub fn lookup(&self, name: &str) -> Result<&IndexDefinition, RegistryError> {
        self.by_name
            .get(name)
            .map(|&position| &self.definitions[position])
            .ok_or_else(|| RegistryError::UnknownIndex(name.to_string()))
    }

    /// All definitions in insertion order.
    #[must_use]
    pub fn all(&self) -> &[IndexDefinition] {
        &self.definitions
    }

    /// Source by id.
    #[must_use]
    pub fn source(&self, id: &str) -> Option<&SourceSpec> {
        self.sources.get(id)
    }

    /// Number of registered indices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether no index is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
