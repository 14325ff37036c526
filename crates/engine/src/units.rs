//! Physical units and value formatting.

use serde::{Deserialize, Serialize};

/// Canonical unit of a monitored index.
///
/// Observations are always stored in the canonical unit; a source that
/// reports a different but compatible unit is scaled on ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    /// Magnetic field strength
    #[serde(rename = "nT")]
    NanoTesla,
    /// Solar wind speed
    #[serde(rename = "km/s")]
    KilometersPerSecond,
    /// Proton density
    #[serde(rename = "p/cm3")]
    PerCubicCentimeter,
    /// Particle flux units (protons / cm² s sr)
    #[serde(rename = "pfu")]
    Pfu,
    /// X-ray irradiance
    #[serde(rename = "W/m2")]
    WattsPerSquareMeter,
    /// Indices such as Kp
    #[serde(rename = "dimensionless")]
    Dimensionless,
}

impl Unit {
    /// Display symbol.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::NanoTesla => "nT",
            Self::KilometersPerSecond => "km/s",
            Self::PerCubicCentimeter => "p/cm³",
            Self::Pfu => "pfu",
            Self::WattsPerSquareMeter => "W/m²",
            Self::Dimensionless => "",
        }
    }

    /// Scale factor that converts a value reported in `reported` into this unit.
    ///
    /// Returns `None` when the two units are not commensurable.
    #[must_use]
    pub fn factor_from(&self, reported: &str) -> Option<f64> {
        let reported = reported.trim();
        let factor = match self {
            Self::NanoTesla => match reported {
                "nT" | "nt" => 1.0,
                "pT" | "pt" => 1e-3,
                "uT" | "µT" => 1e3,
                "T" => 1e9,
                _ => return None,
            },
            Self::KilometersPerSecond => match reported {
                "km/s" | "kms" => 1.0,
                "m/s" => 1e-3,
                _ => return None,
            },
            Self::PerCubicCentimeter => match reported {
                "p/cm3" | "p/cm³" | "cm^-3" | "1/cm3" => 1.0,
                "p/m3" | "m^-3" | "1/m3" => 1e-6,
                _ => return None,
            },
            Self::Pfu => match reported {
                "pfu" | "p/cm2-s-sr" | "particles/cm2/s/sr" => 1.0,
                _ => return None,
            },
            Self::WattsPerSquareMeter => match reported {
                "W/m2" | "W/m²" | "Watts m^-2" => 1.0,
                "mW/m2" | "mW/m²" => 1e-3,
                _ => return None,
            },
            Self::Dimensionless => match reported {
                "" | "dimensionless" | "index" => 1.0,
                _ => return None,
            },
        };
        Some(factor)
    }

    /// Convert `value` reported in `reported` into this unit.
    pub fn convert_from(&self, reported: &str, value: f64) -> Result<f64, String> {
        self.factor_from(reported)
            .map(|factor| value * factor)
            .ok_or_else(|| format!("cannot convert {reported} into {}", self.symbol()))
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

/// How a value is rendered in alerts and status output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueFormat {
    /// Fixed-point with the index's precision.
    #[default]
    Fixed,
    /// Scientific notation with the index's precision.
    Scientific,
    /// GOES flare class derived from 0.1-0.8 nm X-ray flux in W/m².
    FlareClass,
}

impl ValueFormat {
    /// Render `value` with its unit.
    #[must_use]
    pub fn render(self, value: f64, precision: usize, unit: Unit) -> String {
        let number = match self {
            Self::Fixed => format!("{value:.precision$}"),
            Self::Scientific => format!("{value:.precision$e}"),
            Self::FlareClass => return flare_class(value),
        };
        match unit.symbol() {
            "" => number,
            symbol => format!("{number} {symbol}"),
        }
    }
}

/// Classify X-ray flux into a GOES flare class (`X1.2`, `M5.0`, `C3.4`, `Below C`).
#[must_use]
pub fn flare_class(flux: f64) -> String {
    if flux >= 1e-4 {
        format!("X{:.1}", flux / 1e-4)
    } else if flux >= 1e-5 {
        format!("M{:.1}", flux / 1e-5)
    } else if flux >= 1e-6 {
        format!("C{:.1}", flux / 1e-6)
    } else {
        "Below C".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_factors() {
        assert_eq!(
            Unit::KilometersPerSecond.convert_from("m/s", 450_000.0),
            Ok(450.0)
        );
        assert_eq!(Unit::NanoTesla.convert_from("nT", -12.5), Ok(-12.5));
        assert!(Unit::NanoTesla.convert_from("km/s", 1.0).is_err());
    }

    #[test]
    fn test_flare_class() {
        assert_eq!(flare_class(2.3e-4), "X2.3");
        assert_eq!(flare_class(5.0e-5), "M5.0");
        assert_eq!(flare_class(3.4e-6), "C3.4");
        assert_eq!(flare_class(4.0e-7), "Below C");
    }

    #[test]
    fn test_render() {
        assert_eq!(
            ValueFormat::Fixed.render(-18.24, 1, Unit::NanoTesla),
            "-18.2 nT"
        );
        assert_eq!(ValueFormat::Fixed.render(6.67, 2, Unit::Dimensionless), "6.67");
        assert_eq!(
            ValueFormat::FlareClass.render(1.2e-4, 1, Unit::WattsPerSquareMeter),
            "X1.2"
        );
    }
}
