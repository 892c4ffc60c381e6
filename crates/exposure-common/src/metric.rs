//! Exposure metric identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ExposureError;

/// The environmental exposure metrics the grid services compute.
///
/// The lowercase name is used as the tile file prefix and the HTTP route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Fraction of the sun path not blocked by obstructions.
    Solar,
    /// Sky view factor.
    Sky,
    /// Urban heat island potential, derived from sky view.
    Uhi,
    /// Wind permeability.
    Wind,
}

impl Metric {
    pub const ALL: [Metric; 4] = [Metric::Solar, Metric::Sky, Metric::Uhi, Metric::Wind];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Solar => "solar",
            Metric::Sky => "sky",
            Metric::Uhi => "uhi",
            Metric::Wind => "wind",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = ExposureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "solar" => Ok(Metric::Solar),
            "sky" => Ok(Metric::Sky),
            "uhi" => Ok(Metric::Uhi),
            "wind" => Ok(Metric::Wind),
            other => Err(ExposureError::UnknownMetric(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!("sky".parse::<Metric>().unwrap(), Metric::Sky);
        assert_eq!("UHI".parse::<Metric>().unwrap(), Metric::Uhi);
        assert!("noise".parse::<Metric>().is_err());
    }

    #[test]
    fn test_display_matches_serde() {
        for metric in Metric::ALL {
            let json = serde_json::to_string(&metric).unwrap();
            assert_eq!(json, format!("\"{}\"", metric));
        }
    }
}
