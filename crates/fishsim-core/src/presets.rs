//! Built-in parameter presets

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PresetError;
use crate::params::SimulationParameters;

const GOLDFISH_RON: &str = include_str!("../presets/goldfish.ron");
const SHARK_RON: &str = include_str!("../presets/shark.ron");

/// Named parameter sets shipped with the crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// Hover-capable, low power, pectoral fins tuned
    #[default]
    Goldfish,
    /// Swim-only, high power, soft fins
    Shark,
}

impl Preset {
    pub const ALL: [Preset; 2] = [Preset::Goldfish, Preset::Shark];

    pub fn name(self) -> &'static str {
        match self {
            Preset::Goldfish => "goldfish",
            Preset::Shark => "shark",
        }
    }

    /// Whether rigs for this preset are built with pectoral fins
    pub fn has_pectorals(self) -> bool {
        matches!(self, Preset::Goldfish)
    }

    fn source(self) -> &'static str {
        match self {
            Preset::Goldfish => GOLDFISH_RON,
            Preset::Shark => SHARK_RON,
        }
    }

    /// Parse the embedded parameter set
    pub fn parameters(self) -> Result<SimulationParameters, PresetError> {
        SimulationParameters::from_ron_str(self.source())
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = PresetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Preset::ALL
            .into_iter()
            .find(|preset| preset.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| PresetError::UnknownPreset(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ThrustModel;

    #[test]
    fn test_all_presets_parse() {
        for preset in Preset::ALL {
            let params = preset
                .parameters()
                .unwrap_or_else(|e| panic!("preset {} failed to parse: {}", preset, e));
            assert_eq!(params.sanitized(), params, "preset {} out of range", preset);
        }
    }

    #[test]
    fn test_goldfish_values() {
        let params = Preset::Goldfish.parameters().unwrap();
        assert_eq!(params.power, 1.0);
        assert_eq!(params.max_pec_freq, 15.0);
        assert_eq!(params.pec_turn_assist, 1.0);
        assert_eq!(params.thrust_model, ThrustModel::Revised);
    }

    #[test]
    fn test_shark_values() {
        let params = Preset::Shark.parameters().unwrap();
        assert_eq!(params.power, 20.0);
        assert_eq!(params.max_side_fin_angle, 15.0);
        assert!((params.tail_fin_stiffness - 0.2).abs() < 1e-6);
        assert!(!Preset::Shark.has_pectorals());
    }

    #[test]
    fn test_from_str() {
        assert_eq!("Goldfish".parse::<Preset>().unwrap(), Preset::Goldfish);
        assert_eq!(" shark ".parse::<Preset>().unwrap(), Preset::Shark);
        assert!(matches!(
            "tuna".parse::<Preset>(),
            Err(PresetError::UnknownPreset(name)) if name == "tuna"
        ));
    }
}
