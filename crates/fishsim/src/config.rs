//! Runner configuration with layered loading
//!
//! Configuration is loaded from multiple sources (lowest to highest priority):
//! 1. Compiled defaults
//! 2. `fishsim.ron` file (if exists)
//! 3. Environment variables prefixed with `FISHSIM_`
//!
//! Example environment variable: `FISHSIM_RUN__SEED=7`

use std::path::PathBuf;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use fishsim_core::{Preset, RunSettings, SimulationParameters};
use serde::{Deserialize, Serialize};

/// Main runner configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FishSimConfig {
    #[serde(default)]
    pub simulation: SimulationConfig,

    #[serde(default)]
    pub run: RunSettings,

    #[serde(default)]
    pub school: SchoolConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Which gait parameters to simulate with
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SimulationConfig {
    /// Built-in parameter set, also picks the rig fixture
    #[serde(default)]
    pub preset: Preset,
    /// RON parameter file replacing the preset's values
    #[serde(default)]
    pub params_file: Option<PathBuf>,
}

impl SimulationConfig {
    pub fn parameters(&self) -> Result<SimulationParameters> {
        match &self.params_file {
            Some(path) => SimulationParameters::from_ron_file(path)
                .with_context(|| format!("Failed to load parameters: {}", path.display())),
            None => self
                .preset
                .parameters()
                .with_context(|| format!("Failed to load preset '{}'", self.preset)),
        }
    }
}

/// Layout of the demo school
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchoolConfig {
    /// Number of rigs
    pub size: usize,
    /// Distance between neighbouring rigs along X
    pub spacing: f32,
    /// How far ahead of each rig its target starts
    pub target_distance: f32,
    /// Target size, scales the hover threshold
    pub target_size: f32,
}

impl Default for SchoolConfig {
    fn default() -> Self {
        Self {
            size: 3,
            spacing: 4.0,
            target_distance: 20.0,
            target_size: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutputConfig {
    /// Write a RON run report here
    #[serde(default)]
    pub report: Option<PathBuf>,
}

impl FishSimConfig {
    /// Load configuration with layered priority:
    /// 1. Compiled defaults (lowest priority)
    /// 2. `fishsim.ron` file (if exists)
    /// 3. Environment variables prefixed with `FISHSIM_` (highest priority)
    pub fn load() -> Result<Self> {
        let run = RunSettings::default();
        let school = SchoolConfig::default();
        let builder = Config::builder()
            // Layer 1: Compiled defaults
            .set_default("simulation.preset", Preset::default().name())?
            .set_default("run.start_frame", run.start_frame as i64)?
            .set_default("run.end_frame", run.end_frame as i64)?
            .set_default("run.frames_per_second", run.frames_per_second as f64)?
            .set_default("run.seed", run.seed as i64)?
            .set_default("school.size", school.size as i64)?
            .set_default("school.spacing", school.spacing as f64)?
            .set_default("school.target_distance", school.target_distance as f64)?
            .set_default("school.target_size", school.target_size as f64)?
            // Layer 2: Config file (optional, won't error if missing)
            .add_source(
                File::with_name("fishsim")
                    .format(config::FileFormat::Ron)
                    .required(false),
            )
            // Layer 3: Environment variables (FISHSIM_RUN__SEED, etc.)
            .add_source(Environment::with_prefix("FISHSIM").separator("__"));

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}
