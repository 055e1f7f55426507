//! Error types for fishsim-core.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while preparing a rig for simulation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RigError {
    /// One or more required joint roles could not be resolved.
    #[error("rig '{rig}' is missing required joints: {}", roles.join(", "))]
    MissingJoints {
        /// Name of the rig being resolved.
        rig: String,
        /// Every role that failed to resolve, in role table order.
        roles: Vec<String>,
    },

    /// The requested frame range is empty.
    #[error("invalid frame range: start {start} is after end {end}")]
    InvalidFrameRange {
        /// First frame of the run.
        start: i32,
        /// Last frame of the run.
        end: i32,
    },
}

impl RigError {
    /// Creates a missing joints error.
    #[must_use]
    pub fn missing_joints(rig: impl Into<String>, roles: Vec<String>) -> Self {
        Self::MissingJoints {
            rig: rig.into(),
            roles,
        }
    }
}

/// Errors raised while loading parameter presets.
#[derive(Debug, Error)]
pub enum PresetError {
    /// Unknown preset name.
    #[error("unknown preset '{0}' (expected goldfish or shark)")]
    UnknownPreset(String),

    /// Preset text is not valid RON.
    #[error("failed to parse parameters: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Preset file could not be read.
    #[error("failed to read parameter file {path}: {source}")]
    Io {
        /// File that failed to load.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}
