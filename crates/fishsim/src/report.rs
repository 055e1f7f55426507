//! Run report written after a batch

use std::path::Path;

use anyhow::{Context, Result};
use fishsim_core::{BatchReport, Preset, RigOutcome, RunSettings, SimulationParameters};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Timestamp (ISO 8601)
    pub timestamp: String,
    pub preset: Preset,
    /// Parameters as configured, before clamping
    pub parameters: SimulationParameters,
    pub settings: RunSettings,
    pub batch: BatchReport,
}

impl RunReport {
    pub fn new(
        preset: Preset,
        parameters: SimulationParameters,
        settings: RunSettings,
        batch: BatchReport,
    ) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            preset,
            parameters,
            settings,
            batch,
        }
    }

    /// One line per rig for the log
    pub fn summary_lines(&self) -> Vec<String> {
        self.batch
            .rigs
            .iter()
            .map(|rig| {
                format!(
                    "{:<16} {:<10} frames {:>5} | travelled {:>8.2} | turned {:>7.1} deg | effort {:.2} | hover {:.2}",
                    rig.name,
                    outcome_label(&rig.outcome),
                    rig.frames_written,
                    rig.distance_travelled,
                    rig.heading_change,
                    rig.final_effort,
                    rig.peak_hover_mode
                )
            })
            .collect()
    }

    /// Save report to a pretty RON file
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let ron = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .context("Failed to serialize run report to RON")?;

        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        std::fs::write(path.as_ref(), ron)
            .with_context(|| format!("Failed to write run report: {}", path.as_ref().display()))?;

        Ok(())
    }
}

fn outcome_label(outcome: &RigOutcome) -> &'static str {
    match outcome {
        RigOutcome::Completed => "Completed",
        RigOutcome::Cancelled => "Cancelled",
        RigOutcome::Failed(_) => "Failed",
        RigOutcome::NotRun => "NotRun",
    }
}
