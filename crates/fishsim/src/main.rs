use std::ops::ControlFlow;
use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use fishsim::{FishSimConfig, RunReport, School};
use fishsim_core::{FrameSample, MemoryScene, Preset, RigKey, Sequencer};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Parameter preset: goldfish, shark
    #[arg(long)]
    preset: Option<Preset>,

    /// RON parameter file (overrides the preset's values)
    #[arg(long)]
    params: Option<PathBuf>,

    /// First frame to simulate
    #[arg(long)]
    start: Option<i32>,

    /// Last frame to simulate (inclusive)
    #[arg(long)]
    end: Option<i32>,

    /// Random seed for the per-run gait jitter
    #[arg(long)]
    seed: Option<u64>,

    /// Number of rigs in the school
    #[arg(long)]
    school: Option<usize>,

    /// Initial distance from each rig to its target
    #[arg(long)]
    target_distance: Option<f32>,

    /// Write a RON run report to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

impl Args {
    /// Command-line flags take priority over every configuration layer
    fn apply(self, config: &mut FishSimConfig) {
        if let Some(preset) = self.preset {
            config.simulation.preset = preset;
        }
        if let Some(params) = self.params {
            config.simulation.params_file = Some(params);
        }
        if let Some(start) = self.start {
            config.run.start_frame = start;
        }
        if let Some(end) = self.end {
            config.run.end_frame = end;
        }
        if let Some(seed) = self.seed {
            config.run.seed = seed;
        }
        if let Some(size) = self.school {
            config.school.size = size;
        }
        if let Some(distance) = self.target_distance {
            config.school.target_distance = distance;
        }
        if let Some(report) = self.report {
            config.output.report = Some(report);
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = FishSimConfig::load()?;
    args.apply(&mut config);

    let preset = config.simulation.preset;
    let parameters = config.simulation.parameters()?;
    let settings = config.run;

    log::info!("Starting FishSim");
    log::info!("  Preset: {}", preset);
    if let Some(path) = &config.simulation.params_file {
        log::info!("  Parameters: {}", path.display());
    }
    log::info!(
        "  Frames: {}..={} at {} fps",
        settings.start_frame,
        settings.end_frame,
        settings.frames_per_second
    );
    log::info!("  Seed: {}", settings.seed);
    log::info!("  School: {} rigs", config.school.size);

    let School {
        mut scene, rigs, ..
    } = School::build(preset, &config.school);

    let sequencer = Sequencer::new(&parameters, settings);
    let resolved = sequencer.params();
    log::debug!(
        "Fin bend bands: tail +/-{:.3}, pectoral +/-{:.3}",
        resolved.tail_fin_band,
        resolved.pec_band
    );
    let total = rigs.len().saturating_mul(sequencer.settings().frame_count());
    let mut done = 0usize;
    let mut last_logged = 0usize;
    let mut progress = |_host: &mut MemoryScene, _rig: RigKey, sample: &FrameSample| {
        done += 1;
        log::trace!(
            "frame {} effort {:.3} offset {:.2} hover {:.2}",
            sample.frame,
            sample.effort,
            sample.steering_offset,
            sample.hover_mode
        );
        let percent = (done as u64 * 100 / total.max(1) as u64) as usize;
        if percent >= last_logged + 10 {
            last_logged = percent - percent % 10;
            log::info!("Progress: {}%", last_logged);
        }
        ControlFlow::Continue(())
    };
    let batch = sequencer.run(&mut scene, &rigs, &mut progress);

    let report = RunReport::new(preset, parameters, settings, batch);
    log::info!(
        "Finished: {} completed, {} failed, {} frames written",
        report.batch.completed(),
        report.batch.failed(),
        report.batch.frames_written()
    );
    for line in report.summary_lines() {
        log::info!("  {}", line);
    }

    if let Some(path) = &config.output.report {
        report.to_file(path)?;
        log::info!("Report written to {}", path.display());
    }

    if !rigs.is_empty() && report.batch.completed() == 0 {
        bail!("No rig completed its run");
    }
    Ok(())
}
