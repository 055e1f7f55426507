//! Gait sequencer
//!
//! Runs a list of rigs over a frame range, one rig after another and one
//! frame at a time. Hosts either hand control to [`Sequencer::run`] with a
//! [`FrameControl`] hook, or drive a [`BatchRun`] themselves with
//! [`BatchRun::tick`] to interleave frames with their own event loop.

use glam::Vec3;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;
use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;

use crate::error::RigError;
use crate::math::{heading_yaw, wrap_angle};
use crate::params::{ResolvedParameters, SimulationParameters};
use crate::rig::{RigAccess, RigHandle, RigMutAccess, Transform};
use crate::rng::SimRng;
use crate::state::SimulationState;
use crate::step::{step_frame, FrameSample};

/// Frame range, rate and seed of a batch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    pub start_frame: i32,
    /// Inclusive
    pub end_frame: i32,
    pub frames_per_second: f32,
    pub seed: u64,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            start_frame: 1,
            end_frame: 250,
            frames_per_second: 24.0,
            seed: 0,
        }
    }
}

impl RunSettings {
    pub fn frame_count(&self) -> usize {
        (i64::from(self.end_frame) - i64::from(self.start_frame) + 1).max(0) as usize
    }
}

/// Hook called after every simulated frame: the yield point and the cancellation check
pub trait FrameControl<H: RigAccess> {
    fn after_frame(&mut self, host: &mut H, rig: H::RigId, sample: &FrameSample) -> ControlFlow<()>;
}

impl<H, F> FrameControl<H> for F
where
    H: RigAccess,
    F: FnMut(&mut H, H::RigId, &FrameSample) -> ControlFlow<()>,
{
    fn after_frame(&mut self, host: &mut H, rig: H::RigId, sample: &FrameSample) -> ControlFlow<()> {
        self(host, rig, sample)
    }
}

/// Never yields work back and never cancels
#[derive(Debug, Clone, Copy, Default)]
pub struct RunToEnd;

impl<H: RigAccess> FrameControl<H> for RunToEnd {
    fn after_frame(&mut self, _host: &mut H, _rig: H::RigId, _sample: &FrameSample) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

/// How a rig's run ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RigOutcome {
    Completed,
    Cancelled,
    /// Validation failed; nothing was written
    Failed(String),
    /// The batch was cancelled before this rig started
    NotRun,
}

/// Propulsion capability detected at run start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RigMode {
    SwimOnly,
    HoverCapable,
}

/// Summary of one rig's run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RigReport {
    pub name: String,
    pub outcome: RigOutcome,
    pub mode: Option<RigMode>,
    pub frames_written: usize,
    pub start_position: Vec3,
    pub end_position: Vec3,
    /// Path length of the root
    pub distance_travelled: f32,
    /// Degrees, counter-clockwise positive
    pub heading_change: f32,
    pub final_effort: f32,
    pub peak_hover_mode: f32,
}

impl RigReport {
    /// Report for a rig that never ran
    fn idle<H: RigAccess>(host: &H, rig: H::RigId, outcome: RigOutcome) -> Self {
        let position = host.world_transform(rig).position;
        Self {
            name: host.rig_name(rig),
            outcome,
            mode: None,
            frames_written: 0,
            start_position: position,
            end_position: position,
            distance_travelled: 0.0,
            heading_change: 0.0,
            final_effort: 0.0,
            peak_hover_mode: 0.0,
        }
    }
}

/// Result of a batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub rigs: Vec<RigReport>,
    pub cancelled: bool,
}

impl BatchReport {
    pub fn completed(&self) -> usize {
        self.count(|o| matches!(o, RigOutcome::Completed))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, RigOutcome::Failed(_)))
    }

    pub fn frames_written(&self) -> usize {
        self.rigs.iter().map(|r| r.frames_written).sum()
    }

    fn count(&self, pred: impl Fn(&RigOutcome) -> bool) -> usize {
        self.rigs.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Simulation of one rig over the frame range
pub struct RigRun<H: RigAccess> {
    rig: H::RigId,
    name: String,
    handle: RigHandle<H::JointId>,
    target: Option<H::TargetId>,
    state: SimulationState,
    end_frame: i32,
    start: Transform,
    frames_written: usize,
    distance_travelled: f32,
    peak_hover_mode: f32,
    last_position: Vec3,
    finished: bool,
}

impl<H: RigMutAccess> RigRun<H> {
    /// Validate the rig and prepare a fresh run
    ///
    /// Seeks the timeline to the start frame, clears earlier recordings of the
    /// driven joints and draws the per-run gait jitter.
    pub fn begin<R: SimRng>(
        host: &mut H,
        rig: H::RigId,
        params: &ResolvedParameters,
        settings: &RunSettings,
        rng: &mut R,
    ) -> Result<Self, RigError> {
        if settings.start_frame > settings.end_frame {
            return Err(RigError::InvalidFrameRange {
                start: settings.start_frame,
                end: settings.end_frame,
            });
        }
        let handle = RigHandle::resolve(host, rig)?;
        let name = host.rig_name(rig);

        host.advance_frame(settings.start_frame);
        host.clear_recorded_poses(rig, &handle.driven_joints());

        let start = host.world_transform(rig);
        let target = host.resolve_target(rig);
        if target.is_none() {
            log::debug!("Rig '{}' has no target, swimming straight ahead", name);
        }
        let state = SimulationState::new(
            settings.start_frame,
            heading_yaw(start.orientation),
            params,
            rng,
        );

        log::info!(
            "Simulating '{}' frames {}..={} ({})",
            name,
            settings.start_frame,
            settings.end_frame,
            if handle.has_pectorals() { "hover capable" } else { "swim only" }
        );

        Ok(Self {
            rig,
            name,
            handle,
            target,
            state,
            end_frame: settings.end_frame,
            start,
            frames_written: 0,
            distance_travelled: 0.0,
            peak_hover_mode: 0.0,
            last_position: start.position,
            finished: false,
        })
    }

    /// Continue a run from a state snapshot
    ///
    /// Recordings before the snapshot's frame are kept. The rig is expected to
    /// be posed as it was when the snapshot was taken.
    pub fn resume(
        host: &mut H,
        rig: H::RigId,
        settings: &RunSettings,
        state: SimulationState,
    ) -> Result<Self, RigError> {
        if state.frame < settings.start_frame {
            return Err(RigError::InvalidFrameRange {
                start: state.frame,
                end: settings.end_frame,
            });
        }
        let handle = RigHandle::resolve(host, rig)?;
        let name = host.rig_name(rig);

        host.advance_frame(state.frame);
        let current = host.world_transform(rig);
        let target = host.resolve_target(rig);
        log::info!(
            "Resuming '{}' at frame {} of {}",
            name,
            state.frame,
            settings.end_frame
        );

        Ok(Self {
            rig,
            name,
            handle,
            target,
            finished: state.frame > settings.end_frame,
            state,
            end_frame: settings.end_frame,
            start: current,
            frames_written: 0,
            distance_travelled: 0.0,
            peak_hover_mode: 0.0,
            last_position: current.position,
        })
    }

    /// Simulate the current frame; `None` once the run has finished
    pub fn step<R: SimRng>(
        &mut self,
        host: &mut H,
        params: &ResolvedParameters,
        rng: &mut R,
    ) -> Option<FrameSample> {
        if self.finished {
            return None;
        }

        let sample = step_frame(
            host,
            self.rig,
            &self.handle,
            self.target,
            &mut self.state,
            params,
            rng,
        );

        self.frames_written += 1;
        self.distance_travelled += sample.position.distance(self.last_position);
        self.last_position = sample.position;
        self.peak_hover_mode = self.peak_hover_mode.max(sample.hover_mode);

        if sample.frame >= self.end_frame {
            self.finished = true;
        } else {
            self.state.frame += 1;
            host.advance_frame(self.state.frame);
        }
        Some(sample)
    }

    pub fn rig(&self) -> H::RigId {
        self.rig
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn report(&self, host: &H, outcome: RigOutcome) -> RigReport {
        let end = host.world_transform(self.rig);
        let heading_change =
            wrap_angle(heading_yaw(end.orientation) - self.state.start_heading).to_degrees();
        RigReport {
            name: self.name.clone(),
            outcome,
            mode: Some(if self.handle.has_pectorals() {
                RigMode::HoverCapable
            } else {
                RigMode::SwimOnly
            }),
            frames_written: self.frames_written,
            start_position: self.start.position,
            end_position: end.position,
            distance_travelled: self.distance_travelled,
            heading_change,
            final_effort: self.state.controller.effort,
            peak_hover_mode: self.peak_hover_mode,
        }
    }
}

/// Unit of work performed by [`BatchRun::tick`]
#[derive(Debug, Clone, PartialEq)]
pub enum Tick<R> {
    RigStarted { rig: R, name: String },
    Frame { rig: R, sample: FrameSample },
    RigFailed { rig: R, error: RigError },
    Finished,
}

/// A batch in progress, advanced one unit of work at a time
pub struct BatchRun<H: RigAccess, R = Xoshiro256StarStar> {
    params: ResolvedParameters,
    settings: RunSettings,
    rigs: Vec<H::RigId>,
    next_rig: usize,
    current: Option<RigRun<H>>,
    reports: Vec<RigReport>,
    rng: R,
    cancelled: bool,
}

impl<H: RigMutAccess, R: SimRng> BatchRun<H, R> {
    pub fn new(params: ResolvedParameters, settings: RunSettings, rigs: Vec<H::RigId>, rng: R) -> Self {
        Self {
            params,
            settings,
            rigs,
            next_rig: 0,
            current: None,
            reports: Vec::new(),
            rng,
            cancelled: false,
        }
    }

    /// Start the next rig or simulate one frame of the current one
    pub fn tick(&mut self, host: &mut H) -> Tick<H::RigId> {
        if self.cancelled {
            return Tick::Finished;
        }
        if self.current.is_none() {
            return self.start_next(host);
        }
        let Some(run) = self.current.as_mut() else {
            return Tick::Finished;
        };

        let rig = run.rig();
        let Some(sample) = run.step(host, &self.params, &mut self.rng) else {
            self.finish_current(host, RigOutcome::Completed);
            return self.tick(host);
        };
        if run.is_finished() {
            self.finish_current(host, RigOutcome::Completed);
        }
        Tick::Frame { rig, sample }
    }

    fn start_next(&mut self, host: &mut H) -> Tick<H::RigId> {
        let Some(&rig) = self.rigs.get(self.next_rig) else {
            return Tick::Finished;
        };
        self.next_rig += 1;

        match RigRun::begin(host, rig, &self.params, &self.settings, &mut self.rng) {
            Ok(run) => {
                let name = run.name().to_string();
                self.current = Some(run);
                Tick::RigStarted { rig, name }
            }
            Err(error) => {
                log::warn!("Skipping rig '{}': {}", host.rig_name(rig), error);
                self.reports.push(RigReport::idle(
                    host,
                    rig,
                    RigOutcome::Failed(error.to_string()),
                ));
                Tick::RigFailed { rig, error }
            }
        }
    }

    fn finish_current(&mut self, host: &H, outcome: RigOutcome) {
        if let Some(run) = self.current.take() {
            let report = run.report(host, outcome);
            log::info!(
                "Rig '{}' {:?}: {} frames, travelled {:.2}, turned {:.1} deg",
                report.name,
                report.outcome,
                report.frames_written,
                report.distance_travelled,
                report.heading_change
            );
            self.reports.push(report);
        }
    }

    /// Stop between frames; frames already written stay recorded
    pub fn cancel(&mut self, host: &H) {
        if self.cancelled {
            return;
        }
        self.finish_current(host, RigOutcome::Cancelled);
        for &rig in &self.rigs[self.next_rig..] {
            self.reports.push(RigReport::idle(host, rig, RigOutcome::NotRun));
        }
        self.next_rig = self.rigs.len();
        self.cancelled = true;
        log::info!("Batch cancelled");
    }

    pub fn current(&self) -> Option<&RigRun<H>> {
        self.current.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.cancelled || (self.current.is_none() && self.next_rig >= self.rigs.len())
    }

    /// Fraction of the batch done, 0..1
    pub fn progress(&self) -> f32 {
        if self.rigs.is_empty() || self.is_finished() {
            return 1.0;
        }
        let frames = self.settings.frame_count().max(1) as f32;
        let (done, partial) = match &self.current {
            Some(run) => (self.next_rig - 1, run.frames_written() as f32 / frames),
            None => (self.next_rig, 0.0),
        };
        (done as f32 + partial) / self.rigs.len() as f32
    }

    pub fn finish(self) -> BatchReport {
        BatchReport {
            rigs: self.reports,
            cancelled: self.cancelled,
        }
    }
}

/// Runs batches of rigs with shared parameters and settings
#[derive(Debug, Clone)]
pub struct Sequencer {
    params: ResolvedParameters,
    settings: RunSettings,
}

impl Sequencer {
    /// Sanitizes and resolves `params` for the settings' frame rate
    pub fn new(params: &SimulationParameters, settings: RunSettings) -> Self {
        Self {
            params: params.resolve(settings.frames_per_second),
            settings,
        }
    }

    pub fn params(&self) -> &ResolvedParameters {
        &self.params
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Begin a batch seeded from the settings
    pub fn start<H: RigMutAccess>(&self, rigs: &[H::RigId]) -> BatchRun<H> {
        self.start_with_rng(rigs, Xoshiro256StarStar::seed_from_u64(self.settings.seed))
    }

    /// Begin a batch with an injected random source
    pub fn start_with_rng<H: RigMutAccess, R: SimRng>(&self, rigs: &[H::RigId], rng: R) -> BatchRun<H, R> {
        BatchRun::new(self.params, self.settings, rigs.to_vec(), rng)
    }

    /// Run every rig to the end, calling `control` after each frame
    pub fn run<H, C>(&self, host: &mut H, rigs: &[H::RigId], control: &mut C) -> BatchReport
    where
        H: RigMutAccess,
        C: FrameControl<H>,
    {
        let mut batch = self.start::<H>(rigs);
        loop {
            match batch.tick(host) {
                Tick::Frame { rig, sample } => {
                    if control.after_frame(host, rig, &sample).is_break() {
                        batch.cancel(host);
                        break;
                    }
                }
                Tick::Finished => break,
                Tick::RigStarted { .. } | Tick::RigFailed { .. } => {}
            }
        }
        batch.finish()
    }
}
