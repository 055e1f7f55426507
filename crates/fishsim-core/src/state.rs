//! Per-rig simulation state
//!
//! One owned value per rig, created when its run begins and threaded through
//! every frame step. Serializable so a run can be snapshotted and resumed.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::controller::{RandomizedGait, SteeringController};
use crate::hover::HoverBlend;
use crate::oscillator::OscillatorBank;
use crate::params::ResolvedParameters;
use crate::rng::SimRng;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    /// Next frame to simulate
    pub frame: i32,
    /// Rig-local velocity
    pub velocity: Vec3,
    pub controller: SteeringController,
    pub oscillators: OscillatorBank,
    pub hover: HoverBlend,
    /// Jittered amplitude and period for this run
    pub gait: RandomizedGait,
    /// Rig-local X of the tail reference point on the previous frame
    pub previous_sweep: Option<f32>,
    /// Heading when the run began (radians)
    pub start_heading: f32,
}

impl SimulationState {
    /// Fresh state for a run starting at `start_frame`; draws the per-run jitter
    pub fn new(
        start_frame: i32,
        start_heading: f32,
        params: &ResolvedParameters,
        rng: &mut impl SimRng,
    ) -> Self {
        Self {
            frame: start_frame,
            velocity: Vec3::ZERO,
            controller: SteeringController::new(),
            oscillators: OscillatorBank::new(),
            hover: HoverBlend::new(start_frame, params),
            gait: RandomizedGait::draw(params, rng),
            previous_sweep: None,
            start_heading,
        }
    }
}
