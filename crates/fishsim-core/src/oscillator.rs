//! Gait oscillator bank
//!
//! Two phase accumulators (tail and pectoral) drive every joint the
//! simulation writes. Fin bending is expressed as a Y scale so the rig's own
//! constraints turn it into a curve.

use glam::Quat;
use serde::{Deserialize, Serialize};
use std::f32::consts::{PI, TAU};

use crate::math::finite_or_zero;
use crate::params::ResolvedParameters;

/// Phase accumulators of one rig (radians, kept in [0, TAU))
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OscillatorBank {
    pub tail_phase: f32,
    pub pec_phase: f32,
}

/// Inputs to the body and tail pose for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TailDrive {
    /// Stroke amplitude (radians)
    pub amplitude: f32,
    /// Steering bias (radians)
    pub steering_offset: f32,
    /// Hover twitch (radians)
    pub twitch: f32,
    /// Hover pitch composed onto the torso
    pub body_tilt: Quat,
}

/// Joint values for the body, tail and side fins
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TailPose {
    /// Radians
    pub tail_angle: f32,
    pub spine: Quat,
    pub chest: Quat,
    pub torso: Quat,
    pub tail_fin_scale: f32,
    pub tail_fin_stub_scale: f32,
    pub side_fin_left: Quat,
    pub side_fin_right: Quat,
}

/// Inputs to the pectoral pose for one frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PectoralDrive {
    /// 0 flapping, 1 folded at rest
    pub rest_amount: f32,
    /// Filtered hover yaw error (radians)
    pub hover_turn: f32,
}

/// Joint values for both pectoral fins
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PectoralPose {
    pub palm_left: Quat,
    pub palm_right: Quat,
    pub top_left: f32,
    pub top_right: f32,
    pub bottom_left: f32,
    pub bottom_right: f32,
}

/// Advance a phase by one frame of a cycle lasting `period` frames
pub fn advance_phase(phase: f32, period: f32) -> f32 {
    if !(period.is_finite() && period > 0.0) {
        return phase;
    }
    (phase + TAU / period).rem_euclid(TAU)
}

/// Fin tip scale for a phase, within `1 ± band`
pub fn bend_scale(phase: f32, band: f32) -> f32 {
    1.0 + finite_or_zero(phase.sin()) * band
}

/// Stub scale following the tip by `ratio`, kept inside the tip's band
pub fn stub_scale(tip_scale: f32, ratio: f32, band: f32) -> f32 {
    (1.0 - (1.0 - tip_scale) * ratio).clamp(1.0 - band, 1.0 + band)
}

impl OscillatorBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Step both accumulators by one frame
    pub fn advance(&mut self, stroke_period: f32, pec_period: f32) {
        self.tail_phase = advance_phase(self.tail_phase, stroke_period);
        self.pec_phase = advance_phase(self.pec_phase, pec_period);
    }

    pub fn tail_pose(&self, drive: &TailDrive, params: &ResolvedParameters) -> TailPose {
        let offset = drive.steering_offset;
        let tail_angle =
            finite_or_zero(self.tail_phase.sin() * drive.amplitude + offset + drive.twitch);

        let spine = Quat::from_rotation_z(tail_angle);

        // Chest counters the tail and the steering bias, and dips into turns
        let chest = Quat::from_rotation_z(-tail_angle * params.chest_ratio - offset)
            * Quat::from_rotation_x(-offset.abs() * params.chest_raise);

        // Bank into the turn on top of the hover pitch
        let torso = drive.body_tilt * Quat::from_rotation_y(-offset * params.lean_into_turn);

        let tail_fin_scale = bend_scale(self.tail_phase + params.tail_fin_phase, params.tail_fin_band);
        let tail_fin_stub_scale =
            stub_scale(tail_fin_scale, params.tail_fin_stub_ratio, params.tail_fin_band);

        let side = (self.tail_phase + params.side_fin_phase).sin() * params.max_side_fin_angle;

        TailPose {
            tail_angle,
            spine,
            chest,
            torso,
            tail_fin_scale,
            tail_fin_stub_scale,
            side_fin_left: Quat::from_rotation_x(-side),
            side_fin_right: Quat::from_rotation_x(side),
        }
    }

    pub fn pectoral_pose(&self, drive: &PectoralDrive, params: &ResolvedParameters) -> PectoralPose {
        let rest = drive.rest_amount.clamp(0.0, 1.0);
        let turn = finite_or_zero(drive.hover_turn).clamp(-params.max_pec_angle, params.max_pec_angle);

        // Mirrored pairs run the right fin half a cycle behind
        let right_phase = if params.pec_synch {
            self.pec_phase
        } else {
            self.pec_phase + PI
        };

        let fin = |phase: f32, side: f32| {
            let flap = phase.sin() * params.max_pec_angle;
            let active = Quat::from_rotation_z(side * turn) * Quat::from_rotation_x(flap);
            let folded = Quat::from_rotation_z(side * params.pec_offset);
            let palm = active.slerp(folded, rest);

            // Tip bend lags the flap and fades out at rest
            let tip = bend_scale(phase - params.pec_phase, params.pec_band);
            let tip = 1.0 + (tip - 1.0) * (1.0 - rest);
            let bottom = stub_scale(tip, params.pec_stub_ratio, params.pec_band);
            (palm, tip, bottom)
        };

        let (palm_left, top_left, bottom_left) = fin(self.pec_phase, 1.0);
        let (palm_right, top_right, bottom_right) = fin(right_phase, -1.0);

        PectoralPose {
            palm_left,
            palm_right,
            top_left,
            top_right,
            bottom_left,
            bottom_right,
        }
    }
}
