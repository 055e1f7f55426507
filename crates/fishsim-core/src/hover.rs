//! Hover blend
//!
//! Near its target a pectoral-finned rig stops swimming and holds station.
//! The blend is continuous (`hover_mode` in 0..1, slew limited) but the
//! force path switches at [`HOVER_CUTOVER`].
//!
//! While hovering, a duty-cycle scheduler folds the pectorals into short rest
//! windows and a random twitch keeps the tail alive.

use glam::{Quat, Vec3};
use keyframe::{ease, functions};
use serde::{Deserialize, Serialize};
use std::f32::consts::FRAC_PI_2;

use crate::math::{approach, blend, finite_or_zero};
use crate::params::ResolvedParameters;
use crate::propulsion::integrate_velocity;
use crate::rig::Transform;
use crate::rng::SimRng;

/// Hover mode at or above which hover forces replace swim forces
pub const HOVER_CUTOVER: f32 = 0.1;

/// Per-frame slerp fraction of the body tilt toward its target
pub const TILT_BLEND: f32 = 0.03;

/// Per-frame progress of a rest transition before easing
const REST_SLEW: f32 = 0.1;

/// Per-frame inputs to the hover state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoverInputs {
    pub frame: i32,
    /// Distance from rig root to target
    pub distance: f32,
    pub target_size: f32,
    /// Target heading minus rig heading (radians, counter-clockwise positive)
    pub yaw_error: f32,
}

/// Hover state of one rig
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoverBlend {
    /// 0 swimming, 1 hovering
    pub hover_mode: f32,
    /// Filtered heading error (radians)
    pub hover_turn: f32,
    /// 0 flapping, 1 pectorals folded
    pub rest_amount: f32,
    /// Tail twitch (degrees)
    pub twitch: f32,
    /// Torso pitch cue
    pub body_tilt: Quat,
    rest_progress: f32,
    resting: bool,
    next_rest_toggle: i32,
    twitch_target: f32,
    next_twitch: i32,
}

impl HoverBlend {
    pub fn new(start_frame: i32, params: &ResolvedParameters) -> Self {
        Self {
            hover_mode: 0.0,
            hover_turn: 0.0,
            rest_amount: 0.0,
            twitch: 0.0,
            body_tilt: Quat::IDENTITY,
            rest_progress: 0.0,
            resting: false,
            next_rest_toggle: start_frame.saturating_add(active_frames(params)),
            twitch_target: 0.0,
            next_twitch: start_frame,
        }
    }

    /// Whether the hover force path is active
    pub fn is_hovering(&self) -> bool {
        self.hover_mode >= HOVER_CUTOVER
    }

    /// Advance mode, rest, twitch and heading estimate by one frame
    pub fn update(&mut self, inputs: &HoverInputs, params: &ResolvedParameters, rng: &mut impl SimRng) {
        let threshold = params.hover_dist * inputs.target_size;
        self.update_mode(inputs.distance < threshold, params);
        self.update_rest(inputs.frame, params);
        self.update_twitch(inputs.frame, params, rng);
        self.update_turn(inputs.yaw_error, params);
    }

    /// Slew `hover_mode` toward 1 inside the threshold, toward 0 outside
    pub fn update_mode(&mut self, within_range: bool, params: &ResolvedParameters) {
        let was_hovering = self.is_hovering();
        self.hover_mode = if within_range {
            approach(self.hover_mode, 1.0, params.hover_ramp_in)
        } else {
            approach(self.hover_mode, 0.0, params.hover_ramp_out)
        };

        if was_hovering != self.is_hovering() {
            log::debug!(
                "Hover {} (mode {:.2})",
                if self.is_hovering() { "engaged" } else { "released" },
                self.hover_mode
            );
        }
    }

    fn update_rest(&mut self, frame: i32, params: &ResolvedParameters) {
        if !self.is_hovering() {
            // Active window restarts on the next hover
            self.resting = false;
            self.next_rest_toggle = frame.saturating_add(active_frames(params));
        } else if frame >= self.next_rest_toggle {
            let rest_frames = rest_frames(params);
            if !self.resting && rest_frames > 0 {
                self.resting = true;
                self.next_rest_toggle = frame.saturating_add(rest_frames);
                log::debug!("Pectorals rest for {} frames at frame {}", rest_frames, frame);
            } else {
                self.resting = false;
                self.next_rest_toggle = frame.saturating_add(active_frames(params));
            }
        }

        let goal = if self.resting { 1.0 } else { 0.0 };
        self.rest_progress = approach(self.rest_progress, goal, REST_SLEW);
        let t = (self.rest_progress as f64).clamp(0.0, 1.0);
        self.rest_amount = ease(functions::EaseInOut, 0.0, 1.0, t) as f32;
    }

    fn update_twitch(&mut self, frame: i32, params: &ResolvedParameters, rng: &mut impl SimRng) {
        if !self.is_hovering() {
            self.twitch_target = 0.0;
            self.next_twitch = frame;
        } else if frame >= self.next_twitch {
            self.twitch_target = rng.gen_signed() * params.hover_twitch;
            let wait = (rng.gen_f32() * 2.0 * params.hover_twitch_time).round().max(1.0);
            self.next_twitch = frame.saturating_add(wait as i32);
            log::debug!(
                "Twitch toward {:.2} deg, next at frame {}",
                self.twitch_target,
                self.next_twitch
            );
        }

        // Suppressed while resting and faded in with the hover blend
        let goal = self.twitch_target * self.hover_mode * (1.0 - self.rest_amount);
        self.twitch = blend(self.twitch, goal, params.effort_ramp);
    }

    fn update_turn(&mut self, yaw_error: f32, params: &ResolvedParameters) {
        let goal = if self.is_hovering() {
            finite_or_zero(yaw_error)
        } else {
            0.0
        };
        self.hover_turn = blend(self.hover_turn, goal, params.effort_ramp);
    }

    /// Ease the torso pitch toward the cue for `axial_force` (0 while swimming)
    pub fn update_tilt(&mut self, axial_force: f32, params: &ResolvedParameters) {
        let target = if self.is_hovering() && params.hover_max_force > 0.0 {
            let ratio = finite_or_zero(axial_force / params.hover_max_force).clamp(-1.0, 1.0);
            // Accelerating forward pitches the nose down
            Quat::from_rotation_x(ratio * params.hover_tilt)
        } else {
            Quat::IDENTITY
        };
        self.body_tilt = self.body_tilt.slerp(target, TILT_BLEND).normalize();
    }

    /// Fraction of the stroke amplitude kept at the current blend
    pub fn tail_amplitude_scale(&self, params: &ResolvedParameters) -> f32 {
        1.0 + (params.hover_tail_fraction - 1.0) * self.hover_mode
    }

    /// Steering demand (-1..1) that turns the tail toward the target heading
    pub fn steering_demand(&self) -> f32 {
        // A counter-clockwise error is a leftward (negative) demand
        (-self.hover_turn / FRAC_PI_2).clamp(-1.0, 1.0)
    }
}

fn active_frames(params: &ResolvedParameters) -> i32 {
    params.pec_duration.round().max(1.0) as i32
}

fn rest_frames(params: &ResolvedParameters) -> i32 {
    (params.pec_duration * (1.0 - params.pec_duty) / params.pec_duty).round() as i32
}

/// Station-keeping force in rig-local axes, clamped per axis
pub fn servo_force(root: &Transform, target: Vec3, hover_mode: f32, params: &ResolvedParameters) -> Vec3 {
    let demand = root.to_local(target) * hover_mode * params.pec_effort_gain;
    let axial = params.hover_max_force;
    let lateral = axial * params.hover_derate;
    Vec3::new(
        demand.x.clamp(-lateral, lateral),
        demand.y.clamp(-axial, axial),
        demand.z.clamp(-lateral, lateral),
    )
}

/// Advance the root by one hover frame; `velocity` is rig-local
pub fn advance_hover(
    root: &Transform,
    velocity: &mut Vec3,
    force: Vec3,
    target_orientation: Quat,
    params: &ResolvedParameters,
) -> Transform {
    *velocity = integrate_velocity(*velocity, force, params.drag, params.mass);
    let position = root.position + root.orientation * *velocity;
    let orientation = root
        .orientation
        .slerp(target_orientation, params.pec_turn_rate)
        .normalize();
    Transform::new(position, orientation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{heading_yaw, FORWARD};
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256StarStar;

    fn inputs(frame: i32, distance: f32) -> HoverInputs {
        HoverInputs {
            frame,
            distance,
            target_size: 1.0,
            yaw_error: 0.0,
        }
    }

    #[test]
    fn test_mode_slew_limited_both_ways() {
        let params = ResolvedParameters::default();
        let mut rng = Xoshiro256StarStar::seed_from_u64(1);
        let mut hover = HoverBlend::new(1, &params);

        let mut previous = hover.hover_mode;
        for frame in 1..40 {
            hover.update(&inputs(frame, 0.5), &params, &mut rng);
            assert!(hover.hover_mode - previous <= params.hover_ramp_in + 1e-6);
            previous = hover.hover_mode;
        }
        assert_eq!(hover.hover_mode, 1.0);

        for frame in 40..80 {
            hover.update(&inputs(frame, 5.0), &params, &mut rng);
            assert!(previous - hover.hover_mode <= params.hover_ramp_out + 1e-6);
            previous = hover.hover_mode;
        }
        assert_eq!(hover.hover_mode, 0.0);
    }

    #[test]
    fn test_rest_schedule_and_smoothness() {
        let params = ResolvedParameters::default();
        let mut rng = Xoshiro256StarStar::seed_from_u64(2);
        let mut hover = HoverBlend::new(1, &params);

        let mut previous = 0.0;
        let mut peak: f32 = 0.0;
        for frame in 1..400 {
            hover.update(&inputs(frame, 0.1), &params, &mut rng);
            assert!((0.0..=1.0).contains(&hover.rest_amount));
            assert!(
                (hover.rest_amount - previous).abs() <= 0.3,
                "rest jumped from {} to {} at frame {}",
                previous,
                hover.rest_amount,
                frame
            );
            previous = hover.rest_amount;
            peak = peak.max(hover.rest_amount);
        }
        // 50 active frames then 13 rest frames: the fins fold completely
        assert!(peak > 0.99, "peak rest {}", peak);
    }

    #[test]
    fn test_full_duty_never_rests() {
        let params = ResolvedParameters {
            pec_duty: 1.0,
            ..Default::default()
        };
        let mut rng = Xoshiro256StarStar::seed_from_u64(3);
        let mut hover = HoverBlend::new(1, &params);

        for frame in 1..300 {
            hover.update(&inputs(frame, 0.1), &params, &mut rng);
            assert_eq!(hover.rest_amount, 0.0);
        }
    }

    #[test]
    fn test_twitch_bounded() {
        let params = ResolvedParameters {
            hover_twitch_time: 3.0,
            ..Default::default()
        };
        let mut rng = Xoshiro256StarStar::seed_from_u64(4);
        let mut hover = HoverBlend::new(1, &params);

        let mut moved = false;
        for frame in 1..1000 {
            hover.update(&inputs(frame, 0.1), &params, &mut rng);
            assert!(hover.twitch.abs() <= params.hover_twitch + 1e-5);
            moved |= hover.twitch.abs() > 0.1;
        }
        assert!(moved, "twitch never moved");
    }

    #[test]
    fn test_swimming_draws_no_random_numbers() {
        let params = ResolvedParameters::default();
        let mut rng = Xoshiro256StarStar::seed_from_u64(5);
        let mut reference = rng.clone();
        let mut hover = HoverBlend::new(1, &params);

        for frame in 1..50 {
            hover.update(&inputs(frame, 50.0), &params, &mut rng);
        }
        assert_eq!(rng.gen_f32(), reference.gen_f32());
        assert_eq!(hover.twitch, 0.0);
    }

    #[test]
    fn test_servo_force_clamped_per_axis() {
        let params = ResolvedParameters::default();
        let root = Transform::IDENTITY;
        let force = servo_force(&root, Vec3::new(10.0, -10.0, -10.0), 1.0, &params);

        let lateral = params.hover_max_force * params.hover_derate;
        assert!((force.x - lateral).abs() < 1e-6);
        assert!((force.y + params.hover_max_force).abs() < 1e-6);
        assert!((force.z + lateral).abs() < 1e-6);
    }

    #[test]
    fn test_servo_force_is_rig_local() {
        let params = ResolvedParameters::default();
        let root = Transform::new(Vec3::ZERO, Quat::from_rotation_z(std::f32::consts::FRAC_PI_2));
        // Straight ahead of a rig turned a quarter left
        let ahead = root.orientation * FORWARD * 0.2;
        let force = servo_force(&root, ahead, 1.0, &params);

        assert!(force.x.abs() < 1e-6);
        assert!((force.y + 0.2 * params.pec_effort_gain).abs() < 1e-6);
    }

    #[test]
    fn test_heading_servo_converges() {
        let params = ResolvedParameters {
            pec_turn_rate: 0.05,
            ..Default::default()
        };
        let mut root = Transform::IDENTITY;
        let mut velocity = Vec3::ZERO;
        let target = Quat::from_rotation_z(1.0);

        for _ in 0..300 {
            root = advance_hover(&root, &mut velocity, Vec3::ZERO, target, &params);
        }
        assert!((heading_yaw(root.orientation) - 1.0).abs() < 1e-3);
        assert_eq!(root.position, Vec3::ZERO);
    }

    #[test]
    fn test_tilt_eases_and_relaxes() {
        let params = ResolvedParameters::default();
        let mut hover = HoverBlend::new(1, &params);
        hover.hover_mode = 1.0;

        hover.update_tilt(params.hover_max_force, &params);
        let first = hover.body_tilt.angle_between(Quat::IDENTITY);
        assert!(first > 0.0 && first < params.hover_tilt * 0.05);

        for _ in 0..500 {
            hover.update_tilt(params.hover_max_force, &params);
        }
        assert!((hover.body_tilt.angle_between(Quat::IDENTITY) - params.hover_tilt).abs() < 1e-3);

        hover.hover_mode = 0.0;
        for _ in 0..500 {
            hover.update_tilt(0.0, &params);
        }
        assert!(hover.body_tilt.angle_between(Quat::IDENTITY) < 1e-3);
    }
}
