//! Effort and steering controller
//!
//! One-pole filters turn the sensor demands into a smoothed swimming effort,
//! a steering bias for the tail and a vertical turning rate.

use serde::{Deserialize, Serialize};

use crate::math::{blend, finite_or_zero};
use crate::params::ResolvedParameters;
use crate::rng::SimRng;
use crate::sensor::TargetReading;

/// Keeps the stroke period finite as effort approaches zero
pub const EFFORT_EPSILON: f32 = 0.01;

/// Frames per tail cycle; lower effort gives slower strokes
pub fn stroke_period(max_period: f32, effort: f32) -> f32 {
    max_period / (effort.clamp(0.0, 1.0) + EFFORT_EPSILON)
}

/// Per-run jittered gait scalars, drawn once when a run begins
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RandomizedGait {
    /// Stroke amplitude at full effort (radians)
    pub max_tail_angle: f32,
    /// Frames per tail cycle at full effort
    pub stroke_period: f32,
}

impl RandomizedGait {
    pub fn draw(params: &ResolvedParameters, rng: &mut impl SimRng) -> Self {
        let max_tail_angle = rng.jitter(params.max_tail_angle, params.random);
        // Period never drops below one frame per cycle
        let stroke_period = rng.jitter(params.stroke_period, params.random).max(1.0);
        Self {
            max_tail_angle,
            stroke_period,
        }
    }

    /// Values without jitter
    pub fn nominal(params: &ResolvedParameters) -> Self {
        Self {
            max_tail_angle: params.max_tail_angle,
            stroke_period: params.stroke_period,
        }
    }
}

/// Controller outputs consumed by the oscillators and propulsion
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControllerOutput {
    pub effort: f32,
    /// Degrees
    pub steering_offset: f32,
    /// Frames per tail cycle
    pub stroke_period: f32,
    /// Radians
    pub stroke_amplitude: f32,
    /// Degrees per frame of pitch
    pub vertical_angular_force: f32,
    /// PI demand reported in telemetry; not fed back
    pub effort_demand: f32,
}

/// Persistent controller state of one rig
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SteeringController {
    pub effort: f32,
    /// Degrees
    pub steering_offset: f32,
    /// Degrees per frame
    pub vertical_force: f32,
    previous_closing_rate: Option<f32>,
}

impl SteeringController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the filters by one frame
    ///
    /// # Arguments
    /// * `reading` - Sensor output for this frame
    /// * `steering_demand` - Horizontal demand in -1..1 (the sensor's while swimming)
    /// * `params` - Resolved parameters
    /// * `gait` - Per-run jittered amplitude and period
    pub fn update(
        &mut self,
        reading: &TargetReading,
        steering_demand: f32,
        params: &ResolvedParameters,
        gait: &RandomizedGait,
    ) -> ControllerOutput {
        let ramp = params.effort_ramp;
        let closing_rate = finite_or_zero(reading.closing_rate);

        // 1. Effort tracks the gain-scaled closing rate
        let effort = blend(self.effort, params.effort_gain * closing_rate, ramp);
        self.effort = finite_or_zero(effort).clamp(0.0, 1.0);

        // 2. Steering bias and vertical turning rate
        let demand = finite_or_zero(steering_demand).clamp(-1.0, 1.0);
        self.steering_offset = blend(self.steering_offset, demand * params.max_steering_angle, ramp);
        self.vertical_force = self.vertical_force * (1.0 - ramp)
            + finite_or_zero(reading.vertical_demand) * params.max_vertical_angle;

        // 3. Diagnostic PI demand, seeded on the first frame
        let previous = self.previous_closing_rate.unwrap_or(closing_rate);
        let effort_demand = params.effort_gain
            * (params.effort_integral * closing_rate + (closing_rate - previous));
        self.previous_closing_rate = Some(closing_rate);

        ControllerOutput {
            effort: self.effort,
            steering_offset: self.steering_offset,
            stroke_period: stroke_period(gait.stroke_period, self.effort),
            stroke_amplitude: gait.max_tail_angle * self.effort,
            vertical_angular_force: self.vertical_force,
            effort_demand,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256StarStar;

    fn ahead(closing_rate: f32) -> TargetReading {
        TargetReading {
            closing_rate,
            distance: closing_rate.abs(),
            ..Default::default()
        }
    }

    #[test]
    fn test_stroke_period_monotonic() {
        let mut previous = f32::INFINITY;
        for step in 0..=100 {
            let effort = step as f32 / 100.0;
            let period = stroke_period(15.0, effort);
            assert!(period.is_finite() && period > 0.0, "effort {}", effort);
            assert!(period <= previous, "period rose at effort {}", effort);
            previous = period;
        }
        assert!((stroke_period(15.0, 0.0) - 1500.0).abs() < 1e-2);
    }

    #[test]
    fn test_effort_saturates_at_one() {
        let params = ResolvedParameters::default();
        let gait = RandomizedGait::nominal(&params);
        let mut controller = SteeringController::new();

        let out = controller.update(&ahead(10.0), 0.0, &params, &gait);
        // 0.5 * 10 * 0.2 = 1.0 on the first frame
        assert!((out.effort - 1.0).abs() < 1e-6);
        assert!((out.stroke_amplitude - params.max_tail_angle).abs() < 1e-6);
    }

    #[test]
    fn test_effort_never_negative() {
        let params = ResolvedParameters::default();
        let gait = RandomizedGait::nominal(&params);
        let mut controller = SteeringController::new();

        for _ in 0..20 {
            let out = controller.update(&ahead(-10.0), 0.0, &params, &gait);
            assert_eq!(out.effort, 0.0);
        }
    }

    #[test]
    fn test_steering_offset_converges() {
        let params = ResolvedParameters::default();
        let gait = RandomizedGait::nominal(&params);
        let mut controller = SteeringController::new();

        let mut out = ControllerOutput::default();
        for _ in 0..100 {
            out = controller.update(&ahead(5.0), 0.5, &params, &gait);
        }
        assert!(
            (out.steering_offset - 7.5).abs() < 1e-3,
            "offset {}",
            out.steering_offset
        );
    }

    #[test]
    fn test_zero_ramp_freezes_filters() {
        let params = ResolvedParameters {
            effort_ramp: 0.0,
            ..Default::default()
        };
        let gait = RandomizedGait::nominal(&params);
        let mut controller = SteeringController::new();

        let out = controller.update(&ahead(10.0), 1.0, &params, &gait);
        assert_eq!(out.effort, 0.0);
        assert_eq!(out.steering_offset, 0.0);
    }

    #[test]
    fn test_effort_demand_seeded_on_first_frame() {
        let params = ResolvedParameters::default();
        let gait = RandomizedGait::nominal(&params);
        let mut controller = SteeringController::new();

        let first = controller.update(&ahead(4.0), 0.0, &params, &gait);
        // No derivative kick: 0.5 * (0.5 * 4)
        assert!((first.effort_demand - 1.0).abs() < 1e-6);

        let second = controller.update(&ahead(6.0), 0.0, &params, &gait);
        // 0.5 * (0.5 * 6 + 2)
        assert!((second.effort_demand - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_non_finite_reading_is_ignored() {
        let params = ResolvedParameters::default();
        let gait = RandomizedGait::nominal(&params);
        let mut controller = SteeringController::new();

        let out = controller.update(&ahead(f32::NAN), f32::NAN, &params, &gait);
        assert!(out.effort.is_finite());
        assert!(out.steering_offset.is_finite());
        assert!(out.stroke_period.is_finite());
    }

    #[test]
    fn test_randomized_gait_within_jitter() {
        let params = ResolvedParameters::default();
        let mut rng = Xoshiro256StarStar::seed_from_u64(3);

        for _ in 0..200 {
            let gait = RandomizedGait::draw(&params, &mut rng);
            let ratio = gait.max_tail_angle / params.max_tail_angle;
            assert!((0.75 - 1e-5..=1.25 + 1e-5).contains(&ratio), "ratio {}", ratio);
            assert!(gait.stroke_period >= 15.0 * 0.75 - 1e-4);
        }
    }
}
