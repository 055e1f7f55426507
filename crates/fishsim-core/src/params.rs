//! Simulation parameters
//!
//! [`SimulationParameters`] is the author-facing form: angles in degrees,
//! periods in frames, every field optional in RON files. Before a run the
//! sequencer sanitizes it and converts it into [`ResolvedParameters`], the
//! only form the per-frame code reads.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::PresetError;

/// Scale deflection per degree of fin angle, before stiffness
const BEND_SCALE_PER_DEGREE: f32 = 0.2 / 30.0;

/// Upper bound for the fin bend band so scales stay positive
pub const MAX_BEND_BAND: f32 = 0.9;

/// Forward-force model used while swimming
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ThrustModel {
    /// Thrust from the measured tail sweep and the tail fin bend angle
    Legacy,
    /// Thrust from the stroke phase and amplitude
    #[default]
    Revised,
}

/// Author-configured gait parameters (degrees and frames)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParameters {
    // Body dynamics
    pub mass: f32,
    pub drag: f32,
    pub power: f32,
    /// Baseline frames per tail cycle at full effort
    pub stroke_period: f32,
    pub thrust_model: ThrustModel,

    // Steering
    pub effort_gain: f32,
    /// Integral gain of the diagnostic PI effort demand (telemetry only)
    pub effort_integral: f32,
    /// One-pole factor shared by the effort, steering and twitch filters
    pub effort_ramp: f32,
    pub angular_drag: f32,
    /// Yaw degrees per frame at full steering offset
    pub turn_assist: f32,
    pub max_tail_angle: f32,
    pub max_steering_angle: f32,
    pub max_vertical_angle: f32,

    // Tail fin
    pub max_tail_fin_angle: f32,
    pub tail_fin_phase: f32,
    pub tail_fin_stiffness: f32,
    pub tail_fin_stub_ratio: f32,

    // Side fins and body
    pub max_side_fin_angle: f32,
    pub side_fin_phase: f32,
    pub chest_ratio: f32,
    pub chest_raise: f32,
    pub lean_into_turn: f32,

    /// Per-run jitter fraction for tail amplitude and stroke period
    pub random: f32,

    // Pectoral fins
    /// Frames per pectoral cycle
    pub max_pec_freq: f32,
    pub max_pec_angle: f32,
    pub pec_phase: f32,
    pub pec_stub_ratio: f32,
    pub pec_stiffness: f32,
    pub pec_effort_gain: f32,
    /// Hover heading slerp rate, percent per frame
    pub pec_turn_assist: f32,
    /// Folded yaw of a resting pectoral
    pub pec_offset: f32,
    /// Active flapping frames before a rest window
    pub pec_duration: f32,
    /// Active fraction of a rest cycle
    pub pec_duty: f32,
    /// Synchronized pectorals share a phase, otherwise they are mirrored
    pub pec_synch: bool,

    // Hover
    /// Swim to hover ramp (seconds)
    pub hover_transition_time: f32,
    /// Hover to swim ramp (seconds)
    pub swim_transition_time: f32,
    /// Hover threshold measured in target sizes
    pub hover_dist: f32,
    /// Tail amplitude kept while hovering
    pub hover_tail_fraction: f32,
    pub hover_max_force: f32,
    pub hover_derate: f32,
    pub hover_tilt: f32,
    pub hover_twitch: f32,
    /// Mean frames between twitches
    pub hover_twitch_time: f32,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            mass: 30.0,
            drag: 8.0,
            power: 20.0,
            stroke_period: 15.0,
            thrust_model: ThrustModel::Revised,

            effort_gain: 0.5,
            effort_integral: 0.5,
            effort_ramp: 0.2,
            angular_drag: 1.0,
            turn_assist: 3.0,
            max_tail_angle: 15.0,
            max_steering_angle: 15.0,
            max_vertical_angle: 0.1,

            max_tail_fin_angle: 15.0,
            tail_fin_phase: 90.0,
            tail_fin_stiffness: 1.0,
            tail_fin_stub_ratio: 0.3,

            max_side_fin_angle: 5.0,
            side_fin_phase: 90.0,
            chest_ratio: 0.5,
            chest_raise: 1.0,
            lean_into_turn: 1.0,

            random: 0.25,

            max_pec_freq: 10.0,
            max_pec_angle: 20.0,
            pec_phase: 90.0,
            pec_stub_ratio: 0.7,
            pec_stiffness: 0.7,
            pec_effort_gain: 0.25,
            pec_turn_assist: 1.0,
            pec_offset: 20.0,
            pec_duration: 50.0,
            pec_duty: 0.8,
            pec_synch: false,

            hover_transition_time: 0.5,
            swim_transition_time: 0.2,
            hover_dist: 1.0,
            hover_tail_fraction: 0.2,
            hover_max_force: 0.2,
            hover_derate: 0.2,
            hover_tilt: 4.0,
            hover_twitch: 4.0,
            hover_twitch_time: 40.0,
        }
    }
}

/// Clamp one field, warning when the input was out of range (NaN maps to `min`)
fn clamp_field(name: &str, value: f32, min: f32, max: f32) -> f32 {
    let clamped = if value.is_nan() {
        min
    } else {
        value.clamp(min, max)
    };
    if clamped != value {
        log::warn!(
            "Parameter {} = {} is outside [{}, {}], using {}",
            name,
            value,
            min,
            max,
            clamped
        );
    }
    clamped
}

macro_rules! clamp_fields {
    ($params:ident { $($field:ident: $min:expr => $max:expr),* $(,)? }) => {
        $(
            $params.$field = clamp_field(stringify!($field), $params.$field, $min, $max);
        )*
    };
}

impl SimulationParameters {
    /// Parse parameters from RON text; missing fields keep their defaults
    pub fn from_ron_str(text: &str) -> Result<Self, PresetError> {
        Ok(ron::from_str(text)?)
    }

    /// Load parameters from a RON file
    pub fn from_ron_file(path: impl AsRef<Path>) -> Result<Self, PresetError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| PresetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron_str(&text)
    }

    /// Copy with every field clamped to its valid range
    pub fn sanitized(&self) -> Self {
        let mut p = self.clone();
        clamp_fields!(p {
            mass: 0.01 => 3000.0,
            drag: 0.0 => 3000.0,
            power: 0.0 => 1000.0,
            stroke_period: 1.0 => 1000.0,
            effort_gain: 0.0 => 100.0,
            effort_integral: 0.0 => 100.0,
            effort_ramp: 0.0 => 0.6,
            angular_drag: 0.01 => 1000.0,
            turn_assist: 0.0 => 10.0,
            max_tail_angle: 0.0 => 30.0,
            max_steering_angle: 0.01 => 40.0,
            max_vertical_angle: 0.0 => 40.0,
            max_tail_fin_angle: 0.0 => 30.0,
            tail_fin_phase: 45.0 => 135.0,
            tail_fin_stiffness: 0.05 => 2.0,
            tail_fin_stub_ratio: 0.0 => 3.0,
            max_side_fin_angle: 0.0 => 60.0,
            side_fin_phase: 45.0 => 135.0,
            chest_ratio: 0.0 => 2.0,
            chest_raise: 0.0 => 20.0,
            lean_into_turn: 0.0 => 20.0,
            random: 0.0 => 1.0,
            max_pec_freq: 1.0 => 1000.0,
            max_pec_angle: 0.0 => 80.0,
            pec_phase: 0.0 => 180.0,
            pec_stub_ratio: 0.0 => 2.0,
            pec_stiffness: 0.05 => 2.0,
            pec_effort_gain: 0.0 => 10.0,
            pec_turn_assist: 0.0 => 100.0,
            pec_offset: 0.0 => 90.0,
            pec_duration: 1.0 => 10000.0,
            pec_duty: 0.05 => 1.0,
            hover_transition_time: 0.01 => 60.0,
            swim_transition_time: 0.01 => 60.0,
            hover_dist: 0.0 => 100.0,
            hover_tail_fraction: 0.0 => 1.0,
            hover_max_force: 0.0 => 100.0,
            hover_derate: 0.0 => 1.0,
            hover_tilt: 0.0 => 45.0,
            hover_twitch: 0.0 => 45.0,
            hover_twitch_time: 1.0 => 10000.0,
        });
        p
    }

    /// Sanitize and convert for the per-frame code
    pub fn resolve(&self, frames_per_second: f32) -> ResolvedParameters {
        ResolvedParameters::new(&self.sanitized(), frames_per_second)
    }
}

/// Scale band of a bending fin: `maxAngle / stiffness * 0.2 / 30`, capped
pub fn bend_band(max_angle_deg: f32, stiffness: f32) -> f32 {
    (max_angle_deg / stiffness * BEND_SCALE_PER_DEGREE).min(MAX_BEND_BAND)
}

/// Sanitized parameters in radians with derived quantities
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedParameters {
    pub mass: f32,
    pub drag: f32,
    pub power: f32,
    pub stroke_period: f32,
    pub thrust_model: ThrustModel,

    pub effort_gain: f32,
    pub effort_integral: f32,
    pub effort_ramp: f32,
    pub angular_drag: f32,
    pub turn_assist: f32,
    /// Radians
    pub max_tail_angle: f32,
    /// Degrees; the steering offset is filtered in degrees
    pub max_steering_angle: f32,
    /// Degrees per frame at full vertical demand
    pub max_vertical_angle: f32,

    pub tail_fin_phase: f32,
    pub tail_fin_stub_ratio: f32,
    /// Maximum deviation of the tail fin scale from 1.0
    pub tail_fin_band: f32,

    pub max_side_fin_angle: f32,
    pub side_fin_phase: f32,
    pub chest_ratio: f32,
    pub chest_raise: f32,
    pub lean_into_turn: f32,

    pub random: f32,

    pub max_pec_freq: f32,
    pub max_pec_angle: f32,
    pub pec_phase: f32,
    pub pec_stub_ratio: f32,
    /// Maximum deviation of the pectoral tip scale from 1.0
    pub pec_band: f32,
    pub pec_effort_gain: f32,
    /// Slerp fraction per frame
    pub pec_turn_rate: f32,
    pub pec_offset: f32,
    pub pec_duration: f32,
    pub pec_duty: f32,
    pub pec_synch: bool,

    /// Per-frame hover mode increase
    pub hover_ramp_in: f32,
    /// Per-frame hover mode decrease
    pub hover_ramp_out: f32,
    pub hover_dist: f32,
    pub hover_tail_fraction: f32,
    pub hover_max_force: f32,
    pub hover_derate: f32,
    pub hover_tilt: f32,
    /// Degrees, added to the tail angle
    pub hover_twitch: f32,
    pub hover_twitch_time: f32,
}

impl ResolvedParameters {
    /// Convert already sanitized parameters
    pub fn new(p: &SimulationParameters, frames_per_second: f32) -> Self {
        let fps = if frames_per_second.is_finite() && frames_per_second > 0.0 {
            frames_per_second
        } else {
            log::warn!("Invalid frames per second {}, using 24", frames_per_second);
            24.0
        };

        Self {
            mass: p.mass,
            drag: p.drag,
            power: p.power,
            stroke_period: p.stroke_period,
            thrust_model: p.thrust_model,

            effort_gain: p.effort_gain,
            effort_integral: p.effort_integral,
            effort_ramp: p.effort_ramp,
            angular_drag: p.angular_drag,
            turn_assist: p.turn_assist,
            max_tail_angle: p.max_tail_angle.to_radians(),
            max_steering_angle: p.max_steering_angle,
            max_vertical_angle: p.max_vertical_angle,

            tail_fin_phase: p.tail_fin_phase.to_radians(),
            tail_fin_stub_ratio: p.tail_fin_stub_ratio,
            tail_fin_band: bend_band(p.max_tail_fin_angle, p.tail_fin_stiffness),

            max_side_fin_angle: p.max_side_fin_angle.to_radians(),
            side_fin_phase: p.side_fin_phase.to_radians(),
            chest_ratio: p.chest_ratio,
            chest_raise: p.chest_raise,
            lean_into_turn: p.lean_into_turn,

            random: p.random,

            max_pec_freq: p.max_pec_freq,
            max_pec_angle: p.max_pec_angle.to_radians(),
            pec_phase: p.pec_phase.to_radians(),
            pec_stub_ratio: p.pec_stub_ratio,
            pec_band: bend_band(p.max_pec_angle, p.pec_stiffness),
            pec_effort_gain: p.pec_effort_gain,
            pec_turn_rate: p.pec_turn_assist / 100.0,
            pec_offset: p.pec_offset.to_radians(),
            pec_duration: p.pec_duration,
            pec_duty: p.pec_duty,
            pec_synch: p.pec_synch,

            hover_ramp_in: 1.0 / (p.hover_transition_time * fps),
            hover_ramp_out: 1.0 / (p.swim_transition_time * fps),
            hover_dist: p.hover_dist,
            hover_tail_fraction: p.hover_tail_fraction,
            hover_max_force: p.hover_max_force,
            hover_derate: p.hover_derate,
            hover_tilt: p.hover_tilt.to_radians(),
            hover_twitch: p.hover_twitch,
            hover_twitch_time: p.hover_twitch_time,
        }
    }
}

impl Default for ResolvedParameters {
    fn default() -> Self {
        SimulationParameters::default().resolve(24.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_already_sanitized() {
        let params = SimulationParameters::default();
        assert_eq!(params.sanitized(), params);
    }

    #[test]
    fn test_sanitize_clamps_out_of_range() {
        let params = SimulationParameters {
            mass: -5.0,
            effort_ramp: 0.95,
            tail_fin_stiffness: 0.0,
            pec_duty: 0.0,
            hover_derate: f32::NAN,
            ..Default::default()
        };

        let clean = params.sanitized();
        assert_eq!(clean.mass, 0.01);
        assert_eq!(clean.effort_ramp, 0.6);
        assert_eq!(clean.tail_fin_stiffness, 0.05);
        assert_eq!(clean.pec_duty, 0.05);
        assert_eq!(clean.hover_derate, 0.0);

        // In-range values pass through untouched
        assert_eq!(clean.drag, params.drag);
        assert_eq!(clean.max_tail_angle, params.max_tail_angle);
    }

    #[test]
    fn test_bend_band_formula_and_cap() {
        let band = bend_band(15.0, 1.0);
        assert!((band - 0.1).abs() < 1e-6, "band {}", band);

        // Softest fin at the widest angle would exceed 1.0 without the cap
        assert_eq!(bend_band(30.0, 0.05), MAX_BEND_BAND);
    }

    #[test]
    fn test_tail_fin_angle_sets_band() {
        let narrow = SimulationParameters {
            max_tail_fin_angle: 10.0,
            ..Default::default()
        };
        let wide = SimulationParameters {
            max_tail_fin_angle: 20.0,
            ..Default::default()
        };
        let narrow = narrow.resolve(24.0).tail_fin_band;
        let wide = wide.resolve(24.0).tail_fin_band;
        assert!((wide - 2.0 * narrow).abs() < 1e-6, "{} vs {}", wide, narrow);
        assert!((narrow - bend_band(10.0, 1.0)).abs() < 1e-6);
    }

    #[test]
    fn test_resolve_converts_degrees() {
        let resolved = SimulationParameters::default().resolve(24.0);
        assert!((resolved.max_tail_angle - 15f32.to_radians()).abs() < 1e-6);
        assert!((resolved.pec_offset - 20f32.to_radians()).abs() < 1e-6);
        // Steering offset stays in degrees
        assert_eq!(resolved.max_steering_angle, 15.0);
    }

    #[test]
    fn test_hover_ramps_from_seconds() {
        let resolved = SimulationParameters::default().resolve(24.0);
        assert!((resolved.hover_ramp_in - 1.0 / 12.0).abs() < 1e-6);
        assert!((resolved.hover_ramp_out - 1.0 / 4.8).abs() < 1e-6);
    }

    #[test]
    fn test_partial_ron_keeps_defaults() {
        let params = SimulationParameters::from_ron_str("(mass: 12.0, pec_synch: true)")
            .expect("valid RON");
        assert_eq!(params.mass, 12.0);
        assert!(params.pec_synch);
        assert_eq!(params.drag, 8.0);
        assert_eq!(params.thrust_model, ThrustModel::Revised);
    }

    #[test]
    fn test_invalid_ron_is_an_error() {
        assert!(SimulationParameters::from_ron_str("(mass: \"heavy\")").is_err());
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = SimulationParameters::from_ron_file("/definitely/not/here.ron")
            .expect_err("file does not exist");
        assert!(err.to_string().contains("/definitely/not/here.ron"));
    }
}
