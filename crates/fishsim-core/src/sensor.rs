//! Target sensing
//!
//! Turns the rig root and its target into a closing rate and normalized
//! steering demands. Pure: no state, no side effects.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::math::{forward, horizontal, signed_angle_cw, vertical};
use crate::rig::Transform;

/// Distance of the substitute target placed ahead of a rig without one
pub const FALLBACK_TARGET_DISTANCE: f32 = 10.0;

/// Horizontal angle giving full steering demand
const HORIZONTAL_FULL_DEMAND: f32 = std::f32::consts::FRAC_PI_2;

/// Vertical angle giving full steering demand (20 degrees)
const VERTICAL_FULL_DEMAND: f32 = 20.0 * std::f32::consts::PI / 180.0;

/// Sensor output for one frame
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TargetReading {
    /// Target vector projected on the forward axis, positive when ahead
    pub closing_rate: f32,
    /// -1..1, positive when the target is clockwise (to the right, seen from above)
    pub horizontal_demand: f32,
    /// -1..1, positive when the target is below the forward axis
    pub vertical_demand: f32,
    /// Length of the target vector
    pub distance: f32,
}

/// Measure `target` from `root`; `None` substitutes a point ahead of the rig
pub fn sense_target(root: &Transform, target: Option<Vec3>) -> TargetReading {
    let fwd = forward(root.orientation);
    let target_vector = match target {
        Some(position) => position - root.position,
        None => fwd * FALLBACK_TARGET_DISTANCE,
    };

    let horizontal_angle = signed_angle_cw(horizontal(fwd), horizontal(target_vector));
    let vertical_angle = signed_angle_cw(vertical(fwd), vertical(target_vector));

    TargetReading {
        closing_rate: target_vector.dot(fwd),
        horizontal_demand: (horizontal_angle / HORIZONTAL_FULL_DEMAND).clamp(-1.0, 1.0),
        vertical_demand: (vertical_angle / VERTICAL_FULL_DEMAND).clamp(-1.0, 1.0),
        distance: target_vector.length(),
    }
}
