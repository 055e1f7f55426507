//! Small vector helpers shared by the sensor and the dynamics
//!
//! Rig convention: forward is local -Y, up is +Z.

use glam::{Quat, Vec2, Vec3};
use std::f32::consts::{PI, TAU};

/// Rig-local forward axis
pub const FORWARD: Vec3 = Vec3::NEG_Y;

const DEGENERATE_LENGTH_SQ: f32 = 1e-12;

/// World-space forward direction of an orientation
pub fn forward(orientation: Quat) -> Vec3 {
    orientation * FORWARD
}

/// Signed angle in radians needed to rotate `from` onto `to`, clockwise positive.
///
/// Returns 0.0 when either vector is zero-length or not finite.
pub fn signed_angle_cw(from: Vec2, to: Vec2) -> f32 {
    // Written as a negated comparison so NaN lengths fall into the degenerate branch
    if !(from.length_squared() > DEGENERATE_LENGTH_SQ) || !(to.length_squared() > DEGENERATE_LENGTH_SQ)
    {
        return 0.0;
    }

    let angle = (from.y * to.x - from.x * to.y).atan2(from.dot(to));
    finite_or_zero(angle)
}

/// Projection onto the horizontal (XY) plane
pub fn horizontal(v: Vec3) -> Vec2 {
    v.truncate()
}

/// Side-view projection: (horizontal length, height)
pub fn vertical(v: Vec3) -> Vec2 {
    Vec2::new(v.truncate().length(), v.z)
}

/// Yaw of the forward direction about +Z, counter-clockwise positive, 0 for identity
pub fn heading_yaw(orientation: Quat) -> f32 {
    let f = forward(orientation);
    if f.truncate().length_squared() <= DEGENERATE_LENGTH_SQ {
        return 0.0;
    }
    f.x.atan2(-f.y)
}

/// Wrap an angle into [-PI, PI]
pub fn wrap_angle(angle: f32) -> f32 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    finite_or_zero(wrapped)
}

/// Move `current` toward `target` by at most `max_step`
pub fn approach(current: f32, target: f32, max_step: f32) -> f32 {
    let delta = target - current;
    if delta.abs() <= max_step {
        target
    } else {
        current + max_step.copysign(delta)
    }
}

/// First-order filter: `previous * (1 - ramp) + target * ramp`
pub fn blend(previous: f32, target: f32, ramp: f32) -> f32 {
    previous * (1.0 - ramp) + target * ramp
}

pub fn finite_or_zero(value: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_signed_angle_clockwise_positive() {
        let ahead = Vec2::new(0.0, -1.0);
        // Looking down -Y, +X is on the left side, so reaching it is counter-clockwise
        let left = Vec2::new(1.0, 0.0);
        let right = Vec2::new(-1.0, 0.0);

        assert!((signed_angle_cw(ahead, left) + FRAC_PI_2).abs() < 1e-6);
        assert!((signed_angle_cw(ahead, right) - FRAC_PI_2).abs() < 1e-6);
        assert_eq!(signed_angle_cw(ahead, ahead), 0.0);
    }

    #[test]
    fn test_signed_angle_degenerate_inputs() {
        assert_eq!(signed_angle_cw(Vec2::ZERO, Vec2::X), 0.0);
        assert_eq!(signed_angle_cw(Vec2::X, Vec2::ZERO), 0.0);
        assert_eq!(signed_angle_cw(Vec2::new(f32::NAN, 0.0), Vec2::X), 0.0);
    }

    #[test]
    fn test_heading_yaw_matches_z_rotation() {
        for angle in [-2.5f32, -0.3, 0.0, 0.7, 3.0] {
            let yaw = heading_yaw(Quat::from_rotation_z(angle));
            assert!(
                (wrap_angle(yaw - angle)).abs() < 1e-5,
                "yaw {} for rotation {}",
                yaw,
                angle
            );
        }
    }

    #[test]
    fn test_wrap_angle() {
        assert!((wrap_angle(3.0 * PI) - PI).abs() < 1e-5 || (wrap_angle(3.0 * PI) + PI).abs() < 1e-5);
        assert!((wrap_angle(0.5) - 0.5).abs() < 1e-6);
        assert!((wrap_angle(-TAU + 0.25) - 0.25).abs() < 1e-5);
    }

    #[test]
    fn test_approach_never_overshoots() {
        assert_eq!(approach(0.0, 1.0, 0.3), 0.3);
        assert_eq!(approach(0.9, 1.0, 0.3), 1.0);
        assert_eq!(approach(0.5, 0.0, 0.2), 0.3);
    }
}
