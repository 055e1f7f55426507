//! Swim propulsion and body dynamics
//!
//! Kinematic integration of the rig root: thrust and quadratic drag update a
//! rig-local velocity, yaw and pitch are applied as small Euler increments.

use glam::{Quat, Vec3};

use crate::math::{finite_or_zero, FORWARD};
use crate::params::{ResolvedParameters, ThrustModel};
use crate::rig::Transform;

/// Degrees of fin bend per unit of scale deviation in the legacy thrust model
const LEGACY_BEND_DEGREES_PER_SCALE: f32 = 30.0 / 0.4;

/// Forces driving the root for one swim frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SwimForces {
    /// Along the rig's forward axis
    pub forward: f32,
    /// Yaw, degrees per frame
    pub angular: f32,
    /// Pitch, degrees per frame
    pub vertical: f32,
}

/// Inputs to the thrust models
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThrustInput {
    /// Rig-local sideways travel of the tail tip since the previous frame
    pub fin_delta: f32,
    pub tail_fin_scale: f32,
    pub tail_phase: f32,
    /// Radians
    pub stroke_amplitude: f32,
    /// Frames per tail cycle at full effort
    pub base_period: f32,
}

/// Forward thrust for the configured model
pub fn forward_force(input: &ThrustInput, params: &ResolvedParameters) -> f32 {
    let force = match params.thrust_model {
        ThrustModel::Legacy => {
            let bend = (input.tail_fin_scale - 1.0) * LEGACY_BEND_DEGREES_PER_SCALE;
            -input.fin_delta * bend.to_radians().sin() * params.power
        }
        ThrustModel::Revised => {
            input.tail_phase.cos().abs() * input.stroke_amplitude * params.power / input.base_period
        }
    };
    finite_or_zero(force)
}

/// Yaw rate: swish reaction, rudder drag and turn assist
///
/// # Arguments
/// * `fin_delta` - Rig-local sideways travel of the tail tip
/// * `tail_angle` - Current tail angle (radians)
/// * `forward_speed` - Speed along the forward axis
/// * `steering_offset` - Steering bias (degrees)
pub fn angular_force(
    fin_delta: f32,
    tail_angle: f32,
    forward_speed: f32,
    steering_offset: f32,
    params: &ResolvedParameters,
) -> f32 {
    let swish = fin_delta / params.angular_drag;
    let rudder = tail_angle * forward_speed / params.angular_drag;
    let assist = steering_offset / params.max_steering_angle * params.turn_assist;
    finite_or_zero(swish - rudder - assist)
}

/// One frame of per-axis velocity integration with quadratic drag
///
/// Drag may stop an axis but never reverse it, which keeps light or
/// high-drag bodies stable.
pub fn integrate_velocity(velocity: Vec3, force: Vec3, drag: f32, mass: f32) -> Vec3 {
    let axis = |v: f32, f: f32| {
        let drag_step = drag * v * v.abs() / mass;
        let drag_step = if drag_step.abs() > v.abs() { v } else { drag_step };
        finite_or_zero(v - drag_step + f / mass)
    };
    Vec3::new(
        axis(velocity.x, force.x),
        axis(velocity.y, force.y),
        axis(velocity.z, force.z),
    )
}

/// Speed along the rig's forward axis for a rig-local velocity
pub fn forward_speed(velocity: Vec3) -> f32 {
    velocity.dot(FORWARD)
}

/// Advance the root by one swim frame; `velocity` is rig-local
pub fn advance_swim(
    root: &Transform,
    velocity: &mut Vec3,
    forces: &SwimForces,
    params: &ResolvedParameters,
) -> Transform {
    *velocity = integrate_velocity(*velocity, FORWARD * forces.forward, params.drag, params.mass);

    let position = root.position + root.orientation * *velocity;

    // Yaw about world up, pitch about the rig's own lateral axis
    let yaw = Quat::from_rotation_z(finite_or_zero(forces.angular).to_radians());
    let pitch = Quat::from_rotation_x(finite_or_zero(forces.vertical).to_radians());
    let orientation = (yaw * root.orientation * pitch).normalize();

    Transform::new(position, orientation)
}
