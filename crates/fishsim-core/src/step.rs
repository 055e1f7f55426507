//! One simulated frame of one rig
//!
//! Sense, control, hover update, pose the joints, measure the tail sweep,
//! move the root, record.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::hover::{advance_hover, servo_force, HoverInputs};
use crate::math::{forward, heading_yaw, wrap_angle};
use crate::oscillator::{PectoralDrive, PectoralPose, TailDrive, TailPose};
use crate::params::ResolvedParameters;
use crate::propulsion::{
    advance_swim, angular_force, forward_force, forward_speed, SwimForces, ThrustInput,
};
use crate::rig::{PectoralJoints, RigHandle, RigMutAccess};
use crate::rng::SimRng;
use crate::sensor::{sense_target, FALLBACK_TARGET_DISTANCE};
use crate::state::SimulationState;

/// Force path used for a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropulsionMode {
    Swim,
    Hover,
}

/// Telemetry for one simulated frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameSample {
    pub frame: i32,
    pub mode: PropulsionMode,
    /// Root position after the frame
    pub position: Vec3,
    /// Root heading after the frame (radians)
    pub heading: f32,
    pub speed: f32,
    pub effort: f32,
    /// Diagnostic PI demand
    pub effort_demand: f32,
    /// Degrees
    pub steering_offset: f32,
    pub stroke_period: f32,
    /// Radians
    pub tail_angle: f32,
    pub fin_delta: f32,
    pub forward_force: f32,
    pub closing_rate: f32,
    pub target_distance: f32,
    pub hover_mode: f32,
    pub rest_amount: f32,
    /// Degrees
    pub twitch: f32,
}

/// Simulate `state.frame` for one rig and record its pose
///
/// Does not move the timeline; the caller advances it.
pub fn step_frame<H, R>(
    host: &mut H,
    rig: H::RigId,
    handle: &RigHandle<H::JointId>,
    target: Option<H::TargetId>,
    state: &mut SimulationState,
    params: &ResolvedParameters,
    rng: &mut R,
) -> FrameSample
where
    H: RigMutAccess,
    R: SimRng,
{
    let frame = state.frame;
    let root = host.world_transform(rig);

    // 1. Sense the target, or a point straight ahead
    let target_position = target.map(|t| host.target_position(t));
    let reading = sense_target(&root, target_position);
    let (target_size, target_orientation) = match target {
        Some(t) => (host.target_size(t), host.target_orientation(t)),
        None => (1.0, root.orientation),
    };

    // 2. Effort and steering; while hovering the tail steers toward the target heading
    let steering_demand = if state.hover.is_hovering() {
        state.hover.steering_demand()
    } else {
        reading.horizontal_demand
    };
    let control = state
        .controller
        .update(&reading, steering_demand, params, &state.gait);

    // 3. Hover blend, only for rigs with pectorals
    if handle.has_pectorals() {
        let inputs = HoverInputs {
            frame,
            distance: reading.distance,
            target_size,
            yaw_error: wrap_angle(heading_yaw(target_orientation) - heading_yaw(root.orientation)),
        };
        state.hover.update(&inputs, params, rng);
    }

    // 4. Oscillators and joint writes
    state
        .oscillators
        .advance(control.stroke_period, params.max_pec_freq);
    let amplitude = control.stroke_amplitude * state.hover.tail_amplitude_scale(params);
    let tail = state.oscillators.tail_pose(
        &TailDrive {
            amplitude,
            steering_offset: control.steering_offset.to_radians(),
            twitch: state.hover.twitch.to_radians(),
            body_tilt: state.hover.body_tilt,
        },
        params,
    );
    write_tail_pose(host, handle, &tail);

    if let Some(pectorals) = &handle.pectorals {
        let pose = state.oscillators.pectoral_pose(
            &PectoralDrive {
                rest_amount: state.hover.rest_amount,
                hover_turn: state.hover.hover_turn,
            },
            params,
        );
        write_pectoral_pose(host, pectorals, &pose);
    }

    // 5. Sideways tail sweep since the previous frame, in rig space
    let sweep = root.to_local(host.world_reference_point(handle.tail_reference)).x;
    let fin_delta = state.previous_sweep.map_or(0.0, |previous| sweep - previous);
    state.previous_sweep = Some(sweep);

    // 6. Move the root
    let (next_root, mode, thrust) = if state.hover.is_hovering() {
        let goal = target_position
            .unwrap_or(root.position + forward(root.orientation) * FALLBACK_TARGET_DISTANCE);
        let force = servo_force(&root, goal, state.hover.hover_mode, params);
        let next = advance_hover(&root, &mut state.velocity, force, target_orientation, params);
        // Forward is local -Y
        let axial = -force.y;
        state.hover.update_tilt(axial, params);
        (next, PropulsionMode::Hover, axial)
    } else {
        let thrust = forward_force(
            &ThrustInput {
                fin_delta,
                tail_fin_scale: tail.tail_fin_scale,
                tail_phase: state.oscillators.tail_phase,
                stroke_amplitude: control.stroke_amplitude,
                base_period: state.gait.stroke_period,
            },
            params,
        );
        let forces = SwimForces {
            forward: thrust,
            angular: angular_force(
                fin_delta,
                tail.tail_angle,
                forward_speed(state.velocity),
                control.steering_offset,
                params,
            ),
            vertical: control.vertical_angular_force,
        };
        let next = advance_swim(&root, &mut state.velocity, &forces, params);
        if handle.has_pectorals() {
            state.hover.update_tilt(0.0, params);
        }
        (next, PropulsionMode::Swim, thrust)
    };

    // 7. Write and record
    host.set_world_transform(rig, next_root);
    host.record_pose(rig, frame);

    FrameSample {
        frame,
        mode,
        position: next_root.position,
        heading: heading_yaw(next_root.orientation),
        speed: state.velocity.length(),
        effort: control.effort,
        effort_demand: control.effort_demand,
        steering_offset: control.steering_offset,
        stroke_period: control.stroke_period,
        tail_angle: tail.tail_angle,
        fin_delta,
        forward_force: thrust,
        closing_rate: reading.closing_rate,
        target_distance: reading.distance,
        hover_mode: state.hover.hover_mode,
        rest_amount: state.hover.rest_amount,
        twitch: state.hover.twitch,
    }
}

/// Write a fin bend, keeping the joint's X and Z scale
fn set_bend<H: RigMutAccess>(host: &mut H, joint: H::JointId, bend: f32) {
    let mut scale = host.local_scale(joint);
    scale.y = bend;
    host.set_local_scale(joint, scale);
}

fn write_tail_pose<H: RigMutAccess>(host: &mut H, handle: &RigHandle<H::JointId>, pose: &TailPose) {
    let rotations: [(H::JointId, Quat); 5] = [
        (handle.spine, pose.spine),
        (handle.chest, pose.chest),
        (handle.torso, pose.torso),
        (handle.side_fin_left, pose.side_fin_left),
        (handle.side_fin_right, pose.side_fin_right),
    ];
    for (joint, rotation) in rotations {
        host.set_local_rotation(joint, rotation);
    }
    set_bend(host, handle.tail_fin, pose.tail_fin_scale);
    set_bend(host, handle.tail_fin_stub, pose.tail_fin_stub_scale);
}

fn write_pectoral_pose<H: RigMutAccess>(
    host: &mut H,
    joints: &PectoralJoints<H::JointId>,
    pose: &PectoralPose,
) {
    host.set_local_rotation(joints.palm_left, pose.palm_left);
    host.set_local_rotation(joints.palm_right, pose.palm_right);
    set_bend(host, joints.top_left, pose.top_left);
    set_bend(host, joints.top_right, pose.top_right);
    set_bend(host, joints.bottom_left, pose.bottom_left);
    set_bend(host, joints.bottom_right, pose.bottom_right);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{MemoryRig, MemoryScene, MemoryTarget};
    use crate::rig::{RigAccess, Transform};
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256StarStar;

    #[test]
    fn test_first_frame_has_no_sweep() {
        let params = ResolvedParameters::default();
        let mut rng = Xoshiro256StarStar::seed_from_u64(1);
        let mut scene = MemoryScene::new();
        let rig = scene.add_rig(MemoryRig::fish("Goldie", Transform::IDENTITY));
        let handle = RigHandle::resolve(&scene, rig).unwrap();
        let mut state = SimulationState::new(1, 0.0, &params, &mut rng);

        let sample = step_frame(&mut scene, rig, &handle, None, &mut state, &params, &mut rng);
        assert_eq!(sample.fin_delta, 0.0);
        assert_eq!(sample.frame, 1);
        assert_eq!(sample.mode, PropulsionMode::Swim);
        assert!(state.previous_sweep.is_some());
        assert_eq!(scene.rig(rig).track().len(), 1);
    }

    #[test]
    fn test_steers_toward_target_on_the_right() {
        let params = ResolvedParameters::default();
        let mut rng = Xoshiro256StarStar::seed_from_u64(2);
        let mut scene = MemoryScene::new();
        let rig = scene.add_rig(MemoryRig::shark("Bruce", Transform::IDENTITY));
        // Ahead and to the right (-X)
        let target = scene.add_target(MemoryTarget::at(Vec3::new(-20.0, -20.0, 0.0)));
        scene.attach_target(rig, Some(target));
        let handle = RigHandle::resolve(&scene, rig).unwrap();
        let mut state = SimulationState::new(1, 0.0, &params, &mut rng);

        for _ in 0..60 {
            step_frame(&mut scene, rig, &handle, Some(target), &mut state, &params, &mut rng);
            state.frame += 1;
        }
        // Turning right is clockwise, so the heading goes negative
        let heading = heading_yaw(scene.world_transform(rig).orientation);
        assert!(heading < -0.2, "heading {}", heading);
    }

    #[test]
    fn test_swim_only_rig_never_hovers() {
        let params = ResolvedParameters::default();
        let mut rng = Xoshiro256StarStar::seed_from_u64(3);
        let mut scene = MemoryScene::new();
        let rig = scene.add_rig(MemoryRig::shark("Bruce", Transform::IDENTITY));
        let target = scene.add_target(MemoryTarget::at(Vec3::new(0.0, -0.2, 0.0)).with_size(5.0));
        scene.attach_target(rig, Some(target));
        let handle = RigHandle::resolve(&scene, rig).unwrap();
        let mut state = SimulationState::new(1, 0.0, &params, &mut rng);

        for _ in 0..30 {
            let sample =
                step_frame(&mut scene, rig, &handle, Some(target), &mut state, &params, &mut rng);
            assert_eq!(sample.hover_mode, 0.0);
            assert_eq!(sample.mode, PropulsionMode::Swim);
            state.frame += 1;
        }
    }

    #[test]
    fn test_bend_keeps_other_scale_axes() {
        let params = ResolvedParameters::default();
        let mut rng = Xoshiro256StarStar::seed_from_u64(4);
        let mut scene = MemoryScene::new();
        let rig = scene.add_rig(MemoryRig::fish("Goldie", Transform::IDENTITY));
        let handle = RigHandle::resolve(&scene, rig).unwrap();
        scene.set_local_scale(handle.tail_fin, Vec3::new(2.0, 1.0, 3.0));
        let mut state = SimulationState::new(1, 0.0, &params, &mut rng);

        step_frame(&mut scene, rig, &handle, None, &mut state, &params, &mut rng);
        let scale = scene.local_scale(handle.tail_fin);
        assert_eq!(scale.x, 2.0);
        assert_eq!(scale.z, 3.0);
    }
}
