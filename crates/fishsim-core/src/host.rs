//! In-memory rig host
//!
//! A small scene with forward-kinematics joint trees, recorded pose tracks
//! and proxy targets. Used by the headless runner and the tests; any other
//! host only needs to implement the traits in [`crate::rig`].

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::rig::{RigAccess, RigMutAccess, Transform};

/// Index of a rig in a [`MemoryScene`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RigKey(pub usize);

/// Index of a joint within a rig of a [`MemoryScene`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JointKey {
    rig: usize,
    joint: usize,
}

/// Index of a target in a [`MemoryScene`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetKey(pub usize);

/// One bone of a rig's joint tree
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryJoint {
    pub name: String,
    /// Parents always precede their children
    pub parent: Option<usize>,
    /// Head position in the parent's frame (the rig frame for roots)
    pub head: Vec3,
    /// Bone length along local +Y
    pub length: f32,
    pub rotation: Quat,
    pub scale: Vec3,
}

/// Recorded local pose of one joint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointSample {
    pub rotation: Quat,
    pub scale: Vec3,
}

/// Recorded samples of one rig, keyed by frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoseTrack {
    root: BTreeMap<i32, Transform>,
    joints: Vec<BTreeMap<i32, JointSample>>,
}

impl PoseTrack {
    fn with_joints(count: usize) -> Self {
        Self {
            root: BTreeMap::new(),
            joints: vec![BTreeMap::new(); count],
        }
    }

    pub fn root(&self) -> &BTreeMap<i32, Transform> {
        &self.root
    }

    pub fn root_sample(&self, frame: i32) -> Option<&Transform> {
        self.root.get(&frame)
    }

    /// Frames with a recorded root sample
    pub fn frames(&self) -> impl Iterator<Item = i32> + '_ {
        self.root.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.root.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }
}

/// A rig instance: root transform, joint tree and its recordings
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryRig {
    name: String,
    transform: Transform,
    joints: Vec<MemoryJoint>,
    target: Option<TargetKey>,
    track: PoseTrack,
}

impl MemoryRig {
    /// Empty rig with no joints
    pub fn new(name: impl Into<String>, transform: Transform) -> Self {
        Self {
            name: name.into(),
            transform,
            joints: Vec::new(),
            target: None,
            track: PoseTrack::default(),
        }
    }

    /// Append a joint; `parent` must already exist
    pub fn with_joint(mut self, name: &str, parent: Option<&str>, head: Vec3, length: f32) -> Self {
        let parent = parent.and_then(|p| self.joint_index(p));
        self.joints.push(MemoryJoint {
            name: name.to_string(),
            parent,
            head,
            length,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        });
        self
    }

    /// Swim-only fish body: spine, tail fin pair, tail tip, side fins, chest, torso
    ///
    /// Bones point toward the tail (+Y); the rig swims along -Y.
    pub fn shark(name: impl Into<String>, transform: Transform) -> Self {
        Self::new(name, transform)
            .with_joint("torso", None, Vec3::ZERO, 0.3)
            .with_joint("head", Some("torso"), Vec3::new(0.0, -0.6, 0.0), 0.3)
            .with_joint("chest", Some("torso"), Vec3::new(0.0, -0.1, 0.0), 0.5)
            .with_joint("spine_master", Some("torso"), Vec3::new(0.0, 0.3, 0.0), 1.0)
            .with_joint("back_fin_masterBk.001", Some("spine_master"), Vec3::new(0.0, 1.0, 0.0), 0.4)
            .with_joint("back_fin_masterBk", Some("spine_master"), Vec3::new(0.0, 1.0, 0.0), 0.2)
            .with_joint(
                "DEF-back_fin.T.001.Bk",
                Some("back_fin_masterBk.001"),
                Vec3::new(0.0, 0.2, 0.0),
                0.2,
            )
            .with_joint("side_fin.L", Some("torso"), Vec3::new(0.15, 0.0, -0.1), 0.2)
            .with_joint("side_fin.R", Some("torso"), Vec3::new(-0.15, 0.0, -0.1), 0.2)
    }

    /// Hover-capable fish: the swim-only body plus both pectoral fins
    pub fn fish(name: impl Into<String>, transform: Transform) -> Self {
        Self::shark(name, transform)
            .with_joint("pec_palm.L", Some("chest"), Vec3::new(0.15, -0.2, -0.05), 0.1)
            .with_joint("pec_palm.R", Some("chest"), Vec3::new(-0.15, -0.2, -0.05), 0.1)
            .with_joint("t_master.L", Some("pec_palm.L"), Vec3::new(0.0, 0.1, 0.02), 0.15)
            .with_joint("t_master.R", Some("pec_palm.R"), Vec3::new(0.0, 0.1, 0.02), 0.15)
            .with_joint("b_master.L", Some("pec_palm.L"), Vec3::new(0.0, 0.1, -0.02), 0.15)
            .with_joint("b_master.R", Some("pec_palm.R"), Vec3::new(0.0, 0.1, -0.02), 0.15)
    }

    /// Remove a joint, re-parenting its children onto its parent
    pub fn without_joint(mut self, name: &str) -> Self {
        if let Some(index) = self.joint_index(name) {
            let removed = self.joints.remove(index);
            for joint in &mut self.joints {
                match joint.parent {
                    Some(p) if p == index => {
                        joint.parent = removed.parent;
                        joint.head += removed.head;
                    }
                    Some(p) if p > index => joint.parent = Some(p - 1),
                    _ => {}
                }
            }
        }
        self
    }

    pub fn with_renamed_joint(mut self, from: &str, to: &str) -> Self {
        if let Some(index) = self.joint_index(from) {
            self.joints[index].name = to.to_string();
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    pub fn target(&self) -> Option<TargetKey> {
        self.target
    }

    pub fn joints(&self) -> &[MemoryJoint] {
        &self.joints
    }

    pub fn joint(&self, name: &str) -> Option<&MemoryJoint> {
        self.joint_index(name).map(|i| &self.joints[i])
    }

    pub fn track(&self) -> &PoseTrack {
        &self.track
    }

    /// Recorded samples of one joint
    pub fn joint_samples(&self, name: &str) -> Option<&BTreeMap<i32, JointSample>> {
        self.joint_index(name)
            .and_then(|index| self.track.joints.get(index))
    }

    fn joint_index(&self, name: &str) -> Option<usize> {
        self.joints.iter().position(|j| j.name == name)
    }

    /// World matrix of a joint's head frame
    fn joint_matrix(&self, index: usize) -> Mat4 {
        // Walk up to the root, then compose downwards
        let mut chain = vec![index];
        let mut current = index;
        while let Some(parent) = self.joints[current].parent {
            chain.push(parent);
            current = parent;
        }

        let mut matrix = Mat4::from_rotation_translation(
            self.transform.orientation,
            self.transform.position,
        );
        for &i in chain.iter().rev() {
            let joint = &self.joints[i];
            matrix *= Mat4::from_scale_rotation_translation(joint.scale, joint.rotation, joint.head);
        }
        matrix
    }

    /// World position of a joint's tail
    pub fn joint_tail(&self, index: usize) -> Vec3 {
        let length = self.joints[index].length;
        self.joint_matrix(index).transform_point3(Vec3::Y * length)
    }
}

/// Proxy target a rig swims toward
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemoryTarget {
    pub position: Vec3,
    pub size: f32,
    pub orientation: Quat,
}

impl MemoryTarget {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            size: 1.0,
            orientation: Quat::IDENTITY,
        }
    }

    pub fn with_size(mut self, size: f32) -> Self {
        self.size = size;
        self
    }

    pub fn with_orientation(mut self, orientation: Quat) -> Self {
        self.orientation = orientation;
        self
    }
}

/// Scene holding rigs, targets and a timeline cursor
#[derive(Debug, Clone, Default)]
pub struct MemoryScene {
    rigs: Vec<MemoryRig>,
    targets: Vec<MemoryTarget>,
    current_frame: i32,
}

impl MemoryScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rig(&mut self, mut rig: MemoryRig) -> RigKey {
        rig.track = PoseTrack::with_joints(rig.joints.len());
        self.rigs.push(rig);
        RigKey(self.rigs.len() - 1)
    }

    pub fn add_target(&mut self, target: MemoryTarget) -> TargetKey {
        self.targets.push(target);
        TargetKey(self.targets.len() - 1)
    }

    pub fn attach_target(&mut self, rig: RigKey, target: Option<TargetKey>) {
        self.rigs[rig.0].target = target;
    }

    pub fn rig(&self, key: RigKey) -> &MemoryRig {
        &self.rigs[key.0]
    }

    pub fn target(&self, key: TargetKey) -> &MemoryTarget {
        &self.targets[key.0]
    }

    pub fn target_mut(&mut self, key: TargetKey) -> &mut MemoryTarget {
        &mut self.targets[key.0]
    }

    fn joint(&self, key: JointKey) -> &MemoryJoint {
        &self.rigs[key.rig].joints[key.joint]
    }

    fn joint_mut(&mut self, key: JointKey) -> &mut MemoryJoint {
        &mut self.rigs[key.rig].joints[key.joint]
    }

    /// Apply recorded samples at `frame`, like scrubbing an animated timeline
    fn play_back(&mut self, frame: i32) {
        for rig in &mut self.rigs {
            if let Some(root) = rig.track.root.get(&frame) {
                rig.transform = *root;
            }
            for (joint, samples) in rig.joints.iter_mut().zip(&rig.track.joints) {
                if let Some(sample) = samples.get(&frame) {
                    joint.rotation = sample.rotation;
                    joint.scale = sample.scale;
                }
            }
        }
    }
}

impl RigAccess for MemoryScene {
    type RigId = RigKey;
    type JointId = JointKey;
    type TargetId = TargetKey;

    fn rig_name(&self, rig: RigKey) -> String {
        self.rigs[rig.0].name.clone()
    }

    fn resolve_joint(&self, rig: RigKey, name: &str) -> Option<JointKey> {
        self.rigs[rig.0]
            .joint_index(name)
            .map(|joint| JointKey { rig: rig.0, joint })
    }

    fn world_transform(&self, rig: RigKey) -> Transform {
        self.rigs[rig.0].transform
    }

    fn local_scale(&self, joint: JointKey) -> Vec3 {
        self.joint(joint).scale
    }

    fn world_reference_point(&self, joint: JointKey) -> Vec3 {
        self.rigs[joint.rig].joint_tail(joint.joint)
    }

    fn current_frame(&self) -> i32 {
        self.current_frame
    }

    fn resolve_target(&self, rig: RigKey) -> Option<TargetKey> {
        self.rigs[rig.0].target
    }

    fn target_position(&self, target: TargetKey) -> Vec3 {
        self.targets[target.0].position
    }

    fn target_size(&self, target: TargetKey) -> f32 {
        self.targets[target.0].size
    }

    fn target_orientation(&self, target: TargetKey) -> Quat {
        self.targets[target.0].orientation
    }
}

impl RigMutAccess for MemoryScene {
    fn set_world_transform(&mut self, rig: RigKey, transform: Transform) {
        self.rigs[rig.0].transform = transform;
    }

    fn set_local_rotation(&mut self, joint: JointKey, rotation: Quat) {
        self.joint_mut(joint).rotation = rotation;
    }

    fn set_local_scale(&mut self, joint: JointKey, scale: Vec3) {
        self.joint_mut(joint).scale = scale;
    }

    fn record_pose(&mut self, rig: RigKey, frame: i32) {
        let rig = &mut self.rigs[rig.0];
        rig.track.root.insert(frame, rig.transform);
        for (joint, samples) in rig.joints.iter().zip(rig.track.joints.iter_mut()) {
            samples.insert(
                frame,
                JointSample {
                    rotation: joint.rotation,
                    scale: joint.scale,
                },
            );
        }
    }

    fn clear_recorded_poses(&mut self, rig: RigKey, joints: &[JointKey]) {
        let rig_index = rig.0;
        let rig = &mut self.rigs[rig_index];
        rig.track.root.clear();
        for key in joints.iter().filter(|key| key.rig == rig_index) {
            if let Some(samples) = rig.track.joints.get_mut(key.joint) {
                samples.clear();
            }
        }
    }

    fn advance_frame(&mut self, frame: i32) {
        self.current_frame = frame;
        self.play_back(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene_with_fish() -> (MemoryScene, RigKey) {
        let mut scene = MemoryScene::new();
        let rig = scene.add_rig(MemoryRig::fish("Goldie", Transform::IDENTITY));
        (scene, rig)
    }

    #[test]
    fn test_fixture_joint_counts() {
        assert_eq!(MemoryRig::fish("a", Transform::IDENTITY).joints().len(), 15);
        assert_eq!(MemoryRig::shark("b", Transform::IDENTITY).joints().len(), 9);
    }

    #[test]
    fn test_record_pose_is_idempotent() {
        let (mut scene, rig) = scene_with_fish();
        let spine = scene.resolve_joint(rig, "spine_master").unwrap();
        scene.set_local_rotation(spine, Quat::from_rotation_z(0.2));

        scene.record_pose(rig, 5);
        let first = scene.rig(rig).clone();
        scene.record_pose(rig, 5);

        assert_eq!(scene.rig(rig).track().len(), 1);
        assert_eq!(scene.rig(rig), &first);
    }

    #[test]
    fn test_tail_reference_swings_with_spine() {
        let (mut scene, rig) = scene_with_fish();
        let spine = scene.resolve_joint(rig, "spine_master").unwrap();
        let tip = scene.resolve_joint(rig, "DEF-back_fin.T.001.Bk").unwrap();

        let rest = scene.world_reference_point(tip);
        assert!(rest.x.abs() < 1e-6, "rest tip should be on the axis: {:?}", rest);
        assert!((rest.y - 1.7).abs() < 1e-5, "rest tip {:?}", rest);

        // Yawing the spine counter-clockwise swings a +Y tail toward -X
        scene.set_local_rotation(spine, Quat::from_rotation_z(0.3));
        let swung = scene.world_reference_point(tip);
        assert!(swung.x < -0.3, "swung tip {:?}", swung);
    }

    #[test]
    fn test_reference_point_follows_root() {
        let (mut scene, rig) = scene_with_fish();
        let tip = scene.resolve_joint(rig, "DEF-back_fin.T.001.Bk").unwrap();
        let before = scene.world_reference_point(tip);

        scene.set_world_transform(rig, Transform::from_position(Vec3::new(5.0, 0.0, 2.0)));
        let after = scene.world_reference_point(tip);
        assert!((after - before - Vec3::new(5.0, 0.0, 2.0)).length() < 1e-5);
    }

    #[test]
    fn test_clear_and_playback() {
        let (mut scene, rig) = scene_with_fish();
        let start = Transform::from_position(Vec3::new(1.0, 2.0, 3.0));
        scene.set_world_transform(rig, start);
        scene.record_pose(rig, 1);

        scene.set_world_transform(rig, Transform::from_position(Vec3::new(9.0, 9.0, 9.0)));
        scene.record_pose(rig, 2);

        // Scrubbing back restores the recorded root
        scene.advance_frame(1);
        assert_eq!(scene.current_frame(), 1);
        assert_eq!(scene.world_transform(rig), start);

        let spine = scene.resolve_joint(rig, "spine_master").unwrap();
        scene.clear_recorded_poses(rig, &[spine]);
        assert!(scene.rig(rig).track().is_empty());
        assert!(scene.rig(rig).joint_samples("spine_master").unwrap().is_empty());
        // Joints outside the cleared set keep their samples
        assert_eq!(scene.rig(rig).joint_samples("torso").unwrap().len(), 2);
    }

    #[test]
    fn test_without_joint_reparents_children() {
        let rig = MemoryRig::fish("a", Transform::IDENTITY).without_joint("spine_master");
        let fin = rig.joint("back_fin_masterBk.001").unwrap();
        let torso_index = rig.joints().iter().position(|j| j.name == "torso");
        assert_eq!(fin.parent, torso_index);
        assert!((fin.head - Vec3::new(0.0, 1.3, 0.0)).length() < 1e-6);
    }
}
