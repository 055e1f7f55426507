//! Rig access traits and joint resolution
//!
//! These traits define the interface between the simulation and the host
//! that owns the animated rigs, so the core never depends on a particular
//! scene representation.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::error::RigError;

/// World position and orientation of a rig root
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub orientation: Quat,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        orientation: Quat::IDENTITY,
    };

    pub fn new(position: Vec3, orientation: Quat) -> Self {
        Self {
            position,
            orientation,
        }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self::new(position, Quat::IDENTITY)
    }

    /// Convert a world point into this transform's local frame
    pub fn to_local(&self, point: Vec3) -> Vec3 {
        self.orientation.inverse() * (point - self.position)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Read-only access to rigs and targets
pub trait RigAccess {
    type RigId: Copy + Debug;
    type JointId: Copy + Debug;
    type TargetId: Copy + Debug;

    /// Display name of a rig, used in logs and reports
    fn rig_name(&self, rig: Self::RigId) -> String;

    /// Look up a joint by name
    fn resolve_joint(&self, rig: Self::RigId, name: &str) -> Option<Self::JointId>;

    /// World transform of the rig root
    fn world_transform(&self, rig: Self::RigId) -> Transform;

    fn local_scale(&self, joint: Self::JointId) -> Vec3;

    /// World-space point of a joint used to sample the tail sweep
    fn world_reference_point(&self, joint: Self::JointId) -> Vec3;

    /// Timeline cursor
    fn current_frame(&self) -> i32;

    /// Target the rig tracks, if any
    fn resolve_target(&self, rig: Self::RigId) -> Option<Self::TargetId>;

    fn target_position(&self, target: Self::TargetId) -> Vec3;

    /// Bounding size used to scale the hover distance
    fn target_size(&self, target: Self::TargetId) -> f32;

    /// Orientation the rig turns toward while hovering
    fn target_orientation(&self, target: Self::TargetId) -> Quat;
}

/// Mutable access for posing and recording rigs
pub trait RigMutAccess: RigAccess {
    fn set_world_transform(&mut self, rig: Self::RigId, transform: Transform);

    fn set_local_rotation(&mut self, joint: Self::JointId, rotation: Quat);

    fn set_local_scale(&mut self, joint: Self::JointId, scale: Vec3);

    /// Persist the current pose at `frame`; recording the same frame again overwrites
    fn record_pose(&mut self, rig: Self::RigId, frame: i32);

    /// Drop recorded samples of the root and the given joints
    fn clear_recorded_poses(&mut self, rig: Self::RigId, joints: &[Self::JointId]);

    /// Move the timeline cursor
    fn advance_frame(&mut self, frame: i32);
}

/// Semantic joint roles driven by the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JointRole {
    Spine,
    Torso,
    Chest,
    TailFin,
    TailFinStub,
    TailReference,
    SideFinLeft,
    SideFinRight,
    PecTopLeft,
    PecTopRight,
    PecBottomLeft,
    PecBottomRight,
    PecPalmLeft,
    PecPalmRight,
}

impl JointRole {
    /// Roles every rig must provide
    pub const REQUIRED: [JointRole; 8] = [
        JointRole::Spine,
        JointRole::Torso,
        JointRole::Chest,
        JointRole::TailFin,
        JointRole::TailFinStub,
        JointRole::TailReference,
        JointRole::SideFinLeft,
        JointRole::SideFinRight,
    ];

    /// Roles that enable pectoral fins and hovering
    pub const PECTORAL: [JointRole; 6] = [
        JointRole::PecTopLeft,
        JointRole::PecTopRight,
        JointRole::PecBottomLeft,
        JointRole::PecBottomRight,
        JointRole::PecPalmLeft,
        JointRole::PecPalmRight,
    ];

    /// Joint names tried in order; rigs from different generator versions name bones differently
    pub fn candidates(self) -> &'static [&'static str] {
        match self {
            JointRole::Spine => &["spine_master", "spine"],
            JointRole::Torso => &["torso"],
            JointRole::Chest => &["chest"],
            JointRole::TailFin => &["back_fin_masterBk.001", "back_fin_master.001"],
            JointRole::TailFinStub => &["back_fin_masterBk", "back_fin_master"],
            JointRole::TailReference => &["DEF-back_fin.T.001.Bk", "DEF-back_fin.T.001"],
            JointRole::SideFinLeft => &["side_fin.L"],
            JointRole::SideFinRight => &["side_fin.R"],
            JointRole::PecTopLeft => &["t_master.L"],
            JointRole::PecTopRight => &["t_master.R"],
            JointRole::PecBottomLeft => &["b_master.L"],
            JointRole::PecBottomRight => &["b_master.R"],
            JointRole::PecPalmLeft => &["pec_palm.L"],
            JointRole::PecPalmRight => &["pec_palm.R"],
        }
    }

    /// Name used when reporting a missing role
    pub fn primary_name(self) -> &'static str {
        self.candidates()[0]
    }
}

/// Pectoral fin joints, present only on hover-capable rigs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PectoralJoints<J> {
    pub top_left: J,
    pub top_right: J,
    pub bottom_left: J,
    pub bottom_right: J,
    pub palm_left: J,
    pub palm_right: J,
}

/// Joints resolved once at the start of a run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigHandle<J> {
    pub spine: J,
    pub torso: J,
    pub chest: J,
    pub tail_fin: J,
    pub tail_fin_stub: J,
    pub tail_reference: J,
    pub side_fin_left: J,
    pub side_fin_right: J,
    /// `None` means swim-only
    pub pectorals: Option<PectoralJoints<J>>,
}

impl<J: Copy> RigHandle<J> {
    /// Resolve every role on `rig`
    ///
    /// All missing required roles are reported together. Missing pectoral
    /// roles are not an error; the rig runs swim-only.
    pub fn resolve<H>(host: &H, rig: H::RigId) -> Result<Self, RigError>
    where
        H: RigAccess<JointId = J> + ?Sized,
    {
        let lookup = |role: JointRole| {
            role.candidates()
                .iter()
                .find_map(|name| host.resolve_joint(rig, name))
        };

        let mut missing = Vec::new();
        let mut required = Vec::with_capacity(JointRole::REQUIRED.len());
        for role in JointRole::REQUIRED {
            match lookup(role) {
                Some(joint) => required.push(joint),
                None => missing.push(role.primary_name().to_string()),
            }
        }
        if !missing.is_empty() {
            return Err(RigError::missing_joints(host.rig_name(rig), missing));
        }

        let pectoral: Vec<J> = JointRole::PECTORAL.into_iter().filter_map(lookup).collect();
        let pectorals = if pectoral.len() == JointRole::PECTORAL.len() {
            Some(PectoralJoints {
                top_left: pectoral[0],
                top_right: pectoral[1],
                bottom_left: pectoral[2],
                bottom_right: pectoral[3],
                palm_left: pectoral[4],
                palm_right: pectoral[5],
            })
        } else {
            if !pectoral.is_empty() {
                log::debug!(
                    "Rig '{}' has {} of {} pectoral joints, running swim-only",
                    host.rig_name(rig),
                    pectoral.len(),
                    JointRole::PECTORAL.len()
                );
            }
            None
        };

        Ok(Self {
            spine: required[0],
            torso: required[1],
            chest: required[2],
            tail_fin: required[3],
            tail_fin_stub: required[4],
            tail_reference: required[5],
            side_fin_left: required[6],
            side_fin_right: required[7],
            pectorals,
        })
    }

    pub fn has_pectorals(&self) -> bool {
        self.pectorals.is_some()
    }

    /// Every joint the simulation writes, for clearing old recordings
    pub fn driven_joints(&self) -> Vec<J> {
        let mut joints = vec![
            self.spine,
            self.torso,
            self.chest,
            self.tail_fin,
            self.tail_fin_stub,
            self.side_fin_left,
            self.side_fin_right,
        ];
        if let Some(pec) = &self.pectorals {
            joints.extend([
                pec.top_left,
                pec.top_right,
                pec.bottom_left,
                pec.bottom_right,
                pec.palm_left,
                pec.palm_right,
            ]);
        }
        joints
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{MemoryRig, MemoryScene};

    #[test]
    fn test_fish_resolves_with_pectorals() {
        let mut scene = MemoryScene::new();
        let rig = scene.add_rig(MemoryRig::fish("Goldie", Transform::IDENTITY));

        let handle = RigHandle::resolve(&scene, rig).expect("complete rig");
        assert!(handle.has_pectorals());
        assert_eq!(handle.driven_joints().len(), 13);
    }

    #[test]
    fn test_shark_is_swim_only() {
        let mut scene = MemoryScene::new();
        let rig = scene.add_rig(MemoryRig::shark("Bruce", Transform::IDENTITY));

        let handle = RigHandle::resolve(&scene, rig).expect("complete rig");
        assert!(!handle.has_pectorals());
        assert_eq!(handle.driven_joints().len(), 7);
    }

    #[test]
    fn test_reports_every_missing_role() {
        let mut scene = MemoryScene::new();
        let rig = scene.add_rig(
            MemoryRig::fish("Broken", Transform::IDENTITY)
                .without_joint("chest")
                .without_joint("side_fin.R"),
        );

        let err = RigHandle::resolve(&scene, rig).expect_err("chest and fin missing");
        assert_eq!(
            err,
            RigError::MissingJoints {
                rig: "Broken".to_string(),
                roles: vec!["chest".to_string(), "side_fin.R".to_string()],
            }
        );
    }

    #[test]
    fn test_alternative_names_resolve() {
        let mut scene = MemoryScene::new();
        let rig = scene.add_rig(
            MemoryRig::fish("Legacy", Transform::IDENTITY)
                .with_renamed_joint("spine_master", "spine")
                .with_renamed_joint("back_fin_masterBk.001", "back_fin_master.001")
                .with_renamed_joint("back_fin_masterBk", "back_fin_master")
                .with_renamed_joint("DEF-back_fin.T.001.Bk", "DEF-back_fin.T.001"),
        );

        let handle = RigHandle::resolve(&scene, rig).expect("alternate names");
        assert_eq!(Some(handle.spine), scene.resolve_joint(rig, "spine"));
        assert_eq!(
            Some(handle.tail_reference),
            scene.resolve_joint(rig, "DEF-back_fin.T.001")
        );
    }

    #[test]
    fn test_partial_pectorals_degrade() {
        let mut scene = MemoryScene::new();
        let rig = scene.add_rig(
            MemoryRig::fish("OneFin", Transform::IDENTITY).without_joint("pec_palm.R"),
        );

        let handle = RigHandle::resolve(&scene, rig).expect("required roles present");
        assert!(!handle.has_pectorals());
    }

    #[test]
    fn test_transform_to_local() {
        let t = Transform::new(Vec3::new(1.0, 2.0, 0.0), Quat::from_rotation_z(std::f32::consts::FRAC_PI_2));
        let local = t.to_local(Vec3::new(1.0, 1.0, 0.0));
        // One unit along world -Y is local -X after a quarter turn
        assert!((local - Vec3::new(-1.0, 0.0, 0.0)).length() < 1e-5, "local {:?}", local);
    }
}
