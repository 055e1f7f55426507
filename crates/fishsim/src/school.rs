//! Demo school of in-memory rigs
//!
//! Rigs stand side by side on the X axis, all facing -Y, each with its own
//! target straight ahead.

use fishsim_core::{MemoryRig, MemoryScene, MemoryTarget, Preset, RigKey, TargetKey, Transform};
use glam::Vec3;

use crate::config::SchoolConfig;

pub struct School {
    pub scene: MemoryScene,
    pub rigs: Vec<RigKey>,
    pub targets: Vec<TargetKey>,
}

impl School {
    /// Build `config.size` rigs of the fixture matching `preset`
    pub fn build(preset: Preset, config: &SchoolConfig) -> Self {
        let mut scene = MemoryScene::new();
        let mut rigs = Vec::with_capacity(config.size);
        let mut targets = Vec::with_capacity(config.size);

        // Centre the line on the origin
        let offset = (config.size.saturating_sub(1)) as f32 * config.spacing * 0.5;
        for i in 0..config.size {
            let x = i as f32 * config.spacing - offset;
            let start = Transform::from_position(Vec3::new(x, 0.0, 0.0));
            let name = format!("{}.{:03}", preset.name(), i);
            let rig = if preset.has_pectorals() {
                MemoryRig::fish(name, start)
            } else {
                MemoryRig::shark(name, start)
            };

            let key = scene.add_rig(rig);
            let target = scene.add_target(
                MemoryTarget::at(Vec3::new(x, -config.target_distance, 0.0))
                    .with_size(config.target_size),
            );
            scene.attach_target(key, Some(target));
            rigs.push(key);
            targets.push(target);
        }

        log::debug!("Built a school of {} {} rigs", rigs.len(), preset);
        Self {
            scene,
            rigs,
            targets,
        }
    }
}
