//! Procedural swimming and hovering for skeletal fish rigs
//!
//! This crate implements:
//! - Target sensing and a filtered effort/steering controller
//! - Phase-accumulating oscillators for tail, fins and pectorals
//! - Thrust, drag and turning forces integrated into a root transform
//! - A hover blend with pectoral rest scheduling and random twitches
//! - A frame sequencer that drives any host through the rig access traits
//!
//! Host applications implement [`RigAccess`]/[`RigMutAccess`]; [`MemoryScene`]
//! is a complete in-memory host used by the CLI and the tests.

pub mod controller;
pub mod error;
pub mod host;
pub mod hover;
pub mod math;
pub mod oscillator;
pub mod params;
pub mod presets;
pub mod propulsion;
pub mod rig;
pub mod rng;
pub mod sensor;
pub mod sequencer;
pub mod state;
pub mod step;

// Re-export main types for convenience
pub use error::{PresetError, RigError};
pub use host::{MemoryRig, MemoryScene, MemoryTarget, RigKey, TargetKey};
pub use params::{ResolvedParameters, SimulationParameters, ThrustModel};
pub use presets::Preset;
pub use rig::{JointRole, RigAccess, RigHandle, RigMutAccess, Transform};
pub use rng::SimRng;
pub use sequencer::{
    BatchReport, BatchRun, FrameControl, RigOutcome, RigReport, RigRun, RunSettings, RunToEnd,
    Sequencer, Tick,
};
pub use state::SimulationState;
pub use step::{FrameSample, PropulsionMode};
