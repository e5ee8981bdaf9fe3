// src/motion/mod.rs
pub mod executor;
pub mod homing;
pub mod jog;
pub mod planner;
pub mod poller;

pub use executor::{Executor, ExecutorError, ExecutorSettings, ExecutorState, MotionPrimitive, RunOutcome, SegmentWaiter};
pub use homing::{HomingDirection, HomingError, HomingSequencer, HomingSettings};
pub use jog::{JogController, JogDirection};
pub use planner::{Fill, FillDirection, Shape, Waypoint, plan};
pub use poller::{PositionPoller, StageSnapshot};
