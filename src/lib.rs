//! Serial driver and path sequencer for a two-axis stage with a pulsed laser.
//!
//! The stage is driven over a carriage-return terminated text protocol; shapes
//! are planned into timed waypoints and executed with the laser switched in
//! step with each segment.

pub mod command;
pub mod config;
pub mod hardware;
pub mod motion;
pub mod system;

pub use command::{CommandError, ShapeRequest};
pub use config::{Config, ConfigError, Mode, load_config};
pub use hardware::{AxisId, LaserDriver, Position, StageDriver};
pub use motion::{Executor, HomingSequencer, PositionPoller, Shape, StageSnapshot, Waypoint};
pub use system::{EmissionOnExit, StageSystem, SystemError};
