// src/hardware/mod.rs - Device links and protocol drivers
pub mod debug;
pub mod laser;
pub mod mock;
pub mod serial;
pub mod stage;
pub mod transport;

pub use laser::{LaserDriver, LaserError};
pub use stage::{AxisId, AxisPair, LimitState, Position, StageDriver, StageError};
pub use transport::{Link, SharedLink, TransportError};
