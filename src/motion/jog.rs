// src/motion/jog.rs - Manual continuous motion
use serde::{Deserialize, Serialize};

use crate::hardware::stage::{MAX_VELOCITY, MIN_VELOCITY};
use crate::hardware::{AxisId, AxisPair, StageDriver, StageError};

/// Screen directions. Stage Y grows downward, so Up is negative Y.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JogDirection {
    Right,
    Left,
    Up,
    Down,
}

impl JogDirection {
    pub fn axis_and_sign(self) -> (AxisId, i32) {
        match self {
            JogDirection::Right => (AxisId::X, 1),
            JogDirection::Left => (AxisId::X, -1),
            JogDirection::Up => (AxisId::Y, -1),
            JogDirection::Down => (AxisId::Y, 1),
        }
    }
}

pub struct JogController {
    stage: StageDriver,
    presets: Vec<u32>,
    velocity: u32,
    /// Sign of the continuous motion last started on each axis.
    active: AxisPair<i32>,
}

impl JogController {
    pub fn new(stage: StageDriver, presets: Vec<u32>) -> Self {
        Self {
            stage,
            presets,
            velocity: 100,
            active: AxisPair::new(0, 0),
        }
    }

    pub fn velocity(&self) -> u32 {
        self.velocity
    }

    /// Set the jog velocity, clamping into the stage's accepted range.
    pub fn set_velocity(&mut self, velocity: i64) -> u32 {
        let clamped = velocity.clamp(i64::from(MIN_VELOCITY), i64::from(MAX_VELOCITY)) as u32;
        if i64::from(clamped) != velocity {
            tracing::warn!("Jog velocity {} clamped to {} um/s", velocity, clamped);
        }
        self.velocity = clamped;
        clamped
    }

    pub fn preset(&self, rank: usize) -> Option<u32> {
        self.presets.get(rank).copied()
    }

    pub fn presets(&self) -> &[u32] {
        &self.presets
    }

    /// Start continuous motion at the current jog velocity.
    pub async fn jog(&mut self, direction: JogDirection) -> Result<(), StageError> {
        self.start(direction, self.velocity).await
    }

    /// Start continuous motion at a preset velocity. A zero or missing preset
    /// does nothing and returns false.
    pub async fn jog_rank(&mut self, direction: JogDirection, rank: usize) -> Result<bool, StageError> {
        match self.preset(rank) {
            Some(velocity) if velocity > 0 => {
                self.start(direction, velocity).await?;
                Ok(true)
            }
            _ => {
                tracing::debug!("Jog rank {} has no velocity, ignoring", rank);
                Ok(false)
            }
        }
    }

    async fn start(&mut self, direction: JogDirection, velocity: u32) -> Result<(), StageError> {
        let (axis, sign) = direction.axis_and_sign();
        // The controller can miss a reversal issued during motion.
        if self.active.get(axis) == -sign {
            self.stage.stop_axis(axis).await?;
        }
        tracing::info!("Jog {:?} at {} um/s", direction, velocity);
        self.stage.move_velocity(axis, sign * velocity as i32).await?;
        self.active.set(axis, sign);
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<(), StageError> {
        self.active = AxisPair::new(0, 0);
        self.stage.stop().await
    }
}
