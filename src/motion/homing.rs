// src/motion/homing.rs - Limit-switch homing
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

use crate::hardware::stage::MAX_VELOCITY;
use crate::hardware::{AxisId, StageDriver, StageError};
use crate::motion::poller::StageSnapshot;

#[derive(Debug, Error)]
pub enum HomingError {
    #[error("Stage error: {0}")]
    Stage(#[from] StageError),
    #[error("Position poller stopped while homing {0} axis")]
    PollerStopped(AxisId),
}

/// Which end of travel carries the homing limit switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HomingDirection {
    Positive,
    Negative,
}

impl HomingDirection {
    fn sign(self) -> f64 {
        match self {
            HomingDirection::Positive => 1.0,
            HomingDirection::Negative => -1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HomingSettings {
    pub track_length_mm: f64,
    pub direction: HomingDirection,
    /// How often the published limit state is checked.
    pub poll_tick: Duration,
    /// Wait after returning to zero before the axis counts as homed.
    pub settle: Duration,
}

impl Default for HomingSettings {
    fn default() -> Self {
        Self {
            track_length_mm: 50.0,
            direction: HomingDirection::Positive,
            poll_tick: Duration::from_millis(50),
            settle: Duration::from_secs(2),
        }
    }
}

/// Drives each axis onto its limit switch, declares that point half a track
/// from center and returns to the new zero.
///
/// Relies on a running [`PositionPoller`](crate::motion::poller::PositionPoller)
/// for limit state.
pub struct HomingSequencer {
    stage: StageDriver,
    snapshots: watch::Receiver<StageSnapshot>,
    settings: HomingSettings,
}

impl HomingSequencer {
    pub fn new(
        stage: StageDriver,
        snapshots: watch::Receiver<StageSnapshot>,
        settings: HomingSettings,
    ) -> Self {
        Self {
            stage,
            snapshots,
            settings,
        }
    }

    /// Limit coordinate assigned to the switch position.
    pub fn limit_offset_mm(&self) -> f64 {
        self.settings.direction.sign() * self.settings.track_length_mm / 2.0
    }

    pub async fn home_axis(&mut self, axis: AxisId) -> Result<(), HomingError> {
        tracing::info!("Homing {} axis", axis);
        let velocity = self.settings.direction.sign() as i32 * MAX_VELOCITY as i32;
        self.stage.move_velocity(axis, velocity).await?;
        // Poll `seen + 1` may have read LIMIT? before GO went out; every poll
        // after it started once GO was on the wire.
        let seen = self.snapshots.borrow().seq;

        self.wait_for_limit(axis, seen + 2).await?;
        tracing::info!("{} axis reached its limit", axis);

        self.stage.set_position(axis, self.limit_offset_mm()).await?;
        self.stage.move_abs(axis, 0.0).await?;
        tokio::time::sleep(self.settings.settle).await;
        tracing::info!("{} axis homed", axis);
        Ok(())
    }

    /// Home X, then Y.
    pub async fn home_all(&mut self) -> Result<(), HomingError> {
        for axis in AxisId::ALL {
            self.home_axis(axis).await?;
        }
        Ok(())
    }

    /// Wait for a snapshot numbered `first_seq` or later showing `axis` on a limit.
    async fn wait_for_limit(&mut self, axis: AxisId, first_seq: u64) -> Result<(), HomingError> {
        let mut tick = tokio::time::interval(self.settings.poll_tick);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tick.tick().await;
            let snapshot = *self.snapshots.borrow();
            if snapshot.seq >= first_seq && snapshot.limits.get(axis) {
                return Ok(());
            }
            if self.snapshots.has_changed().is_err() {
                return Err(HomingError::PollerStopped(axis));
            }
        }
    }
}
