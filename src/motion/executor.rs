// src/motion/executor.rs - Runs planned waypoints on the stage and laser
//
// The controller never acknowledges that a move finished, so each segment is
// followed by a wait of its travel time plus a fixed settle margin.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

use crate::hardware::{AxisId, LaserDriver, LaserError, Position, StageDriver, StageError};
use crate::motion::planner::Waypoint;

pub const DEFAULT_SETTLE_MARGIN: Duration = Duration::from_millis(300);

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Another path is already running")]
    Busy,
    #[error("Stage error: {0}")]
    Stage(#[from] StageError),
    #[error("Laser error: {0}")]
    Laser(#[from] LaserError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    Idle,
    Running,
    Cancelling,
}

/// Stage command used for each segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionPrimitive {
    /// `GOLineA`: both axes move together.
    #[default]
    Line,
    /// `GOABS` on each axis whose coordinate changes.
    SingleAxis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed { segments: usize },
    Cancelled { segments: usize },
}

/// Blocks until a segment is assumed complete.
#[async_trait]
pub trait SegmentWaiter: Send + Sync {
    async fn wait_for_segment(&self, delay: Duration);
}

/// Waits by sleeping for the given time.
pub struct SleepWaiter;

#[async_trait]
impl SegmentWaiter for SleepWaiter {
    async fn wait_for_segment(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub settle_margin: Duration,
    pub primitive: MotionPrimitive,
    /// Pulse frequency used whenever auto-emission turns the laser on.
    pub laser_frequency_hz: u32,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            settle_margin: DEFAULT_SETTLE_MARGIN,
            primitive: MotionPrimitive::Line,
            laser_frequency_hz: 1000,
        }
    }
}

/// Resets the executor to `Idle` however a run ends.
struct RunGuard<'a>(&'a watch::Sender<ExecutorState>);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.send_replace(ExecutorState::Idle);
    }
}

#[derive(Clone)]
pub struct Executor {
    stage: StageDriver,
    laser: Option<LaserDriver>,
    waiter: Arc<dyn SegmentWaiter>,
    settings: ExecutorSettings,
    state: Arc<watch::Sender<ExecutorState>>,
}

impl Executor {
    pub fn new(stage: StageDriver, laser: Option<LaserDriver>, settings: ExecutorSettings) -> Self {
        Self::with_waiter(stage, laser, settings, Arc::new(SleepWaiter))
    }

    pub fn with_waiter(
        stage: StageDriver,
        laser: Option<LaserDriver>,
        settings: ExecutorSettings,
        waiter: Arc<dyn SegmentWaiter>,
    ) -> Self {
        let (state, _) = watch::channel(ExecutorState::Idle);
        Self {
            stage,
            laser,
            waiter,
            settings,
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> ExecutorState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ExecutorState> {
        self.state.subscribe()
    }

    /// Ask a running path to stop before its next segment. Returns false when
    /// nothing is running.
    pub fn cancel(&self) -> bool {
        let requested = self.state.send_if_modified(|state| {
            if *state == ExecutorState::Running {
                *state = ExecutorState::Cancelling;
                true
            } else {
                false
            }
        });
        if requested {
            tracing::info!("Path cancellation requested");
        }
        requested
    }

    /// Run `waypoints` as offsets from `start`, at `velocity` µm/s.
    ///
    /// With `auto_emission` the laser follows each segment's flag and is
    /// forced off at the end.
    pub async fn run(
        &self,
        waypoints: &[Waypoint],
        velocity: u32,
        start: Position,
        auto_emission: bool,
    ) -> Result<RunOutcome, ExecutorError> {
        let acquired = self.state.send_if_modified(|state| {
            if *state == ExecutorState::Idle {
                *state = ExecutorState::Running;
                true
            } else {
                false
            }
        });
        if !acquired {
            tracing::warn!("Rejected path: executor is {:?}", self.state());
            return Err(ExecutorError::Busy);
        }
        let _guard = RunGuard(&self.state);

        let auto_emission = auto_emission && self.laser_available();
        let result = self
            .run_segments(waypoints, velocity, start, auto_emission)
            .await;
        if result.is_err() && auto_emission {
            if let Some(laser) = &self.laser {
                if let Err(e) = laser.stop().await {
                    tracing::error!("Failed to stop laser after aborted path: {}", e);
                }
            }
        }
        result
    }

    fn laser_available(&self) -> bool {
        if self.laser.is_none() {
            tracing::warn!("Auto-emission requested without a laser; running dark");
            return false;
        }
        true
    }

    async fn run_segments(
        &self,
        waypoints: &[Waypoint],
        velocity: u32,
        start: Position,
        auto_emission: bool,
    ) -> Result<RunOutcome, ExecutorError> {
        tracing::info!(
            "Running path: {} segments at {} um/s from ({}, {})",
            waypoints.len(),
            velocity,
            start.x,
            start.y
        );
        match self.stage.set_velocity_all(velocity).await {
            Ok(()) => {}
            // Already logged by the driver; the stage keeps its last velocity.
            Err(StageError::VelocityOutOfRange(_)) => {}
            Err(e) => return Err(e.into()),
        }

        let mut emitting = self.laser.as_ref().is_some_and(LaserDriver::is_emitting);
        let mut current = start;
        for (index, waypoint) in waypoints.iter().enumerate() {
            if self.state() == ExecutorState::Cancelling {
                self.abort(auto_emission).await?;
                tracing::info!("Path cancelled after {} segments", index);
                return Ok(RunOutcome::Cancelled { segments: index });
            }

            if auto_emission && waypoint.laser_on != emitting {
                self.set_emission(waypoint.laser_on).await?;
                emitting = waypoint.laser_on;
            }

            let target = Position::new(
                start.x + waypoint.dx * 1e-3,
                start.y + waypoint.dy * 1e-3,
            );
            tracing::debug!(
                "Segment {}: -> ({}, {}) mm, laser {}",
                index,
                target.x,
                target.y,
                if waypoint.laser_on { "on" } else { "off" }
            );
            self.issue(current, target).await?;
            current = target;

            self.waiter
                .wait_for_segment(waypoint.delay_duration() + self.settings.settle_margin)
                .await;
        }

        if auto_emission {
            self.set_emission(false).await?;
        }
        tracing::info!("Path complete");
        Ok(RunOutcome::Completed {
            segments: waypoints.len(),
        })
    }

    async fn issue(&self, current: Position, target: Position) -> Result<(), StageError> {
        match self.settings.primitive {
            MotionPrimitive::Line => self.stage.move_line(target.x, target.y).await,
            MotionPrimitive::SingleAxis => {
                for axis in AxisId::ALL {
                    if target.get(axis) != current.get(axis) {
                        self.stage.move_abs(axis, target.get(axis)).await?;
                    }
                }
                Ok(())
            }
        }
    }

    async fn set_emission(&self, on: bool) -> Result<(), LaserError> {
        let Some(laser) = &self.laser else {
            return Ok(());
        };
        if on {
            laser.set_frequency(self.settings.laser_frequency_hz).await
        } else {
            laser.stop().await
        }
    }

    async fn abort(&self, auto_emission: bool) -> Result<(), ExecutorError> {
        self.stage.stop().await?;
        if auto_emission {
            self.set_emission(false).await?;
        }
        Ok(())
    }
}
