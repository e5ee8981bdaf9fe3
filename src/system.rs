// src/system.rs - Wires links, drivers, poller and executor together
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::command::{CommandError, ShapeRequest};
use crate::config::{Config, ConfigError, Mode};
use crate::hardware::debug::DebugLink;
use crate::hardware::serial::open_line_transport;
use crate::hardware::transport::{SharedLink, shared};
use crate::hardware::{AxisId, AxisPair, LaserDriver, LaserError, Position, StageDriver, StageError, TransportError};
use crate::motion::planner::Fill;
use crate::motion::{
    Executor, ExecutorError, HomingError, HomingSequencer, JogController, PositionPoller, RunOutcome,
    StageSnapshot,
};

#[derive(Debug, Error)]
pub enum SystemError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Stage error: {0}")]
    Stage(#[from] StageError),
    #[error("Laser error: {0}")]
    Laser(#[from] LaserError),
    #[error("Command error: {0}")]
    Command(#[from] CommandError),
    #[error("Executor error: {0}")]
    Executor(#[from] ExecutorError),
    #[error("Homing error: {0}")]
    Homing(#[from] HomingError),
}

/// What shutdown does with the laser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmissionOnExit {
    Stop,
    /// Leave the last commanded emission in place.
    Keep,
}

pub struct StageSystem {
    config: Config,
    stage: StageDriver,
    laser: LaserDriver,
    executor: Executor,
    poller: Option<PositionPoller>,
    snapshots: watch::Receiver<StageSnapshot>,
    poller_task: Option<JoinHandle<()>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl StageSystem {
    /// Open the device links for the configured mode.
    pub async fn connect(config: Config) -> Result<Self, SystemError> {
        config.validate()?;
        let (stage_link, laser_link) = match config.mode {
            Mode::Debug => {
                tracing::info!("DEBUG mode: device commands are logged, not sent");
                (shared(DebugLink::new("stage")), shared(DebugLink::new("laser")))
            }
            Mode::Release => {
                let stage = open_line_transport(&config.stage_serial())?;
                let laser = open_line_transport(&config.laser_serial())?;
                tokio::time::sleep(Duration::from_millis(config.laser.startup_delay_ms)).await;
                (shared(stage), shared(laser))
            }
        };
        Ok(Self::from_links(config, stage_link, laser_link))
    }

    pub fn from_links(config: Config, stage_link: SharedLink, laser_link: SharedLink) -> Self {
        let stage = StageDriver::new(stage_link);
        let laser = LaserDriver::new(laser_link);
        let executor = Executor::new(stage.clone(), Some(laser.clone()), config.executor_settings());
        let (poller, snapshots) = PositionPoller::new(stage.clone(), config.poll_interval());
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            stage,
            laser,
            executor,
            poller: Some(poller),
            snapshots,
            poller_task: None,
            shutdown_tx,
        }
    }

    pub async fn initialize(&self) -> Result<AxisPair<bool>, SystemError> {
        tracing::info!("Initializing stage controller");
        Ok(self.stage.initialize().await?)
    }

    /// Start the background poller. Later calls do nothing.
    pub fn start_polling(&mut self) {
        if let Some(poller) = self.poller.take() {
            self.poller_task = Some(poller.spawn(self.shutdown_tx.subscribe()));
        }
    }

    pub fn is_polling(&self) -> bool {
        self.poller_task.is_some()
    }

    pub fn snapshot(&self) -> StageSnapshot {
        *self.snapshots.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<StageSnapshot> {
        self.snapshots.clone()
    }

    /// Latest polled position, or a direct query before the first poll.
    pub async fn current_position(&self) -> Result<Position, SystemError> {
        let snapshot = self.snapshot();
        if snapshot.seq > 0 {
            Ok(snapshot.position)
        } else {
            Ok(self.stage.get_position().await?)
        }
    }

    /// Validate a text shape command against the configured limits.
    pub fn submit(&self, text: &str, fill: Option<Fill>) -> Result<ShapeRequest, CommandError> {
        ShapeRequest::parse(text, fill, &self.config.submission_limits()).inspect_err(|e| {
            tracing::warn!("Rejected command {:?}: {}", text, e);
        })
    }

    /// Plan and run a request from the current position.
    pub async fn execute(&self, request: &ShapeRequest, auto_emission: bool) -> Result<RunOutcome, SystemError> {
        run_request(
            self.executor.clone(),
            self.current_position().await?,
            request.clone(),
            auto_emission,
        )
        .await
    }

    /// Run a request on its own task so the caller keeps control.
    pub async fn spawn_execute(
        &self,
        request: ShapeRequest,
        auto_emission: bool,
    ) -> Result<JoinHandle<Result<RunOutcome, SystemError>>, SystemError> {
        let start = self.current_position().await?;
        let executor = self.executor.clone();
        Ok(tokio::spawn(run_request(executor, start, request, auto_emission)))
    }

    /// Home one axis, or X then Y. Starts polling if needed.
    pub async fn home(&mut self, axis: Option<AxisId>) -> Result<(), SystemError> {
        self.start_polling();
        let mut homing = HomingSequencer::new(
            self.stage.clone(),
            self.subscribe(),
            self.config.homing_settings(),
        );
        match axis {
            Some(axis) => homing.home_axis(axis).await?,
            None => homing.home_all().await?,
        }
        Ok(())
    }

    pub fn jog_controller(&self) -> JogController {
        JogController::new(self.stage.clone(), self.config.velocity_presets.clone())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stage(&self) -> &StageDriver {
        &self.stage
    }

    pub fn laser(&self) -> &LaserDriver {
        &self.laser
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Stop motion and emission, then stop the poller.
    pub async fn shutdown(&mut self) -> Result<(), SystemError> {
        self.shutdown_with(EmissionOnExit::Stop).await
    }

    pub async fn shutdown_with(&mut self, emission: EmissionOnExit) -> Result<(), SystemError> {
        tracing::info!("Shutting down stage system");
        self.executor.cancel();
        let stopped = self.stage.stop().await;
        let laser_off = match emission {
            EmissionOnExit::Stop => self.laser.stop().await,
            EmissionOnExit::Keep => {
                tracing::info!("Leaving laser emission as commanded");
                Ok(())
            }
        };
        let _ = self.shutdown_tx.send(());
        if let Some(task) = self.poller_task.take() {
            if let Err(e) = task.await {
                tracing::error!("Poller task ended abnormally: {}", e);
            }
        }
        stopped?;
        laser_off?;
        Ok(())
    }
}

async fn run_request(
    executor: Executor,
    start: Position,
    request: ShapeRequest,
    auto_emission: bool,
) -> Result<RunOutcome, SystemError> {
    let waypoints = request.plan();
    if waypoints.is_empty() {
        tracing::info!("Nothing to do for {}", request);
        return Ok(RunOutcome::Completed { segments: 0 });
    }
    tracing::info!("Executing {}", request);
    Ok(executor
        .run(&waypoints, request.velocity, start, auto_emission)
        .await?)
}
