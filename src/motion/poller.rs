// src/motion/poller.rs - Background position and limit polling
use serde::Serialize;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::hardware::{LimitState, Position, StageDriver, StageError};

/// Position and limit state read in the same poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StageSnapshot {
    pub position: Position,
    pub limits: LimitState,
    /// Number of completed polls; 0 until the first one lands.
    pub seq: u64,
}

/// Sole writer of [`StageSnapshot`]s. Readers hold `watch::Receiver`s and
/// always see a whole snapshot.
pub struct PositionPoller {
    stage: StageDriver,
    interval: Duration,
    tx: watch::Sender<StageSnapshot>,
    seq: u64,
}

impl PositionPoller {
    pub fn new(stage: StageDriver, interval: Duration) -> (Self, watch::Receiver<StageSnapshot>) {
        let (tx, rx) = watch::channel(StageSnapshot::default());
        (
            Self {
                stage,
                interval,
                tx,
                seq: 0,
            },
            rx,
        )
    }

    pub fn subscribe(&self) -> watch::Receiver<StageSnapshot> {
        self.tx.subscribe()
    }

    /// Read position and limits once and publish them.
    pub async fn poll_once(&mut self) -> Result<StageSnapshot, StageError> {
        let position = self.stage.get_position().await?;
        let limits = self.stage.check_limit_all().await?;
        self.seq += 1;
        let snapshot = StageSnapshot {
            position,
            limits,
            seq: self.seq,
        };
        self.tx.send_replace(snapshot);
        tracing::trace!(
            "Poll #{}: x={} y={} limits=({}, {})",
            snapshot.seq,
            position.x,
            position.y,
            limits.x,
            limits.y
        );
        Ok(snapshot)
    }

    /// Poll every tick until `shutdown` fires. A failed poll is logged and the
    /// tick skipped.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!("Position poller started ({:?} tick)", self.interval);
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Position poller shutting down");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.poll_once().await {
                        tracing::error!("Position poll failed: {}", e);
                    }
                }
            }
        }
    }

    pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
