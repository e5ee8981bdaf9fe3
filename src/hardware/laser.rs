// src/hardware/laser.rs - Pulsed laser controller
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

use crate::hardware::transport::{SharedLink, TransportError};

pub const MIN_FREQUENCY: u32 = 16;
pub const MAX_FREQUENCY: u32 = 10_000;

#[derive(Debug, Error)]
pub enum LaserError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Invalid frequency: {0}. It must be 16~10000.")]
    FrequencyOutOfRange(u32),
}

/// Writes `<freq>` to start pulsing and `-1` to stop, newline terminated.
#[derive(Clone)]
pub struct LaserDriver {
    link: SharedLink,
    emitting: Arc<AtomicBool>,
}

impl LaserDriver {
    pub fn new(link: SharedLink) -> Self {
        Self {
            link,
            emitting: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn set_frequency(&self, hz: u32) -> Result<(), LaserError> {
        if !(MIN_FREQUENCY..=MAX_FREQUENCY).contains(&hz) {
            let err = LaserError::FrequencyOutOfRange(hz);
            tracing::warn!("{}", err);
            return Err(err);
        }
        self.link.lock().await.send(&hz.to_string()).await?;
        self.emitting.store(true, Ordering::SeqCst);
        tracing::info!("Laser emitting at {} Hz", hz);
        Ok(())
    }

    pub async fn stop(&self) -> Result<(), LaserError> {
        self.link.lock().await.send("-1").await?;
        self.emitting.store(false, Ordering::SeqCst);
        tracing::info!("Laser stopped");
        Ok(())
    }

    /// Last commanded state. The controller never reports back.
    pub fn is_emitting(&self) -> bool {
        self.emitting.load(Ordering::SeqCst)
    }
}
