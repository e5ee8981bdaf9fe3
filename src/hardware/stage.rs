// src/hardware/stage.rs - Two-axis stage controller protocol
//
// Plain-text commands, one per carriage-return terminated line. Axis commands
// carry an `AXIs1:`/`AXIs2:` prefix; the combined line move and the global
// stop do not.
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::hardware::transport::{SharedLink, TransportError};

pub const MIN_VELOCITY: u32 = 1;
/// Highest velocity the controller accepts, in µm/s.
pub const MAX_VELOCITY: u32 = 25_000;
pub const SPEED_TABLE_SLOTS: u8 = 10;
/// The only speed table this system operates.
pub const DEFAULT_SPEED_TABLE: u8 = 0;

#[derive(Debug, Error)]
pub enum StageError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Invalid velocity: {0}. It must be 1~25000.")]
    VelocityOutOfRange(u32),
    #[error("Invalid speed table slot: {0}. It must be 0~9.")]
    SpeedTableOutOfRange(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisId {
    X,
    Y,
}

impl AxisId {
    pub const ALL: [AxisId; 2] = [AxisId::X, AxisId::Y];

    /// Wire prefix addressing this axis.
    pub fn prefix(self) -> &'static str {
        match self {
            AxisId::X => "AXIs1:",
            AxisId::Y => "AXIs2:",
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'X' => Some(AxisId::X),
            'Y' => Some(AxisId::Y),
            _ => None,
        }
    }
}

impl fmt::Display for AxisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxisId::X => write!(f, "x"),
            AxisId::Y => write!(f, "y"),
        }
    }
}

/// One value per axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AxisPair<T> {
    pub x: T,
    pub y: T,
}

impl<T: Copy> AxisPair<T> {
    pub fn new(x: T, y: T) -> Self {
        Self { x, y }
    }

    pub fn get(&self, axis: AxisId) -> T {
        match axis {
            AxisId::X => self.x,
            AxisId::Y => self.y,
        }
    }

    pub fn set(&mut self, axis: AxisId, value: T) {
        match axis {
            AxisId::X => self.x = value,
            AxisId::Y => self.y = value,
        }
    }
}

/// Stage position in millimeters.
pub type Position = AxisPair<f64>;

/// True where the axis sits on or past a mechanical limit.
pub type LimitState = AxisPair<bool>;

/// Format a millimeter value for the wire, rounded to the nanometer.
fn format_mm(value: f64) -> String {
    let rounded = (value * 1e6).round() / 1e6;
    if rounded == 0.0 {
        "0".to_string()
    } else {
        rounded.to_string()
    }
}

/// Driver for the stage controller. Cheap to clone; clones share the link.
#[derive(Clone)]
pub struct StageDriver {
    link: SharedLink,
}

impl StageDriver {
    pub fn new(link: SharedLink) -> Self {
        Self { link }
    }

    async fn command(&self, text: &str) -> Result<(), StageError> {
        let mut link = self.link.lock().await;
        link.send(text).await?;
        Ok(())
    }

    async fn query(&self, text: &str) -> Result<String, StageError> {
        let mut link = self.link.lock().await;
        link.send(text).await?;
        Ok(link.receive().await?)
    }

    /// Check readiness of both axes and force speed table 0.
    ///
    /// An axis that does not answer `1` is reported and skipped over; the
    /// returned pair says which axes were ready.
    pub async fn initialize(&self) -> Result<AxisPair<bool>, StageError> {
        let mut ready = AxisPair::new(false, false);
        for axis in AxisId::ALL {
            let is_ready = self.is_ready(axis).await?;
            if is_ready {
                tracing::info!("{} axis: READY", axis);
            } else {
                tracing::warn!("{} axis: NOT READY", axis);
            }
            ready.set(axis, is_ready);
        }
        for axis in AxisId::ALL {
            if !self.speed_table_is(axis, DEFAULT_SPEED_TABLE).await? {
                self.select_speed_table(axis, DEFAULT_SPEED_TABLE).await?;
            }
        }
        Ok(ready)
    }

    pub async fn is_ready(&self, axis: AxisId) -> Result<bool, StageError> {
        let reply = self.query(&format!("{}READY?", axis.prefix())).await?;
        Ok(reply == "1")
    }

    /// Set `Fspeed0` on one axis. Out-of-range values are refused without
    /// writing anything.
    pub async fn set_velocity(&self, axis: AxisId, velocity: u32) -> Result<(), StageError> {
        if !(MIN_VELOCITY..=MAX_VELOCITY).contains(&velocity) {
            let err = StageError::VelocityOutOfRange(velocity);
            tracing::warn!("{} axis: {}", axis, err);
            return Err(err);
        }
        self.command(&format!("{}Fspeed0 {}", axis.prefix(), velocity))
            .await
    }

    /// Set the velocity on both axes. Each axis is attempted even if the
    /// other is refused; the first failure is returned.
    pub async fn set_velocity_all(&self, velocity: u32) -> Result<(), StageError> {
        let x = self.set_velocity(AxisId::X, velocity).await;
        let y = self.set_velocity(AxisId::Y, velocity).await;
        x.and(y)
    }

    pub async fn set_velocity_max_all(&self) -> Result<(), StageError> {
        self.set_velocity_all(MAX_VELOCITY).await
    }

    pub async fn select_speed_table(&self, axis: AxisId, slot: u8) -> Result<(), StageError> {
        if slot >= SPEED_TABLE_SLOTS {
            return Err(StageError::SpeedTableOutOfRange(slot));
        }
        tracing::info!("{} axis: selecting speed table {}", axis, slot);
        self.command(&format!("{}SELectSPeed {}", axis.prefix(), slot))
            .await
    }

    pub async fn speed_table_is(&self, axis: AxisId, slot: u8) -> Result<bool, StageError> {
        let reply = self
            .query(&format!("{}SELectSPeed?", axis.prefix()))
            .await?;
        if reply == slot.to_string() {
            Ok(true)
        } else {
            tracing::warn!("{} axis: selected speed table is {:?}", axis, reply);
            Ok(false)
        }
    }

    /// Continuous motion at `|velocity|`, positive direction for positive
    /// values. Runs until stopped.
    pub async fn move_velocity(&self, axis: AxisId, velocity: i32) -> Result<(), StageError> {
        self.set_velocity(axis, velocity.unsigned_abs()).await?;
        let direction = if velocity > 0 { 5 } else { 6 };
        self.command(&format!("{}GO {}", axis.prefix(), direction))
            .await
    }

    pub async fn move_abs(&self, axis: AxisId, position_mm: f64) -> Result<(), StageError> {
        self.command(&format!("{}GOABS {}", axis.prefix(), format_mm(position_mm)))
            .await
    }

    /// Coordinated absolute move: both axes arrive together.
    pub async fn move_line(&self, x_mm: f64, y_mm: f64) -> Result<(), StageError> {
        self.command(&format!("GOLineA X{} Y{}", format_mm(x_mm), format_mm(y_mm)))
            .await
    }

    pub async fn stop_axis(&self, axis: AxisId) -> Result<(), StageError> {
        self.command(&format!("{}STOP Emergency", axis.prefix()))
            .await
    }

    pub async fn stop(&self) -> Result<(), StageError> {
        self.command("STOP Emergency").await
    }

    /// Position of one axis in millimeters.
    ///
    /// Serial noise occasionally garbles the reply; an unparseable value reads
    /// as 0 instead of failing, so callers see a spurious zero now and then.
    pub async fn get_axis_position(&self, axis: AxisId) -> Result<f64, StageError> {
        let reply = self.query(&format!("{}POSition?", axis.prefix())).await?;
        match reply.trim().parse::<f64>() {
            Ok(mm) if mm.is_finite() => Ok(mm),
            _ => {
                tracing::warn!("{} axis: unreadable position {:?}, using 0", axis, reply);
                Ok(0.0)
            }
        }
    }

    pub async fn get_position(&self) -> Result<Position, StageError> {
        let x = self.get_axis_position(AxisId::X).await?;
        let y = self.get_axis_position(AxisId::Y).await?;
        Ok(Position::new(x, y))
    }

    /// Redefine the controller's coordinate for `axis` without moving.
    pub async fn set_position(&self, axis: AxisId, position_mm: f64) -> Result<(), StageError> {
        self.command(&format!("{}POS {}", axis.prefix(), format_mm(position_mm)))
            .await
    }

    /// Any positive limit code (1, 2 or 3) means the axis is at a limit.
    /// Unreadable replies count as not at a limit.
    pub async fn check_limit(&self, axis: AxisId) -> Result<bool, StageError> {
        let reply = self.query(&format!("{}LIMIT?", axis.prefix())).await?;
        match reply.trim().parse::<i64>() {
            Ok(code) => Ok(code > 0),
            Err(_) => {
                tracing::warn!("{} axis: unreadable limit status {:?}", axis, reply);
                Ok(false)
            }
        }
    }

    pub async fn check_limit_all(&self) -> Result<LimitState, StageError> {
        let x = self.check_limit(AxisId::X).await?;
        let y = self.check_limit(AxisId::Y).await?;
        Ok(LimitState::new(x, y))
    }
}
