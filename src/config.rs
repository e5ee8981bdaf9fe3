//! # Stage and Laser Configuration
//!
//! Loaded from TOML, or from JSON when the file ends in `.json`.
//!
//! ## Example: TOML Configuration
//!
//! ```toml
//! mode = "release"
//! poll_interval_ms = 200
//! velocity_presets = [0, 10, 100, 1000, 5000, 25000]
//!
//! [stage]
//! port = "/dev/ttyUSB0"
//! baud = 38400
//!
//! [laser]
//! port = "/dev/ttyUSB1"
//! baud = 9600
//! frequency_hz = 1000
//!
//! [executor]
//! settle_margin_ms = 300
//! auto_emission = true
//! primitive = "line"
//!
//! [homing]
//! track_length_mm = 50.0
//! direction = "positive"
//! ```
//!
//! ## Example: Rust Usage
//!
//! ```rust
//! use stage_laser::config::{Config, Mode};
//! let config: Config = toml::from_str("mode = \"DEBUG\"\nfps = 10").unwrap();
//! assert_eq!(config.mode, Mode::Debug);
//! assert_eq!(config.poll_interval().as_millis(), 100);
//! assert!(config.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::command::SubmissionLimits;
use crate::hardware::laser::{MAX_FREQUENCY, MIN_FREQUENCY};
use crate::hardware::serial::SerialSettings;
use crate::hardware::stage::MAX_VELOCITY;
use crate::hardware::transport::{LASER_TERMINATOR, STAGE_TERMINATOR};
use crate::motion::executor::{ExecutorSettings, MotionPrimitive};
use crate::motion::homing::{HomingDirection, HomingSettings};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// `debug` logs every device command instead of opening ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    #[serde(alias = "DEBUG")]
    Debug,
    #[serde(alias = "RELEASE")]
    Release,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub mode: Mode,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Alternative to `poll_interval_ms`: polls per second.
    #[serde(default, alias = "FPS")]
    pub fps: Option<u32>,
    #[serde(default = "default_velocity_presets", alias = "VEL_LIST")]
    pub velocity_presets: Vec<u32>,
    #[serde(default)]
    pub stage: StageConfig,
    #[serde(default)]
    pub laser: LaserConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub homing: HomingConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(flatten)]
    legacy: LegacyKeys,
}

/// Flat keys from the older `config.json` layout. Folded into the sections
/// above by [`Config::apply_legacy_keys`].
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct LegacyKeys {
    #[serde(rename = "PORT-stage", default, skip_serializing_if = "Option::is_none")]
    port_stage: Option<LegacyPort>,
    #[serde(rename = "PORT-laser", default, skip_serializing_if = "Option::is_none")]
    port_laser: Option<LegacyPort>,
    #[serde(rename = "BAUDRATE-stage", default, skip_serializing_if = "Option::is_none")]
    baud_stage: Option<u32>,
    #[serde(rename = "BAUDRATE-laser", default, skip_serializing_if = "Option::is_none")]
    baud_laser: Option<u32>,
}

/// A bare number means a Windows `COM<n>` port.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
enum LegacyPort {
    Number(u32),
    Name(String),
}

impl LegacyPort {
    fn into_port_name(self) -> String {
        match self {
            LegacyPort::Number(n) => format!("COM{}", n),
            LegacyPort::Name(name) => name,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            poll_interval_ms: default_poll_interval_ms(),
            fps: None,
            velocity_presets: default_velocity_presets(),
            stage: StageConfig::default(),
            laser: LaserConfig::default(),
            executor: ExecutorConfig::default(),
            homing: HomingConfig::default(),
            limits: LimitsConfig::default(),
            legacy: LegacyKeys::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StageConfig {
    #[serde(default)]
    pub port: String,
    #[serde(default = "default_stage_baud")]
    pub baud: u32,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud: default_stage_baud(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LaserConfig {
    #[serde(default)]
    pub port: String,
    #[serde(default = "default_laser_baud")]
    pub baud: u32,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    #[serde(default = "default_frequency_hz")]
    pub frequency_hz: u32,
    /// The controller resets when its port opens.
    #[serde(default = "default_startup_delay_ms")]
    pub startup_delay_ms: u64,
}

impl Default for LaserConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud: default_laser_baud(),
            read_timeout_ms: default_read_timeout_ms(),
            frequency_hz: default_frequency_hz(),
            startup_delay_ms: default_startup_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutorConfig {
    #[serde(default = "default_settle_margin_ms")]
    pub settle_margin_ms: u64,
    #[serde(default)]
    pub auto_emission: bool,
    #[serde(default)]
    pub primitive: MotionPrimitive,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            settle_margin_ms: default_settle_margin_ms(),
            auto_emission: false,
            primitive: MotionPrimitive::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HomingConfig {
    #[serde(default = "default_track_length_mm")]
    pub track_length_mm: f64,
    #[serde(default = "default_homing_direction")]
    pub direction: HomingDirection,
    #[serde(default = "default_homing_settle_ms")]
    pub settle_ms: u64,
    #[serde(default = "default_homing_poll_tick_ms")]
    pub poll_tick_ms: u64,
}

impl Default for HomingConfig {
    fn default() -> Self {
        Self {
            track_length_mm: default_track_length_mm(),
            direction: default_homing_direction(),
            settle_ms: default_homing_settle_ms(),
            poll_tick_ms: default_homing_poll_tick_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_extent_um")]
    pub max_extent_um: f64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_extent_um: default_max_extent_um(),
        }
    }
}

fn default_poll_interval_ms() -> u64 { 200 }
fn default_velocity_presets() -> Vec<u32> { vec![0, 10, 100, 1000, 5000, 25000] }
fn default_stage_baud() -> u32 { 38400 }
fn default_read_timeout_ms() -> u64 { 1000 }
fn default_laser_baud() -> u32 { 9600 }
fn default_frequency_hz() -> u32 { 1000 }
fn default_startup_delay_ms() -> u64 { 1000 }
fn default_settle_margin_ms() -> u64 { 300 }
fn default_track_length_mm() -> f64 { 50.0 }
fn default_homing_direction() -> HomingDirection { HomingDirection::Positive }
fn default_homing_settle_ms() -> u64 { 2000 }
fn default_homing_poll_tick_ms() -> u64 { 50 }
fn default_max_extent_um() -> f64 { 50_000.0 }

impl Config {
    /// Move any legacy flat keys into their sections. They win over the
    /// section defaults.
    pub fn apply_legacy_keys(&mut self) {
        let legacy = std::mem::take(&mut self.legacy);
        if let Some(port) = legacy.port_stage {
            self.stage.port = port.into_port_name();
        }
        if let Some(port) = legacy.port_laser {
            self.laser.port = port.into_port_name();
        }
        if let Some(baud) = legacy.baud_stage {
            self.stage.baud = baud;
        }
        if let Some(baud) = legacy.baud_laser {
            self.laser.baud = baud;
        }
    }

    /// Poll tick, derived from `fps` when that is set.
    pub fn poll_interval(&self) -> Duration {
        match self.fps {
            Some(fps) if fps > 0 => Duration::from_millis(1000 / u64::from(fps)),
            _ => Duration::from_millis(self.poll_interval_ms),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fps == Some(0) {
            return Err(ConfigError::Invalid("fps must be positive".into()));
        }
        if self.poll_interval().is_zero() {
            return Err(ConfigError::Invalid("poll interval must be positive".into()));
        }
        if self.velocity_presets.is_empty() {
            return Err(ConfigError::Invalid("velocity_presets is empty".into()));
        }
        if let Some(v) = self.velocity_presets.iter().find(|&&v| v > MAX_VELOCITY) {
            return Err(ConfigError::Invalid(format!(
                "velocity preset {} exceeds {} um/s",
                v, MAX_VELOCITY
            )));
        }
        if self.mode == Mode::Release {
            if self.stage.port.is_empty() {
                return Err(ConfigError::Invalid("stage.port is required in release mode".into()));
            }
            if self.laser.port.is_empty() {
                return Err(ConfigError::Invalid("laser.port is required in release mode".into()));
            }
        }
        if !(MIN_FREQUENCY..=MAX_FREQUENCY).contains(&self.laser.frequency_hz) {
            return Err(ConfigError::Invalid(format!(
                "laser.frequency_hz {} out of range {}~{}",
                self.laser.frequency_hz, MIN_FREQUENCY, MAX_FREQUENCY
            )));
        }
        if !(self.homing.track_length_mm > 0.0) {
            return Err(ConfigError::Invalid("homing.track_length_mm must be positive".into()));
        }
        if !(self.limits.max_extent_um > 0.0) {
            return Err(ConfigError::Invalid("limits.max_extent_um must be positive".into()));
        }
        Ok(())
    }

    pub fn stage_serial(&self) -> SerialSettings {
        SerialSettings {
            port_name: self.stage.port.clone(),
            baud_rate: self.stage.baud,
            read_timeout: Duration::from_millis(self.stage.read_timeout_ms),
            terminator: STAGE_TERMINATOR,
            label: "stage",
        }
    }

    pub fn laser_serial(&self) -> SerialSettings {
        SerialSettings {
            port_name: self.laser.port.clone(),
            baud_rate: self.laser.baud,
            read_timeout: Duration::from_millis(self.laser.read_timeout_ms),
            terminator: LASER_TERMINATOR,
            label: "laser",
        }
    }

    pub fn executor_settings(&self) -> ExecutorSettings {
        ExecutorSettings {
            settle_margin: Duration::from_millis(self.executor.settle_margin_ms),
            primitive: self.executor.primitive,
            laser_frequency_hz: self.laser.frequency_hz,
        }
    }

    pub fn homing_settings(&self) -> HomingSettings {
        HomingSettings {
            track_length_mm: self.homing.track_length_mm,
            direction: self.homing.direction,
            poll_tick: Duration::from_millis(self.homing.poll_tick_ms),
            settle: Duration::from_millis(self.homing.settle_ms),
        }
    }

    pub fn submission_limits(&self) -> SubmissionLimits {
        SubmissionLimits {
            max_extent_um: self.limits.max_extent_um,
            primitive: self.executor.primitive,
        }
    }
}

/// Load and validate a configuration file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let mut config: Config = if is_json {
        serde_json::from_str(&content)?
    } else {
        toml::from_str(&content)?
    };
    config.apply_legacy_keys();
    config.validate()?;
    Ok(config)
}
