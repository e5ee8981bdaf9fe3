// src/command.rs - Shape command parsing and submission checks
//
// Commands look like `rectangle, 100, 50, 500`: shape, width and height in µm,
// then an optional velocity in µm/s.
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::motion::executor::MotionPrimitive;
use crate::motion::planner::{self, Fill, Shape, Waypoint};

pub const MIN_SUBMIT_VELOCITY: i64 = 1;
/// Submissions may ask for more than the stage's own 25000 µm/s ceiling; the
/// stage driver refuses the excess when the velocity is applied.
pub const MAX_SUBMIT_VELOCITY: i64 = 100_000;
pub const DEFAULT_SUBMIT_VELOCITY: u32 = 10;
pub const MAX_RASTER_PASSES: usize = 10_000;

#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("Unknown shape: {0:?}")]
    UnknownShape(String),
    #[error("Expected 3 or 4 comma-separated fields, got {0}")]
    FieldCount(usize),
    #[error("Invalid number: {0:?}")]
    InvalidNumber(String),
    #[error("Velocity {0} out of range 1~100000")]
    VelocityOutOfRange(i64),
    #[error("Extent {0} um exceeds the stage travel")]
    ExtentOutOfRange(f64),
    #[error("Single-axis moves need a horizontal or vertical line")]
    NotAxisAligned,
    #[error("Fill only applies to rectangles")]
    FillOnLine,
    #[error("Fill would need {0} passes")]
    TooManyPasses(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Line,
    Rectangle,
}

impl FromStr for ShapeKind {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "line" => Ok(ShapeKind::Line),
            "rectangle" | "rect" => Ok(ShapeKind::Rectangle),
            other => Err(CommandError::UnknownShape(other.to_string())),
        }
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeKind::Line => write!(f, "line"),
            ShapeKind::Rectangle => write!(f, "rectangle"),
        }
    }
}

/// Bounds a submission is checked against.
#[derive(Debug, Clone)]
pub struct SubmissionLimits {
    pub max_extent_um: f64,
    pub primitive: MotionPrimitive,
}

impl Default for SubmissionLimits {
    fn default() -> Self {
        Self {
            max_extent_um: 50_000.0,
            primitive: MotionPrimitive::Line,
        }
    }
}

/// A validated shape and velocity, ready for the planner.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeRequest {
    pub shape: Shape,
    pub velocity: u32,
}

impl ShapeRequest {
    pub fn new(
        kind: ShapeKind,
        x: f64,
        y: f64,
        velocity: i64,
        fill: Option<Fill>,
        limits: &SubmissionLimits,
    ) -> Result<Self, CommandError> {
        if !(MIN_SUBMIT_VELOCITY..=MAX_SUBMIT_VELOCITY).contains(&velocity) {
            return Err(CommandError::VelocityOutOfRange(velocity));
        }
        for extent in [x, y] {
            if !extent.is_finite() || extent.abs() > limits.max_extent_um {
                return Err(CommandError::ExtentOutOfRange(extent));
            }
        }
        let shape = match kind {
            ShapeKind::Line => {
                if fill.is_some() {
                    return Err(CommandError::FillOnLine);
                }
                if limits.primitive == MotionPrimitive::SingleAxis && x != 0.0 && y != 0.0 {
                    return Err(CommandError::NotAxisAligned);
                }
                Shape::Line { x, y }
            }
            ShapeKind::Rectangle => {
                if let Some(fill) = &fill {
                    if let Some(passes) = planner::raster_passes(x, y, fill) {
                        if passes > MAX_RASTER_PASSES {
                            return Err(CommandError::TooManyPasses(passes));
                        }
                    }
                }
                Shape::Rectangle { x, y, fill }
            }
        };
        Ok(Self {
            shape,
            velocity: velocity as u32,
        })
    }

    /// Parse `<shape>, <x>, <y>[, <velocity>]`.
    pub fn parse(text: &str, fill: Option<Fill>, limits: &SubmissionLimits) -> Result<Self, CommandError> {
        let fields: Vec<&str> = text.split(',').map(str::trim).collect();
        if !(3..=4).contains(&fields.len()) {
            return Err(CommandError::FieldCount(fields.len()));
        }
        let kind: ShapeKind = fields[0].parse()?;
        let x = parse_number::<f64>(fields[1])?;
        let y = parse_number::<f64>(fields[2])?;
        let velocity = match fields.get(3) {
            Some(field) => parse_number::<i64>(field)?,
            None => i64::from(DEFAULT_SUBMIT_VELOCITY),
        };
        Self::new(kind, x, y, velocity, fill, limits)
    }

    pub fn plan(&self) -> Vec<Waypoint> {
        planner::plan(&self.shape, self.velocity)
    }

    pub fn kind(&self) -> ShapeKind {
        match self.shape {
            Shape::Line { .. } => ShapeKind::Line,
            Shape::Rectangle { .. } => ShapeKind::Rectangle,
        }
    }
}

impl fmt::Display for ShapeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (x, y) = match self.shape {
            Shape::Line { x, y } | Shape::Rectangle { x, y, .. } => (x, y),
        };
        write!(f, "{} x: {} um, y: {} um at {} um/s", self.kind(), x, y, self.velocity)?;
        if let Shape::Rectangle { fill: Some(fill), .. } = self.shape {
            write!(f, ", {:?} fill every {} um", fill.direction, fill.interval)?;
        }
        Ok(())
    }
}

fn parse_number<T: FromStr>(field: &str) -> Result<T, CommandError> {
    field
        .parse()
        .map_err(|_| CommandError::InvalidNumber(field.to_string()))
}
