// src/motion/planner.rs - Shape to waypoint expansion
//
// Pure and deterministic: the same shape and velocity always give the same
// waypoints. Distances are micrometers, velocities µm/s, delays seconds.
// The stage's positive Y points physically down, so shape heights are negated.
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Rasters needing more passes than this plan to nothing.
pub const MAX_PLANNED_PASSES: usize = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillDirection {
    /// Passes run along Y, stepping along X.
    Vertical,
    /// Passes run along X, stepping along Y.
    Horizontal,
}

/// Raster fill settings for a rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fill {
    pub interval: f64,
    pub direction: FillDirection,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Line { x: f64, y: f64 },
    Rectangle { x: f64, y: f64, fill: Option<Fill> },
}

/// One motion segment.
///
/// `dx`/`dy` are offsets from the position the path started at, not from the
/// previous waypoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Waypoint {
    pub dx: f64,
    pub dy: f64,
    /// Travel time of the segment in seconds.
    pub delay: f64,
    pub laser_on: bool,
}

impl Waypoint {
    pub fn delay_duration(&self) -> Duration {
        Duration::from_secs_f64(self.delay.max(0.0))
    }
}

/// Expand `shape` into waypoints traversed at `velocity`.
///
/// A zero velocity or a non-positive fill interval yields an empty plan.
pub fn plan(shape: &Shape, velocity: u32) -> Vec<Waypoint> {
    if velocity == 0 {
        return Vec::new();
    }
    let v = f64::from(velocity);
    match *shape {
        Shape::Line { x, y } => vec![Waypoint {
            dx: x,
            dy: -y,
            delay: x.abs().max(y.abs()) / v,
            laser_on: true,
        }],
        Shape::Rectangle { x, y, fill: None } => outline(x, y, v),
        Shape::Rectangle { x, y, fill: Some(fill) } => raster(x, y, fill, v),
    }
}

fn outline(x: f64, y: f64, v: f64) -> Vec<Waypoint> {
    let corners = [(x, 0.0), (x, -y), (0.0, -y), (0.0, 0.0)];
    let edges = [x.abs(), y.abs(), x.abs(), y.abs()];
    corners
        .iter()
        .zip(edges)
        .map(|(&(dx, dy), edge)| Waypoint {
            dx,
            dy,
            delay: edge / v,
            laser_on: true,
        })
        .collect()
}

/// Serpentine fill: emitting passes across the rectangle alternate with dark
/// steps of one interval to the next pass.
fn raster(x: f64, y: f64, fill: Fill, v: f64) -> Vec<Waypoint> {
    let d = fill.interval;
    let Some(passes) = raster_passes(x, y, &fill) else {
        return Vec::new();
    };
    if passes > MAX_PLANNED_PASSES {
        tracing::warn!("Raster needs {} passes, planning nothing", passes);
        return Vec::new();
    }
    let sweep = match fill.direction {
        FillDirection::Vertical => y.abs(),
        FillDirection::Horizontal => x.abs(),
    };
    let count = 2 * passes;

    (1..=count)
        .map(|i| {
            let across = d * (i / 2) as f64;
            let far_side = matches!(i % 4, 1 | 2);
            let (dx, dy) = match fill.direction {
                FillDirection::Vertical => (across * x.signum(), if far_side { -y } else { 0.0 }),
                FillDirection::Horizontal => (if far_side { x } else { 0.0 }, -across * y.signum()),
            };
            let laser_on = i % 2 == 1;
            Waypoint {
                dx,
                dy,
                delay: if laser_on { sweep / v } else { d / v },
                laser_on,
            }
        })
        .collect()
}

/// Sum of segment delays in seconds, without any settle margin.
pub fn travel_time(waypoints: &[Waypoint]) -> f64 {
    waypoints.iter().map(|w| w.delay).sum()
}

/// Number of raster passes a fill would produce, or `None` when the
/// interval is not positive. Saturates at `usize::MAX`.
pub fn raster_passes(x: f64, y: f64, fill: &Fill) -> Option<usize> {
    // Also rejects NaN.
    if !(fill.interval > 0.0) {
        return None;
    }
    let extent = match fill.direction {
        FillDirection::Vertical => x.abs(),
        FillDirection::Horizontal => y.abs(),
    };
    let passes = (extent / fill.interval).floor() + 1.0;
    if passes.is_nan() {
        return None;
    }
    // Float to int casts saturate.
    Some(passes as usize)
}
