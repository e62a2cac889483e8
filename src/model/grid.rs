//! Grid parameters, waypoints, and plans.

use std::time::Duration;

/// Grid parameters rejected before any hardware is touched.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GridError {
    #[error("{name} must not be negative (got {value})")]
    Negative { name: &'static str, value: f64 },

    #[error("{name} must be a finite number (got {value})")]
    NotFinite { name: &'static str, value: f64 },

    #[error("{name} is too large (got {value})")]
    TooLarge { name: &'static str, value: i64 },
}

/// Largest plan a grid may expand to.
pub const MAX_WAYPOINTS: u64 = 10_000_000;

/// User-supplied description of a rectangular raster.
///
/// Construct with [`GridSpec::new`], which rejects negative or non-finite input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
    pub x_steps: u32,
    pub y_steps: u32,
    pub x_step_size_mm: f64,
    pub y_step_size_mm: f64,
    pub dwell_s: u64,
}

impl GridSpec {
    /// Validates raw operator input and builds a grid.
    ///
    /// Arguments follow the order the operator enters them in.
    pub fn new(
        x_steps: i64,
        x_step_size_mm: f64,
        y_steps: i64,
        y_step_size_mm: f64,
        dwell_s: i64,
    ) -> Result<Self, GridError> {
        let x_steps = count("x steps", x_steps)?;
        let y_steps = count("y steps", y_steps)?;
        let total = u64::from(x_steps) * u64::from(y_steps);
        if total > MAX_WAYPOINTS {
            return Err(GridError::TooLarge {
                name: "waypoint count",
                value: i64::try_from(total).unwrap_or(i64::MAX),
            });
        }
        Ok(Self {
            x_steps,
            y_steps,
            x_step_size_mm: size("x step size", x_step_size_mm)?,
            y_step_size_mm: size("y step size", y_step_size_mm)?,
            dwell_s: u64::try_from(dwell_s).map_err(|_| GridError::Negative {
                name: "dwell time",
                value: dwell_s as f64,
            })?,
        })
    }

    /// Number of waypoints this grid expands to.
    pub fn len(&self) -> usize {
        self.x_steps as usize * self.y_steps as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn count(name: &'static str, value: i64) -> Result<u32, GridError> {
    if value < 0 {
        return Err(GridError::Negative {
            name,
            value: value as f64,
        });
    }
    u32::try_from(value).map_err(|_| GridError::TooLarge { name, value })
}

fn size(name: &'static str, value: f64) -> Result<f64, GridError> {
    if !value.is_finite() {
        return Err(GridError::NotFinite { name, value });
    }
    if value < 0.0 {
        return Err(GridError::Negative { name, value });
    }
    Ok(value)
}

/// One absolute target position plus how long to stay there.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waypoint {
    pub x_mm: f64,
    pub y_mm: f64,
    pub dwell_s: u64,
}

impl Waypoint {
    pub fn new(x_mm: f64, y_mm: f64, dwell_s: u64) -> Self {
        Self {
            x_mm,
            y_mm,
            dwell_s,
        }
    }

    pub fn dwell(&self) -> Duration {
        Duration::from_secs(self.dwell_s)
    }
}

/// Ordered waypoints in row-major raster order.
///
/// Order is significant: it is preserved from generation through
/// persistence to playback.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Plan {
    waypoints: Vec<Waypoint>,
}

impl Plan {
    pub fn new(waypoints: Vec<Waypoint>) -> Self {
        Self { waypoints }
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Waypoint> {
        self.waypoints.iter()
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }
}

impl<'a> IntoIterator for &'a Plan {
    type Item = &'a Waypoint;
    type IntoIter = std::slice::Iter<'a, Waypoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
