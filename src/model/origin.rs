//! Origin: the calibrated zero reference for both axes.

use std::fmt;

/// One linear degree of freedom of the stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X => f.write_str("x"),
            Self::Y => f.write_str("y"),
        }
    }
}

/// Absolute position of the calibrated zero, in millimetres,
/// measured from wherever the stage homed at power-on.
///
/// Produced once per run by calibration and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Origin {
    pub x0: f64,
    pub y0: f64,
}

impl Origin {
    pub fn new(x0: f64, y0: f64) -> Self {
        Self { x0, y0 }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} mm, {} mm)", self.x0, self.y0)
    }
}
