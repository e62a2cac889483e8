//! Axis drivers: the blocking motion capability the core is written against.
//!
//! The core never talks to hardware directly. It drives a [`Stage`], a pair
//! of [`AxisDriver`]s, one axis at a time:
//!
//! - [`ZaberAxis`] speaks the Zaber ASCII protocol over a serial link.
//! - [`SimulatedAxis`] keeps position in memory, for dry runs and tests.

mod sim;
mod zaber;

use std::{io, time::Duration};

use crate::model::Axis;

pub use sim::{Command, SimulatedAxis};
pub use zaber::{AxisAddress, ZaberAxis, ZaberLink};

/// Errors reported by an axis while executing a command.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("communication failure: {0}")]
    Io(#[from] io::Error),

    #[error("could not open serial port: {0}")]
    Serial(#[from] serialport::Error),

    #[error("command `{command}` rejected: {reason}")]
    Rejected { command: String, reason: String },

    #[error("axis fault: {0}")]
    Fault(String),

    #[error("axis still busy after {0:?}")]
    Timeout(Duration),

    #[error("unexpected reply: {0}")]
    Protocol(String),
}

/// A driver error tagged with the axis that raised it.
#[derive(Debug, thiserror::Error)]
#[error("{axis} axis: {source}")]
pub struct AxisError {
    pub axis: Axis,
    #[source]
    pub source: DriverError,
}

pub type Result<T> = core::result::Result<T, DriverError>;

/// Blocking motion commands for one linear axis. Distances are millimetres.
///
/// Every call may block and may fail with a [`DriverError`].
pub trait AxisDriver {
    fn home(&mut self) -> Result<()>;

    fn unpark(&mut self) -> Result<()>;

    fn park(&mut self) -> Result<()>;

    fn move_relative(&mut self, delta_mm: f64) -> Result<()>;

    fn move_absolute(&mut self, position_mm: f64) -> Result<()>;

    /// Blocks until the axis reports it is no longer moving.
    fn wait_until_idle(&mut self) -> Result<()>;
}

impl<A: AxisDriver + ?Sized> AxisDriver for Box<A> {
    fn home(&mut self) -> Result<()> {
        (**self).home()
    }

    fn unpark(&mut self) -> Result<()> {
        (**self).unpark()
    }

    fn park(&mut self) -> Result<()> {
        (**self).park()
    }

    fn move_relative(&mut self, delta_mm: f64) -> Result<()> {
        (**self).move_relative(delta_mm)
    }

    fn move_absolute(&mut self, position_mm: f64) -> Result<()> {
        (**self).move_absolute(position_mm)
    }

    fn wait_until_idle(&mut self) -> Result<()> {
        (**self).wait_until_idle()
    }
}

/// A single commanded motion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Motion {
    Relative(f64),
    Absolute(f64),
}

/// The two axes of the stage, driven strictly one at a time.
pub struct Stage<A> {
    pub x: A,
    pub y: A,
}

impl<A: AxisDriver> Stage<A> {
    pub fn new(x: A, y: A) -> Self {
        Self { x, y }
    }

    pub fn axis_mut(&mut self, axis: Axis) -> &mut A {
        match axis {
            Axis::X => &mut self.x,
            Axis::Y => &mut self.y,
        }
    }

    /// Homes x, then y.
    pub fn home(&mut self) -> core::result::Result<(), AxisError> {
        for axis in [Axis::X, Axis::Y] {
            tracing::info!("Homing {axis} axis");
            self.axis_mut(axis)
                .home()
                .map_err(|source| AxisError { axis, source })?;
        }
        Ok(())
    }

    /// Runs one parked move on `axis`: unpark, move, wait until idle, park.
    ///
    /// Returns as soon as any step fails; the axis may then be left unparked.
    pub fn step(&mut self, axis: Axis, motion: Motion) -> Result<()> {
        let driver = self.axis_mut(axis);
        driver.unpark()?;
        match motion {
            Motion::Relative(delta) => driver.move_relative(delta)?,
            Motion::Absolute(position) => driver.move_absolute(position)?,
        }
        driver.wait_until_idle()?;
        driver.park()
    }
}
