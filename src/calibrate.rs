//! Origin calibration: jog each axis until the operator is happy with zero.
//!
//! Each axis is calibrated on its own, x fully before y. The operator supplies
//! a stream of signed relative distances in millimetres; every non-zero
//! distance is executed as a parked jog and folded into that axis's running
//! total. A `0` ends the axis and its total becomes the origin coordinate.
//! The stream ending early is treated the same as the sentinel.

use std::iter;

use crate::driver::{AxisDriver, AxisError, Motion, Stage};
use crate::model::{Axis, Origin};

/// Jog distance that ends calibration for the current axis.
pub const SENTINEL: f64 = 0.0;

/// Supplies jog distances, asked for one axis at a time.
///
/// `None` means no more input for that axis.
pub trait JogSource {
    fn next_jog(&mut self, axis: Axis) -> Option<f64>;
}

/// A pair of scripted sequences, one per axis.
impl<X, Y> JogSource for (X, Y)
where
    X: Iterator<Item = f64>,
    Y: Iterator<Item = f64>,
{
    fn next_jog(&mut self, axis: Axis) -> Option<f64> {
        match axis {
            Axis::X => self.0.next(),
            Axis::Y => self.1.next(),
        }
    }
}

/// Calibrates x, then y, returning the accumulated origin.
///
/// A driver error aborts immediately, before any further jog is read.
pub fn calibrate<A, S>(stage: &mut Stage<A>, jogs: &mut S) -> Result<Origin, AxisError>
where
    A: AxisDriver,
    S: JogSource,
{
    let x0 = calibrate_axis(stage, Axis::X, iter::from_fn(|| jogs.next_jog(Axis::X)))?;
    let y0 = calibrate_axis(stage, Axis::Y, iter::from_fn(|| jogs.next_jog(Axis::Y)))?;
    let origin = Origin::new(x0, y0);
    tracing::info!("Origin calibrated at {origin}");
    Ok(origin)
}

/// Folds jogs on one axis until the sentinel, returning the total distance moved.
pub fn calibrate_axis<A, I>(stage: &mut Stage<A>, axis: Axis, jogs: I) -> Result<f64, AxisError>
where
    A: AxisDriver,
    I: IntoIterator<Item = f64>,
{
    jogs.into_iter()
        .take_while(|&delta| delta != SENTINEL)
        .try_fold(0.0, |offset, delta| {
            stage
                .step(axis, Motion::Relative(delta))
                .map_err(|source| AxisError { axis, source })?;
            let offset = offset + delta;
            tracing::info!("{axis} offset now {offset} mm");
            Ok(offset)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::Cell;

    use crate::driver::{Command, DriverError, SimulatedAxis};

    fn stage() -> Stage<SimulatedAxis> {
        Stage::new(SimulatedAxis::new(), SimulatedAxis::new())
    }

    #[test]
    fn accumulates_until_sentinel() {
        let mut stage = stage();
        let x0 = calibrate_axis(&mut stage, Axis::X, [5.0, -2.0, 0.0]).unwrap();

        assert_eq!(x0, 3.0);
        assert_eq!(stage.x.position(), 3.0);
        assert!(stage.x.is_parked());
    }

    #[test]
    fn immediate_sentinel_yields_zero_without_motion() {
        let mut stage = stage();
        let x0 = calibrate_axis(&mut stage, Axis::X, [0.0]).unwrap();

        assert_eq!(x0, 0.0);
        assert!(stage.x.journal().is_empty());
    }

    #[test]
    fn input_after_sentinel_is_ignored() {
        let mut stage = stage();
        let x0 = calibrate_axis(&mut stage, Axis::X, [1.5, 0.0, 9.0]).unwrap();
        assert_eq!(x0, 1.5);
    }

    #[test]
    fn exhausted_input_ends_axis() {
        let mut stage = stage();
        let x0 = calibrate_axis(&mut stage, Axis::X, [2.0, 2.0]).unwrap();
        assert_eq!(x0, 4.0);
    }

    #[test]
    fn calibrates_x_before_y() {
        let mut stage = stage();
        let mut jogs = ([10.0, 0.0].into_iter(), [4.0, 1.0, 0.0].into_iter());
        let origin = calibrate(&mut stage, &mut jogs).unwrap();

        assert_eq!(origin, Origin::new(10.0, 5.0));
        assert_eq!(
            stage.y.journal().iter().filter(|c| **c == Command::Park).count(),
            2
        );
    }

    #[test]
    fn each_jog_is_a_parked_relative_move() {
        let mut stage = stage();
        calibrate_axis(&mut stage, Axis::Y, [-1.0, 0.0]).unwrap();

        assert_eq!(
            stage.y.journal(),
            &[
                Command::Unpark,
                Command::MoveRelative(-1.0),
                Command::WaitUntilIdle,
                Command::Park,
            ]
        );
    }

    #[test]
    fn driver_error_stops_reading_input() {
        let mut stage = Stage::new(SimulatedAxis::new().failing_after(1), SimulatedAxis::new());
        let read = Cell::new(0);
        let jogs = [1.0, 2.0, 3.0, 0.0].into_iter().inspect(|_| read.set(read.get() + 1));

        let err = calibrate(&mut stage, &mut (jogs, [7.0, 0.0].into_iter())).unwrap_err();

        assert_eq!(err.axis, Axis::X);
        assert!(matches!(err.source, DriverError::Fault(_)));
        assert_eq!(read.get(), 2);
        assert!(stage.y.journal().is_empty());
    }
}
