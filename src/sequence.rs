//! Waypoint playback.
//!
//! The sequencer walks waypoints strictly one at a time. Each waypoint goes
//! through the same phases:
//!
//! ```text
//! Idle -> MovingX -> MovingY -> Dwelling -> Logged -> Idle
//! ```
//!
//! Axes are moved one after the other, never together. Dwelling and waiting
//! for an axis to settle are the only places execution blocks.
//!
//! Failure policy:
//! - a stored line that does not parse is reported and skipped;
//! - an axis error ends the run, and the failing waypoint is not logged;
//! - a storage error ends the run.

use std::{fmt, thread, time::Duration};

use jiff::{Zoned, civil::DateTime};

use crate::driver::{AxisDriver, DriverError, Motion, Stage};
use crate::model::{Axis, Plan, VisitRecord, Waypoint};
use crate::storage::{MalformedRecord, ReadError, StorageError, VisitLog};

/// Source of wall-clock time and of blocking waits.
pub trait Clock {
    /// Current local time, truncated to whole seconds.
    fn now(&self) -> DateTime;

    fn sleep(&mut self, duration: Duration);
}

/// The real clock: local wall time and `thread::sleep`.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime {
        let now = Zoned::now().datetime();
        now.date().at(now.hour(), now.minute(), now.second(), 0)
    }

    fn sleep(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Where the sequencer is within the current waypoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    MovingX,
    MovingY,
    Dwelling,
    Logged,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::MovingX => "moving x",
            Self::MovingY => "moving y",
            Self::Dwelling => "dwelling",
            Self::Logged => "logging",
        })
    }
}

/// Errors that end a run.
#[derive(Debug, thiserror::Error)]
pub enum SequenceError {
    #[error("waypoint {index}: {axis} axis failed while {phase}: {source}")]
    Driver {
        index: usize,
        phase: Phase,
        axis: Axis,
        #[source]
        source: DriverError,
    },

    #[error("waypoint {index}: could not log visit: {source}")]
    Log {
        index: usize,
        #[source]
        source: StorageError,
    },

    #[error("could not read waypoints: {0}")]
    Read(#[source] StorageError),
}

/// What a run got through.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Waypoints reached, dwelt at, and logged.
    pub visited: usize,

    /// Stored lines skipped because they did not parse, in input order.
    pub skipped: Vec<MalformedRecord>,
}

/// Drives a stage through waypoints and logs each visit.
pub struct Sequencer<'a, A, C, L> {
    stage: &'a mut Stage<A>,
    clock: &'a mut C,
    log: &'a mut L,
    phase: Phase,
    last_visit: Option<DateTime>,
    report: RunReport,
}

impl<'a, A, C, L> Sequencer<'a, A, C, L>
where
    A: AxisDriver,
    C: Clock,
    L: VisitLog,
{
    pub fn new(stage: &'a mut Stage<A>, clock: &'a mut C, log: &'a mut L) -> Self {
        Self {
            stage,
            clock,
            log,
            phase: Phase::Idle,
            last_visit: None,
            report: RunReport::default(),
        }
    }

    /// The phase the sequencer is in, or failed in.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Plays a freshly generated plan.
    pub fn run_plan(&mut self, plan: &Plan) -> Result<(), SequenceError> {
        tracing::info!("Running plan of {} waypoints", plan.len());
        for (n, waypoint) in plan.iter().enumerate() {
            self.visit(n + 1, waypoint)?;
        }
        Ok(())
    }

    /// Plays waypoints read from storage, skipping lines that do not parse.
    pub fn run_records<I>(&mut self, records: I) -> Result<(), SequenceError>
    where
        I: IntoIterator<Item = Result<Waypoint, ReadError>>,
    {
        let mut index = 0;
        for record in records {
            match record {
                Ok(waypoint) => {
                    index += 1;
                    self.visit(index, &waypoint)?;
                }
                Err(ReadError::Malformed(malformed)) => {
                    tracing::warn!("Skipping {malformed}");
                    self.report.skipped.push(malformed);
                }
                Err(ReadError::Storage(source)) => return Err(SequenceError::Read(source)),
            }
        }
        Ok(())
    }

    /// Moves to, dwells at, and logs one waypoint.
    pub fn visit(&mut self, index: usize, waypoint: &Waypoint) -> Result<VisitRecord, SequenceError> {
        self.enter(Phase::MovingX);
        self.move_axis(index, Axis::X, waypoint.x_mm)?;

        self.enter(Phase::MovingY);
        self.move_axis(index, Axis::Y, waypoint.y_mm)?;

        self.enter(Phase::Dwelling);
        self.clock.sleep(waypoint.dwell());

        self.enter(Phase::Logged);
        let visit = VisitRecord::new(waypoint, self.visit_time());
        self.log
            .append(&visit)
            .map_err(|source| SequenceError::Log { index, source })?;
        self.report.visited += 1;
        tracing::info!(
            "Moved to X: {}, Y: {} and waited for {} s at {}",
            visit.x_mm,
            visit.y_mm,
            visit.dwell_s,
            visit.timestamp()
        );

        self.enter(Phase::Idle);
        Ok(visit)
    }

    /// Ends the run, returning what it got through.
    pub fn finish(self) -> RunReport {
        self.report
    }

    fn enter(&mut self, phase: Phase) {
        tracing::debug!("{} -> {}", self.phase, phase);
        self.phase = phase;
    }

    fn move_axis(&mut self, index: usize, axis: Axis, position_mm: f64) -> Result<(), SequenceError> {
        self.stage
            .step(axis, Motion::Absolute(position_mm))
            .map_err(|source| {
                tracing::error!("{axis} axis failed at waypoint {index}: {source}");
                SequenceError::Driver {
                    index,
                    phase: self.phase,
                    axis,
                    source,
                }
            })
    }

    /// Wall-clock time, never earlier than the previous visit in this run.
    fn visit_time(&mut self) -> DateTime {
        let now = self.clock.now();
        let at = self.last_visit.map_or(now, |last| last.max(now));
        self.last_visit = Some(at);
        at
    }
}
