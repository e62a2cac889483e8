//! In-memory axis for dry runs and tests.

use super::{AxisDriver, DriverError, Result};

/// A command received by a [`SimulatedAxis`], in arrival order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Home,
    Unpark,
    Park,
    MoveRelative(f64),
    MoveAbsolute(f64),
    WaitUntilIdle,
}

/// An axis that moves instantly and remembers every command it was sent.
///
/// Mirrors the controller's parking rules: a parked axis rejects moves.
/// Faults can be injected to exercise error paths.
#[derive(Debug, Default)]
pub struct SimulatedAxis {
    position_mm: f64,
    parked: bool,
    moves: usize,
    fail_after: Option<usize>,
    fail_home: bool,
    journal: Vec<Command>,
}

impl SimulatedAxis {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lets `moves` moves succeed, then reports a stall on every move after.
    #[must_use]
    pub fn failing_after(mut self, moves: usize) -> Self {
        self.fail_after = Some(moves);
        self
    }

    /// Makes homing fail.
    #[must_use]
    pub fn failing_home(mut self) -> Self {
        self.fail_home = true;
        self
    }

    pub fn position(&self) -> f64 {
        self.position_mm
    }

    pub fn is_parked(&self) -> bool {
        self.parked
    }

    pub fn journal(&self) -> &[Command] {
        &self.journal
    }

    fn start_move(&mut self, command: Command, target_mm: f64) -> Result<()> {
        self.journal.push(command);
        if self.parked {
            return Err(DriverError::Rejected {
                command: format!("{command:?}"),
                reason: "PARKED".to_string(),
            });
        }
        if self.fail_after.is_some_and(|limit| self.moves >= limit) {
            return Err(DriverError::Fault("FS: stalled and stopped".to_string()));
        }
        self.moves += 1;
        self.position_mm = target_mm;
        tracing::trace!(position_mm = target_mm, "simulated move");
        Ok(())
    }
}

impl AxisDriver for SimulatedAxis {
    fn home(&mut self) -> Result<()> {
        self.journal.push(Command::Home);
        if self.fail_home {
            return Err(DriverError::Fault("FQ: encoder error".to_string()));
        }
        self.position_mm = 0.0;
        self.parked = false;
        Ok(())
    }

    fn unpark(&mut self) -> Result<()> {
        self.journal.push(Command::Unpark);
        self.parked = false;
        Ok(())
    }

    fn park(&mut self) -> Result<()> {
        self.journal.push(Command::Park);
        self.parked = true;
        Ok(())
    }

    fn move_relative(&mut self, delta_mm: f64) -> Result<()> {
        let target = self.position_mm + delta_mm;
        self.start_move(Command::MoveRelative(delta_mm), target)
    }

    fn move_absolute(&mut self, position_mm: f64) -> Result<()> {
        self.start_move(Command::MoveAbsolute(position_mm), position_mm)
    }

    fn wait_until_idle(&mut self) -> Result<()> {
        self.journal.push(Command::WaitUntilIdle);
        Ok(())
    }
}
