//! Zaber ASCII protocol over a serial link.
//!
//! Commands are single lines addressed to a device and axis:
//!
//! ```text
//! /1 1 move abs 50394
//! @01 1 OK BUSY -- 0
//! ```
//!
//! Replies carry an `OK`/`RJ` flag, the axis status (`IDLE`/`BUSY`), the
//! highest-priority warning flag (`--` when clear), and a data field.
//! Alerts (`!`) and info lines (`#`) may be interleaved and are skipped.
//!
//! Both axes of a stage usually share one link, so [`ZaberAxis`] holds it
//! through `Rc<RefCell<_>>`: access is single-threaded and strictly sequential.

use std::{
    cell::RefCell,
    io::{self, BufRead, BufReader, Read, Write},
    rc::Rc,
    thread,
    time::{Duration, Instant},
};

use serialport::SerialPort;

use super::{AxisDriver, DriverError, Result};

/// How long a single reply may take before the link is considered dead.
const REPLY_TIMEOUT: Duration = Duration::from_millis(500);

/// Where an axis lives on the daisy chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisAddress {
    pub device: u8,
    pub axis: u8,
}

/// A parsed `@` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Reply {
    device: u8,
    axis: u8,
    accepted: bool,
    busy: bool,
    warning: String,
    data: String,
}

impl Reply {
    fn parse(line: &str) -> Result<Self> {
        let protocol = || DriverError::Protocol(line.to_string());

        let mut fields = line.split_whitespace();
        let device = fields
            .next()
            .and_then(|f| f.strip_prefix('@'))
            .and_then(|f| f.parse().ok())
            .ok_or_else(protocol)?;
        let axis = fields
            .next()
            .and_then(|f| f.parse().ok())
            .ok_or_else(protocol)?;
        let accepted = match fields.next() {
            Some("OK") => true,
            Some("RJ") => false,
            _ => return Err(protocol()),
        };
        let busy = match fields.next() {
            Some("BUSY") => true,
            Some("IDLE") => false,
            _ => return Err(protocol()),
        };
        let warning = fields.next().ok_or_else(protocol)?.to_string();
        let data = fields.collect::<Vec<_>>().join(" ");

        Ok(Self {
            device,
            axis,
            accepted,
            busy,
            warning,
            data,
        })
    }

    /// Warning flags starting with `F` are faults (stall, limit, encoder).
    fn fault(&self) -> Option<&str> {
        self.warning.starts_with('F').then_some(self.warning.as_str())
    }
}

/// A line-oriented connection to a chain of Zaber devices.
pub struct ZaberLink<T> {
    port: BufReader<T>,
}

impl ZaberLink<Box<dyn SerialPort>> {
    /// Opens a serial port at the given baud rate.
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .timeout(REPLY_TIMEOUT)
            .open()?;
        tracing::info!("Opened {path} at {baud_rate} baud");
        Ok(Self::new(port))
    }
}

impl<T: Read + Write> ZaberLink<T> {
    pub fn new(transport: T) -> Self {
        Self {
            port: BufReader::new(transport),
        }
    }

    /// Sends `command` to one axis and returns that axis's reply.
    fn send(&mut self, address: AxisAddress, command: &str) -> Result<Reply> {
        let line = if command.is_empty() {
            format!("/{} {}\n", address.device, address.axis)
        } else {
            format!("/{} {} {command}\n", address.device, address.axis)
        };
        tracing::debug!("-> {}", line.trim_end());
        let port = self.port.get_mut();
        port.write_all(line.as_bytes())?;
        port.flush()?;

        loop {
            let mut reply = String::new();
            if self.port.read_line(&mut reply)? == 0 {
                return Err(DriverError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed",
                )));
            }
            let reply = reply.trim();
            tracing::debug!("<- {reply}");
            if !reply.starts_with('@') {
                continue;
            }
            let reply = Reply::parse(reply)?;
            if reply.device == address.device && reply.axis == address.axis {
                return Ok(reply);
            }
        }
    }
}

/// One axis of a Zaber device.
pub struct ZaberAxis<T> {
    link: Rc<RefCell<ZaberLink<T>>>,
    address: AxisAddress,
    microstep_um: f64,
    poll_interval: Duration,
    move_timeout: Duration,
}

impl<T: Read + Write> ZaberAxis<T> {
    pub fn new(
        link: Rc<RefCell<ZaberLink<T>>>,
        address: AxisAddress,
        microstep_um: f64,
        poll_interval: Duration,
        move_timeout: Duration,
    ) -> Self {
        Self {
            link,
            address,
            microstep_um,
            poll_interval,
            move_timeout,
        }
    }

    /// Confirms the axis answers a status query.
    pub fn ping(&mut self) -> Result<()> {
        self.command("").map(drop)
    }

    fn microsteps(&self, mm: f64) -> i64 {
        (mm * 1000.0 / self.microstep_um).round() as i64
    }

    fn command(&mut self, command: &str) -> Result<Reply> {
        let reply = self.link.borrow_mut().send(self.address, command)?;
        if !reply.accepted {
            return Err(DriverError::Rejected {
                command: command.to_string(),
                reason: reply.data,
            });
        }
        if let Some(flag) = reply.fault() {
            return Err(DriverError::Fault(flag.to_string()));
        }
        Ok(reply)
    }
}

impl<T: Read + Write> AxisDriver for ZaberAxis<T> {
    fn home(&mut self) -> Result<()> {
        self.command("home")?;
        self.wait_until_idle()
    }

    fn unpark(&mut self) -> Result<()> {
        self.command("tools parking unpark").map(drop)
    }

    fn park(&mut self) -> Result<()> {
        self.command("tools parking park").map(drop)
    }

    fn move_relative(&mut self, delta_mm: f64) -> Result<()> {
        let steps = self.microsteps(delta_mm);
        self.command(&format!("move rel {steps}")).map(drop)
    }

    fn move_absolute(&mut self, position_mm: f64) -> Result<()> {
        let steps = self.microsteps(position_mm);
        self.command(&format!("move abs {steps}")).map(drop)
    }

    fn wait_until_idle(&mut self) -> Result<()> {
        let started = Instant::now();
        loop {
            if !self.command("")?.busy {
                return Ok(());
            }
            if started.elapsed() >= self.move_timeout {
                return Err(DriverError::Timeout(self.move_timeout));
            }
            thread::sleep(self.poll_interval);
        }
    }
}
