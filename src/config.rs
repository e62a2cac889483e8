//! stagescan configuration.
//!
//! Loaded from `~/.stagescan/config.toml`, or the file given with `--config`.
//! Every key is optional; a missing default file means all defaults.
//!
//! ```toml
//! port = "/dev/ttyUSB0"
//! baud-rate = 115200
//! data-file = "scan.csv"
//!
//! [x]
//! device = 1
//! axis = 1
//! microstep-size-um = 0.1984375
//!
//! [y]
//! device = 2
//! axis = 1
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// stagescan configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Config {
    /// Serial device the controllers are daisy-chained on.
    pub port: String,

    pub baud_rate: u32,

    pub x: AxisConfig,

    pub y: AxisConfig,

    /// How often a moving axis is polled for completion.
    pub poll_interval_ms: u64,

    /// How long a single move may take before it is treated as failed.
    pub move_timeout_s: u64,

    /// Run file: origin line, then the generated plan.
    pub data_file: PathBuf,
}

/// Address and scale of one axis.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct AxisConfig {
    pub device: u8,

    #[serde(default = "default_axis_number")]
    pub axis: u8,

    /// Distance of one microstep, in micrometres.
    #[serde(default = "default_microstep_size_um")]
    pub microstep_size_um: f64,
}

fn default_axis_number() -> u8 {
    1
}

fn default_microstep_size_um() -> f64 {
    0.198_437_5
}

impl AxisConfig {
    fn on_device(device: u8) -> Self {
        Self {
            device,
            axis: default_axis_number(),
            microstep_size_um: default_microstep_size_um(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 115_200,
            x: AxisConfig::on_device(1),
            y: AxisConfig::on_device(2),
            poll_interval_ms: 50,
            move_timeout_s: 120,
            data_file: PathBuf::from("stagescan.csv"),
        }
    }
}

impl Config {
    /// Load config from `explicit`, or from `~/.stagescan/config.toml`.
    ///
    /// An explicit path must exist. The default path may be absent,
    /// in which case defaults are used.
    pub fn load(explicit: Option<&Path>) -> Result<Self, String> {
        let (path, required) = match explicit {
            Some(path) => (path.to_path_buf(), true),
            None => match Self::path() {
                Some(path) => (path, false),
                None => return Ok(Self::default()),
            },
        };

        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound && !required => {
                tracing::debug!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(format!("failed to read {}: {e}", path.display())),
        };

        let config = Self::parse(&contents)
            .map_err(|e| format!("invalid config at {}: {e}", path.display()))?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse and validate config file contents.
    pub fn parse(contents: &str) -> Result<Self, String> {
        let config: Self = toml::from_str(contents).map_err(|e| e.to_string())?;

        if config.baud_rate == 0 {
            return Err("baud-rate must be positive".to_string());
        }
        for (name, axis) in [("x", &config.x), ("y", &config.y)] {
            if !(axis.microstep_size_um.is_finite() && axis.microstep_size_um > 0.0) {
                return Err(format!("[{name}] microstep-size-um must be positive"));
            }
        }
        if config.x.device == config.y.device && config.x.axis == config.y.axis {
            return Err("x and y must address different axes".to_string());
        }

        Ok(config)
    }

    /// The default config file path: `~/.stagescan/config.toml`.
    pub fn path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".stagescan").join("config.toml"))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn move_timeout(&self) -> Duration {
        Duration::from_secs(self.move_timeout_s)
    }
}
