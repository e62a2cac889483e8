//! CLI interface for stagescan.
//!
//! Two commands:
//!
//! - `stagescan run`: the bench session: home, calibrate the origin, then
//!   either generate and run a grid plan or replay a stored file.
//! - `stagescan plan`: write a grid plan offline, no hardware needed.
//!
//! `run` prompts for anything not given as a flag, so a session can be
//! driven entirely by hand or scripted down to the calibration jogs.

mod format;
mod prompt;

use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::str::FromStr;

use clap::{Args, Parser, Subcommand};

use crate::calibrate;
use crate::config::{AxisConfig, Config};
use crate::driver::{AxisAddress, AxisDriver, SimulatedAxis, Stage, ZaberAxis, ZaberLink};
use crate::model::{Axis, GridSpec, Origin};
use crate::plan;
use crate::sequence::{SequenceError, Sequencer, SystemClock};
use crate::storage::{self, CsvVisitLog, RunFile};

use format::{format_grid, format_report};
use prompt::Prompter;

/// stagescan: raster a two-axis stage over a grid and log every stop.
#[derive(Debug, Parser)]
#[command(name = "stagescan", version, after_long_help = WORKFLOW_HELP)]
pub struct Cli {
    /// Config file (default: `~/.stagescan/config.toml`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log debug detail, including serial traffic.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

const WORKFLOW_HELP: &str = r"Workflow: scanning a 10 x 5 grid
  1. stagescan run --mode 1
     → homes both axes, then asks for jogs until the stage sits at the origin
  2. enter x_steps, x step size, y_steps, y step size, and dwell when asked
     → the origin and plan are written to the data file, then played
  3. every stop is appended to <data>.visits.csv with its timestamp

Replay a stored plan or an earlier visit log:
  stagescan run --mode 2 --plan scan.csv

Dry run without hardware:
  stagescan run --simulate --mode 1 --x-steps 10 --x-step-size 0.5 \
      --y-steps 5 --y-step-size 0.5 --dwell 0

Offline planning:
  stagescan plan --x0 12 --y0 3 --x-steps 10 --x-step-size 0.5 \
      --y-steps 5 --y-step-size 0.5 --dwell 2 --out scan.csv";

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Home, calibrate the origin, then run a plan.
    ///
    /// Mode 1 generates a grid plan from the calibrated origin, saves it
    /// after the origin line in the data file, and runs it.
    /// Mode 2 runs the waypoints of an existing plan or visit log.
    /// Visits are appended to `<source>.visits.csv`.
    Run(RunArgs),

    /// Write a grid plan without touching hardware.
    ///
    /// Output is the origin line followed by one line per waypoint,
    /// ready for `run --mode 2`.
    Plan(PlanArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Use an in-memory stage instead of the serial link.
    #[arg(long)]
    simulate: bool,

    /// Serial device (overrides config).
    #[arg(long)]
    port: Option<String>,

    /// Run file for the origin and generated plan (overrides config).
    #[arg(long)]
    data: Option<PathBuf>,

    /// 1 = generate a grid plan and run it, 2 = run an existing file.
    #[arg(long)]
    mode: Option<Mode>,

    /// File to run in mode 2.
    #[arg(long)]
    plan: Option<PathBuf>,

    #[command(flatten)]
    grid: GridArgs,
}

/// Grid flags for `run`; any left out are prompted for.
#[derive(Debug, Args)]
struct GridArgs {
    /// Number of positions along x.
    #[arg(long, allow_hyphen_values = true)]
    x_steps: Option<i64>,

    /// Distance between x positions, in mm.
    #[arg(long, allow_hyphen_values = true)]
    x_step_size: Option<f64>,

    /// Number of positions along y.
    #[arg(long, allow_hyphen_values = true)]
    y_steps: Option<i64>,

    /// Distance between y positions, in mm.
    #[arg(long, allow_hyphen_values = true)]
    y_step_size: Option<f64>,

    /// Seconds to stay at each position.
    #[arg(long, allow_hyphen_values = true)]
    dwell: Option<i64>,
}

impl GridArgs {
    /// The grid, if every flag was given.
    fn preset(&self) -> Option<Result<GridSpec, String>> {
        Some(
            GridSpec::new(
                self.x_steps?,
                self.x_step_size?,
                self.y_steps?,
                self.y_step_size?,
                self.dwell?,
            )
            .map_err(|e| format!("invalid grid: {e}")),
        )
    }

    /// Prompts for whichever values were not given as flags.
    fn complete<R: io::BufRead, W: io::Write>(
        &self,
        prompter: &mut Prompter<R, W>,
    ) -> Result<GridSpec, String> {
        let x_steps = match self.x_steps {
            Some(v) => v,
            None => prompter.number("Enter the number of steps in x direction: ")?,
        };
        let x_step_size = match self.x_step_size {
            Some(v) => v,
            None => prompter.number("Enter the step size in x direction (mm): ")?,
        };
        let y_steps = match self.y_steps {
            Some(v) => v,
            None => prompter.number("Enter the number of steps in y direction: ")?,
        };
        let y_step_size = match self.y_step_size {
            Some(v) => v,
            None => prompter.number("Enter the step size in y direction (mm): ")?,
        };
        let dwell = match self.dwell {
            Some(v) => v,
            None => prompter.number("Enter the stay time at each position (s): ")?,
        };
        GridSpec::new(x_steps, x_step_size, y_steps, y_step_size, dwell)
            .map_err(|e| format!("invalid grid: {e}"))
    }
}

#[derive(Debug, Args)]
pub struct PlanArgs {
    /// Origin x, in mm.
    #[arg(long, allow_hyphen_values = true)]
    x0: f64,

    /// Origin y, in mm.
    #[arg(long, allow_hyphen_values = true)]
    y0: f64,

    /// Number of positions along x.
    #[arg(long, allow_hyphen_values = true)]
    x_steps: i64,

    /// Distance between x positions, in mm.
    #[arg(long, allow_hyphen_values = true)]
    x_step_size: f64,

    /// Number of positions along y.
    #[arg(long, allow_hyphen_values = true)]
    y_steps: i64,

    /// Distance between y positions, in mm.
    #[arg(long, allow_hyphen_values = true)]
    y_step_size: f64,

    /// Seconds to stay at each position.
    #[arg(long, allow_hyphen_values = true)]
    dwell: i64,

    /// Write the plan to this file instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

/// Operating mode, entered as `1` or `2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Generate a grid plan from the origin, then run it.
    Generate,
    /// Run the waypoints of an existing file.
    Replay,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" => Ok(Self::Generate),
            "2" => Ok(Self::Replay),
            other => Err(format!("invalid mode '{other}': enter 1 or 2")),
        }
    }
}

/// Run the CLI, returning an error message on failure.
pub fn run(cli: Cli) -> Result<(), String> {
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Run(args) => cmd_run(&config, &args),
        Command::Plan(args) => cmd_plan(&args),
    }
}

fn cmd_plan(args: &PlanArgs) -> Result<(), String> {
    if !(args.x0.is_finite() && args.y0.is_finite()) {
        return Err("origin must be finite".to_string());
    }
    let origin = Origin::new(args.x0, args.y0);
    let spec = GridSpec::new(
        args.x_steps,
        args.x_step_size,
        args.y_steps,
        args.y_step_size,
        args.dwell,
    )
    .map_err(|e| format!("invalid grid: {e}"))?;
    let plan = plan::generate(origin, &spec);

    match &args.out {
        Some(path) => {
            let file = fs::File::create(path)
                .map_err(|e| format!("failed to create {}: {e}", path.display()))?;
            storage::write_plan(file, origin, &plan)
                .map_err(|e| format!("failed to write {}: {e}", path.display()))?;
            eprintln!("Planned {} → {}", format_grid(&spec), path.display());
        }
        None => {
            storage::write_plan(io::stdout().lock(), origin, &plan)
                .map_err(|e| format!("failed to write plan: {e}"))?;
        }
    }

    Ok(())
}

fn cmd_run(config: &Config, args: &RunArgs) -> Result<(), String> {
    // Grid flags are checked before any hardware is touched.
    let preset = args.grid.preset().transpose()?;

    let data = args.data.as_ref().unwrap_or(&config.data_file);
    if args.mode != Some(Mode::Generate) {
        if let Some(source) = &args.plan {
            check_replay_source(source, data)?;
        }
    }

    let mut stage = open_stage(config, args)?;
    stage.home().map_err(|e| format!("homing failed: {e}"))?;

    let mut run_file = RunFile::create(data).map_err(|e| e.to_string())?;

    let stdin = io::stdin();
    let mut prompter = Prompter::new(stdin.lock(), io::stdout());
    let origin = calibrate::calibrate(&mut stage, &mut prompter)
        .map_err(|e| format!("calibration failed: {e}"))?;
    run_file
        .write_origin(origin)
        .map_err(|e| format!("failed to save origin: {e}"))?;

    let mode = match args.mode {
        Some(mode) => mode,
        None => prompter.mode()?,
    };

    match mode {
        Mode::Generate => {
            let spec = match preset {
                Some(spec) => spec,
                None => args.grid.complete(&mut prompter)?,
            };
            let plan = plan::generate(origin, &spec);
            tracing::info!("Generated {}", format_grid(&spec));
            run_file
                .append_plan(&plan)
                .map_err(|e| format!("failed to save plan: {e}"))?;

            let visits = storage::visits_path_for(run_file.path());
            play(&mut stage, &visits, |sequencer| sequencer.run_plan(&plan))
        }
        Mode::Replay => {
            let source = replay_source(args.plan.as_deref(), &mut prompter, run_file.path())?;
            let records = storage::read_waypoints(&source).map_err(|e| e.to_string())?;

            let visits = storage::visits_path_for(&source);
            play(&mut stage, &visits, |sequencer| sequencer.run_records(records))
        }
    }
}

/// The file to replay: `--plan`, or asked for. Never the run file itself.
fn replay_source<R: io::BufRead, W: io::Write>(
    flag: Option<&Path>,
    prompter: &mut Prompter<R, W>,
    run_file: &Path,
) -> Result<PathBuf, String> {
    let source = match flag {
        Some(path) => path.to_path_buf(),
        None => prompter.path("Enter the path of the plan or log file: ")?,
    };
    check_replay_source(&source, run_file)?;
    Ok(source)
}

/// Rejects replaying the run file, which is rewritten at calibration.
fn check_replay_source(source: &Path, run_file: &Path) -> Result<(), String> {
    let same = match (fs::canonicalize(source), fs::canonicalize(run_file)) {
        (Ok(a), Ok(b)) => a == b,
        _ => source == run_file,
    };
    if same {
        return Err(format!(
            "{} is the run file and is overwritten at calibration; \
             replay a copy or pass --data with another path",
            source.display()
        ));
    }
    Ok(())
}

/// Runs `run` against a visit log at `visits`, then prints what got done.
fn play<A, F>(stage: &mut Stage<A>, visits: &Path, run: F) -> Result<(), String>
where
    A: AxisDriver,
    F: FnOnce(&mut Sequencer<'_, A, SystemClock, CsvVisitLog<fs::File>>) -> Result<(), SequenceError>,
{
    let mut log = CsvVisitLog::open(visits).map_err(|e| e.to_string())?;
    let mut clock = SystemClock;
    let mut sequencer = Sequencer::new(stage, &mut clock, &mut log);

    let result = run(&mut sequencer);
    let report = sequencer.finish();
    println!("{}", format_report(&report, visits));
    result.map_err(|e| e.to_string())?;

    println!("COMPLETED");
    Ok(())
}

/// Opens the configured axes, or a simulated pair.
fn open_stage(config: &Config, args: &RunArgs) -> Result<Stage<Box<dyn AxisDriver>>, String> {
    if args.simulate {
        tracing::info!("Using a simulated stage");
        return Ok(Stage::new(
            Box::new(SimulatedAxis::new()),
            Box::new(SimulatedAxis::new()),
        ));
    }

    let port = args.port.as_deref().unwrap_or(&config.port);
    let link = ZaberLink::open(port, config.baud_rate)
        .map_err(|e| format!("failed to open {port}: {e}"))?;
    let link = Rc::new(RefCell::new(link));

    let connect = |axis: Axis, axis_config: &AxisConfig| -> Result<Box<dyn AxisDriver>, String> {
        let address = AxisAddress {
            device: axis_config.device,
            axis: axis_config.axis,
        };
        let mut driver = ZaberAxis::new(
            Rc::clone(&link),
            address,
            axis_config.microstep_size_um,
            config.poll_interval(),
            config.move_timeout(),
        );
        driver.ping().map_err(|e| {
            format!(
                "{axis} axis (device {}, axis {}) is not responding: {e}",
                address.device, address.axis
            )
        })?;
        Ok(Box::new(driver))
    };

    Ok(Stage::new(
        connect(Axis::X, &config.x)?,
        connect(Axis::Y, &config.y)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn run_with_full_grid() {
        let cli = parse(&[
            "stagescan",
            "run",
            "--simulate",
            "--mode",
            "1",
            "--x-steps",
            "2",
            "--x-step-size",
            "1",
            "--y-steps",
            "2",
            "--y-step-size",
            "2",
            "--dwell",
            "3",
        ]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };

        assert!(args.simulate);
        assert_eq!(args.mode, Some(Mode::Generate));
        let spec = args.grid.preset().unwrap().unwrap();
        assert_eq!(spec, GridSpec::new(2, 1.0, 2, 2.0, 3).unwrap());
    }

    #[test]
    fn partial_grid_has_no_preset() {
        let cli = parse(&["stagescan", "run", "--x-steps", "4"]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert!(args.grid.preset().is_none());
    }

    #[test]
    fn negative_grid_flag_is_rejected_up_front() {
        let cli = parse(&[
            "stagescan",
            "run",
            "--x-steps",
            "-2",
            "--x-step-size",
            "1",
            "--y-steps",
            "2",
            "--y-step-size",
            "1",
            "--dwell",
            "0",
        ]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        let err = args.grid.preset().unwrap().unwrap_err();
        assert!(err.contains("x steps must not be negative"));
    }

    #[test]
    fn invalid_mode_is_rejected() {
        assert!(Cli::try_parse_from(["stagescan", "run", "--mode", "3"]).is_err());
        assert_eq!("2".parse::<Mode>().unwrap(), Mode::Replay);
    }

    #[test]
    fn grid_prompts_only_for_missing_values() {
        let cli = parse(&["stagescan", "run", "--x-steps", "3", "--dwell", "1"]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        let mut prompter = Prompter::new(io::Cursor::new(b"0.5\n2\n0.25\n".to_vec()), Vec::new());

        let spec = args.grid.complete(&mut prompter).unwrap();
        assert_eq!(spec, GridSpec::new(3, 0.5, 2, 0.25, 1).unwrap());
    }

    #[test]
    fn plan_writes_origin_then_waypoints() {
        let dir = tempfile::TempDir::new().unwrap();
        let out = dir.path().join("scan.csv");
        let cli = parse(&[
            "stagescan",
            "plan",
            "--x0",
            "10",
            "--y0",
            "5",
            "--x-steps",
            "2",
            "--x-step-size",
            "1",
            "--y-steps",
            "2",
            "--y-step-size",
            "2",
            "--dwell",
            "3",
            "--out",
            out.to_str().unwrap(),
        ]);
        let Command::Plan(args) = cli.command else {
            panic!("expected plan");
        };

        cmd_plan(&args).unwrap();
        assert_eq!(
            fs::read_to_string(&out).unwrap(),
            "10,5,0\n10,5,3\n11,5,3\n10,7,3\n11,7,3\n"
        );
    }

    #[test]
    fn plan_rejects_negative_step_size() {
        let cli = parse(&[
            "stagescan",
            "plan",
            "--x0",
            "0",
            "--y0",
            "0",
            "--x-steps",
            "2",
            "--x-step-size",
            "-1",
            "--y-steps",
            "2",
            "--y-step-size",
            "1",
            "--dwell",
            "0",
        ]);
        let Command::Plan(args) = cli.command else {
            panic!("expected plan");
        };
        assert!(cmd_plan(&args).unwrap_err().contains("invalid grid"));
    }

    #[test]
    fn replay_flag_naming_data_file_is_rejected_before_it_is_truncated() {
        let dir = tempfile::TempDir::new().unwrap();
        let data = dir.path().join("stagescan.csv");
        fs::write(&data, "10,5,0\n10,5,3\n").unwrap();
        let roundabout = dir.path().join(".").join("stagescan.csv");

        let err = check_replay_source(&roundabout, &data).unwrap_err();
        assert!(err.contains("is the run file"));
        assert!(check_replay_source(&dir.path().join("other.csv"), &data).is_ok());
        assert_eq!(fs::read_to_string(&data).unwrap(), "10,5,0\n10,5,3\n");
    }

    #[test]
    fn replay_path_typed_at_prompt_must_not_be_run_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let data = dir.path().join("stagescan.csv");
        RunFile::create(&data)
            .unwrap()
            .write_origin(Origin::new(1.0, 2.0))
            .unwrap();
        let answer = format!("{}\n", data.display());
        let mut prompter = Prompter::new(io::Cursor::new(answer.into_bytes()), Vec::new());

        let err = replay_source(None, &mut prompter, &data).unwrap_err();
        assert!(err.contains("is the run file"));
    }

    #[test]
    fn replay_source_accepts_other_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let data = dir.path().join("stagescan.csv");
        let plan = dir.path().join("scan.csv");
        fs::write(&data, "0,0,0\n").unwrap();
        fs::write(&plan, "1,1,1\n").unwrap();
        let mut prompter = Prompter::new(io::Cursor::new(Vec::new()), Vec::new());

        let source = replay_source(Some(&plan), &mut prompter, &data).unwrap();
        assert_eq!(source, plan);
    }

    #[test]
    fn simulated_replay_logs_visits_beside_source() {
        let dir = tempfile::TempDir::new().unwrap();
        let source = dir.path().join("scan.csv");
        fs::write(&source, "1,2,0\nbad line\n3,4,0\n").unwrap();
        let mut stage = Stage::new(SimulatedAxis::new(), SimulatedAxis::new());
        let visits = storage::visits_path_for(&source);
        let records = storage::read_waypoints(&source).unwrap();

        play(&mut stage, &visits, |sequencer| sequencer.run_records(records)).unwrap();

        let logged = fs::read_to_string(dir.path().join("scan.visits.csv")).unwrap();
        let lines: Vec<_> = logged.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("1,2,0,"));
        assert!(lines[1].starts_with("3,4,0,"));
        assert_eq!(stage.y.position(), 4.0);
    }

    #[test]
    fn failed_replay_reports_driver_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let source = dir.path().join("scan.csv");
        fs::write(&source, "1,1,0\n2,2,0\n3,3,0\n4,4,0\n5,5,0\n").unwrap();
        let mut stage = Stage::new(SimulatedAxis::new().failing_after(2), SimulatedAxis::new());
        let visits = storage::visits_path_for(&source);
        let records = storage::read_waypoints(&source).unwrap();

        let err = play(&mut stage, &visits, |sequencer| sequencer.run_records(records)).unwrap_err();

        assert!(err.contains("waypoint 3"));
        let logged = fs::read_to_string(&visits).unwrap();
        assert_eq!(logged.lines().count(), 2);
    }
}
