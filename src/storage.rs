//! Local persistence for scan runs.
//!
//! Everything is comma-separated text, one record per line:
//!
//! ```text
//! <data>.csv            # run file
//!   x0,y0,0             # origin, written once after calibration
//!   x,y,dwell_s         # plan lines, in playback order
//! <data>.visits.csv     # visit log, append-only
//!   x,y,dwell_s,YYYY-MM-DD HH:MM:SS
//! ```
//!
//! Any line with at least `x,y,dwell_s` reads back as a waypoint; a trailing
//! timestamp is ignored, so a visit log can itself be replayed.

mod records;
mod visits;

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use crate::model::{Origin, Plan};

pub use records::{MalformedRecord, WaypointReader};
pub use visits::{CsvVisitLog, VisitLog};

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("could not open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = core::result::Result<T, StorageError>;

/// Why a stored line did not yield a waypoint.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    /// The line is unusable; skip it and keep going.
    #[error(transparent)]
    Malformed(#[from] MalformedRecord),

    /// The file itself could not be read; stop.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// The file a run starts from: the origin line, then any generated plan.
pub struct RunFile {
    path: PathBuf,
    writer: csv::Writer<fs::File>,
}

impl RunFile {
    /// Creates (or truncates) the run file.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = fs::File::create(&path).map_err(|source| StorageError::Open {
            path: path.clone(),
            source,
        })?;
        Ok(Self {
            writer: records::writer(file),
            path,
        })
    }

    /// Writes the origin line. Called once, before any plan lines.
    pub fn write_origin(&mut self, origin: Origin) -> Result<()> {
        self.writer.write_record(records::origin_fields(origin))?;
        self.writer.flush()?;
        tracing::info!("Origin saved to {}", self.path.display());
        Ok(())
    }

    /// Appends every waypoint of `plan`, in order.
    pub fn append_plan(&mut self, plan: &Plan) -> Result<()> {
        for waypoint in plan {
            self.writer.write_record(records::waypoint_fields(waypoint))?;
        }
        self.writer.flush()?;
        tracing::info!("{} waypoints saved to {}", plan.len(), self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Writes an origin line and a plan to any writer.
///
/// Used when a plan is produced offline rather than during a run.
pub fn write_plan<W: Write>(out: W, origin: Origin, plan: &Plan) -> Result<()> {
    let mut writer = records::writer(out);
    writer.write_record(records::origin_fields(origin))?;
    for waypoint in plan {
        writer.write_record(records::waypoint_fields(waypoint))?;
    }
    writer.flush()?;
    Ok(())
}

/// Opens a stored plan or log for playback.
pub fn read_waypoints(path: &Path) -> Result<WaypointReader<fs::File>> {
    let file = fs::File::open(path).map_err(|source| StorageError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(WaypointReader::new(file))
}

/// Where visits are logged when playing `source`: `<stem>.visits.csv` beside it.
pub fn visits_path_for(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map_or_else(|| "run".into(), |s| s.to_string_lossy().into_owned());
    source.with_file_name(format!("{stem}.visits.csv"))
}
