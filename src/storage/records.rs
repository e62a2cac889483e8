//! Line format: field layout, formatting, and per-line parsing.

use std::io::{Read, Write};

use csv::StringRecord;

use crate::model::{Origin, VisitRecord, Waypoint};

use super::{ReadError, StorageError};

/// A stored line that could not be turned into a waypoint.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {reason} ({text:?})")]
pub struct MalformedRecord {
    /// 1-based line number in the source file.
    pub line: u64,
    pub reason: String,
    /// The offending line as read.
    pub text: String,
}

pub(super) fn writer<W: Write>(out: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_writer(out)
}

/// `x0,y0,0`: the trailing zero is a fixed placeholder.
pub(super) fn origin_fields(origin: Origin) -> [String; 3] {
    [origin.x0.to_string(), origin.y0.to_string(), "0".to_string()]
}

pub(super) fn waypoint_fields(waypoint: &Waypoint) -> [String; 3] {
    [
        waypoint.x_mm.to_string(),
        waypoint.y_mm.to_string(),
        waypoint.dwell_s.to_string(),
    ]
}

pub(super) fn visit_fields(visit: &VisitRecord) -> [String; 4] {
    [
        visit.x_mm.to_string(),
        visit.y_mm.to_string(),
        visit.dwell_s.to_string(),
        visit.timestamp(),
    ]
}

/// Streams waypoints out of stored lines, one result per non-empty line.
///
/// Lines that do not parse come back as [`ReadError::Malformed`] and the
/// reader moves on; I/O failures come back as [`ReadError::Storage`].
pub struct WaypointReader<R> {
    records: csv::StringRecordsIntoIter<R>,
}

impl<R: Read> WaypointReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .trim(csv::Trim::All)
            .from_reader(source);
        Self {
            records: reader.into_records(),
        }
    }
}

impl<R: Read> Iterator for WaypointReader<R> {
    type Item = Result<Waypoint, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = match self.records.next()? {
            Ok(record) => parse_waypoint(&record).map_err(ReadError::from),
            Err(err) if err.is_io_error() => Err(StorageError::Csv(err).into()),
            Err(err) => Err(MalformedRecord {
                line: err.position().map_or(0, csv::Position::line),
                reason: err.to_string(),
                text: String::new(),
            }
            .into()),
        };
        Some(item)
    }
}

fn parse_waypoint(record: &StringRecord) -> Result<Waypoint, MalformedRecord> {
    let malformed = |reason: String| MalformedRecord {
        line: record.position().map_or(0, csv::Position::line),
        reason,
        text: record.iter().collect::<Vec<_>>().join(","),
    };

    if record.len() < 3 {
        return Err(malformed(format!(
            "expected at least 3 fields, found {}",
            record.len()
        )));
    }

    let coordinate = |index: usize, name: &str| {
        record[index]
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| malformed(format!("invalid {name} {:?}", &record[index])))
    };
    let x_mm = coordinate(0, "x")?;
    let y_mm = coordinate(1, "y")?;
    let dwell_s = record[2]
        .parse::<u64>()
        .map_err(|_| malformed(format!("invalid dwell time {:?}", &record[2])))?;

    Ok(Waypoint::new(x_mm, y_mm, dwell_s))
}
