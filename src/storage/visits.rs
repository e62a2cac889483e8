//! Visit log storage: append-only record of completed waypoints.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use crate::model::VisitRecord;

use super::{Result, StorageError, records};

/// Append-only sink for visit records.
pub trait VisitLog {
    /// Appends one record. Once this returns, the record is durable.
    fn append(&mut self, visit: &VisitRecord) -> Result<()>;
}

impl VisitLog for Vec<VisitRecord> {
    fn append(&mut self, visit: &VisitRecord) -> Result<()> {
        self.push(*visit);
        Ok(())
    }
}

/// Visit log written as `x,y,dwell_s,timestamp` lines.
pub struct CsvVisitLog<W: Write> {
    writer: csv::Writer<W>,
}

impl CsvVisitLog<fs::File> {
    /// Opens `path` for appending, creating it if needed.
    pub fn open(path: &Path) -> Result<Self> {
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| StorageError::Open {
                path: PathBuf::from(path),
                source,
            })?;
        tracing::info!("Logging visits to {}", path.display());
        Ok(Self::new(file))
    }
}

impl<W: Write> CsvVisitLog<W> {
    pub fn new(out: W) -> Self {
        Self {
            writer: records::writer(out),
        }
    }
}

impl<W: Write> VisitLog for CsvVisitLog<W> {
    fn append(&mut self, visit: &VisitRecord) -> Result<()> {
        self.writer.write_record(records::visit_fields(visit))?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use jiff::civil::date;
    use tempfile::TempDir;

    use crate::model::Waypoint;
    use crate::storage::read_waypoints;

    fn sample_visit(x_mm: f64, second: i8) -> VisitRecord {
        VisitRecord::new(
            &Waypoint::new(x_mm, 2.0, 1),
            date(2024, 6, 1).at(9, 30, second, 0),
        )
    }

    #[test]
    fn append_and_read_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scan.visits.csv");

        let mut log = CsvVisitLog::open(&path).unwrap();
        log.append(&sample_visit(1.0, 0)).unwrap();
        log.append(&sample_visit(2.0, 1)).unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "1,2,1,2024-06-01 09:30:00\n2,2,1,2024-06-01 09:30:01\n"
        );
    }

    #[test]
    fn reopening_appends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scan.visits.csv");

        CsvVisitLog::open(&path)
            .unwrap()
            .append(&sample_visit(1.0, 0))
            .unwrap();
        CsvVisitLog::open(&path)
            .unwrap()
            .append(&sample_visit(3.0, 5))
            .unwrap();

        let xs: Vec<f64> = read_waypoints(&path)
            .unwrap()
            .map(|w| w.unwrap().x_mm)
            .collect();
        assert_eq!(xs, vec![1.0, 3.0]);
    }

    #[test]
    fn records_are_visible_before_drop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scan.visits.csv");

        let mut log = CsvVisitLog::open(&path).unwrap();
        log.append(&sample_visit(1.0, 0)).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 1);
    }

    #[test]
    fn open_in_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let err = CsvVisitLog::open(&dir.path().join("no").join("v.csv"))
            .err()
            .unwrap();
        assert!(matches!(err, StorageError::Open { .. }));
    }
}
