//! Visit records: timestamped proof that a waypoint was reached.

use jiff::civil::DateTime;

use super::Waypoint;

/// `strftime` format of the timestamp column, local time, second precision.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A waypoint the stage reached and dwelt at, with the local wall-clock
/// time the dwell finished.
///
/// Appended once per completed waypoint; never rewritten.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisitRecord {
    pub x_mm: f64,
    pub y_mm: f64,
    pub dwell_s: u64,
    pub visited_at: DateTime,
}

impl VisitRecord {
    pub fn new(waypoint: &Waypoint, visited_at: DateTime) -> Self {
        Self {
            x_mm: waypoint.x_mm,
            y_mm: waypoint.y_mm,
            dwell_s: waypoint.dwell_s,
            visited_at,
        }
    }

    /// The waypoint this record proves was visited.
    pub fn waypoint(&self) -> Waypoint {
        Waypoint::new(self.x_mm, self.y_mm, self.dwell_s)
    }

    /// `visited_at` rendered as `YYYY-MM-DD HH:MM:SS`.
    pub fn timestamp(&self) -> String {
        self.visited_at.strftime(TIMESTAMP_FORMAT).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use jiff::civil::date;

    #[test]
    fn timestamp_has_second_precision() {
        let at = date(2024, 3, 9).at(7, 5, 2, 999_000_000);
        let record = VisitRecord::new(&Waypoint::new(1.0, 2.0, 3), at);
        assert_eq!(record.timestamp(), "2024-03-09 07:05:02");
    }

    #[test]
    fn waypoint_round_trips_through_record() {
        let waypoint = Waypoint::new(10.25, -4.5, 7);
        let record = VisitRecord::new(&waypoint, date(2024, 1, 1).at(0, 0, 0, 0));
        assert_eq!(record.waypoint(), waypoint);
    }
}
