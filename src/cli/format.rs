//! Output formatting for CLI display.

use std::path::Path;

use crate::model::GridSpec;
use crate::sequence::RunReport;

/// One-line description of a grid, e.g. `3 x 2 grid, 0.5 mm x 1 mm steps, 4 s dwell`.
pub(super) fn format_grid(spec: &GridSpec) -> String {
    format!(
        "{} x {} grid, {} mm x {} mm steps, {} s dwell",
        spec.x_steps, spec.y_steps, spec.x_step_size_mm, spec.y_step_size_mm, spec.dwell_s
    )
}

/// Summary printed when a run ends, successfully or not.
pub(super) fn format_report(report: &RunReport, visits: &Path) -> String {
    let mut out = format!(
        "Visited {} waypoint{}, logged to {}",
        report.visited,
        plural(report.visited),
        visits.display()
    );
    if !report.skipped.is_empty() {
        out.push_str(&format!(
            "\nSkipped {} malformed line{}:",
            report.skipped.len(),
            plural(report.skipped.len())
        ));
        for record in &report.skipped {
            out.push_str(&format!("\n  {record}"));
        }
    }
    out
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::storage::MalformedRecord;

    #[test]
    fn grid_description() {
        let spec = GridSpec::new(3, 0.5, 2, 1.0, 4).unwrap();
        assert_eq!(
            format_grid(&spec),
            "3 x 2 grid, 0.5 mm x 1 mm steps, 4 s dwell"
        );
    }

    #[test]
    fn clean_report() {
        let report = RunReport {
            visited: 1,
            skipped: vec![],
        };
        assert_eq!(
            format_report(&report, Path::new("scan.visits.csv")),
            "Visited 1 waypoint, logged to scan.visits.csv"
        );
    }

    #[test]
    fn report_lists_skipped_lines() {
        let report = RunReport {
            visited: 2,
            skipped: vec![MalformedRecord {
                line: 2,
                reason: "invalid x \"a\"".into(),
                text: "a,1,1".into(),
            }],
        };
        let text = format_report(&report, Path::new("v.csv"));

        assert!(text.starts_with("Visited 2 waypoints"));
        assert!(text.contains("Skipped 1 malformed line:"));
        assert!(text.contains("line 2: invalid x"));
    }
}
