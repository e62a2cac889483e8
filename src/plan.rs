//! Grid plan generation.

use crate::model::{GridSpec, Origin, Plan, Waypoint};

/// Expands a grid into absolute waypoints in row-major raster order.
///
/// Every x position is visited at a given y before y advances. The result
/// has exactly `x_steps * y_steps` waypoints, all with the grid's dwell.
/// Travel limits are not checked here; the axis rejects unreachable targets.
pub fn generate(origin: Origin, spec: &GridSpec) -> Plan {
    let mut waypoints = Vec::with_capacity(spec.len());
    for j in 0..spec.y_steps {
        let y_mm = origin.y0 + f64::from(j) * spec.y_step_size_mm;
        for i in 0..spec.x_steps {
            let x_mm = origin.x0 + f64::from(i) * spec.x_step_size_mm;
            waypoints.push(Waypoint::new(x_mm, y_mm, spec.dwell_s));
        }
    }
    Plan::new(waypoints)
}
