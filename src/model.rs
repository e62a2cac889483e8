//! Core data model for stagescan.
//!
//! These types describe a raster scan end to end:
//! the calibrated origin, the grid it is expanded from,
//! the waypoints that make up a plan, and the visits recorded while playing it.

mod grid;
mod origin;
mod visit;

pub use grid::{GridError, GridSpec, Plan, Waypoint};
pub use origin::{Axis, Origin};
pub use visit::{TIMESTAMP_FORMAT, VisitRecord};
