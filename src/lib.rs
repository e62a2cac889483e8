//! Raster scanning for two-axis motorized stages.
//!
//! A run homes the stage, calibrates an origin by jogging, expands a grid
//! into a plan of waypoints, and visits each one in turn, logging every stop.

pub mod calibrate;
pub mod cli;
pub mod config;
pub mod driver;
pub mod model;
pub mod plan;
pub mod sequence;
pub mod storage;
