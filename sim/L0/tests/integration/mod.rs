//! Integration tests for the mbd-* analysis crates.
//!
//! These tests drive hand-written models through the public solver API:
//! - Coordinate partitioning on known Jacobians
//! - Kinematic analysis of driven systems
//! - Dynamic analysis by coordinate partitioning
//! - Joint reactions from recovered multipliers
//! - Time array construction

pub mod fixtures;
pub mod kinematic_analysis;
pub mod reactions;
pub mod time_grid;
