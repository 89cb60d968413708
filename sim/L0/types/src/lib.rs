//! Core types for multibody kinematic and dynamic analysis.
//!
//! This crate provides the foundational types shared by the solver crates:
//!
//! - [`SolverError`] / [`SolveStage`] - Error reporting, tagged with the
//!   linear solve that failed
//! - [`AnalysisConfig`] - Newton-Raphson and integrator settings
//! - [`TimeGrid`] - Output time discretization
//!
//! # Layer 0
//!
//! This is a Layer 0 crate with **zero rendering dependencies**. It can be
//! used in:
//!
//! - Batch suspension studies
//! - Analysis tools
//! - Other solvers
//!
//! # Example
//!
//! ```
//! use mbd_types::{AnalysisConfig, TimeGrid};
//!
//! let grid = TimeGrid::from_duration(2.0, 0.01).unwrap();
//! assert_eq!(grid.len(), 200);
//!
//! let config = AnalysisConfig::default();
//! assert!(config.validate().is_ok());
//! ```

#![doc(html_root_url = "https://docs.rs/mbd-types/0.3.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,
    clippy::cast_precision_loss,       // usize to f64 is fine for counts
    clippy::missing_errors_doc,        // Error docs added where non-obvious
)]

mod config;
mod error;
mod time;

pub use config::{AnalysisConfig, IntegrationMethod, IntegratorConfig, NewtonConfig};
pub use error::{SolveStage, SolverError};
pub use time::TimeGrid;

/// Result type for analysis operations.
pub type Result<T> = std::result::Result<T, SolverError>;
