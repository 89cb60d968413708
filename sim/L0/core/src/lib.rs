//! Kinematic and dynamic analysis of constrained multibody systems.
//!
//! This crate drives a [`MultibodyModel`] through time. The model supplies
//! constraint equations, Jacobian blocks, mass and force blocks for its
//! current state; the drivers solve for the motion that satisfies them:
//!
//! - [`KinematicSolver`] - Fully constrained systems (`dof = 0`). Motion
//!   follows from the constraints alone.
//! - [`DynamicSolver`] - Systems with free coordinates (`dof > 0`).
//!   Coordinate partitioning reduces the equations of motion to an ODE in
//!   the independent coordinates, which [`AdaptiveIntegrator`] advances.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    MultibodyModel (user)                    │
//! │  set_gen_coordinates / set_time → eval_pos_eq, eval_jac_eq  │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           │ ModelSystem (assembly)
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 run_analysis (stepping loop)                │
//! │  KinematicStrategy | DynamicStrategy                        │
//! │  NewtonCorrector, CoordinatePartition, AdaptiveIntegrator   │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           │ History
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  TimeTable: positions, velocities, accelerations, reactions │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate with **zero rendering dependencies**. It can be
//! used in:
//!
//! - Suspension kinematics studies
//! - Batch parameter sweeps
//! - Other engines
//!
//! # Quick Start
//!
//! ```ignore
//! use mbd_core::KinematicSolver;
//!
//! let mut solver = KinematicSolver::new(model);
//! solver.set_time_array(1.0, 0.01)?;
//! solver.solve()?;
//!
//! let positions = solver.pos_table()?;
//! for (t, x) in positions.time().iter().zip(positions.column("rocker.x").unwrap_or(&[])) {
//!     println!("{t:.2}: {x}");
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/mbd-core/0.3.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,       // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,           // mul_add style changes aren't always clearer
    clippy::cast_precision_loss,        // usize to f64 for counts and norms
    clippy::missing_errors_doc,         // Error docs added where non-obvious
    clippy::many_single_char_names,     // t, y, h, q follow the math
    clippy::doc_markdown,               // Not all technical terms need backticks
)]

// Model adapter contract
pub mod model;

// Assembly of model blocks into equations
pub mod assembly;

// Adaptive ODE integration
pub mod integrator;

// Step-indexed results and the tables built from them
pub mod history;
pub mod table;

// Stepping loop and analysis strategies
pub mod driver;
pub mod dynamic;
pub mod kinematic;

// Joint reaction loads
pub mod reactions;

// User-facing solvers
pub mod solver;

pub use assembly::{AugmentedSystem, ModelSystem};
pub use driver::{AnalysisStrategy, extrapolate, run_analysis};
pub use dynamic::{DynamicStrategy, ReducedDynamics, augmented_accelerations, reduced_system};
pub use history::{History, StepRecord};
pub use integrator::{AdaptiveIntegrator, IntegratorStats, OdeSystem};
pub use kinematic::KinematicStrategy;
pub use model::{MultibodyModel, ReactionSite, SPATIAL_BODY_COORDINATES, SPATIAL_COORDINATES};
pub use reactions::{
    JointReaction, ReactionHistory, euler_parameter_matrix, joint_reaction, rotation_matrix,
    skew, validate_site,
};
pub use solver::{DynamicSolver, KinematicSolver, Solver};
pub use table::{TIME_COLUMN, TimeTable};

// Re-export the types a model implementation needs
pub use mbd_constraint::{CoordinatePartition, MatrixBlock, NewtonCorrector, NewtonOutcome};
pub use mbd_types::{
    AnalysisConfig, IntegrationMethod, IntegratorConfig, NewtonConfig, Result, SolveStage,
    SolverError, TimeGrid,
};
