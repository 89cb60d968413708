//! Constraint-side numerics for multibody analysis.
//!
//! This crate holds the pieces of the solver that only look at constraint
//! equations, independent of how a model produces them:
//!
//! - [`BlockAssembler`]: Validated sparse assembly of `(row, col, block)` lists
//! - [`solve`] / [`solve_vector`]: The single entry point for linear solves
//! - [`NewtonCorrector`]: Newton-Raphson position correction with a cached
//!   Jacobian
//! - [`CoordinatePartition`]: Dependent/independent split of the coordinates
//!
//! # Constraint Formulation
//!
//! Position constraints and their time derivatives:
//!
//! ```text
//! Φ(q, t) = 0                  (position)
//! J · qd  = −ν                 (velocity, J = ∂Φ/∂q)
//! J · qdd = −γ                 (acceleration)
//! ```
//!
//! # Example
//!
//! ```
//! use mbd_constraint::CoordinatePartition;
//! use nalgebra::DMatrix;
//!
//! // A particle on the unit circle at (1, 0).
//! let jacobian = DMatrix::from_row_slice(1, 2, &[2.0, 0.0]);
//! let partition = CoordinatePartition::from_jacobian(&jacobian).unwrap();
//!
//! assert_eq!(partition.dof(), 1);
//! assert_eq!(partition.independent(), &[1]);
//! ```
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate with **zero rendering dependencies**.

#![doc(html_root_url = "https://docs.rs/mbd-constraint/0.3.0")]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
#![allow(clippy::missing_const_for_fn, clippy::missing_errors_doc)]

mod linear;
mod newton;
mod partition;
mod sparse;

pub use linear::{RightHandSide, SINGULAR_PIVOT_RATIO, SystemMatrix, solve, solve_vector};
pub use newton::{NewtonCorrector, NewtonOutcome, PositionSystem};
pub use partition::CoordinatePartition;
pub use sparse::{
    BlockAssembler, MatrixBlock, SparseMatrix, assemble_block_diagonal, assemble_blocks,
    concatenate_blocks,
};

// Re-export types needed to drive the solvers
pub use mbd_types::{NewtonConfig, Result, SolveStage, SolverError};
