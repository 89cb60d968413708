//! Newton-Raphson position correction.
//!
//! Drives generalized coordinates onto the constraint manifold `Φ(q) = 0`.
//!
//! # Algorithm
//!
//! ```text
//! A = ∂Φ/∂q (q₀)
//! repeat:
//!     solve A · Δq = −Φ(q)
//!     q ← q + Δq
//!     stop when ‖Δq‖ ≤ tol
//! ```
//!
//! The Jacobian is evaluated once at the initial guess and reused; it is only
//! re-evaluated on iterations that are a multiple of
//! [`NewtonConfig::jacobian_refresh`]. Near the solution the stale Jacobian
//! still contracts, and Jacobian assembly is the expensive part of a step.
//!
//! Hitting the iteration cap is not an error. The corrector logs a warning
//! and hands back its last guess with `converged == false`, so callers can
//! record the inaccuracy and keep stepping.

use mbd_types::{NewtonConfig, Result, SolveStage};
use nalgebra::DVector;
use tracing::{trace, warn};

use crate::linear::{SystemMatrix, solve_vector};

/// A set of nonlinear position equations `Φ(q) = 0`.
///
/// Implemented by the drivers over a model adapter. The dynamic driver
/// implements it a second time for the augmented system that also pins the
/// independent coordinates.
pub trait PositionSystem {
    /// Jacobian matrix type.
    type Jacobian: SystemMatrix;

    /// Number of unknowns.
    fn dimension(&self) -> usize;

    /// Push a coordinate vector into the system.
    fn set_coordinates(&mut self, q: &DVector<f64>) -> Result<()>;

    /// Residual `Φ(q)` at the current coordinates.
    fn residual(&mut self) -> Result<DVector<f64>>;

    /// Jacobian `∂Φ/∂q` at the current coordinates.
    fn jacobian(&mut self) -> Result<Self::Jacobian>;
}

/// Result of a position correction.
#[derive(Debug, Clone, PartialEq)]
pub struct NewtonOutcome {
    /// Corrected coordinates. The system has already been set to them.
    pub coordinates: DVector<f64>,

    /// Number of Newton iterations performed.
    pub iterations: usize,

    /// Whether `‖Δq‖` fell to the tolerance before the cap.
    pub converged: bool,

    /// Norm of the last correction.
    pub step_norm: f64,
}

/// Newton-Raphson corrector with a cached Jacobian.
#[derive(Debug, Clone, Copy, Default)]
pub struct NewtonCorrector {
    config: NewtonConfig,
}

impl NewtonCorrector {
    /// Create a corrector with the given configuration.
    #[must_use]
    pub const fn new(config: NewtonConfig) -> Self {
        Self { config }
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &NewtonConfig {
        &self.config
    }

    /// Correct `guess` onto the constraint manifold of `system`.
    ///
    /// # Errors
    ///
    /// Returns [`mbd_types::SolverError::SingularSystem`] at
    /// [`SolveStage::PositionCorrection`] if the Jacobian is singular, and
    /// propagates any error raised by the system's evaluators. Running out of
    /// iterations is reported through [`NewtonOutcome::converged`].
    pub fn correct<S>(&self, system: &mut S, guess: DVector<f64>) -> Result<NewtonOutcome>
    where
        S: PositionSystem + ?Sized,
    {
        let tolerance = self.config.tolerance;
        let max_iterations = self.config.max_iterations.max(1);
        let refresh = self.config.jacobian_refresh.max(1);

        let mut q = guess;
        system.set_coordinates(&q)?;
        let mut jacobian = system.jacobian()?;

        let mut iterations = 0;
        loop {
            let residual = system.residual()?;
            let delta = solve_vector(&jacobian, &(-residual), SolveStage::PositionCorrection)?;
            let step_norm = delta.norm();

            q += &delta;
            system.set_coordinates(&q)?;
            iterations += 1;

            trace!(iterations, step_norm, "newton iteration");

            if step_norm <= tolerance {
                return Ok(NewtonOutcome {
                    coordinates: q,
                    iterations,
                    converged: true,
                    step_norm,
                });
            }

            if iterations >= max_iterations {
                warn!(
                    iterations,
                    step_norm,
                    tolerance,
                    "Newton-Raphson iterations exceeded the cap, keeping last guess"
                );
                return Ok(NewtonOutcome {
                    coordinates: q,
                    iterations,
                    converged: false,
                    step_norm,
                });
            }

            if iterations % refresh == 0 {
                jacobian = system.jacobian()?;
            }
        }
    }
}
