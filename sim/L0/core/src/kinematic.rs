//! Kinematic analysis of fully constrained systems.
//!
//! With as many independent constraints as coordinates (driving constraints
//! included) the motion is fixed by the constraints alone. Each step solves
//! the position equations with Newton-Raphson and then the linear velocity
//! and acceleration equations:
//!
//! ```text
//! J · qd  = −ν
//! J · qdd = −γ
//! ```
//!
//! Multipliers follow from the equations of motion, `Jᵀ·λ = Q − M·qdd`.
//! No ODE is integrated.

use mbd_constraint::{NewtonCorrector, NewtonOutcome, SolveStage, solve_vector};
use mbd_types::{AnalysisConfig, Result, SolverError};
use nalgebra::{DMatrix, DVector};

use crate::assembly::ModelSystem;
use crate::driver::AnalysisStrategy;
use crate::history::StepRecord;
use crate::model::MultibodyModel;

/// Strategy for zero-DOF systems.
#[derive(Debug, Clone, Copy, Default)]
pub struct KinematicStrategy;

impl AnalysisStrategy for KinematicStrategy {
    const NAME: &'static str = "kinematic";

    fn from_config(_config: &AnalysisConfig) -> Self {
        Self
    }

    fn start<M: MultibodyModel + ?Sized>(
        &mut self,
        system: &mut ModelSystem<'_, M>,
        _t0: f64,
        _q0: &DVector<f64>,
    ) -> Result<()> {
        if system.nrows() != system.ncols() {
            return Err(SolverError::DofMismatch {
                analysis: Self::NAME,
                expected: "nrows == ncols (zero degrees of freedom)",
                nrows: system.nrows(),
                ncols: system.ncols(),
            });
        }
        Ok(())
    }

    fn correct<M: MultibodyModel + ?Sized>(
        &mut self,
        system: &mut ModelSystem<'_, M>,
        corrector: &NewtonCorrector,
        guess: DVector<f64>,
    ) -> Result<NewtonOutcome> {
        corrector.correct(system, guess)
    }

    fn recover<M: MultibodyModel + ?Sized>(
        &mut self,
        system: &mut ModelSystem<'_, M>,
        outcome: NewtonOutcome,
    ) -> Result<StepRecord> {
        let jacobian = system.constraint_jacobian()?;

        let vel_rhs = system.velocity_rhs()?;
        let qd = solve_vector(&jacobian, &(-vel_rhs), SolveStage::Velocity)?;
        system.set_velocities(&qd);

        let acc_rhs = system.acceleration_rhs()?;
        let qdd = solve_vector(&jacobian, &(-acc_rhs), SolveStage::Acceleration)?;
        system.set_accelerations(&qdd);

        let lambda = lagrange_multipliers(system, &jacobian.to_dense(), &qdd)?;

        Ok(StepRecord {
            q: outcome.coordinates,
            qd,
            qdd,
            lambda,
            converged: outcome.converged,
        })
    }
}

/// `λ` from `Jᵀ·λ = Q − M·qdd`.
fn lagrange_multipliers<M: MultibodyModel + ?Sized>(
    system: &mut ModelSystem<'_, M>,
    jacobian: &DMatrix<f64>,
    qdd: &DVector<f64>,
) -> Result<DVector<f64>> {
    let forces = system.forces()?;
    let inertia = system.mass_matrix()?.mul_vec(qdd);
    solve_vector(
        &jacobian.transpose(),
        &(forces - inertia),
        SolveStage::Multipliers,
    )
}
