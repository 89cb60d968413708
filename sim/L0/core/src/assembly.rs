//! Equation assembly over a model adapter.
//!
//! [`ModelSystem`] borrows a [`MultibodyModel`] exclusively for the duration
//! of a run and turns its block lists into assembled vectors and matrices.
//! It is also the [`PositionSystem`] the Newton corrector works on.
//! [`AugmentedSystem`] stacks the selector rows of a coordinate partition
//! under the physical constraints so under-constrained systems can be
//! corrected with a square Jacobian.

use mbd_constraint::{
    CoordinatePartition, PositionSystem, Result, SolverError, SparseMatrix,
    assemble_block_diagonal, assemble_blocks, concatenate_blocks,
};
use nalgebra::{DMatrix, DVector};

use crate::model::MultibodyModel;

/// Assembled view of a model adapter.
#[derive(Debug)]
pub struct ModelSystem<'a, M: MultibodyModel + ?Sized> {
    model: &'a mut M,
    nrows: usize,
    ncols: usize,
}

impl<'a, M: MultibodyModel + ?Sized> ModelSystem<'a, M> {
    /// Borrow a model.
    pub fn new(model: &'a mut M) -> Self {
        let nrows = model.nrows();
        let ncols = model.ncols();
        Self {
            model,
            nrows,
            ncols,
        }
    }

    /// Number of scalar constraint equations.
    #[must_use]
    pub const fn nrows(&self) -> usize {
        self.nrows
    }

    /// Number of generalized coordinates.
    #[must_use]
    pub const fn ncols(&self) -> usize {
        self.ncols
    }

    /// Degrees of freedom, `ncols − nrows`.
    #[must_use]
    pub fn dof(&self) -> usize {
        self.ncols.saturating_sub(self.nrows)
    }

    /// The underlying model.
    pub fn model(&self) -> &M {
        &*self.model
    }

    /// Initial coordinates, checked against `ncols`.
    pub fn initial_coordinates(&self) -> Result<DVector<f64>> {
        self.checked("initial coordinates", self.model.initial_coordinates())
    }

    /// Initial velocities, checked against `ncols`.
    pub fn initial_velocities(&self) -> Result<DVector<f64>> {
        self.checked("initial velocities", self.model.initial_velocities())
    }

    /// Set the simulation time.
    pub fn set_time(&mut self, t: f64) {
        self.model.set_time(t);
    }

    /// Set the generalized velocities.
    pub fn set_velocities(&mut self, qd: &DVector<f64>) {
        self.model.set_gen_velocities(qd);
    }

    /// Set the generalized accelerations.
    pub fn set_accelerations(&mut self, qdd: &DVector<f64>) {
        self.model.set_gen_accelerations(qdd);
    }

    /// Restore a full state, including multipliers, and let the model refresh
    /// its reaction bookkeeping.
    pub fn restore_state(
        &mut self,
        t: f64,
        q: &DVector<f64>,
        qd: &DVector<f64>,
        qdd: &DVector<f64>,
        lambda: &DVector<f64>,
    ) {
        self.model.set_time(t);
        self.model.set_gen_coordinates(q);
        self.model.set_gen_velocities(qd);
        self.model.set_gen_accelerations(qdd);
        self.model.set_lagrange_multipliers(lambda);
        self.model.eval_reactions_eq();
    }

    /// Position residual `Φ`.
    pub fn position_residual(&mut self) -> Result<DVector<f64>> {
        concatenate_blocks("position equations", self.nrows, &self.model.eval_pos_eq())
    }

    /// Velocity right-hand side `ν`.
    pub fn velocity_rhs(&mut self) -> Result<DVector<f64>> {
        concatenate_blocks("velocity equations", self.nrows, &self.model.eval_vel_eq())
    }

    /// Acceleration right-hand side `γ`.
    pub fn acceleration_rhs(&mut self) -> Result<DVector<f64>> {
        concatenate_blocks(
            "acceleration equations",
            self.nrows,
            &self.model.eval_acc_eq(),
        )
    }

    /// Applied generalized forces `Q`.
    pub fn forces(&mut self) -> Result<DVector<f64>> {
        concatenate_blocks("force equations", self.ncols, &self.model.eval_frc_eq())
    }

    /// Sparse constraint Jacobian `J` (`nrows × ncols`).
    pub fn constraint_jacobian(&mut self) -> Result<SparseMatrix> {
        assemble_blocks(self.nrows, self.ncols, &self.model.eval_jac_eq())
    }

    /// Sparse block-diagonal mass matrix `M` (`ncols × ncols`).
    pub fn mass_matrix(&mut self) -> Result<SparseMatrix> {
        assemble_block_diagonal(self.ncols, &self.model.eval_mass_eq())
    }

    fn checked(&self, what: &str, v: DVector<f64>) -> Result<DVector<f64>> {
        if v.len() == self.ncols {
            Ok(v)
        } else {
            Err(SolverError::dimension_mismatch(
                what,
                self.ncols,
                v.len(),
            ))
        }
    }
}

impl<M: MultibodyModel + ?Sized> PositionSystem for ModelSystem<'_, M> {
    type Jacobian = SparseMatrix;

    fn dimension(&self) -> usize {
        self.ncols
    }

    fn set_coordinates(&mut self, q: &DVector<f64>) -> Result<()> {
        if q.len() != self.ncols {
            return Err(SolverError::dimension_mismatch(
                "generalized coordinates",
                self.ncols,
                q.len(),
            ));
        }
        self.model.set_gen_coordinates(q);
        Ok(())
    }

    fn residual(&mut self) -> Result<DVector<f64>> {
        self.position_residual()
    }

    fn jacobian(&mut self) -> Result<SparseMatrix> {
        self.constraint_jacobian()
    }
}

/// Position equations with the independent coordinates pinned.
///
/// ```text
/// [ Φ(q) ]        [ J  ]
/// [  0   ]   and  [ Sᵀ ]
/// ```
///
/// The zero rows keep the independent coordinates at the values already in
/// the guess.
pub struct AugmentedSystem<'s, 'a, M: MultibodyModel + ?Sized> {
    system: &'s mut ModelSystem<'a, M>,
    selection_t: DMatrix<f64>,
}

impl<'s, 'a, M: MultibodyModel + ?Sized> AugmentedSystem<'s, 'a, M> {
    /// Augment `system` with the selector rows of `partition`.
    pub fn new(system: &'s mut ModelSystem<'a, M>, partition: &CoordinatePartition) -> Self {
        Self {
            system,
            selection_t: partition.selection_matrix().transpose(),
        }
    }

    /// Square augmented Jacobian `[J; Sᵀ]`.
    pub fn augmented_jacobian(&mut self) -> Result<DMatrix<f64>> {
        let jacobian = self.system.constraint_jacobian()?.to_dense();
        Ok(stack_rows(&jacobian, &self.selection_t))
    }
}

impl<M: MultibodyModel + ?Sized> PositionSystem for AugmentedSystem<'_, '_, M> {
    type Jacobian = DMatrix<f64>;

    fn dimension(&self) -> usize {
        self.system.ncols()
    }

    fn set_coordinates(&mut self, q: &DVector<f64>) -> Result<()> {
        self.system.set_coordinates(q)
    }

    fn residual(&mut self) -> Result<DVector<f64>> {
        let residual = self.system.position_residual()?;
        let pinned = DVector::zeros(self.selection_t.nrows());
        concatenate_blocks(
            "augmented position equations",
            self.system.ncols(),
            &[residual, pinned],
        )
    }

    fn jacobian(&mut self) -> Result<DMatrix<f64>> {
        self.augmented_jacobian()
    }
}

/// Stack `bottom` under `top`. Both must have the same column count.
pub(crate) fn stack_rows(top: &DMatrix<f64>, bottom: &DMatrix<f64>) -> DMatrix<f64> {
    let mut out = DMatrix::zeros(top.nrows() + bottom.nrows(), top.ncols());
    out.rows_mut(0, top.nrows()).copy_from(top);
    out.rows_mut(top.nrows(), bottom.nrows()).copy_from(bottom);
    out
}
