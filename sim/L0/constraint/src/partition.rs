//! Coordinate partitioning.
//!
//! Splits the generalized coordinates of an under-constrained system into
//! `nrows` dependent coordinates `u` and `dof = ncols − nrows` independent
//! coordinates `v`.
//!
//! # Method
//!
//! `Jᵀ` (`ncols × nrows`) is factorized with partial pivoting:
//!
//! ```text
//! Jᵀ = P · L · U
//! ```
//!
//! The pivot rows picked for the first `nrows` positions are the coordinates
//! whose Jacobian columns are best conditioned; they become dependent. The
//! trailing `dof` columns of `P` select the independent coordinates, and the
//! single non-zero entry of each such column names the representative
//! coordinate of that direction.
//!
//! A partition is computed once from the initial configuration and is not
//! re-derived when the configuration drifts. If `Ju` later becomes singular
//! the drivers surface the failure instead of re-partitioning.

use mbd_types::{Result, SolveStage, SolverError};
use nalgebra::{DMatrix, DVector};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::linear::check_pivots;

/// Split of the generalized coordinates into dependent and independent sets.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CoordinatePartition {
    nrows: usize,
    /// Coordinate indices in pivot order: dependent first, independent last.
    order: Vec<usize>,
}

impl CoordinatePartition {
    /// Partition the coordinates from the constraint Jacobian `J`
    /// (`nrows × ncols`).
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::DofMismatch`] if `nrows > ncols` and
    /// [`SolverError::SingularSystem`] at [`SolveStage::Partition`] if the
    /// constraint rows are linearly dependent.
    pub fn from_jacobian(jacobian: &DMatrix<f64>) -> Result<Self> {
        let (nrows, ncols) = jacobian.shape();
        if nrows > ncols {
            return Err(SolverError::DofMismatch {
                analysis: "coordinate partitioning",
                expected: "nrows <= ncols",
                nrows,
                ncols,
            });
        }

        let mut order = DVector::from_iterator(ncols, 0..ncols);
        if nrows > 0 {
            let lu = jacobian.transpose().lu();
            check_pivots(&lu.u(), SolveStage::Partition)?;
            lu.p().permute_rows(&mut order);
        }

        let partition = Self {
            nrows,
            order: order.iter().copied().collect(),
        };
        debug!(
            dof = partition.dof(),
            independent = ?partition.independent(),
            "coordinate partition"
        );
        Ok(partition)
    }

    /// Number of degrees of freedom.
    #[must_use]
    pub fn dof(&self) -> usize {
        self.order.len() - self.nrows
    }

    /// Number of constraint rows.
    #[must_use]
    pub const fn nrows(&self) -> usize {
        self.nrows
    }

    /// Number of generalized coordinates.
    #[must_use]
    pub fn ncols(&self) -> usize {
        self.order.len()
    }

    /// All coordinate indices, dependent first then independent.
    #[must_use]
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Indices of the dependent coordinates `u`.
    #[must_use]
    pub fn dependent(&self) -> &[usize] {
        &self.order[..self.nrows]
    }

    /// Indices of the independent coordinates `v`.
    #[must_use]
    pub fn independent(&self) -> &[usize] {
        &self.order[self.nrows..]
    }

    /// Permutation matrix `P` with `P[order[k], k] = 1`.
    ///
    /// `Pᵀ · q` reorders `q` into `[u; v]`.
    #[must_use]
    pub fn permutation_matrix(&self) -> DMatrix<f64> {
        let n = self.ncols();
        let mut p = DMatrix::zeros(n, n);
        for (k, &i) in self.order.iter().enumerate() {
            p[(i, k)] = 1.0;
        }
        p
    }

    /// Trailing `dof` columns of the permutation matrix (`ncols × dof`).
    ///
    /// Its transpose stacked under `J` pins the independent coordinates.
    #[must_use]
    pub fn selection_matrix(&self) -> DMatrix<f64> {
        let mut s = DMatrix::zeros(self.ncols(), self.dof());
        for (k, &i) in self.independent().iter().enumerate() {
            s[(i, k)] = 1.0;
        }
        s
    }

    /// Row of the largest entry of column `k` of the selection matrix, that
    /// is the coordinate representing independent direction `k`.
    #[must_use]
    pub fn representative(&self, k: usize) -> Option<usize> {
        self.independent().get(k).copied()
    }

    /// Labels of the independent coordinates.
    #[must_use]
    pub fn independent_labels<'a>(&self, labels: &'a [String]) -> Vec<&'a str> {
        self.independent()
            .iter()
            .filter_map(|&i| labels.get(i).map(String::as_str))
            .collect()
    }

    /// Split the columns of a `nrows × ncols` matrix into `(Ju, Jv)`.
    #[must_use]
    pub fn split_columns(&self, matrix: &DMatrix<f64>) -> (DMatrix<f64>, DMatrix<f64>) {
        (
            matrix.select_columns(self.dependent()),
            matrix.select_columns(self.independent()),
        )
    }

    /// Split a `ncols × ncols` mass matrix into `(Muu, Muv, Mvu, Mvv)`.
    #[must_use]
    pub fn split_mass(
        &self,
        mass: &DMatrix<f64>,
    ) -> (DMatrix<f64>, DMatrix<f64>, DMatrix<f64>, DMatrix<f64>) {
        let (u, v) = (self.dependent(), self.independent());
        let rows_u = mass.select_rows(u);
        let rows_v = mass.select_rows(v);
        (
            rows_u.select_columns(u),
            rows_u.select_columns(v),
            rows_v.select_columns(u),
            rows_v.select_columns(v),
        )
    }

    /// Split a length-`ncols` vector into `(xu, xv)`.
    #[must_use]
    pub fn split_vector(&self, x: &DVector<f64>) -> (DVector<f64>, DVector<f64>) {
        (
            x.select_rows(self.dependent()),
            x.select_rows(self.independent()),
        )
    }

    /// Independent entries of `x`.
    #[must_use]
    pub fn gather_independent(&self, x: &DVector<f64>) -> DVector<f64> {
        x.select_rows(self.independent())
    }

    /// Overwrite the independent entries of `x` with `values`.
    pub fn scatter_independent(&self, x: &mut DVector<f64>, values: &DVector<f64>) {
        for (&i, &value) in self.independent().iter().zip(values.iter()) {
            x[i] = value;
        }
    }
}
