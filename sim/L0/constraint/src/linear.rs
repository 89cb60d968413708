//! Linear system solves.
//!
//! Every linear solve in the analysis drivers goes through [`solve`]. The
//! coefficient matrix may be dense or sparse (sparse matrices are densified
//! before factorization) and the right-hand side may be a vector or a matrix
//! of several right-hand sides. The solution always comes back as a 2-D
//! matrix with one column per right-hand side.
//!
//! Factorization is LU with partial pivoting of the equilibrated matrix:
//! every row and then every column is scaled to a largest magnitude of one
//! before factoring. Augmented systems mix mass entries with Jacobian
//! entries many orders of magnitude smaller, and without equilibration their
//! Schur-complement pivots look singular next to the mass pivots. A pivot
//! that is tiny relative to the largest pivot of the equilibrated matrix is
//! treated as singular, as is a non-finite solution.

use std::borrow::Cow;

use mbd_types::{Result, SolveStage, SolverError};
use nalgebra::{DMatrix, DVector};

use crate::sparse::SparseMatrix;

/// Pivots smaller than this fraction of the largest pivot mark the matrix
/// as numerically singular. Applied after equilibration in [`solve`].
pub const SINGULAR_PIVOT_RATIO: f64 = 1e-13;

/// A coefficient matrix that can be factorized.
pub trait SystemMatrix {
    /// `(rows, cols)` of the matrix.
    fn shape(&self) -> (usize, usize);

    /// Dense view of the matrix.
    fn to_dense_matrix(&self) -> Cow<'_, DMatrix<f64>>;
}

impl SystemMatrix for DMatrix<f64> {
    fn shape(&self) -> (usize, usize) {
        (self.nrows(), self.ncols())
    }

    fn to_dense_matrix(&self) -> Cow<'_, DMatrix<f64>> {
        Cow::Borrowed(self)
    }
}

impl SystemMatrix for SparseMatrix {
    fn shape(&self) -> (usize, usize) {
        (self.nrows(), self.ncols())
    }

    fn to_dense_matrix(&self) -> Cow<'_, DMatrix<f64>> {
        Cow::Owned(self.to_dense())
    }
}

/// A right-hand side: one or more columns.
pub trait RightHandSide {
    /// The right-hand side as a matrix with one column per system.
    fn to_columns(&self) -> Cow<'_, DMatrix<f64>>;
}

impl RightHandSide for DMatrix<f64> {
    fn to_columns(&self) -> Cow<'_, DMatrix<f64>> {
        Cow::Borrowed(self)
    }
}

impl RightHandSide for DVector<f64> {
    fn to_columns(&self) -> Cow<'_, DMatrix<f64>> {
        Cow::Owned(DMatrix::from_column_slice(self.len(), 1, self.as_slice()))
    }
}

/// Solve `A · X = B`.
///
/// Returns `X` with as many columns as `B`.
///
/// # Errors
///
/// Returns [`SolverError::SingularSystem`] tagged with `stage` if `A` is not
/// square, its size does not match `B`, or it is singular.
pub fn solve<A, B>(a: &A, b: &B, stage: SolveStage) -> Result<DMatrix<f64>>
where
    A: SystemMatrix + ?Sized,
    B: RightHandSide + ?Sized,
{
    let (rows, cols) = a.shape();
    if rows != cols {
        return Err(SolverError::singular(
            stage,
            format!("coefficient matrix is not square ({rows}x{cols})"),
        ));
    }

    let rhs = b.to_columns();
    if rhs.nrows() != rows {
        return Err(SolverError::singular(
            stage,
            format!(
                "right-hand side has {} rows, expected {rows}",
                rhs.nrows()
            ),
        ));
    }

    if rows == 0 {
        return Ok(DMatrix::zeros(0, rhs.ncols()));
    }

    let mut scaled = a.to_dense_matrix().into_owned();
    let (row_scale, col_scale) = equilibrate(&mut scaled, stage)?;

    let lu = scaled.lu();
    check_pivots(&lu.u(), stage)?;

    let mut scaled_rhs = rhs.into_owned();
    for (mut row, &scale) in scaled_rhs.row_iter_mut().zip(row_scale.iter()) {
        row.scale_mut(scale);
    }

    let mut x = lu
        .solve(&scaled_rhs)
        .ok_or_else(|| SolverError::singular(stage, "zero pivot in LU factorization"))?;
    for (mut row, &scale) in x.row_iter_mut().zip(col_scale.iter()) {
        row.scale_mut(scale);
    }

    if x.iter().any(|v| !v.is_finite()) {
        return Err(SolverError::singular(stage, "solution is not finite"));
    }

    Ok(x)
}

/// Solve `A · x = b` for a single right-hand side.
pub fn solve_vector<A>(a: &A, b: &DVector<f64>, stage: SolveStage) -> Result<DVector<f64>>
where
    A: SystemMatrix + ?Sized,
{
    let x = solve(a, b, stage)?;
    Ok(x.column(0).into_owned())
}

/// Scale the rows of `a`, then its columns, to a largest magnitude of one.
///
/// Returns `(r, c)` such that the scaled matrix is `diag(r) · A · diag(c)`.
/// A zero or non-finite row or column makes the matrix singular.
fn equilibrate(
    a: &mut DMatrix<f64>,
    stage: SolveStage,
) -> Result<(DVector<f64>, DVector<f64>)> {
    let mut row_scale = DVector::zeros(a.nrows());
    for (index, mut row) in a.row_iter_mut().enumerate() {
        let largest = row.amax();
        if largest == 0.0 || !largest.is_finite() {
            return Err(SolverError::singular(
                stage,
                format!("row {index} has no usable entries"),
            ));
        }
        row_scale[index] = largest.recip();
        row.scale_mut(row_scale[index]);
    }

    let mut col_scale = DVector::zeros(a.ncols());
    for (index, mut column) in a.column_iter_mut().enumerate() {
        let largest = column.amax();
        if largest == 0.0 || !largest.is_finite() {
            return Err(SolverError::singular(
                stage,
                format!("column {index} has no usable entries"),
            ));
        }
        col_scale[index] = largest.recip();
        column.scale_mut(col_scale[index]);
    }

    Ok((row_scale, col_scale))
}

pub(crate) fn check_pivots(u: &DMatrix<f64>, stage: SolveStage) -> Result<()> {
    let pivots = u.diagonal();
    let largest = pivots.amax();

    if largest == 0.0 || !largest.is_finite() {
        return Err(SolverError::singular(stage, "matrix has no usable pivots"));
    }

    for (index, pivot) in pivots.iter().enumerate() {
        if pivot.abs() <= SINGULAR_PIVOT_RATIO * largest {
            return Err(SolverError::singular(
                stage,
                format!("pivot {index} is {pivot:e} (largest {largest:e})"),
            ));
        }
    }

    Ok(())
}
