//! Sparse block assembly for constraint Jacobians and mass matrices.
//!
//! Model adapters hand equations over as lists of dense blocks, each placed
//! at a scalar `(row, col)` offset of the assembled matrix. Constraint
//! Jacobians are very sparse (a joint only touches the coordinates of the two
//! bodies it connects), so blocks are accumulated as triplets and compressed
//! into CSR form.
//!
//! # Sparsity Pattern
//!
//! For a system with N spatial bodies and M scalar constraints, the Jacobian
//! has dimensions:
//! - Rows: M
//! - Columns: 7 * N (3 translational + 4 Euler parameters per body)
//!
//! Each joint row only has non-zeros in the 14 columns of its body pair.
//!
//! # Validation
//!
//! Unlike a plain triplet list, [`BlockAssembler`] rejects blocks that fall
//! outside the matrix or cover entries already claimed by another block.
//! Silently summing overlapping blocks hides adapter bugs.

use mbd_types::{Result, SolverError};
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{CooMatrix, CsrMatrix};

/// Entries with a magnitude at or below this are not stored.
const DROP_TOLERANCE: f64 = 1e-15;

/// A dense block placed at a scalar offset of an assembled matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixBlock {
    /// Row of the block's top-left entry.
    pub row: usize,
    /// Column of the block's top-left entry.
    pub col: usize,
    /// Block values.
    pub block: DMatrix<f64>,
}

impl MatrixBlock {
    /// Create a block at `(row, col)`.
    #[must_use]
    pub fn new(row: usize, col: usize, block: DMatrix<f64>) -> Self {
        Self { row, col, block }
    }

    /// Create a single-row block from a slice.
    #[must_use]
    pub fn row_vector(row: usize, col: usize, values: &[f64]) -> Self {
        Self::new(row, col, DMatrix::from_row_slice(1, values.len(), values))
    }
}

/// Sparse matrix in CSR format.
///
/// CSR (Compressed Sparse Row) is optimal for:
/// - Row-wise iteration (iterating over constraints)
/// - Matrix-vector products J * v
#[derive(Debug, Clone)]
pub struct SparseMatrix {
    matrix: CsrMatrix<f64>,
}

impl SparseMatrix {
    /// Build a sparse matrix from `(row, col, value)` triplets.
    ///
    /// Duplicate entries are summed. Triplets must be in range; use
    /// [`BlockAssembler`] for validated assembly.
    #[must_use]
    pub fn from_triplets(
        num_rows: usize,
        num_cols: usize,
        triplets: &[(usize, usize, f64)],
    ) -> Self {
        let mut coo = CooMatrix::new(num_rows, num_cols);

        for &(row, col, val) in triplets {
            if val.abs() > DROP_TOLERANCE {
                coo.push(row, col, val);
            }
        }

        Self {
            matrix: CsrMatrix::from(&coo),
        }
    }

    /// An all-zero matrix.
    #[must_use]
    pub fn zeros(num_rows: usize, num_cols: usize) -> Self {
        Self::from_triplets(num_rows, num_cols, &[])
    }

    /// Get the number of rows.
    #[must_use]
    pub fn nrows(&self) -> usize {
        self.matrix.nrows()
    }

    /// Get the number of columns.
    #[must_use]
    pub fn ncols(&self) -> usize {
        self.matrix.ncols()
    }

    /// Get the number of stored entries.
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.matrix.nnz()
    }

    /// Compute A * v.
    #[must_use]
    pub fn mul_vec(&self, v: &DVector<f64>) -> DVector<f64> {
        let mut result = DVector::zeros(self.nrows());

        for (row_idx, row) in self.matrix.row_iter().enumerate() {
            let mut sum = 0.0;
            for (&col_idx, &val) in row.col_indices().iter().zip(row.values().iter()) {
                sum += val * v[col_idx];
            }
            result[row_idx] = sum;
        }

        result
    }

    /// Compute A^T * v.
    #[must_use]
    pub fn mul_transpose_vec(&self, v: &DVector<f64>) -> DVector<f64> {
        let mut result = DVector::zeros(self.ncols());

        // For CSR, transpose multiply requires column-wise accumulation
        for (row_idx, row) in self.matrix.row_iter().enumerate() {
            let v_row = v[row_idx];
            for (&col_idx, &val) in row.col_indices().iter().zip(row.values().iter()) {
                result[col_idx] += val * v_row;
            }
        }

        result
    }

    /// Convert to a dense matrix.
    #[must_use]
    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut dense = DMatrix::zeros(self.nrows(), self.ncols());

        for (row_idx, row) in self.matrix.row_iter().enumerate() {
            for (&col_idx, &val) in row.col_indices().iter().zip(row.values().iter()) {
                dense[(row_idx, col_idx)] = val;
            }
        }

        dense
    }

    /// Dense copy of rows `rows` restricted to columns `cols`.
    #[must_use]
    pub fn dense_block(
        &self,
        rows: std::ops::Range<usize>,
        cols: std::ops::Range<usize>,
    ) -> DMatrix<f64> {
        let mut dense = DMatrix::zeros(rows.len(), cols.len());

        for (local_row, row_idx) in rows.clone().enumerate() {
            let row = self.matrix.row(row_idx);
            for (&col_idx, &val) in row.col_indices().iter().zip(row.values().iter()) {
                if cols.contains(&col_idx) {
                    dense[(local_row, col_idx - cols.start)] = val;
                }
            }
        }

        dense
    }

    /// Get the underlying CSR matrix.
    #[must_use]
    pub const fn csr(&self) -> &CsrMatrix<f64> {
        &self.matrix
    }
}

/// Validated builder turning dense blocks into a [`SparseMatrix`].
#[derive(Debug, Clone)]
pub struct BlockAssembler {
    triplets: Vec<(usize, usize, f64)>,
    /// Claimed rectangles as `(row, col, rows, cols)`.
    claimed: Vec<(usize, usize, usize, usize)>,
    num_rows: usize,
    num_cols: usize,
}

impl BlockAssembler {
    /// Create an assembler for a `num_rows x num_cols` matrix.
    #[must_use]
    pub fn new(num_rows: usize, num_cols: usize) -> Self {
        Self {
            triplets: Vec::with_capacity(num_rows * 14),
            claimed: Vec::new(),
            num_rows,
            num_cols,
        }
    }

    /// Place a dense block with its top-left entry at `(row, col)`.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::BlockOutOfRange`] if the block does not fit and
    /// [`SolverError::BlockOverlap`] if it covers an already claimed entry.
    pub fn add_block(&mut self, row: usize, col: usize, block: &DMatrix<f64>) -> Result<()> {
        let (rows, cols) = block.shape();
        if rows == 0 || cols == 0 {
            return Ok(());
        }

        if row + rows > self.num_rows || col + cols > self.num_cols {
            return Err(SolverError::BlockOutOfRange {
                row,
                col,
                rows,
                cols,
                total_rows: self.num_rows,
                total_cols: self.num_cols,
            });
        }

        let overlaps = self.claimed.iter().any(|&(r, c, nr, nc)| {
            row < r + nr && r < row + rows && col < c + nc && c < col + cols
        });
        if overlaps {
            return Err(SolverError::BlockOverlap { row, col });
        }
        self.claimed.push((row, col, rows, cols));

        for j in 0..cols {
            for i in 0..rows {
                let value = block[(i, j)];
                if value.abs() > DROP_TOLERANCE {
                    self.triplets.push((row + i, col + j, value));
                }
            }
        }

        Ok(())
    }

    /// Place every block of a list.
    pub fn add_blocks<'a>(
        &mut self,
        blocks: impl IntoIterator<Item = &'a MatrixBlock>,
    ) -> Result<()> {
        for block in blocks {
            self.add_block(block.row, block.col, &block.block)?;
        }
        Ok(())
    }

    /// Build the sparse matrix.
    #[must_use]
    pub fn build(self) -> SparseMatrix {
        SparseMatrix::from_triplets(self.num_rows, self.num_cols, &self.triplets)
    }
}

/// Assemble a list of blocks into a `num_rows x num_cols` sparse matrix.
pub fn assemble_blocks(
    num_rows: usize,
    num_cols: usize,
    blocks: &[MatrixBlock],
) -> Result<SparseMatrix> {
    let mut assembler = BlockAssembler::new(num_rows, num_cols);
    assembler.add_blocks(blocks)?;
    Ok(assembler.build())
}

/// Assemble square blocks consecutively along the diagonal of a `size x size`
/// matrix.
///
/// # Errors
///
/// Returns [`SolverError::DimensionMismatch`] if a block is not square or the
/// blocks do not exactly fill the diagonal.
pub fn assemble_block_diagonal(size: usize, blocks: &[DMatrix<f64>]) -> Result<SparseMatrix> {
    let mut assembler = BlockAssembler::new(size, size);
    let mut offset = 0;

    for block in blocks {
        if !block.is_square() {
            return Err(SolverError::dimension_mismatch(
                "diagonal block columns",
                block.nrows(),
                block.ncols(),
            ));
        }
        assembler.add_block(offset, offset, block)?;
        offset += block.nrows();
    }

    if offset != size {
        return Err(SolverError::dimension_mismatch(
            "block diagonal size",
            size,
            offset,
        ));
    }

    Ok(assembler.build())
}

/// Concatenate vector blocks in order, checking the total length.
pub fn concatenate_blocks(
    what: &str,
    len: usize,
    blocks: &[DVector<f64>],
) -> Result<DVector<f64>> {
    let total: usize = blocks.iter().map(DVector::len).sum();
    if total != len {
        return Err(SolverError::dimension_mismatch(what, len, total));
    }

    let mut out = DVector::zeros(len);
    let mut offset = 0;
    for block in blocks {
        out.rows_mut(offset, block.len()).copy_from(block);
        offset += block.len();
    }
    Ok(out)
}
