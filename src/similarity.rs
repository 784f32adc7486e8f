use ndarray::Array2;

use crate::error::{Error, Result};
use crate::sparse::SparseMatrix;

/// Row-aligned dot products between two sparse matrices.
///
/// `a.row_count()` must equal `b.row_count()`; column counts are not
/// compared, since entries only meet where both rows are nonzero at the
/// same index. In the feature pipeline both sides always come from the
/// same fitted vectorizer, so their vocabularies agree by construction.
///
/// This is not cosine similarity by itself. Rows that were L2
/// normalized upstream make the plain dot product a cosine; nothing is
/// re-normalized here.
pub fn row_wise_sparse_dot(a: &SparseMatrix, b: &SparseMatrix) -> Result<Vec<f64>> {
    if a.row_count() != b.row_count() {
        return Err(Error::DimensionMismatch {
            expected: a.row_count(),
            got: b.row_count(),
        });
    }
    Ok(a.rows()
        .iter()
        .zip(b.rows())
        .map(|(row_a, row_b)| row_a.dot(row_b))
        .collect())
}

/// Row-aligned dot products between two dense matrices.
///
/// Both row and column counts must match.
pub fn row_wise_dense_dot(a: &Array2<f64>, b: &Array2<f64>) -> Result<Vec<f64>> {
    if a.nrows() != b.nrows() {
        return Err(Error::DimensionMismatch {
            expected: a.nrows(),
            got: b.nrows(),
        });
    }
    if a.ncols() != b.ncols() {
        return Err(Error::DimensionMismatch {
            expected: a.ncols(),
            got: b.ncols(),
        });
    }
    Ok((0..a.nrows()).map(|i| a.row(i).dot(&b.row(i))).collect())
}
