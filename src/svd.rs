use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::sparse::SparseMatrix;
use crate::utils::math::{orthonormalize_columns, symmetric_eigen_jacobi, Xorshift32};

/// Power iterations before the Rayleigh-Ritz step. Each iteration
/// sharpens the singular-value gaps by another factor of (s_j/s_i)^2;
/// ten is far more than similarity features need.
const POWER_ITERATIONS: usize = 10;

/// Fixed start-basis seed; fits must be reproducible bit-for-bit.
const BASIS_SEED: u32 = 0x9E37_79B9;

/// Truncated SVD parameters, set before fitting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvdConfig {
    dimensions: usize,
    center: bool,
}

impl SvdConfig {
    pub fn new(dimensions: usize) -> Self {
        SvdConfig {
            dimensions,
            center: false,
        }
    }

    /// Subtract column means before decomposing (and again at
    /// transform time). The centering is applied implicitly; the dense
    /// row-by-vocabulary matrix is never materialized.
    pub fn with_centering(mut self, enabled: bool) -> Self {
        self.center = enabled;
        self
    }

    /// Rank-k decomposition of a sparse document-term matrix.
    ///
    /// Runs randomized subspace iteration from a fixed-seed start
    /// basis, so identical input always yields identical output, then
    /// rotates the converged basis onto singular-vector axes with a
    /// small Rayleigh-Ritz eigenproblem. Triples come out ordered by
    /// descending singular value.
    ///
    /// # Errors
    /// `Error::Configuration` when `dimensions` is zero or exceeds
    /// `min(rows, cols)` of the input.
    pub fn fit(&self, matrix: &SparseMatrix) -> Result<FittedSvd> {
        let rows = matrix.row_count();
        let cols = matrix.col_count();
        let limit = rows.min(cols);
        if self.dimensions == 0 || self.dimensions > limit {
            return Err(Error::Configuration(format!(
                "latent dimension {} out of range for a {rows}x{cols} matrix",
                self.dimensions
            )));
        }
        let k = self.dimensions;
        let means = if self.center {
            Some(column_means(matrix))
        } else {
            None
        };

        let mut rng = Xorshift32::new(BASIS_SEED);
        let mut basis = Array2::from_shape_fn((cols, k), |_| rng.next_f64() - 0.5);
        orthonormalize_columns(&mut basis);
        for _ in 0..POWER_ITERATIONS {
            let projected = project_rows(matrix, &basis, means.as_ref());
            let mut back = back_project(matrix, &projected, means.as_ref());
            orthonormalize_columns(&mut back);
            basis = back;
        }

        // Rayleigh-Ritz: eigenvectors of (AV)^T (AV) rotate the basis
        // onto singular-vector axes, eigenvalues are squared singular
        // values.
        let projected = project_rows(matrix, &basis, means.as_ref());
        let gram = projected.t().dot(&projected);
        let (eigenvalues, rotation) = symmetric_eigen_jacobi(gram);
        let rotated = basis.dot(&rotation);

        let mut order: Vec<usize> = (0..k).collect();
        order.sort_by(|&a, &b| eigenvalues[b].total_cmp(&eigenvalues[a]));
        let mut components = Array2::zeros((cols, k));
        let mut singular_values = Array1::zeros(k);
        for (dst, &src) in order.iter().enumerate() {
            components.column_mut(dst).assign(&rotated.column(src));
            singular_values[dst] = eigenvalues[src].max(0.0).sqrt();
        }

        debug!(rows, cols, k, "fitted truncated svd");
        Ok(FittedSvd {
            components,
            singular_values,
            column_means: means,
        })
    }
}

/// Rank-k orthogonal projection produced by [`SvdConfig::fit`]:
/// the top right-singular vectors, their singular values, and the
/// column means when the fit was centered. Frozen after fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedSvd {
    /// Right singular vectors as columns, vocabulary-size by k.
    components: Array2<f64>,
    singular_values: Array1<f64>,
    column_means: Option<Array1<f64>>,
}

impl FittedSvd {
    /// Latent dimensionality k.
    pub fn dimensions(&self) -> usize {
        self.components.ncols()
    }

    /// Expected column count of transform inputs.
    pub fn input_dimension(&self) -> usize {
        self.components.nrows()
    }

    pub fn singular_values(&self) -> &Array1<f64> {
        &self.singular_values
    }

    pub fn components(&self) -> &Array2<f64> {
        &self.components
    }

    /// Project sparse rows into the latent space, one dense k-vector
    /// per input row.
    ///
    /// Accepts any row count; the column count must equal the fitted
    /// vocabulary size. Without centering a zero row maps to the zero
    /// vector.
    ///
    /// # Errors
    /// `Error::DimensionMismatch` on column-count mismatch.
    pub fn transform(&self, matrix: &SparseMatrix) -> Result<Array2<f64>> {
        if matrix.col_count() != self.components.nrows() {
            return Err(Error::DimensionMismatch {
                expected: self.components.nrows(),
                got: matrix.col_count(),
            });
        }
        Ok(project_rows(matrix, &self.components, self.column_means.as_ref()))
    }
}

/// Per-column mean of the sparse matrix (zeros included).
fn column_means(matrix: &SparseMatrix) -> Array1<f64> {
    let mut sums = Array1::zeros(matrix.col_count());
    for row in matrix.rows() {
        for (index, value) in row.iter() {
            sums[index as usize] += value;
        }
    }
    let n = matrix.row_count() as f64;
    sums / n
}

/// `(A - 1u^T) V` computed row-parallel without densifying A: each
/// sparse row hits only the basis rows its nonzeros select, then the
/// precomputed mean projection is subtracted.
fn project_rows(
    matrix: &SparseMatrix,
    basis: &Array2<f64>,
    means: Option<&Array1<f64>>,
) -> Array2<f64> {
    let k = basis.ncols();
    let mean_projection = means.map(|m| m.dot(basis));
    let mut out = Array2::zeros((matrix.row_count(), k));
    out.axis_iter_mut(Axis(0))
        .into_par_iter()
        .zip(matrix.rows().par_iter())
        .for_each(|(mut out_row, row)| {
            for (index, value) in row.iter() {
                let basis_row = basis.row(index as usize);
                for c in 0..k {
                    out_row[c] += value * basis_row[c];
                }
            }
            if let Some(mp) = &mean_projection {
                for c in 0..k {
                    out_row[c] -= mp[c];
                }
            }
        });
    out
}

/// `(A - 1u^T)^T Y`, the pull-back of the projected block onto term
/// space. Accumulates row contributions by scatter, then folds in the
/// centering term `-u * colsum(Y)`.
fn back_project(
    matrix: &SparseMatrix,
    projected: &Array2<f64>,
    means: Option<&Array1<f64>>,
) -> Array2<f64> {
    let k = projected.ncols();
    let mut out = Array2::zeros((matrix.col_count(), k));
    for (i, row) in matrix.rows().iter().enumerate() {
        let y = projected.row(i);
        for (index, value) in row.iter() {
            for c in 0..k {
                out[[index as usize, c]] += value * y[c];
            }
        }
    }
    if let Some(means) = means {
        let column_sums = projected.sum_axis(Axis(0));
        for j in 0..matrix.col_count() {
            for c in 0..k {
                out[[j, c]] -= means[j] * column_sums[c];
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparse::SparseVec;

    fn matrix(cols: usize, rows: Vec<Vec<(u32, f64)>>) -> SparseMatrix {
        SparseMatrix::from_rows(
            cols,
            rows.into_iter()
                .map(|pairs| SparseVec::from_sorted_pairs(cols, pairs))
                .collect(),
        )
    }

    #[test]
    fn fit_rejects_out_of_range_dimensions() {
        let m = matrix(3, vec![vec![(0, 1.0)], vec![(1, 1.0)]]);
        assert!(matches!(
            SvdConfig::new(0).fit(&m),
            Err(Error::Configuration(_))
        ));
        // min(rows, cols) = 2
        assert!(matches!(
            SvdConfig::new(3).fit(&m),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn rank_one_matrix_is_recovered() {
        // rows are multiples of [3, 0, 4]: rank 1, singular value
        // sqrt(5^2 + 10^2) = sqrt(125)
        let m = matrix(3, vec![vec![(0, 3.0), (2, 4.0)], vec![(0, 6.0), (2, 8.0)]]);
        let fitted = SvdConfig::new(1).fit(&m).unwrap();
        assert!((fitted.singular_values()[0] - 125.0f64.sqrt()).abs() < 1e-6);
        let v = fitted.components().column(0);
        // direction is [0.6, 0, 0.8] up to sign
        assert!((v[0].abs() - 0.6).abs() < 1e-6);
        assert!(v[1].abs() < 1e-9);
        assert!((v[2].abs() - 0.8).abs() < 1e-6);
        // projections are the row norms up to a common sign
        let latent = fitted.transform(&m).unwrap();
        assert!((latent[[0, 0]].abs() - 5.0).abs() < 1e-6);
        assert!((latent[[1, 0]].abs() - 10.0).abs() < 1e-6);
    }

    #[test]
    fn components_are_orthonormal() {
        let m = matrix(
            4,
            vec![
                vec![(0, 1.0), (1, 2.0)],
                vec![(1, 1.0), (2, 3.0)],
                vec![(0, 2.0), (3, 1.0)],
            ],
        );
        let fitted = SvdConfig::new(2).fit(&m).unwrap();
        let c = fitted.components();
        for i in 0..2 {
            for j in 0..2 {
                let expected = if i == j { 1.0 } else { 0.0 };
                let got = c.column(i).dot(&c.column(j));
                assert!((got - expected).abs() < 1e-8, "columns {i},{j}: {got}");
            }
        }
    }

    #[test]
    fn singular_values_are_descending() {
        let m = matrix(
            3,
            vec![
                vec![(0, 5.0)],
                vec![(1, 2.0)],
                vec![(2, 1.0)],
                vec![(0, 4.0), (1, 1.0)],
            ],
        );
        let fitted = SvdConfig::new(3).fit(&m).unwrap();
        let s = fitted.singular_values();
        assert!(s[0] >= s[1] && s[1] >= s[2]);
    }

    #[test]
    fn zero_row_maps_to_zero_vector() {
        let m = matrix(3, vec![vec![(0, 1.0), (1, 2.0)], vec![(2, 1.0)]]);
        let fitted = SvdConfig::new(1).fit(&m).unwrap();
        let latent = fitted.transform(&matrix(3, vec![vec![]])).unwrap();
        assert_eq!(latent.nrows(), 1);
        assert_eq!(latent[[0, 0]], 0.0);
    }

    #[test]
    fn transform_accepts_new_row_counts_but_not_new_widths() {
        let m = matrix(3, vec![vec![(0, 1.0)], vec![(1, 1.0)], vec![(2, 1.0)]]);
        let fitted = SvdConfig::new(2).fit(&m).unwrap();
        let five = matrix(
            3,
            vec![vec![(0, 1.0)]; 5],
        );
        assert_eq!(fitted.transform(&five).unwrap().nrows(), 5);
        let wide = matrix(4, vec![vec![(0, 1.0)]]);
        assert!(matches!(
            fitted.transform(&wide),
            Err(Error::DimensionMismatch { expected: 3, got: 4 })
        ));
    }

    #[test]
    fn centered_fit_subtracts_fitted_means_at_transform() {
        // single column with values 1 and 3: mean 2, centered values -1, 1
        let m = matrix(2, vec![vec![(0, 1.0)], vec![(0, 3.0)]]);
        let fitted = SvdConfig::new(1).with_centering(true).fit(&m).unwrap();
        assert!((fitted.singular_values()[0] - 2.0f64.sqrt()).abs() < 1e-8);
        // a row sitting exactly on the mean projects to zero
        let latent = fitted.transform(&matrix(2, vec![vec![(0, 2.0)]])).unwrap();
        assert!(latent[[0, 0]].abs() < 1e-9);
    }

    #[test]
    fn fit_is_deterministic() {
        let m = matrix(
            4,
            vec![
                vec![(0, 1.0), (3, 2.0)],
                vec![(1, 1.5)],
                vec![(2, 0.5), (3, 1.0)],
            ],
        );
        let a = SvdConfig::new(2).fit(&m).unwrap();
        let b = SvdConfig::new(2).fit(&m).unwrap();
        assert_eq!(a.components(), b.components());
        assert_eq!(a.singular_values(), b.singular_values());
    }
}
