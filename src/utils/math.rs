use ndarray::{Array2, Axis};

/// tiny deterministic PRNG (xorshift32)
///
/// Used to seed the subspace iteration start basis. A fixed seed keeps
/// every fit bit-reproducible; statistical quality beyond "not aligned
/// with any singular direction" is irrelevant here.
#[derive(Debug, Clone)]
pub struct Xorshift32(u32);

impl Xorshift32 {
    pub fn new(seed: u32) -> Self {
        // xorshift has a single absorbing state at zero
        Self(if seed == 0 { 0xDEAD_BEEF } else { seed })
    }

    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.0 = x;
        x
    }

    /// Uniform value in `[0, 1)`.
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        self.next_u32() as f64 / (u32::MAX as f64 + 1.0)
    }
}

/// Orthonormalize the columns of `m` in place (modified Gram-Schmidt).
///
/// Columns that collapse below `1e-12` after projection are zeroed out;
/// downstream they carry a zero singular value instead of garbage.
pub fn orthonormalize_columns(m: &mut Array2<f64>) {
    let cols = m.ncols();
    for j in 0..cols {
        let (left, mut right) = m.view_mut().split_at(Axis(1), j);
        let mut col_j = right.column_mut(0);
        for i in 0..j {
            let col_i = left.column(i);
            let proj = col_i.dot(&col_j);
            col_j.zip_mut_with(&col_i, |x, &y| *x -= proj * y);
        }
        let norm = col_j.dot(&col_j).sqrt();
        if norm > 1e-12 {
            col_j.mapv_inplace(|x| x / norm);
        } else {
            col_j.fill(0.0);
        }
    }
}

const JACOBI_MAX_SWEEPS: usize = 64;
const JACOBI_TOL: f64 = 1e-12;

/// Eigendecomposition of a small symmetric matrix by cyclic Jacobi
/// rotations.
///
/// Returns `(eigenvalues, eigenvectors)` with eigenvectors as columns,
/// unordered. Intended for the k-by-k Rayleigh-Ritz matrices of the
/// truncated SVD, where k stays in the low hundreds.
pub fn symmetric_eigen_jacobi(mut a: Array2<f64>) -> (Vec<f64>, Array2<f64>) {
    let n = a.nrows();
    debug_assert_eq!(n, a.ncols(), "jacobi input must be square");
    let mut v: Array2<f64> = Array2::eye(n);
    for _ in 0..JACOBI_MAX_SWEEPS {
        let mut off = 0.0;
        for p in 0..n {
            for q in (p + 1)..n {
                off += a[[p, q]] * a[[p, q]];
            }
        }
        if off.sqrt() <= JACOBI_TOL {
            break;
        }
        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[[p, q]];
                if apq.abs() <= f64::EPSILON {
                    continue;
                }
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;
                // two-sided rotation: A <- J^T A J, column pass then row pass
                for i in 0..n {
                    let aip = a[[i, p]];
                    let aiq = a[[i, q]];
                    a[[i, p]] = c * aip - s * aiq;
                    a[[i, q]] = s * aip + c * aiq;
                }
                for i in 0..n {
                    let api = a[[p, i]];
                    let aqi = a[[q, i]];
                    a[[p, i]] = c * api - s * aqi;
                    a[[q, i]] = s * api + c * aqi;
                }
                for i in 0..n {
                    let vip = v[[i, p]];
                    let viq = v[[i, q]];
                    v[[i, p]] = c * vip - s * viq;
                    v[[i, q]] = s * vip + c * viq;
                }
            }
        }
    }
    let eigenvalues = (0..n).map(|i| a[[i, i]]).collect();
    (eigenvalues, v)
}
