//! Eigenvalue / eigenvector decomposition for small channel matrices.
//!
//! Two Jacobi solvers share one structure:
//!
//! - [`hermitian_eigen`] for complex Hermitian matrices (cross-spectral
//!   densities across channels), using phase-corrected Givens rotations.
//! - [`symmetric_eigen`] for real symmetric matrices (time-domain channel
//!   covariance).
//!
//! Both return eigenpairs sorted by ascending eigenvalue, so the dominant
//! component is always the last one.
//!
//! ## Complex Jacobi Rotation
//!
//! For the pivot `a_pq = |a_pq| e^{iφ}` the rotation is
//!
//! ```text
//!        col p          col q
//! G = [  c           -s          ]  row p
//!     [  s·e^{-iφ}    c·e^{-iφ}  ]  row q
//! ```
//!
//! with `tan 2θ = 2|a_pq| / (a_pp - a_qq)`. `G^H A G` zeroes `a_pq` and keeps
//! the matrix Hermitian; accumulating `V ← V G` yields the eigenvectors.
//!
//! ## Example
//!
//! ```rust
//! use ffr_core::matrix_eigenvalue::{hermitian_eigen, HermitianMatrix};
//! use num_complex::Complex64;
//!
//! let v = [Complex64::new(1.0, 1.0), Complex64::new(0.0, 2.0)];
//! let eig = hermitian_eigen(&HermitianMatrix::outer(&v));
//!
//! // rank one: the dominant eigenvalue is |v|^2, the rest vanish
//! assert!((eig.eigenvalues[1] - 6.0).abs() < 1e-10);
//! assert!(eig.eigenvalues[0].abs() < 1e-10);
//! ```

use crate::types::Complex;

const MAX_SWEEP_FACTOR: usize = 100;
const RELATIVE_TOL: f64 = 1e-15;

/// Row-major dense matrix of `f64` values.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

/// Result of a real symmetric eigenvalue decomposition, ascending.
#[derive(Debug, Clone)]
pub struct EigenResult {
    pub eigenvalues: Vec<f64>,
    /// Column *j* is the eigenvector of `eigenvalues[j]`.
    pub eigenvectors: Matrix,
}

impl EigenResult {
    /// Eigenvector of `eigenvalues[j]`
    pub fn vector(&self, j: usize) -> Vec<f64> {
        (0..self.eigenvectors.rows())
            .map(|i| self.eigenvectors.get(i, j))
            .collect()
    }
}

impl Matrix {
    /// Create a zero-initialized matrix.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Create a matrix from existing data (row-major order).
    ///
    /// # Panics
    /// Panics if `data.len() != rows * cols`.
    pub fn from_data(rows: usize, cols: usize, data: Vec<f64>) -> Self {
        assert_eq!(
            data.len(),
            rows * cols,
            "data length {} != rows*cols {}",
            data.len(),
            rows * cols
        );
        Self { rows, cols, data }
    }

    #[inline]
    pub fn get(&self, r: usize, c: usize) -> f64 {
        self.data[r * self.cols + c]
    }

    #[inline]
    pub fn set(&mut self, r: usize, c: usize, val: f64) {
        self.data[r * self.cols + c] = val;
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Create an *n*-by-*n* identity matrix.
    pub fn identity(n: usize) -> Self {
        let mut m = Self::new(n, n);
        for i in 0..n {
            m.set(i, i, 1.0);
        }
        m
    }

    fn frobenius_norm(&self) -> f64 {
        self.data.iter().map(|x| x * x).sum::<f64>().sqrt()
    }
}

/// Square complex matrix assumed Hermitian, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct HermitianMatrix {
    n: usize,
    data: Vec<Complex>,
}

/// Result of a Hermitian eigenvalue decomposition, ascending.
#[derive(Debug, Clone)]
pub struct HermitianEigen {
    /// Real eigenvalues, ascending
    pub eigenvalues: Vec<f64>,
    /// `eigenvectors[j]` belongs to `eigenvalues[j]`; unit norm.
    pub eigenvectors: Vec<Vec<Complex>>,
}

impl HermitianMatrix {
    pub fn zeros(n: usize) -> Self {
        Self {
            n,
            data: vec![Complex::new(0.0, 0.0); n * n],
        }
    }

    /// Rank-one cross-spectral matrix `v · v^H`.
    pub fn outer(v: &[Complex]) -> Self {
        let n = v.len();
        let mut m = Self::zeros(n);
        for i in 0..n {
            for j in 0..n {
                m.data[i * n + j] = v[i] * v[j].conj();
            }
        }
        m
    }

    #[inline]
    pub fn get(&self, r: usize, c: usize) -> Complex {
        self.data[r * self.n + c]
    }

    #[inline]
    pub fn set(&mut self, r: usize, c: usize, val: Complex) {
        self.data[r * self.n + c] = val;
    }

    /// Dimension
    #[inline]
    pub fn dim(&self) -> usize {
        self.n
    }

    fn frobenius_norm(&self) -> f64 {
        self.data.iter().map(|x| x.norm_sqr()).sum::<f64>().sqrt()
    }
}

// ---------------------------------------------------------------------------
// Complex Hermitian Jacobi
// ---------------------------------------------------------------------------

/// Eigenvalue decomposition of a Hermitian matrix by complex Jacobi rotations.
///
/// Eigenvectors are unit norm with their largest-magnitude entry real and
/// positive; any other phase would be an equally valid eigenvector.
pub fn hermitian_eigen(mat: &HermitianMatrix) -> HermitianEigen {
    let n = mat.dim();
    let zero = Complex::new(0.0, 0.0);

    if n == 1 {
        return HermitianEigen {
            eigenvalues: vec![mat.get(0, 0).re],
            eigenvectors: vec![vec![Complex::new(1.0, 0.0)]],
        };
    }

    let mut a = mat.clone();
    let mut v = HermitianMatrix::zeros(n);
    for i in 0..n {
        v.set(i, i, Complex::new(1.0, 0.0));
    }

    let tol = RELATIVE_TOL * a.frobenius_norm();
    let max_iter = MAX_SWEEP_FACTOR * n * n;

    for _ in 0..max_iter {
        // Find the largest off-diagonal element.
        let (mut p, mut q, mut max_off) = (0, 1, 0.0_f64);
        for i in 0..n {
            for j in (i + 1)..n {
                let val = a.get(i, j).norm();
                if val > max_off {
                    max_off = val;
                    p = i;
                    q = j;
                }
            }
        }
        if max_off <= tol {
            break;
        }

        let apq = a.get(p, q);
        let phase = Complex::from_polar(1.0, -apq.arg());
        let app = a.get(p, p).re;
        let aqq = a.get(q, q).re;
        let theta = if (app - aqq).abs() < 1e-300 {
            std::f64::consts::FRAC_PI_4
        } else {
            0.5 * (2.0 * max_off / (app - aqq)).atan()
        };
        let (s, c) = theta.sin_cos();

        // A ← A G (columns p, q)
        for i in 0..n {
            let aip = a.get(i, p);
            let aiq = a.get(i, q);
            a.set(i, p, aip * c + aiq * phase * s);
            a.set(i, q, -aip * s + aiq * phase * c);
        }
        // A ← G^H A (rows p, q)
        let phase_conj = phase.conj();
        for j in 0..n {
            let apj = a.get(p, j);
            let aqj = a.get(q, j);
            a.set(p, j, apj * c + aqj * phase_conj * s);
            a.set(q, j, -apj * s + aqj * phase_conj * c);
        }
        a.set(p, q, zero);
        a.set(q, p, zero);
        a.set(p, p, Complex::new(a.get(p, p).re, 0.0));
        a.set(q, q, Complex::new(a.get(q, q).re, 0.0));

        // V ← V G
        for i in 0..n {
            let vip = v.get(i, p);
            let viq = v.get(i, q);
            v.set(i, p, vip * c + viq * phase * s);
            v.set(i, q, -vip * s + viq * phase * c);
        }
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| a.get(i, i).re.total_cmp(&a.get(j, j).re));

    HermitianEigen {
        eigenvalues: order.iter().map(|&j| a.get(j, j).re).collect(),
        eigenvectors: order
            .iter()
            .map(|&j| fix_phase((0..n).map(|i| v.get(i, j)).collect()))
            .collect(),
    }
}

/// Rotate an eigenvector so its largest-magnitude entry is real and positive.
fn fix_phase(mut vector: Vec<Complex>) -> Vec<Complex> {
    let pivot = vector
        .iter()
        .copied()
        .fold(Complex::new(0.0, 0.0), |best, z| if z.norm() > best.norm() { z } else { best });
    if pivot.norm() > 0.0 {
        let rotation = pivot.conj() / pivot.norm();
        vector.iter_mut().for_each(|z| *z *= rotation);
    }
    vector
}

// ---------------------------------------------------------------------------
// Real symmetric Jacobi
// ---------------------------------------------------------------------------

/// Eigenvalue decomposition of a real symmetric matrix using the classical
/// Jacobi iterative method, eigenpairs sorted ascending.
///
/// # Panics
/// Panics if `mat` is not square.
pub fn symmetric_eigen(mat: &Matrix) -> EigenResult {
    let n = mat.rows();
    assert_eq!(n, mat.cols(), "symmetric_eigen requires a square matrix");

    let mut a = mat.clone();
    let mut v = Matrix::identity(n);

    let max_iter = MAX_SWEEP_FACTOR * n * n;
    let tol = RELATIVE_TOL * a.frobenius_norm();

    for _ in 0..max_iter {
        if n < 2 {
            break;
        }
        let (mut p, mut q, mut max_off) = (0, 1, 0.0_f64);
        for i in 0..n {
            for j in (i + 1)..n {
                let val = a.get(i, j).abs();
                if val > max_off {
                    max_off = val;
                    p = i;
                    q = j;
                }
            }
        }
        if max_off <= tol {
            break;
        }

        let app = a.get(p, p);
        let aqq = a.get(q, q);
        let apq = a.get(p, q);
        let theta = if (app - aqq).abs() < 1e-300 {
            std::f64::consts::FRAC_PI_4
        } else {
            0.5 * (2.0 * apq / (app - aqq)).atan()
        };
        let (s, c) = theta.sin_cos();

        // A' = G^T A G on rows/cols p and q
        for i in 0..n {
            let aip = a.get(i, p);
            let aiq = a.get(i, q);
            a.set(i, p, c * aip + s * aiq);
            a.set(i, q, -s * aip + c * aiq);
        }
        for j in 0..n {
            let apj = a.get(p, j);
            let aqj = a.get(q, j);
            a.set(p, j, c * apj + s * aqj);
            a.set(q, j, -s * apj + c * aqj);
        }

        // V' = V G
        for i in 0..n {
            let vip = v.get(i, p);
            let viq = v.get(i, q);
            v.set(i, p, c * vip + s * viq);
            v.set(i, q, -s * vip + c * viq);
        }
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| a.get(i, i).total_cmp(&a.get(j, j)));

    let mut vectors = Matrix::new(n, n);
    for (col, &src) in order.iter().enumerate() {
        for i in 0..n {
            vectors.set(i, col, v.get(i, src));
        }
    }
    EigenResult {
        eigenvalues: order.iter().map(|&j| a.get(j, j)).collect(),
        eigenvectors: vectors,
    }
}

// ---------------------------------------------------------------------------
// Covariance matrix
// ---------------------------------------------------------------------------

/// Compute the sample covariance matrix from a set of observation vectors.
///
/// Each element of `data` is one snapshot (observation vector) of length *n*.
/// Returns an *n*-by-*n* covariance matrix normalised by `m - 1`.
///
/// # Panics
/// Panics if `data` is empty or vectors differ in length.
pub fn covariance_matrix(data: &[Vec<f64>]) -> Matrix {
    assert!(!data.is_empty(), "data must not be empty");
    let n = data[0].len();
    let m = data.len() as f64;

    let mut mean = vec![0.0; n];
    for snapshot in data {
        assert_eq!(snapshot.len(), n, "all data vectors must have the same length");
        for (i, &v) in snapshot.iter().enumerate() {
            mean[i] += v;
        }
    }
    for v in mean.iter_mut() {
        *v /= m;
    }

    let divisor = if m > 1.0 { m - 1.0 } else { 1.0 };
    let mut cov = Matrix::new(n, n);
    for snapshot in data {
        for i in 0..n {
            let di = snapshot[i] - mean[i];
            for j in 0..n {
                let dj = snapshot[j] - mean[j];
                let cur = cov.get(i, j);
                cov.set(i, j, cur + di * dj);
            }
        }
    }
    for i in 0..n {
        for j in 0..n {
            let cur = cov.get(i, j);
            cov.set(i, j, cur / divisor);
        }
    }
    cov
}
