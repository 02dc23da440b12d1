//! Taper (window) sequences for multitaper estimation
//!
//! Estimators consume tapers only through elementwise multiplication, so the
//! source of the windows is pluggable through [`TaperProvider`]. The default
//! provider computes discrete prolate spheroidal sequences ([`Dpss`]), the
//! windows that maximise energy concentration in `[-W, W]` for a given length.
//!
//! ## DPSS Construction
//!
//! The Slepian sequences of length `N` and half-bandwidth `W = NW/N` are the
//! eigenvectors of a symmetric tridiagonal matrix that commutes with the
//! concentration operator:
//!
//! ```text
//! diag[n]   = ((N - 1 - 2n) / 2)^2 · cos(2πW)
//! off[n]    = n (N - n) / 2
//! ```
//!
//! The top `K` eigenvalues are isolated by Sturm-sequence bisection and their
//! eigenvectors refined by inverse iteration. Concentration ratios are then
//! evaluated directly from each window's autocorrelation against the sinc
//! kernel.
//!
//! ## Example
//!
//! ```rust
//! use ffr_core::taper::{Dpss, TaperProvider};
//!
//! let tapers = Dpss.tapers(256, 2.0, 3).unwrap();
//! assert_eq!(tapers.count(), 3);
//! assert!(tapers.concentrations()[0] > 0.99);
//! ```

use ndarray::{Array1, Array2, ArrayView1, Axis};
use std::collections::HashMap;
use std::f64::consts::PI;
use std::sync::{Arc, Mutex};

use crate::fft_utils::FftProcessor;
use crate::types::{ConfigError, SpectralResult};

/// An ordered set of windows of equal length with their concentration ratios.
#[derive(Debug, Clone, PartialEq)]
pub struct TaperSet {
    /// `count x length`
    windows: Array2<f64>,
    concentrations: Vec<f64>,
}

impl TaperSet {
    /// Build a taper set from `count x length` windows.
    pub fn new(windows: Array2<f64>, concentrations: Vec<f64>) -> Self {
        debug_assert_eq!(windows.nrows(), concentrations.len());
        Self {
            windows,
            concentrations,
        }
    }

    /// Number of tapers
    pub fn count(&self) -> usize {
        self.windows.nrows()
    }

    /// Window length in samples
    pub fn len(&self) -> usize {
        self.windows.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// The `k`-th window
    pub fn window(&self, k: usize) -> ArrayView1<'_, f64> {
        self.windows.row(k)
    }

    /// Iterate windows in order
    pub fn iter(&self) -> impl Iterator<Item = ArrayView1<'_, f64>> {
        self.windows.axis_iter(Axis(0))
    }

    pub fn concentrations(&self) -> &[f64] {
        &self.concentrations
    }

    /// Copy of this set with every window rescaled to unit peak amplitude.
    pub fn rescaled_to_unit_peak(&self) -> TaperSet {
        let mut windows = self.windows.clone();
        for mut row in windows.axis_iter_mut(Axis(0)) {
            let peak = row.iter().fold(f64::NEG_INFINITY, |m, &v| m.max(v));
            if peak != 0.0 && peak.is_finite() {
                row.mapv_inplace(|v| v / peak);
            }
        }
        TaperSet::new(windows, self.concentrations.clone())
    }
}

/// Source of taper windows.
pub trait TaperProvider: Send + Sync {
    /// `count` windows of `len` samples for time-bandwidth product `time_bandwidth`.
    fn tapers(&self, len: usize, time_bandwidth: f64, count: usize) -> SpectralResult<Arc<TaperSet>>;
}

impl<P: TaperProvider + ?Sized> TaperProvider for Arc<P> {
    fn tapers(&self, len: usize, time_bandwidth: f64, count: usize) -> SpectralResult<Arc<TaperSet>> {
        (**self).tapers(len, time_bandwidth, count)
    }
}

/// Discrete prolate spheroidal (Slepian) sequences, unit energy.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dpss;

impl TaperProvider for Dpss {
    fn tapers(&self, len: usize, time_bandwidth: f64, count: usize) -> SpectralResult<Arc<TaperSet>> {
        if len == 0 || count == 0 || count > len || !(time_bandwidth > 0.0) {
            return Err(ConfigError::InvalidTaper {
                time_bandwidth,
                count,
            }
            .into());
        }
        tracing::debug!(len, time_bandwidth, count, "Computing DPSS tapers");
        Ok(Arc::new(dpss_windows(len, time_bandwidth, count)))
    }
}

/// Memoising wrapper: identical `(length, bandwidth, count)` requests share
/// one taper set.
#[derive(Debug, Default)]
pub struct TaperCache<P> {
    provider: P,
    cache: Mutex<HashMap<(usize, u64, usize), Arc<TaperSet>>>,
}

impl<P: TaperProvider> TaperCache<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Number of cached taper sets
    pub fn cached(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }
}

impl<P: TaperProvider> TaperProvider for TaperCache<P> {
    fn tapers(&self, len: usize, time_bandwidth: f64, count: usize) -> SpectralResult<Arc<TaperSet>> {
        let key = (len, time_bandwidth.to_bits(), count);
        if let Ok(cache) = self.cache.lock() {
            if let Some(set) = cache.get(&key) {
                return Ok(Arc::clone(set));
            }
        }

        let set = self.provider.tapers(len, time_bandwidth, count)?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, Arc::clone(&set));
        }
        Ok(set)
    }
}

// ---------------------------------------------------------------------------
// DPSS computation
// ---------------------------------------------------------------------------

fn dpss_windows(n: usize, time_bandwidth: f64, k: usize) -> TaperSet {
    let w = time_bandwidth / n as f64;
    let cos_w = (2.0 * PI * w).cos();

    let diag: Vec<f64> = (0..n)
        .map(|i| {
            let c = (n as f64 - 1.0 - 2.0 * i as f64) / 2.0;
            c * c * cos_w
        })
        .collect();
    // off[i] couples rows i and i + 1
    let off: Vec<f64> = (1..n)
        .map(|i| i as f64 * (n - i) as f64 / 2.0)
        .collect();

    let mut windows = Array2::<f64>::zeros((k, n));
    for order in 0..k {
        let lambda = tridiagonal_eigenvalue(&diag, &off, n - 1 - order);
        let mut v = inverse_iteration(&diag, &off, lambda);
        fix_sign(&mut v, order);
        windows.row_mut(order).assign(&v);
    }

    let concentrations = windows
        .axis_iter(Axis(0))
        .map(|row| concentration_ratio(row, w))
        .collect();

    TaperSet::new(windows, concentrations)
}

/// Number of eigenvalues of the tridiagonal matrix strictly below `x`.
fn sturm_count(diag: &[f64], off: &[f64], x: f64) -> usize {
    let tiny = f64::MIN_POSITIVE.sqrt();
    let mut count = 0;
    let mut q = diag[0] - x;
    if q < 0.0 {
        count += 1;
    }
    for i in 1..diag.len() {
        if q == 0.0 {
            q = tiny;
        }
        q = diag[i] - x - off[i - 1] * off[i - 1] / q;
        if q < 0.0 {
            count += 1;
        }
    }
    count
}

/// Eigenvalue with ascending index `index`, by bisection.
fn tridiagonal_eigenvalue(diag: &[f64], off: &[f64], index: usize) -> f64 {
    let n = diag.len();
    let radius = |i: usize| {
        let left = if i > 0 { off[i - 1].abs() } else { 0.0 };
        let right = if i + 1 < n { off[i].abs() } else { 0.0 };
        left + right
    };
    let mut lo = (0..n).map(|i| diag[i] - radius(i)).fold(f64::INFINITY, f64::min);
    let mut hi = (0..n).map(|i| diag[i] + radius(i)).fold(f64::NEG_INFINITY, f64::max);

    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if mid <= lo || mid >= hi {
            break;
        }
        if sturm_count(diag, off, mid) > index {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    0.5 * (lo + hi)
}

/// Eigenvector for eigenvalue `lambda` by inverse iteration, unit norm.
fn inverse_iteration(diag: &[f64], off: &[f64], lambda: f64) -> Array1<f64> {
    let n = diag.len();
    if n == 1 {
        return Array1::from(vec![1.0]);
    }

    let scale = diag
        .iter()
        .chain(off.iter())
        .fold(0.0_f64, |m, v| m.max(v.abs()))
        .max(1.0);
    let tiny = scale * f64::EPSILON;

    // Start away from both symmetric and antisymmetric subspaces.
    let mut x: Vec<f64> = (0..n).map(|i| 1.0 + i as f64 / n as f64).collect();
    for _ in 0..4 {
        let shifted: Vec<f64> = diag.iter().map(|d| d - lambda).collect();
        x = solve_tridiagonal(off, &shifted, off, x, tiny);
        let norm = x.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm == 0.0 || !norm.is_finite() {
            break;
        }
        x.iter_mut().for_each(|v| *v /= norm);
    }
    Array1::from(x)
}

/// Solve a tridiagonal system by Gaussian elimination with partial pivoting.
///
/// `sub`/`sup` are the sub- and super-diagonals, `diag` the main diagonal.
/// Zero pivots are replaced by `tiny`.
fn solve_tridiagonal(sub: &[f64], diag: &[f64], sup: &[f64], mut b: Vec<f64>, tiny: f64) -> Vec<f64> {
    let n = diag.len();
    let mut d = diag.to_vec();
    let mut du = sup.to_vec();
    let mut dl = sub.to_vec();
    // second super-diagonal created by row interchanges
    let mut du2 = vec![0.0; n.saturating_sub(2)];

    for i in 0..n - 1 {
        if d[i].abs() >= dl[i].abs() {
            if d[i] == 0.0 {
                d[i] = tiny;
            }
            let fact = dl[i] / d[i];
            d[i + 1] -= fact * du[i];
            b[i + 1] -= fact * b[i];
        } else {
            let fact = d[i] / dl[i];
            d[i] = dl[i];
            let temp = d[i + 1];
            d[i + 1] = du[i] - fact * temp;
            if i + 2 < n {
                du2[i] = du[i + 1];
                du[i + 1] = -fact * du2[i];
            }
            du[i] = temp;
            let tb = b[i];
            b[i] = b[i + 1];
            b[i + 1] = tb - fact * b[i + 1];
        }
        dl[i] = 0.0;
    }
    if d[n - 1] == 0.0 {
        d[n - 1] = tiny;
    }

    b[n - 1] /= d[n - 1];
    if n > 1 {
        b[n - 2] = (b[n - 2] - du[n - 2] * b[n - 1]) / d[n - 2];
    }
    for i in (0..n.saturating_sub(2)).rev() {
        b[i] = (b[i] - du[i] * b[i + 1] - du2[i] * b[i + 2]) / d[i];
    }
    b
}

/// Even tapers get a positive sum, odd tapers a positive first lobe.
fn fix_sign(v: &mut Array1<f64>, order: usize) {
    let flip = if order % 2 == 0 {
        v.sum() < 0.0
    } else {
        let thresh = (1.0 / v.len() as f64).max(1e-7);
        v.iter()
            .find(|&&x| x * x > thresh)
            .map_or(false, |&x| x < 0.0)
    };
    if flip {
        v.mapv_inplace(|x| -x);
    }
}

/// Fraction of the window's energy inside `[-w, w]`.
fn concentration_ratio(window: ArrayView1<'_, f64>, w: f64) -> f64 {
    let n = window.len();
    let nfft = (2 * n).next_power_of_two();
    let mut fft = FftProcessor::new(nfft);

    let spectrum = fft.rfft(&window.to_vec());
    let power: Vec<_> = spectrum
        .iter()
        .map(|c| num_complex::Complex64::new(c.norm_sqr(), 0.0))
        .collect();
    let rxx = fft.irfft(&power);

    let mut ratio = 2.0 * w * rxx[0];
    for (lag, r) in rxx.iter().enumerate().take(n).skip(1) {
        let kernel = (2.0 * PI * w * lag as f64).sin() / (PI * lag as f64);
        ratio += 2.0 * r * kernel;
    }
    ratio
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dpss_orthonormal() {
        let set = Dpss.tapers(128, 3.0, 5).unwrap();
        assert_eq!(set.count(), 5);
        assert_eq!(set.len(), 128);
        for i in 0..5 {
            for j in 0..5 {
                let dot = set.window(i).dot(&set.window(j));
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((dot - expected).abs() < 1e-8, "<{i},{j}> = {dot}");
            }
        }
    }

    #[test]
    fn test_dpss_symmetry_and_sign() {
        let set = Dpss.tapers(64, 2.0, 3).unwrap();
        let n = set.len();
        let even = set.window(0);
        let odd = set.window(1);
        for i in 0..n {
            assert!((even[i] - even[n - 1 - i]).abs() < 1e-9);
            assert!((odd[i] + odd[n - 1 - i]).abs() < 1e-9);
        }
        assert!(even.sum() > 0.0);
        assert!(even.iter().all(|&v| v > 0.0));
        assert!(odd[n / 4] > 0.0);
    }

    #[test]
    fn test_concentration_ratios() {
        let set = Dpss.tapers(512, 4.0, 7).unwrap();
        let c = set.concentrations();
        assert!(c[0] > 0.9999);
        assert!(c.windows(2).all(|p| p[0] >= p[1] - 1e-12));
        assert!(c.iter().all(|&v| v > 0.0 && v <= 1.0 + 1e-9));
        // Beyond 2NW - 1 tapers the concentration drops quickly
        assert!(c[6] < c[0]);
    }

    #[test]
    fn test_single_sample_taper() {
        let set = Dpss.tapers(1, 1.0, 1).unwrap();
        assert_eq!(set.window(0).to_vec(), vec![1.0]);
    }

    #[test]
    fn test_invalid_requests() {
        assert!(Dpss.tapers(0, 2.0, 3).is_err());
        assert!(Dpss.tapers(16, 0.0, 3).is_err());
        assert!(Dpss.tapers(16, 2.0, 0).is_err());
        assert!(Dpss.tapers(2, 1.0, 3).is_err());
    }

    #[test]
    fn test_unit_peak_rescale() {
        let set = Dpss.tapers(100, 1.0, 1).unwrap().rescaled_to_unit_peak();
        let peak = set.window(0).iter().cloned().fold(f64::MIN, f64::max);
        assert!((peak - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_cache_reuses_sets() {
        let cache = TaperCache::new(Dpss);
        let a = cache.tapers(64, 2.0, 3).unwrap();
        let b = cache.tapers(64, 2.0, 3).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        let _ = cache.tapers(64, 2.5, 3).unwrap();
        assert_eq!(cache.cached(), 2);
    }
}
