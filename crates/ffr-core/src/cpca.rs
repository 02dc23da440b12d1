//! Cross-channel complex PCA (cPCA)
//!
//! Reduces the channel axis of a per-taper channel statistic `C` (channels x
//! bins) one frequency bin at a time:
//!
//! ```text
//! CSD(f)  = C(:, f) · C(:, f)^H            Hermitian, rank one
//! eig     = ascending eigenpairs of CSD(f)
//! rank r  → eigenvalue[n - r] / n          n = channel count
//! ```
//!
//! Three normalisations of `C` are used across the crate (see
//! [`Normalization`]). The estimators here return the dominant component
//! only; [`crate::combined`] selects arbitrary ranks and keeps eigenvectors.
//!
//! With the `parallel` feature the per-bin eigendecompositions run on the
//! rayon pool.

use ndarray::{Array1, Array2, Array3, Axis};

use crate::matrix_eigenvalue::{hermitian_eigen, HermitianEigen, HermitianMatrix};
use crate::multitaper::{EstimationContext, TaperMean};
use crate::per_channel::{trial_mean, trial_mean_magnitude, trial_mean_unit};
use crate::types::complex_ops::safe_div;
use crate::types::{Complex, SpectralResult};

/// How the per-channel vector entering the cross-spectral matrix is formed
/// from the trials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Normalization {
    /// `mean(x)`: power
    Power,
    /// `mean(x / |x|)`: phase-locking value
    PhaseLocking,
    /// `mean(x) / mean(|x|)`: inter-trial coherence
    Coherence,
}

impl Normalization {
    /// PLV or ITC flavour according to the `itc` switch.
    pub fn locking(itc: bool) -> Self {
        if itc {
            Normalization::Coherence
        } else {
            Normalization::PhaseLocking
        }
    }

    /// `channels x bins` vector for one taper's transform
    /// (`channels x trials x bins`).
    pub fn channel_vectors(self, xw: &Array3<Complex>) -> Array2<Complex> {
        match self {
            Normalization::Power => trial_mean(xw),
            Normalization::PhaseLocking => trial_mean_unit(xw),
            Normalization::Coherence => {
                let mut c = trial_mean(xw);
                let magnitude = trial_mean_magnitude(xw);
                ndarray::Zip::from(&mut c)
                    .and(&magnitude)
                    .for_each(|z, &m| *z = safe_div(*z, m));
                c
            }
        }
    }
}

/// Eigendecomposition of the cross-spectral matrix `v · v^H`.
///
/// Eigenvalues are ascending and clamped at zero; rounding in the rotations
/// can otherwise leave tiny negative values where the exact answer is 0.
pub fn csd_eigen(v: &[Complex]) -> HermitianEigen {
    let mut eig = hermitian_eigen(&HermitianMatrix::outer(v));
    for value in eig.eigenvalues.iter_mut() {
        *value = value.max(0.0);
    }
    eig
}

/// Eigenvector scaled by the (complex) sum of its entries.
///
/// This fixes the arbitrary phase of the eigenvector so vectors from
/// different tapers can be averaged. A zero sum yields the zero vector.
pub fn normalize_by_sum(v: &[Complex]) -> Vec<Complex> {
    let sum: Complex = v.iter().sum();
    if sum.norm() == 0.0 {
        return vec![Complex::new(0.0, 0.0); v.len()];
    }
    v.iter().map(|z| z / sum).collect()
}

/// Eigenvector scaled by the sum of the magnitudes of its entries.
pub fn normalize_by_abs_sum(v: &[Complex]) -> Vec<Complex> {
    let total: f64 = v.iter().map(|z| z.norm()).sum();
    v.iter().map(|&z| safe_div(z, total)).collect()
}

/// Selected components of one bin.
#[derive(Debug, Clone)]
pub(crate) struct BinComponents {
    /// One eigenvalue per requested rank, divided by the channel count
    pub values: Vec<f64>,
    /// Sum-normalised eigenvectors per requested rank (empty unless asked)
    pub vectors: Vec<Vec<Complex>>,
}

/// Eigen-components of rank `ranks` (1 = dominant) for one channel vector.
pub(crate) fn bin_components(v: &[Complex], ranks: &[usize], keep_vectors: bool) -> BinComponents {
    let n = v.len();
    let eig = csd_eigen(v);
    let values = ranks
        .iter()
        .map(|&r| eig.eigenvalues[n - r] / n as f64)
        .collect();
    let vectors = if keep_vectors {
        ranks
            .iter()
            .map(|&r| normalize_by_sum(&eig.eigenvectors[n - r]))
            .collect()
    } else {
        Vec::new()
    };
    BinComponents { values, vectors }
}

/// Run `f` for every bin index, on the rayon pool when `parallel` is enabled.
pub(crate) fn map_bins<T, F>(n_bins: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Send + Sync,
{
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        (0..n_bins).into_par_iter().map(f).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        (0..n_bins).map(f).collect()
    }
}

/// Per-bin decomposition of a `channels x bins` matrix.
///
/// Returns `ranks x bins` eigenvalues and, when `keep_vectors` is set,
/// `ranks x channels x bins` sum-normalised eigenvectors.
pub(crate) fn decompose(
    c: &Array2<Complex>,
    ranks: &[usize],
    keep_vectors: bool,
) -> (Array2<f64>, Option<Array3<Complex>>) {
    let (n_channels, n_bins) = c.dim();
    let bins = map_bins(n_bins, |f| {
        let column = c.column(f).to_vec();
        bin_components(&column, ranks, keep_vectors)
    });

    let mut values = Array2::<f64>::zeros((ranks.len(), n_bins));
    for (f, bin) in bins.iter().enumerate() {
        for (p, &v) in bin.values.iter().enumerate() {
            values[[p, f]] = v;
        }
    }

    let vectors = keep_vectors.then(|| {
        let mut vectors = Array3::<Complex>::zeros((ranks.len(), n_channels, n_bins));
        for (f, bin) in bins.iter().enumerate() {
            for (p, vector) in bin.vectors.iter().enumerate() {
                for (ch, &z) in vector.iter().enumerate() {
                    vectors[[p, ch, f]] = z;
                }
            }
        }
        vectors
    });

    (values, vectors)
}

/// Dominant cPCA eigenvalue spectrum under `normalization`, averaged over
/// tapers and masked to the passband.
pub fn dominant_spectrum(
    ctx: &EstimationContext<'_>,
    normalization: Normalization,
) -> SpectralResult<(Array1<f64>, Array1<f64>)> {
    let mut fft = ctx.fft();
    let mut mean = TaperMean::new();

    for k in 0..ctx.n_tapers() {
        tracing::debug!(taper = k, "Doing taper");
        let xw = ctx.transform(k, &mut fft);
        let c = normalization.channel_vectors(&xw);
        let (values, _) = decompose(&c, &[1], false);
        mean.push(values.index_axis_move(Axis(0), 0));
    }

    let full = mean
        .finish()
        .unwrap_or_else(|| Array1::zeros(ctx.grid.n_bins()));
    Ok((ctx.grid.apply_mask(&full, Axis(0)), ctx.grid.passband()))
}

/// Multitaper PLV (or ITC with `itc` set) combined over channels by cPCA.
pub fn phase_locking(ctx: &EstimationContext<'_>) -> SpectralResult<(Array1<f64>, Array1<f64>)> {
    tracing::info!(itc = ctx.params.itc(), "Running Multitaper Complex PCA");
    dominant_spectrum(ctx, Normalization::locking(ctx.params.itc()))
}

/// Multitaper power spectrum combined over channels by cPCA.
pub fn spectrum(ctx: &EstimationContext<'_>) -> SpectralResult<(Array1<f64>, Array1<f64>)> {
    tracing::info!("Running Multitaper Complex PCA based power estimation");
    dominant_spectrum(ctx, Normalization::Power)
}
