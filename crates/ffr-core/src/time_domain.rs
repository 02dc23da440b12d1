//! Time-domain waveform reconstruction
//!
//! Two channel-combined versions of the trial-averaged waveform:
//!
//! - `y_cpc`: complex-PCA reconstruction. A single Slepian window (TW = 1,
//!   K = 1) rescaled to unit peak is applied, the coherence-normalised
//!   cross-spectral matrix is decomposed per bin, and the trial-mean spectrum
//!   is projected onto the dominant eigenvector (scaled to unit absolute sum).
//!   The projection is filtered by `sqrt(dominant eigenvalue)` with unit peak
//!   gain and inverse transformed.
//! - `y_pc`: ordinary real PCA of the trial-averaged channels, projected
//!   onto the dominant covariance eigenvector scaled by the sum of its entries.
//!
//! Both waveforms inherit the sign ambiguity of the eigenvectors they are
//! built from; no sign convention is imposed.

use ndarray::{Array1, Array2, Axis};
use std::sync::Arc;

use crate::cpca::{csd_eigen, map_bins, normalize_by_abs_sum, Normalization};
use crate::matrix_eigenvalue::{covariance_matrix, symmetric_eigen};
use crate::multitaper::EstimationContext;
use crate::params::SpectralParams;
use crate::per_channel::trial_mean;
use crate::recording::Recording;
use crate::taper::TaperProvider;
use crate::types::complex_ops::safe_div_real;
use crate::types::{Complex, SpectralResult};

/// Time-bandwidth product of the reconstruction window
pub const RECONSTRUCTION_TIME_BANDWIDTH: f64 = 1.0;

/// `(y_cpc, y_pc)`, each one trial long.
pub type Waveforms = (Array1<f64>, Array1<f64>);

/// Reconstruct the cPCA and real-PCA waveforms of `recording`.
///
/// The configured tapers and passband are ignored: the reconstruction needs
/// a single window and the full frequency axis.
pub fn reconstruct(
    recording: &Recording,
    params: &SpectralParams,
    provider: &dyn TaperProvider,
) -> SpectralResult<Waveforms> {
    tracing::info!("Running Multitaper Complex PCA to extract time waveform");
    tracing::info!("ignoring configured tapers: using a single unit-peak window");

    let mut ctx =
        EstimationContext::with_tapers(recording, params, provider, RECONSTRUCTION_TIME_BANDWIDTH, 1)?;
    let unit_peak = ctx.tapers.rescaled_to_unit_peak();
    ctx.set_tapers(Arc::new(unit_peak));

    let y_cpc = cpca_waveform(&ctx);
    let y_pc = pca_waveform(recording);
    Ok((y_cpc, y_pc))
}

fn cpca_waveform(ctx: &EstimationContext<'_>) -> Array1<f64> {
    let mut fft = ctx.fft();
    let xw = ctx.transform(0, &mut fft);
    let c = trial_mean(&xw);
    let cnorm = Normalization::Coherence.channel_vectors(&xw);

    let n_channels = c.nrows();
    let bins: Vec<(f64, Complex)> = map_bins(c.ncols(), |f| {
        let eig = csd_eigen(&cnorm.column(f).to_vec());
        let weights = normalize_by_abs_sum(&eig.eigenvectors[n_channels - 1]);
        let projected: Complex = weights
            .iter()
            .zip(c.column(f).iter())
            .map(|(w, x)| w.conj() * x)
            .sum();
        (eig.eigenvalues[n_channels - 1], projected)
    });

    let mut scale: Vec<f64> = bins.iter().map(|(value, _)| value.sqrt()).collect();
    let peak = scale.iter().cloned().fold(0.0, f64::max);
    if peak > 0.0 {
        scale.iter_mut().for_each(|s| *s /= peak);
    } else {
        tracing::warn!("reconstruction filter is identically zero");
    }

    let filtered: Vec<Complex> = bins
        .iter()
        .zip(scale.iter())
        .map(|(&(_, z), &s)| z * s)
        .collect();
    let mut waveform = fft.irfft(&filtered);
    waveform.truncate(ctx.recording.n_samples());
    Array1::from(waveform)
}

fn pca_waveform(recording: &Recording) -> Array1<f64> {
    let data = recording.as_channels();
    let n_trials = data.len_of(Axis(1)) as f64;
    // channels x time
    let average: Array2<f64> = data.sum_axis(Axis(1)) / n_trials;

    let snapshots: Vec<Vec<f64>> = average
        .axis_iter(Axis(1))
        .map(|column| column.to_vec())
        .collect();
    let eig = symmetric_eigen(&covariance_matrix(&snapshots));
    let dominant = eig.vector(average.nrows() - 1);
    let total: f64 = dominant.iter().sum();
    let weights = Array1::from(dominant);

    average
        .axis_iter(Axis(1))
        .map(|column| safe_div_real(weights.dot(&column), total))
        .collect()
}
