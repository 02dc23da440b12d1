//! Frequency grid bookkeeping
//!
//! Fixes the transform size for a recording, the full non-negative frequency
//! axis of the real transform, and the passband mask over that axis.
//!
//! ```text
//! L samples ──▶ nfft = 2^ceil(log2 L)      (or an override >= L)
//!           ──▶ f_k = k·Fs/nfft, k = 0..=nfft/2
//!           ──▶ mask_k = flo <= f_k <= fhi
//! ```
//!
//! Estimators always work on the full axis and call [`FrequencyGrid::apply_mask`]
//! as their very last step.

use ndarray::{Array1, ArrayView1, Axis};

use crate::fft_utils::half_spectrum_len;
use crate::params::SpectralParams;

/// Transform size, frequency axis and passband mask for one call.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyGrid {
    nfft: usize,
    full: Array1<f64>,
    mask: Vec<bool>,
}

impl FrequencyGrid {
    /// Derive the grid for `n_samples`-long trials.
    ///
    /// A transform-size override shorter than the trial is ignored (with a
    /// warning) in favour of the power-of-two default.
    pub fn new(n_samples: usize, params: &SpectralParams) -> Self {
        let nfft = match params.nfft() {
            Some(nfft) if nfft >= n_samples && nfft > 0 => nfft,
            Some(nfft) => {
                tracing::warn!(
                    nfft,
                    n_samples,
                    "nfft should be >= number of time points; reverting to 2^ceil(log2(n_samples))"
                );
                default_nfft(n_samples)
            }
            None => default_nfft(n_samples),
        };

        let fs = params.sample_rate();
        let full: Array1<f64> = (0..half_spectrum_len(nfft))
            .map(|k| k as f64 * fs / nfft as f64)
            .collect();
        let [low, high] = params.fpass();
        let mask = full.iter().map(|&f| f >= low && f <= high).collect();

        Self { nfft, full, mask }
    }

    /// Transform size
    pub fn nfft(&self) -> usize {
        self.nfft
    }

    /// Number of bins on the full axis
    pub fn n_bins(&self) -> usize {
        self.full.len()
    }

    /// Full non-negative frequency axis in Hz
    pub fn full_axis(&self) -> ArrayView1<'_, f64> {
        self.full.view()
    }

    /// Passband mask over the full axis
    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    /// Indices of the passband bins
    pub fn passband_indices(&self) -> Vec<usize> {
        self.mask
            .iter()
            .enumerate()
            .filter_map(|(i, &keep)| keep.then_some(i))
            .collect()
    }

    /// Passband frequencies in Hz
    pub fn passband(&self) -> Array1<f64> {
        self.apply_mask(&self.full, Axis(0))
    }

    /// Keep the passband bins of `values` along `axis` (the frequency axis).
    pub fn apply_mask<A, D>(&self, values: &ndarray::Array<A, D>, axis: Axis) -> ndarray::Array<A, D>
    where
        A: Clone,
        D: ndarray::RemoveAxis,
    {
        values.select(axis, &self.passband_indices())
    }
}

/// Smallest power of two not below `n_samples`.
pub fn default_nfft(n_samples: usize) -> usize {
    n_samples.max(1).next_power_of_two()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn params(fs: f64, low: f64, high: f64) -> SpectralParams {
        SpectralParams::builder()
            .sample_rate(fs)
            .fpass(low, high)
            .build()
            .unwrap()
    }

    #[test]
    fn test_default_nfft() {
        assert_eq!(default_nfft(500), 512);
        assert_eq!(default_nfft(512), 512);
        assert_eq!(default_nfft(513), 1024);
        assert_eq!(default_nfft(1), 1);
    }

    #[test]
    fn test_bin_count_and_spacing() {
        let grid = FrequencyGrid::new(500, &params(500.0, 5.0, 100.0));
        assert_eq!(grid.nfft(), 512);
        assert_eq!(grid.n_bins(), 257);
        let axis = grid.full_axis();
        assert_eq!(axis[0], 0.0);
        assert!((axis[256] - 250.0).abs() < 1e-12);
        assert!(axis.windows(2).into_iter().all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_odd_override() {
        let p = SpectralParams::builder()
            .sample_rate(100.0)
            .nfft(101)
            .build()
            .unwrap();
        let grid = FrequencyGrid::new(100, &p);
        assert_eq!(grid.nfft(), 101);
        assert_eq!(grid.n_bins(), 51);
    }

    #[test]
    fn test_short_override_is_replaced() {
        let p = SpectralParams::builder()
            .sample_rate(100.0)
            .nfft(64)
            .build()
            .unwrap();
        let grid = FrequencyGrid::new(100, &p);
        assert_eq!(grid.nfft(), 128);
    }

    #[test]
    fn test_passband_inclusive_subsequence() {
        // 1 Hz resolution: bins at 0, 1, ..., 256
        let grid = FrequencyGrid::new(512, &params(512.0, 5.0, 100.0));
        let band = grid.passband();
        assert_eq!(band.len(), 96);
        assert_eq!(band[0], 5.0);
        assert_eq!(band[95], 100.0);
        assert!(band.windows(2).into_iter().all(|w| w[1] > w[0]));
        assert!(band.iter().all(|f| grid.full_axis().iter().any(|g| g == f)));
    }

    #[test]
    fn test_apply_mask_along_axis() {
        let grid = FrequencyGrid::new(8, &params(8.0, 1.0, 2.0));
        let values = Array2::from_shape_fn((2, grid.n_bins()), |(c, k)| (10 * c + k) as f64);
        let masked = grid.apply_mask(&values, Axis(1));
        assert_eq!(masked, ndarray::arr2(&[[1.0, 2.0], [11.0, 12.0]]));
    }
}
