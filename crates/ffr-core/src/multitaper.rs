//! Shared multitaper plumbing
//!
//! Every estimator follows the same outer loop:
//!
//! ```text
//! for each taper k:
//!     xw_k = rfft(taper_k · x, nfft)          channels x trials x bins
//!     s_k  = statistic(xw_k)                   reduced over trials (and channels)
//! s = mean_k(s_k)
//! return mask(s), passband frequencies
//! ```
//!
//! [`EstimationContext`] carries the validated inputs of one call (recording,
//! grid, tapers, parameters) and [`taper_transform`] produces `xw_k`.

use ndarray::{Array, Array3, ArrayView1, Axis, Dimension, Zip};
use std::ops::AddAssign;
use std::sync::Arc;

use crate::fft_utils::FftProcessor;
use crate::frequency_grid::FrequencyGrid;
use crate::params::SpectralParams;
use crate::recording::Recording;
use crate::taper::{TaperProvider, TaperSet};
use crate::types::{Complex, SpectralError, SpectralResult};

/// Validated inputs of one estimator call.
#[derive(Debug, Clone)]
pub struct EstimationContext<'a> {
    pub recording: &'a Recording,
    pub params: &'a SpectralParams,
    pub grid: FrequencyGrid,
    pub tapers: Arc<TaperSet>,
}

impl<'a> EstimationContext<'a> {
    /// Validate the recording, fix the grid and fetch the configured tapers.
    pub fn new(
        recording: &'a Recording,
        params: &'a SpectralParams,
        provider: &dyn TaperProvider,
    ) -> SpectralResult<Self> {
        let spec = params.tapers();
        Self::with_tapers(recording, params, provider, spec.time_bandwidth, spec.count)
    }

    /// Like [`new`](Self::new) but with an explicit taper request.
    pub fn with_tapers(
        recording: &'a Recording,
        params: &'a SpectralParams,
        provider: &dyn TaperProvider,
        time_bandwidth: f64,
        count: usize,
    ) -> SpectralResult<Self> {
        recording.validate()?;
        recording.log_format();

        let n_samples = recording.n_samples();
        let grid = FrequencyGrid::new(n_samples, params);
        let tapers = provider.tapers(n_samples, time_bandwidth, count)?;
        if tapers.len() != n_samples {
            return Err(SpectralError::TaperLength {
                expected: n_samples,
                actual: tapers.len(),
            });
        }

        Ok(Self {
            recording,
            params,
            grid,
            tapers,
        })
    }

    /// Replace the tapers (e.g. with a rescaled copy).
    pub fn set_tapers(&mut self, tapers: Arc<TaperSet>) {
        self.tapers = tapers;
    }

    pub fn n_channels(&self) -> usize {
        self.recording.n_channels()
    }

    pub fn n_trials(&self) -> usize {
        self.recording.n_trials()
    }

    pub fn n_tapers(&self) -> usize {
        self.tapers.count()
    }

    /// Fresh transform engine for this call's transform size.
    pub fn fft(&self) -> FftProcessor {
        FftProcessor::new(self.grid.nfft())
    }

    /// `channels x trials x bins` transform of the recording under taper `k`.
    pub fn transform(&self, k: usize, fft: &mut FftProcessor) -> Array3<Complex> {
        taper_transform(self.recording, self.tapers.window(k), fft)
    }
}

/// Window every trial of every channel with `taper` and take the real-input
/// transform along time: `channels x trials x bins`.
pub fn taper_transform(
    recording: &Recording,
    taper: ArrayView1<'_, f64>,
    fft: &mut FftProcessor,
) -> Array3<Complex> {
    let data = recording.as_channels();
    let (n_channels, n_trials, _) = data.dim();
    let taper = taper.to_vec();

    let mut out = Array3::<Complex>::zeros((n_channels, n_trials, fft.n_bins()));
    let mut bins = vec![Complex::new(0.0, 0.0); fft.n_bins()];
    Zip::from(data.lanes(Axis(2)))
        .and(out.lanes_mut(Axis(2)))
        .for_each(|trial, mut dest| {
            fft.rfft_into(trial.iter(), Some(&taper), &mut bins);
            dest.iter_mut().zip(bins.iter()).for_each(|(d, b)| *d = *b);
        });
    out
}

/// Running arithmetic mean over tapers.
#[derive(Debug, Clone)]
pub struct TaperMean<A, D: Dimension> {
    sum: Option<Array<A, D>>,
    count: usize,
}

impl<A, D> Default for TaperMean<A, D>
where
    D: Dimension,
{
    fn default() -> Self {
        Self {
            sum: None,
            count: 0,
        }
    }
}

impl<A, D> TaperMean<A, D>
where
    A: Clone + AddAssign + std::ops::Div<f64, Output = A>,
    D: Dimension,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: Array<A, D>) {
        match self.sum.as_mut() {
            Some(sum) => Zip::from(sum).and(&value).for_each(|s, v| *s += v.clone()),
            None => self.sum = Some(value),
        }
        self.count += 1;
    }

    /// Mean of everything pushed, `None` when nothing was.
    pub fn finish(self) -> Option<Array<A, D>> {
        let count = self.count as f64;
        self.sum.map(|s| s.mapv_into(|v| v / count))
    }
}
