//! FFT Utilities for multitaper estimation
//!
//! Real-input transforms on top of `rustfft`. Recordings are real, so only
//! the non-negative half of the spectrum is kept:
//!
//! ```text
//!   x[0..L]  ──zero-pad──▶ x[0..N] ──FFT──▶ X[0..N] ──keep──▶ X[0..=N/2]
//! ```
//!
//! The inverse takes such a half spectrum, restores the Hermitian mirror and
//! returns the real part of the inverse transform. The imaginary parts of the
//! DC bin and (for even `N`) the Nyquist bin are ignored, as they cannot be
//! represented by a real signal.

use rustfft::{num_complex::Complex64, Fft, FftPlanner};
use std::fmt;
use std::sync::Arc;

use crate::types::Sample;

/// Number of non-negative frequency bins of a real transform of size `nfft`.
#[inline]
pub fn half_spectrum_len(nfft: usize) -> usize {
    nfft / 2 + 1
}

/// FFT processor for zero-padded real signals
pub struct FftProcessor {
    /// FFT size
    size: usize,
    /// Forward FFT instance
    fft_forward: Arc<dyn Fft<f64>>,
    /// Inverse FFT instance
    fft_inverse: Arc<dyn Fft<f64>>,
    /// Work buffer of `size` samples
    buffer: Vec<Complex64>,
    /// Scratch buffer for FFT operations
    scratch: Vec<Complex64>,
}

impl fmt::Debug for FftProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FftProcessor")
            .field("size", &self.size)
            .finish()
    }
}

impl Clone for FftProcessor {
    fn clone(&self) -> Self {
        Self {
            size: self.size,
            fft_forward: Arc::clone(&self.fft_forward),
            fft_inverse: Arc::clone(&self.fft_inverse),
            buffer: self.buffer.clone(),
            scratch: self.scratch.clone(),
        }
    }
}

impl FftProcessor {
    /// Create a new FFT processor for the given size
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft_forward = planner.plan_fft_forward(size);
        let fft_inverse = planner.plan_fft_inverse(size);
        let scratch_len = fft_forward
            .get_inplace_scratch_len()
            .max(fft_inverse.get_inplace_scratch_len());

        Self {
            size,
            fft_forward,
            fft_inverse,
            buffer: vec![Complex64::new(0.0, 0.0); size],
            scratch: vec![Complex64::new(0.0, 0.0); scratch_len],
        }
    }

    /// Get the FFT size
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of bins produced by [`rfft_into`](Self::rfft_into)
    pub fn n_bins(&self) -> usize {
        half_spectrum_len(self.size)
    }

    /// Real-input forward transform of `input` (zero-padded or truncated to
    /// the FFT size), writing the `size/2 + 1` non-negative bins to `out`.
    ///
    /// `window`, when given, multiplies the input elementwise first.
    pub fn rfft_into<'a, I>(&mut self, input: I, window: Option<&[f64]>, out: &mut [Complex64])
    where
        I: IntoIterator<Item = &'a Sample>,
    {
        assert_eq!(out.len(), self.n_bins());

        self.buffer.fill(Complex64::new(0.0, 0.0));
        let slots = self.buffer.iter_mut();
        match window {
            Some(w) => {
                for ((slot, &x), &wk) in slots.zip(input).zip(w) {
                    *slot = Complex64::new(x * wk, 0.0);
                }
            }
            None => {
                for (slot, &x) in slots.zip(input) {
                    *slot = Complex64::new(x, 0.0);
                }
            }
        }

        self.fft_forward
            .process_with_scratch(&mut self.buffer, &mut self.scratch);
        out.copy_from_slice(&self.buffer[..out.len()]);
    }

    /// Real-input forward transform, returning a new buffer
    pub fn rfft(&mut self, input: &[Sample]) -> Vec<Complex64> {
        let mut out = vec![Complex64::new(0.0, 0.0); self.n_bins()];
        self.rfft_into(input, None, &mut out);
        out
    }

    /// Inverse of [`rfft`](Self::rfft): half spectrum in, `size` real samples out.
    ///
    /// Normalised by `1/N`, so `irfft(rfft(x)) == x` for `x.len() == size`.
    pub fn irfft(&mut self, spectrum: &[Complex64]) -> Vec<Sample> {
        let n = self.size;
        assert_eq!(spectrum.len(), self.n_bins());

        for (k, slot) in self.buffer.iter_mut().enumerate() {
            *slot = if k < spectrum.len() {
                spectrum[k]
            } else {
                spectrum[n - k].conj()
            };
        }
        self.buffer[0].im = 0.0;
        if n % 2 == 0 && n > 0 {
            self.buffer[n / 2].im = 0.0;
        }

        self.fft_inverse
            .process_with_scratch(&mut self.buffer, &mut self.scratch);

        let scale = 1.0 / n as f64;
        self.buffer.iter().map(|c| c.re * scale).collect()
    }
}
