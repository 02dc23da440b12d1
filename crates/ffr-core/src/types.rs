//! Core types for multitaper spectral estimation
//!
//! This module defines the scalar aliases and the error taxonomy shared by
//! every estimator in the crate.
//!
//! ## Error Taxonomy
//!
//! Two kinds of failure abort a call, and both abort it before any transform
//! work has been done:
//!
//! - **Configuration** errors: a parameter record that cannot be used
//!   (missing sample rate, malformed taper specification, bad passband, a
//!   pairwise estimator without pairs, a component rank larger than the
//!   channel count).
//! - **Shape** errors: an input array that is neither `trials x time` nor
//!   `channels x trials x time`.
//!
//! Numerically degenerate values (a transform coefficient of exactly zero
//! magnitude that would have to be unit-normalised) are *not* errors. They
//! contribute zero to the statistic; see [`complex_ops::unit`].

use num_complex::Complex64;

/// Type alias for complex numbers using f64 precision
pub type Complex = Complex64;

/// A real-valued time-domain sample
pub type Sample = f64;

/// Result type for spectral estimation
pub type SpectralResult<T> = Result<T, SpectralError>;

/// Errors in the parameter record.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("sample rate must be specified and positive, got {0:?}")]
    MissingSampleRate(Option<f64>),

    #[error("invalid taper specification: time-bandwidth {time_bandwidth}, count {count}")]
    InvalidTaper { time_bandwidth: f64, count: usize },

    #[error("invalid passband [{low}, {high}] for Nyquist frequency {nyquist}")]
    InvalidPassband { low: f64, high: f64, nyquist: f64 },

    #[error("pairwise estimators need at least one trial pair, got {0}")]
    InvalidPairCount(usize),

    #[error("component rank {rank} out of range for {channels} channel(s)")]
    ComponentRankOutOfRange { rank: usize, channels: usize },

    #[error("failed to parse parameters: {0}")]
    Parse(String),
}

/// Errors that abort a spectral estimation call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpectralError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("data should be a 2 (trials x time) or 3 (channels x trials x time) dimensional array, got rank {rank}")]
    Shape { rank: usize },

    #[error("recording has no {0}")]
    EmptyRecording(&'static str),

    #[error("taper length {actual} does not match sample count {expected}")]
    TaperLength { expected: usize, actual: usize },
}

/// Helper functions for working with complex transform coefficients
pub mod complex_ops {
    use super::*;

    /// Unit-magnitude version of `z`; zero when `|z| == 0`.
    #[inline]
    pub fn unit(z: Complex) -> Complex {
        let mag = z.norm();
        if mag > 0.0 {
            z / mag
        } else {
            Complex::new(0.0, 0.0)
        }
    }

    /// `num / den`, zero when the denominator vanishes.
    #[inline]
    pub fn safe_div(num: Complex, den: f64) -> Complex {
        if den != 0.0 {
            num / den
        } else {
            Complex::new(0.0, 0.0)
        }
    }

    /// Real-valued counterpart of [`safe_div`].
    #[inline]
    pub fn safe_div_real(num: f64, den: f64) -> f64 {
        if den != 0.0 {
            num / den
        } else {
            0.0
        }
    }
}
