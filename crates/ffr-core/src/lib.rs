//! # Multitaper Spectral Estimation for Frequency-Following Responses
//!
//! This crate estimates frequency-domain statistics of repeated-trial,
//! possibly multi-channel physiological recordings (steady-state evoked
//! responses) and combines channels into single estimates by complex
//! principal component analysis (cPCA) of the cross-spectral matrix.
//!
//! ## Overview
//!
//! - **Per-channel statistics**: phase-locking value / inter-trial coherence,
//!   spectrum with a random-phase noise floor, phase, raw power, pairwise
//!   phase consistency and pairwise power
//! - **cPCA**: per-bin eigendecomposition of `C·C^H` across channels, for
//!   PLV, ITC and power, with selectable component ranks and eigenvectors
//! - **Time domain**: cPCA-weighted and real-PCA waveform reconstruction
//!
//! ## Signal Flow
//!
//! ```text
//! Recording ─▶ FrequencyGrid (nfft, bins, passband)
//!           ─▶ per taper: rfft(taper · x) ─▶ trial statistic ─┬─▶ per channel
//!                                                           └─▶ CSD ─▶ eigen ─▶ cPCA
//!           ─▶ mean over tapers ─▶ passband mask ─▶ (estimate, f)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use ffr_core::{Recording, SpectralAnalyzer, SpectralParams};
//! use ndarray::Array3;
//!
//! let fs = 500.0;
//! let data = Array3::from_shape_fn((2, 10, 250), |(c, t, i)| {
//!     let phase = 0.1 * t as f64;
//!     (1.0 + c as f64) * (2.0 * std::f64::consts::PI * 80.0 * i as f64 / fs + phase).sin()
//! });
//!
//! let params = SpectralParams::builder()
//!     .sample_rate(fs)
//!     .tapers(2.0, 3)
//!     .fpass(5.0, 100.0)
//!     .build()
//!     .unwrap();
//!
//! let analyzer = SpectralAnalyzer::new(params);
//! let (cplv, f) = analyzer.cpca_phase_locking(&Recording::from(data)).unwrap();
//! assert_eq!(cplv.len(), f.len());
//! ```
//!
//! ## Feature Flags
//!
//! - `parallel`: per-bin eigendecompositions on the rayon thread pool

pub mod analyzer;
pub mod combined;
pub mod cpca;
pub mod fft_utils;
pub mod frequency_grid;
pub mod matrix_eigenvalue;
pub mod multitaper;
pub mod observe;
pub mod params;
pub mod per_channel;
pub mod record;
pub mod recording;
pub mod taper;
pub mod time_domain;
pub mod types;

// Re-export main types
pub use analyzer::{BootstrapAnalyzer, SpectralAnalyzer};
pub use combined::{CombinedEstimate, CombinedVectors, RankedSpectrum, RankedVectors};
pub use cpca::Normalization;
pub use frequency_grid::FrequencyGrid;
pub use params::{SpectralParams, SpectralParamsBuilder, TaperSpec};
pub use record::{EstimateRecord, RecordValue};
pub use recording::{ChannelEstimate, Recording};
pub use taper::{Dpss, TaperCache, TaperProvider, TaperSet};
pub use types::{Complex, ConfigError, Sample, SpectralError, SpectralResult};

/// Prelude for common imports
pub mod prelude {
    pub use crate::analyzer::SpectralAnalyzer;
    pub use crate::params::SpectralParams;
    pub use crate::recording::{ChannelEstimate, Recording};
    pub use crate::types::{Complex, SpectralError, SpectralResult};
}
