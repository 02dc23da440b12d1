//! Estimator Parameters
//!
//! This module defines the validated parameter record shared by every
//! estimator: sample rate, taper specification, passband, transform size
//! override and the switches that select estimator variants.
//!
//! ## Understanding the Parameters
//!
//! ### Tapers `[TW, K]`
//!
//! Multitaper estimates average `K` orthogonal Slepian windows with
//! time-bandwidth product `TW`. Larger `TW` gives wider spectral smoothing
//! (half-bandwidth `TW / duration`) and allows up to `2TW - 1` well
//! concentrated tapers, which lowers estimator variance.
//!
//! | TW | useful K | smoothing (1 s epoch) |
//! |----|----------|-----------------------|
//! | 1  | 1        | ±1 Hz                 |
//! | 2  | 3        | ±2 Hz                 |
//! | 3  | 5        | ±3 Hz                 |
//!
//! ### Passband `fpass`
//!
//! Inclusive `[low, high]` range of frequencies returned by the estimators.
//! Transforms are always computed over the full axis; the passband is applied
//! last.
//!
//! ### ITC switch
//!
//! `itc = false` normalises every trial to unit magnitude before averaging
//! (phase-locking value). `itc = true` normalises after averaging
//! (inter-trial coherence), weighting trials by their magnitude.
//!
//! ## Example
//!
//! ```rust
//! use ffr_core::SpectralParams;
//!
//! let params = SpectralParams::builder()
//!     .sample_rate(16384.0)
//!     .tapers(2.0, 3)
//!     .fpass(70.0, 1000.0)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(params.tapers().count, 3);
//! assert_eq!(params.fpass(), [70.0, 1000.0]);
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::types::ConfigError;

/// Multitaper specification `[TW, K]`.
///
/// Deserialises from either `{ time_bandwidth, count }` or the list form `[TW, K]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "TaperSpecRepr")]
pub struct TaperSpec {
    /// Time-bandwidth product (NW)
    pub time_bandwidth: f64,
    /// Number of tapers
    pub count: usize,
}

impl TaperSpec {
    pub fn new(time_bandwidth: f64, count: usize) -> Self {
        Self {
            time_bandwidth,
            count,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.time_bandwidth > 0.0 && self.time_bandwidth.is_finite()) || self.count == 0 {
            return Err(ConfigError::InvalidTaper {
                time_bandwidth: self.time_bandwidth,
                count: self.count,
            });
        }
        Ok(())
    }
}

impl Default for TaperSpec {
    fn default() -> Self {
        Self::new(2.0, 3)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TaperSpecRepr {
    Pair(f64, usize),
    Named { time_bandwidth: f64, count: usize },
}

impl From<TaperSpecRepr> for TaperSpec {
    fn from(repr: TaperSpecRepr) -> Self {
        match repr {
            TaperSpecRepr::Pair(time_bandwidth, count) => Self::new(time_bandwidth, count),
            TaperSpecRepr::Named {
                time_bandwidth,
                count,
            } => Self::new(time_bandwidth, count),
        }
    }
}

/// Validated estimator parameters.
///
/// Construct with [`SpectralParams::builder`] or [`SpectralParams::from_yaml`];
/// both validate the record once, so every estimator can rely on it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpectralParams {
    sample_rate: f64,
    tapers: TaperSpec,
    fpass: [f64; 2],
    nfft: Option<usize>,
    itc: bool,
    n_pairs: usize,
    pca_components: Vec<usize>,
    return_eigenvectors: bool,
}

impl SpectralParams {
    /// Create a new builder
    pub fn builder() -> SpectralParamsBuilder {
        SpectralParamsBuilder::default()
    }

    /// Parse and validate parameters from a YAML document.
    ///
    /// ```yaml
    /// sample_rate: 16384
    /// tapers: { time_bandwidth: 2, count: 3 }
    /// fpass: [70, 1000]
    /// n_pairs: 500
    /// ```
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let file: ParamsFile =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        file.into_builder().build()
    }

    /// Load and validate parameters from a YAML file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml(&content)
    }

    /// Sampling rate in Hz
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Nyquist frequency in Hz
    pub fn nyquist(&self) -> f64 {
        self.sample_rate / 2.0
    }

    pub fn tapers(&self) -> TaperSpec {
        self.tapers
    }

    /// Inclusive passband `[low, high]` in Hz
    pub fn fpass(&self) -> [f64; 2] {
        self.fpass
    }

    /// Requested transform size, if any
    pub fn nfft(&self) -> Option<usize> {
        self.nfft
    }

    pub fn itc(&self) -> bool {
        self.itc
    }

    /// Number of trial pairs drawn by the pairwise estimators
    pub fn n_pairs(&self) -> usize {
        self.n_pairs
    }

    /// Eigen-component ranks, counted from the top (1 = dominant)
    pub fn pca_components(&self) -> &[usize] {
        &self.pca_components
    }

    pub fn return_eigenvectors(&self) -> bool {
        self.return_eigenvectors
    }

    /// Copy of these parameters with a different ITC switch.
    pub fn with_itc(&self, itc: bool) -> Self {
        Self {
            itc,
            ..self.clone()
        }
    }

    /// Pairwise estimators need at least one pair.
    pub(crate) fn check_pairs(&self) -> Result<usize, ConfigError> {
        if self.n_pairs == 0 {
            return Err(ConfigError::InvalidPairCount(self.n_pairs));
        }
        Ok(self.n_pairs)
    }

    /// Every requested component rank must exist for `channels` channels.
    pub(crate) fn check_components(&self, channels: usize) -> Result<(), ConfigError> {
        for &rank in &self.pca_components {
            if rank == 0 || rank > channels {
                return Err(ConfigError::ComponentRankOutOfRange { rank, channels });
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.sample_rate > 0.0 && self.sample_rate.is_finite()) {
            return Err(ConfigError::MissingSampleRate(Some(self.sample_rate)));
        }
        self.tapers.validate()?;

        let [low, high] = self.fpass;
        let nyquist = self.nyquist();
        if !(low >= 0.0 && high >= 0.0 && low <= nyquist && high <= nyquist && low < high) {
            return Err(ConfigError::InvalidPassband { low, high, nyquist });
        }

        if self.pca_components.is_empty() {
            return Err(ConfigError::ComponentRankOutOfRange {
                rank: 0,
                channels: 0,
            });
        }
        if let Some(&rank) = self.pca_components.iter().find(|&&r| r == 0) {
            return Err(ConfigError::ComponentRankOutOfRange { rank, channels: 0 });
        }
        Ok(())
    }
}

/// Builder for SpectralParams
#[derive(Debug, Clone)]
pub struct SpectralParamsBuilder {
    sample_rate: Option<f64>,
    tapers: TaperSpec,
    fpass: Option<[f64; 2]>,
    nfft: Option<usize>,
    itc: bool,
    n_pairs: usize,
    pca_components: Vec<usize>,
    return_eigenvectors: bool,
}

impl Default for SpectralParamsBuilder {
    fn default() -> Self {
        Self {
            sample_rate: None,
            tapers: TaperSpec::default(),
            fpass: None,
            nfft: None,
            itc: false,
            n_pairs: 0,
            pca_components: vec![1],
            return_eigenvectors: false,
        }
    }
}

impl SpectralParamsBuilder {
    pub fn sample_rate(mut self, fs: f64) -> Self {
        self.sample_rate = Some(fs);
        self
    }

    pub fn tapers(mut self, time_bandwidth: f64, count: usize) -> Self {
        self.tapers = TaperSpec::new(time_bandwidth, count);
        self
    }

    pub fn fpass(mut self, low: f64, high: f64) -> Self {
        self.fpass = Some([low, high]);
        self
    }

    pub fn nfft(mut self, nfft: usize) -> Self {
        self.nfft = Some(nfft);
        self
    }

    pub fn itc(mut self, itc: bool) -> Self {
        self.itc = itc;
        self
    }

    pub fn n_pairs(mut self, n_pairs: usize) -> Self {
        self.n_pairs = n_pairs;
        self
    }

    pub fn pca_components(mut self, ranks: impl Into<Vec<usize>>) -> Self {
        self.pca_components = ranks.into();
        self
    }

    pub fn return_eigenvectors(mut self, enabled: bool) -> Self {
        self.return_eigenvectors = enabled;
        self
    }

    /// Validate and freeze the parameters.
    ///
    /// The passband defaults to `[0, Fs/2]` when not given.
    pub fn build(self) -> Result<SpectralParams, ConfigError> {
        let sample_rate = self
            .sample_rate
            .ok_or(ConfigError::MissingSampleRate(None))?;
        let params = SpectralParams {
            sample_rate,
            tapers: self.tapers,
            fpass: self.fpass.unwrap_or([0.0, sample_rate / 2.0]),
            nfft: self.nfft,
            itc: self.itc,
            n_pairs: self.n_pairs,
            pca_components: self.pca_components,
            return_eigenvectors: self.return_eigenvectors,
        };
        params.validate()?;

        tracing::debug!(
            sample_rate = params.sample_rate,
            tw = params.tapers.time_bandwidth,
            tapers = params.tapers.count,
            fpass_low = params.fpass[0],
            fpass_high = params.fpass[1],
            nfft = ?params.nfft,
            itc = params.itc,
            n_pairs = params.n_pairs,
            "Spectral parameters validated"
        );
        Ok(params)
    }
}

/// On-disk parameter layout; every field except the sample rate may be omitted.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct ParamsFile {
    #[serde(alias = "Fs", alias = "fs")]
    sample_rate: Option<f64>,
    tapers: TaperSpec,
    fpass: Option<[f64; 2]>,
    nfft: Option<usize>,
    itc: bool,
    #[serde(alias = "Npairs")]
    n_pairs: usize,
    #[serde(alias = "pcaComponentNumber")]
    pca_components: Vec<usize>,
    #[serde(alias = "returnEigenvectors")]
    return_eigenvectors: bool,
}

impl Default for ParamsFile {
    fn default() -> Self {
        let defaults = SpectralParamsBuilder::default();
        Self {
            sample_rate: None,
            tapers: defaults.tapers,
            fpass: None,
            nfft: None,
            itc: false,
            n_pairs: 0,
            pca_components: defaults.pca_components,
            return_eigenvectors: false,
        }
    }
}

impl ParamsFile {
    fn into_builder(self) -> SpectralParamsBuilder {
        SpectralParamsBuilder {
            sample_rate: self.sample_rate,
            tapers: self.tapers,
            fpass: self.fpass,
            nfft: self.nfft,
            itc: self.itc,
            n_pairs: self.n_pairs,
            pca_components: self.pca_components,
            return_eigenvectors: self.return_eigenvectors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = SpectralParams::builder().sample_rate(1000.0).build().unwrap();
        assert_eq!(params.tapers(), TaperSpec::new(2.0, 3));
        assert_eq!(params.fpass(), [0.0, 500.0]);
        assert_eq!(params.nfft(), None);
        assert!(!params.itc());
        assert_eq!(params.n_pairs(), 0);
        assert_eq!(params.pca_components(), &[1]);
        assert!(!params.return_eigenvectors());
    }

    #[test]
    fn test_missing_sample_rate() {
        let err = SpectralParams::builder().build().unwrap_err();
        assert_eq!(err, ConfigError::MissingSampleRate(None));

        let err = SpectralParams::builder().sample_rate(-1.0).build().unwrap_err();
        assert!(matches!(err, ConfigError::MissingSampleRate(Some(_))));
    }

    #[test]
    fn test_invalid_tapers() {
        let err = SpectralParams::builder()
            .sample_rate(1000.0)
            .tapers(0.0, 3)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTaper { .. }));

        let err = SpectralParams::builder()
            .sample_rate(1000.0)
            .tapers(2.0, 0)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTaper { count: 0, .. }));
    }

    #[test]
    fn test_invalid_passband() {
        for (low, high) in [(100.0, 50.0), (10.0, 10.0), (-1.0, 50.0), (10.0, 600.0)] {
            let err = SpectralParams::builder()
                .sample_rate(1000.0)
                .fpass(low, high)
                .build()
                .unwrap_err();
            assert!(matches!(err, ConfigError::InvalidPassband { .. }), "{low}..{high}");
        }

        // Nyquist itself is allowed
        assert!(SpectralParams::builder()
            .sample_rate(1000.0)
            .fpass(0.0, 500.0)
            .build()
            .is_ok());
    }

    #[test]
    fn test_call_time_checks() {
        let params = SpectralParams::builder()
            .sample_rate(1000.0)
            .pca_components(vec![1, 3])
            .build()
            .unwrap();
        assert_eq!(params.check_pairs(), Err(ConfigError::InvalidPairCount(0)));
        assert!(params.check_components(3).is_ok());
        assert_eq!(
            params.check_components(2),
            Err(ConfigError::ComponentRankOutOfRange { rank: 3, channels: 2 })
        );

        let err = SpectralParams::builder()
            .sample_rate(1000.0)
            .pca_components(vec![0])
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::ComponentRankOutOfRange { rank: 0, .. }));
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
Fs: 16384
tapers: { time_bandwidth: 2, count: 3 }
fpass: [70, 1000]
Npairs: 500
itc: true
"#;
        let params = SpectralParams::from_yaml(yaml).unwrap();
        assert_eq!(params.sample_rate(), 16384.0);
        assert_eq!(params.fpass(), [70.0, 1000.0]);
        assert_eq!(params.n_pairs(), 500);
        assert!(params.itc());
        assert_eq!(params.pca_components(), &[1]);
    }

    #[test]
    fn test_from_yaml_taper_list_form() {
        let yaml = "Fs: 4096\ntapers: [4, 7]\npcaComponentNumber: [1, 2]\n";
        let params = SpectralParams::from_yaml(yaml).unwrap();
        assert_eq!(params.tapers(), TaperSpec::new(4.0, 7));
        assert_eq!(params.pca_components(), &[1, 2]);

        let err = SpectralParams::from_yaml("Fs: 4096\ntapers: [2, 0]\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTaper { count: 0, .. }));
    }

    #[test]
    fn test_from_yaml_rejects_bad_input() {
        assert!(matches!(
            SpectralParams::from_yaml("tapers: [oops"),
            Err(ConfigError::Parse(_))
        ));
        assert_eq!(
            SpectralParams::from_yaml("itc: true"),
            Err(ConfigError::MissingSampleRate(None))
        );
    }
}
