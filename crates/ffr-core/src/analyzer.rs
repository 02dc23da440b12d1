//! Spectral analyzer façade
//!
//! [`SpectralAnalyzer`] binds a validated [`SpectralParams`] to a taper
//! provider and exposes one method per estimator. Every method returns its
//! statistic(s) together with the passband frequency axis, as a tuple.
//!
//! Resampling harnesses that want named fields instead use
//! [`SpectralAnalyzer::bootstrap`], whose methods run the identical
//! computation and pack the result into an [`EstimateRecord`].
//!
//! ## Example
//!
//! ```rust
//! use ffr_core::{Recording, SpectralAnalyzer, SpectralParams};
//! use ndarray::Array2;
//!
//! let fs = 1000.0;
//! let trials = Array2::from_shape_fn((20, 500), |(_, i)| {
//!     (2.0 * std::f64::consts::PI * 100.0 * i as f64 / fs).sin()
//! });
//!
//! let params = SpectralParams::builder()
//!     .sample_rate(fs)
//!     .fpass(50.0, 150.0)
//!     .build()
//!     .unwrap();
//! let analyzer = SpectralAnalyzer::new(params);
//! let (plv, f) = analyzer.phase_locking(&Recording::from(trials)).unwrap();
//! assert_eq!(plv.n_freqs(), f.len());
//! ```
//!
//! Estimators that draw random numbers (noise floor, pairwise statistics)
//! take the generator as an argument; pass a seeded one for reproducible
//! output.

use ndarray::Array1;
use rand::Rng;

use crate::combined::{self, CombinedEstimate};
use crate::cpca;
use crate::multitaper::EstimationContext;
use crate::params::SpectralParams;
use crate::per_channel::{self, ChannelOutput};
use crate::record::{keys, EstimateRecord};
use crate::recording::{ChannelEstimate, Recording};
use crate::taper::{Dpss, TaperCache, TaperProvider};
use crate::time_domain::{self, Waveforms};
use crate::types::SpectralResult;

/// Multitaper spectral estimators over one parameter set.
#[derive(Debug)]
pub struct SpectralAnalyzer<P = TaperCache<Dpss>> {
    params: SpectralParams,
    provider: P,
}

impl SpectralAnalyzer {
    /// Analyzer with cached DPSS tapers.
    pub fn new(params: SpectralParams) -> Self {
        Self::with_provider(params, TaperCache::new(Dpss))
    }
}

impl<P: TaperProvider> SpectralAnalyzer<P> {
    /// Analyzer drawing its windows from `provider`.
    pub fn with_provider(params: SpectralParams, provider: P) -> Self {
        Self { params, provider }
    }

    pub fn params(&self) -> &SpectralParams {
        &self.params
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    fn context<'a>(&'a self, recording: &'a Recording) -> SpectralResult<EstimationContext<'a>> {
        EstimationContext::new(recording, &self.params, &self.provider)
    }

    /// Phase-locking value per channel (inter-trial coherence when `itc` is set).
    pub fn phase_locking(&self, recording: &Recording) -> SpectralResult<ChannelOutput> {
        per_channel::phase_locking(&self.context(recording)?)
    }

    /// Spectrum `|mean(x)|` and random-phase noise floor per channel.
    pub fn spectrum_with_noise_floor<R: Rng + ?Sized>(
        &self,
        recording: &Recording,
        rng: &mut R,
    ) -> SpectralResult<(ChannelEstimate, ChannelEstimate, Array1<f64>)> {
        per_channel::spectrum_with_noise_floor(&self.context(recording)?, rng)
    }

    /// Phase of the trial mean per channel.
    pub fn phase(&self, recording: &Recording) -> SpectralResult<ChannelOutput> {
        per_channel::phase(&self.context(recording)?)
    }

    /// PLV (or ITC) combined over channels by cPCA, dominant component.
    pub fn cpca_phase_locking(&self, recording: &Recording) -> SpectralResult<(Array1<f64>, Array1<f64>)> {
        cpca::phase_locking(&self.context(recording)?)
    }

    /// Alias of [`cpca_phase_locking`](Self::cpca_phase_locking).
    pub fn cplv(&self, recording: &Recording) -> SpectralResult<(Array1<f64>, Array1<f64>)> {
        self.cpca_phase_locking(recording)
    }

    /// Power spectrum combined over channels by cPCA, dominant component.
    pub fn cpca_spectrum(&self, recording: &Recording) -> SpectralResult<(Array1<f64>, Array1<f64>)> {
        cpca::spectrum(&self.context(recording)?)
    }

    /// cPCA and real-PCA time waveforms `(y_cpc, y_pc)`.
    pub fn cpca_time_domain(&self, recording: &Recording) -> SpectralResult<Waveforms> {
        time_domain::reconstruct(recording, &self.params, &self.provider)
    }

    /// Pairwise phase consistency per channel from `n_pairs` random trial pairs per taper.
    pub fn pairwise_phase_consistency<R: Rng + ?Sized>(
        &self,
        recording: &Recording,
        rng: &mut R,
    ) -> SpectralResult<ChannelOutput> {
        per_channel::pairwise_phase_consistency(&self.context(recording)?, rng)
    }

    /// Power `mean(|x|^2)` per channel.
    pub fn raw_spectrum(&self, recording: &Recording) -> SpectralResult<ChannelOutput> {
        per_channel::raw_spectrum(&self.context(recording)?)
    }

    /// Bias-free pairwise power per channel.
    pub fn pairwise_spectrum<R: Rng + ?Sized>(
        &self,
        recording: &Recording,
        rng: &mut R,
    ) -> SpectralResult<ChannelOutput> {
        per_channel::pairwise_spectrum(&self.context(recording)?, rng)
    }

    /// Power, PLV and ITC by cPCA for the configured component ranks.
    pub fn cpca_all(&self, recording: &Recording) -> SpectralResult<(CombinedEstimate, Array1<f64>)> {
        combined::estimate(&self.context(recording)?)
    }

    /// Record-returning view of this analyzer.
    pub fn bootstrap(&self) -> BootstrapAnalyzer<'_, P> {
        BootstrapAnalyzer { analyzer: self }
    }
}

/// The estimators of a [`SpectralAnalyzer`], returning named-field records.
#[derive(Debug, Clone, Copy)]
pub struct BootstrapAnalyzer<'a, P> {
    analyzer: &'a SpectralAnalyzer<P>,
}

impl<'a, P: TaperProvider> BootstrapAnalyzer<'a, P> {
    /// `mtplv`, `f`
    pub fn phase_locking(&self, recording: &Recording) -> SpectralResult<EstimateRecord> {
        let (plv, f) = self.analyzer.phase_locking(recording)?;
        Ok(EstimateRecord::new().with(keys::PLV, plv).with(keys::FREQUENCIES, f))
    }

    /// `mtspec`, `mtspec_noise`, `f`
    pub fn spectrum_with_noise_floor<R: Rng + ?Sized>(
        &self,
        recording: &Recording,
        rng: &mut R,
    ) -> SpectralResult<EstimateRecord> {
        let (s, n, f) = self.analyzer.spectrum_with_noise_floor(recording, rng)?;
        Ok(EstimateRecord::new()
            .with(keys::SPECTRUM, s)
            .with(keys::NOISE_FLOOR, n)
            .with(keys::FREQUENCIES, f))
    }

    /// `mtphase`, `f`
    pub fn phase(&self, recording: &Recording) -> SpectralResult<EstimateRecord> {
        let (phase, f) = self.analyzer.phase(recording)?;
        Ok(EstimateRecord::new().with(keys::PHASE, phase).with(keys::FREQUENCIES, f))
    }

    /// `mtcplv`, `f`
    pub fn cpca_phase_locking(&self, recording: &Recording) -> SpectralResult<EstimateRecord> {
        let (plv, f) = self.analyzer.cpca_phase_locking(recording)?;
        Ok(EstimateRecord::new().with(keys::CPCA_PLV, plv).with(keys::FREQUENCIES, f))
    }

    /// Alias of [`cpca_phase_locking`](Self::cpca_phase_locking).
    pub fn cplv(&self, recording: &Recording) -> SpectralResult<EstimateRecord> {
        self.cpca_phase_locking(recording)
    }

    /// `mtcspec`, `f`
    pub fn cpca_spectrum(&self, recording: &Recording) -> SpectralResult<EstimateRecord> {
        let (spectrum, f) = self.analyzer.cpca_spectrum(recording)?;
        Ok(EstimateRecord::new()
            .with(keys::CPCA_SPECTRUM, spectrum)
            .with(keys::FREQUENCIES, f))
    }

    /// `y_cpc`, `y_pc`
    pub fn cpca_time_domain(&self, recording: &Recording) -> SpectralResult<EstimateRecord> {
        let (y_cpc, y_pc) = self.analyzer.cpca_time_domain(recording)?;
        Ok(EstimateRecord::new()
            .with(keys::CPCA_WAVEFORM, y_cpc)
            .with(keys::PCA_WAVEFORM, y_pc))
    }

    /// `mtppc`, `f`
    pub fn pairwise_phase_consistency<R: Rng + ?Sized>(
        &self,
        recording: &Recording,
        rng: &mut R,
    ) -> SpectralResult<EstimateRecord> {
        let (ppc, f) = self.analyzer.pairwise_phase_consistency(recording, rng)?;
        Ok(EstimateRecord::new().with(keys::PPC, ppc).with(keys::FREQUENCIES, f))
    }

    /// `mtspecraw`, `f`
    pub fn raw_spectrum(&self, recording: &Recording) -> SpectralResult<EstimateRecord> {
        let (raw, f) = self.analyzer.raw_spectrum(recording)?;
        Ok(EstimateRecord::new()
            .with(keys::RAW_SPECTRUM, raw)
            .with(keys::FREQUENCIES, f))
    }

    /// `pspec`, `f`
    pub fn pairwise_spectrum<R: Rng + ?Sized>(
        &self,
        recording: &Recording,
        rng: &mut R,
    ) -> SpectralResult<EstimateRecord> {
        let (pspec, f) = self.analyzer.pairwise_spectrum(recording, rng)?;
        Ok(EstimateRecord::new()
            .with(keys::PAIRWISE_SPECTRUM, pspec)
            .with(keys::FREQUENCIES, f))
    }

    /// `spectrum`, `plv`, `itc`, `f`, plus `spectrumV`, `plvV`, `itcV` when
    /// eigenvectors are requested.
    pub fn cpca_all(&self, recording: &Recording) -> SpectralResult<EstimateRecord> {
        let (estimate, f) = self.analyzer.cpca_all(recording)?;
        let mut record = EstimateRecord::new()
            .with(keys::COMBINED_SPECTRUM, estimate.spectrum)
            .with(keys::COMBINED_PLV, estimate.plv)
            .with(keys::COMBINED_ITC, estimate.itc)
            .with(keys::FREQUENCIES, f);
        if let Some(vectors) = estimate.eigenvectors {
            record = record
                .with(keys::COMBINED_SPECTRUM_VECTORS, vectors.spectrum)
                .with(keys::COMBINED_PLV_VECTORS, vectors.plv)
                .with(keys::COMBINED_ITC_VECTORS, vectors.itc);
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combined::RankedSpectrum;
    use crate::types::{ConfigError, SpectralError};
    use ndarray::{Array2, Array3, ArrayD, IxDyn};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};
    use std::f64::consts::{PI, TAU};

    const FS: f64 = 500.0;

    /// 3 channels x 50 trials x 1 s at 500 Hz: a shared 80 Hz tone with a
    /// fixed phase plus independent noise on every channel.
    fn evoked_recording(seed: u64) -> Recording {
        let mut rng = StdRng::seed_from_u64(seed);
        let noise = Normal::new(0.0, 0.2).unwrap();
        let gains = [1.0, 0.7, 1.3];
        Recording::from(Array3::from_shape_fn((3, 50, 500), |(c, _, i)| {
            let t = i as f64 / FS;
            gains[c] * (2.0 * PI * 80.0 * t).sin() + noise.sample(&mut rng)
        }))
    }

    fn analyzer(n_pairs: usize) -> SpectralAnalyzer {
        let params = SpectralParams::builder()
            .sample_rate(FS)
            .tapers(2.0, 3)
            .fpass(5.0, 100.0)
            .n_pairs(n_pairs)
            .build()
            .unwrap();
        SpectralAnalyzer::new(params)
    }

    fn bin_of(f: &Array1<f64>, target: f64) -> usize {
        f.iter()
            .enumerate()
            .min_by(|a, b| (a.1 - target).abs().total_cmp(&(b.1 - target).abs()))
            .map(|(i, _)| i)
            .unwrap()
    }

    #[test]
    fn test_end_to_end_cpca_peak_at_tone() {
        let rec = evoked_recording(41);
        let analyzer = analyzer(0);
        let (cplv, f) = analyzer.cpca_phase_locking(&rec).unwrap();

        assert_eq!(f.len(), cplv.len());
        assert!(f[0] >= 5.0 && f[f.len() - 1] <= 100.0);
        let k = bin_of(&f, 80.0);
        assert!(cplv[k] > 0.9, "cPCA PLV at 80 Hz = {}", cplv[k]);
        assert!(cplv.iter().all(|&v| (0.0..=1.0 + 1e-9).contains(&v)));

        let peak = cplv
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert!((f[peak] - 80.0).abs() <= 2.0, "peak at {} Hz", f[peak]);
        // away from the tone the locking is at the noise level
        let far = bin_of(&f, 30.0);
        assert!(cplv[far] < 0.2, "cPCA PLV at 30 Hz = {}", cplv[far]);
    }

    #[test]
    fn test_end_to_end_ppc_above_pairwise_noise() {
        let rec = evoked_recording(42);
        let analyzer = analyzer(500);
        let mut rng = StdRng::seed_from_u64(43);

        let (ppc, f) = analyzer.pairwise_phase_consistency(&rec, &mut rng).unwrap();
        let (pspec, _) = analyzer.pairwise_spectrum(&rec, &mut rng).unwrap();
        let k = bin_of(&f, 80.0);
        let far = bin_of(&f, 30.0);

        for ch in 0..3 {
            let ppc = ppc.channel(ch).unwrap();
            let pspec = pspec.channel(ch).unwrap();
            assert!(ppc[k] > 0.5, "channel {ch}: ppc at 80 Hz = {}", ppc[k]);
            assert!(ppc[k] > 10.0 * ppc[far].abs());
            assert!(pspec[k] > 10.0 * pspec[far].abs());
        }
    }

    #[test]
    fn test_single_channel_cpca_equals_plv() {
        let rec = evoked_recording(44);
        let Recording::MultiChannel(data) = &rec else {
            unreachable!()
        };
        let single = Recording::from(data.index_axis(ndarray::Axis(0), 0).to_owned());

        let analyzer = analyzer(0);
        let (cplv, f_c) = analyzer.cplv(&single).unwrap();
        let (plv, f_p) = analyzer.phase_locking(&single).unwrap();
        assert_eq!(f_c, f_p);
        assert_eq!(ChannelEstimate::Single(cplv), plv);
    }

    #[test]
    fn test_repeated_seeded_calls_are_identical() {
        let rec = evoked_recording(45);
        let analyzer = analyzer(100);
        let run = || {
            let mut rng = StdRng::seed_from_u64(7);
            let noise = analyzer.spectrum_with_noise_floor(&rec, &mut rng).unwrap();
            let ppc = analyzer.pairwise_phase_consistency(&rec, &mut rng).unwrap();
            (noise, ppc)
        };
        assert_eq!(run(), run());
        assert_eq!(analyzer.provider().cached(), 1);
    }

    #[test]
    fn test_bootstrap_records_match_tuples() {
        let rec = evoked_recording(46);
        let analyzer = analyzer(50);
        let boot = analyzer.bootstrap();

        let (plv, f) = analyzer.phase_locking(&rec).unwrap();
        let record = boot.phase_locking(&rec).unwrap();
        assert_eq!(record.real(keys::PLV).unwrap(), &plv.into_dyn());
        assert_eq!(record.frequencies().unwrap(), f.view());

        let mut rng = StdRng::seed_from_u64(1);
        let (s, n, _) = analyzer.spectrum_with_noise_floor(&rec, &mut rng).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let record = boot.spectrum_with_noise_floor(&rec, &mut rng).unwrap();
        assert_eq!(record.real(keys::SPECTRUM).unwrap(), &s.into_dyn());
        assert_eq!(record.real(keys::NOISE_FLOOR).unwrap(), &n.into_dyn());

        let record = boot.cpca_time_domain(&rec).unwrap();
        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["y_cpc", "y_pc"]);

        let record = boot.cplv(&rec).unwrap();
        assert!(record.contains("mtcplv"));
        let record = boot.cpca_spectrum(&rec).unwrap();
        assert!(record.contains("mtcspec"));
        let record = boot.phase(&rec).unwrap();
        assert_eq!(record.real(keys::PHASE).unwrap().shape(), &[3, f.len()]);

        let mut rng = StdRng::seed_from_u64(2);
        assert!(boot.pairwise_phase_consistency(&rec, &mut rng).unwrap().contains("mtppc"));
        assert!(boot.pairwise_spectrum(&rec, &mut rng).unwrap().contains("pspec"));
        assert!(boot.raw_spectrum(&rec).unwrap().contains("mtspecraw"));
    }

    #[test]
    fn test_cpca_all_record_fields() {
        let rec = evoked_recording(47);
        let params = SpectralParams::builder()
            .sample_rate(FS)
            .fpass(5.0, 100.0)
            .pca_components(vec![1, 2])
            .return_eigenvectors(true)
            .build()
            .unwrap();
        let analyzer = SpectralAnalyzer::new(params);

        let (estimate, f) = analyzer.cpca_all(&rec).unwrap();
        let RankedSpectrum::Multi(plv) = &estimate.plv else {
            panic!("two ranks requested");
        };
        assert_eq!(plv.dim(), (2, f.len()));
        let k = bin_of(&f, 80.0);
        assert!(plv[[0, k]] > 0.9);

        let record = analyzer.bootstrap().cpca_all(&rec).unwrap();
        let names: Vec<_> = record.keys().collect();
        assert_eq!(names, vec!["f", "itc", "itcV", "plv", "plvV", "spectrum", "spectrumV"]);
        assert_eq!(record.complex(keys::COMBINED_PLV_VECTORS).unwrap().shape(), &[2, 3, f.len()]);
    }

    #[test]
    fn test_errors_surface_before_work() {
        let analyzer = analyzer(0);
        let rec = evoked_recording(48);
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            analyzer.pairwise_phase_consistency(&rec, &mut rng).unwrap_err(),
            SpectralError::Config(ConfigError::InvalidPairCount(0))
        );

        let four_d = ArrayD::<f64>::zeros(IxDyn(&[1, 2, 3, 4]));
        assert_eq!(
            Recording::try_from(four_d).unwrap_err(),
            SpectralError::Shape { rank: 4 }
        );

        let empty = Recording::from(Array2::<f64>::zeros((0, 10)));
        assert!(matches!(
            analyzer.phase_locking(&empty),
            Err(SpectralError::EmptyRecording(_))
        ));
    }

    #[test]
    fn test_random_phase_plv_shrinks_with_trials() {
        let mut rng = StdRng::seed_from_u64(49);
        let analyzer = analyzer(0);
        let n_trials = 500;
        let phases: Vec<f64> = (0..n_trials).map(|_| rng.gen_range(0.0..TAU)).collect();
        let rec = Recording::from(Array2::from_shape_fn((n_trials, 500), |(t, i)| {
            (2.0 * PI * 80.0 * i as f64 / FS + phases[t]).sin()
        }));

        let (plv, f) = analyzer.phase_locking(&rec).unwrap();
        let plv = plv.channel(0).unwrap();
        let k = bin_of(&f, 80.0);
        assert!(plv[k] < 0.02, "PLV with {n_trials} trials = {}", plv[k]);
    }
}
