//! Combined cPCA estimation of power, PLV and ITC
//!
//! One pass over the tapers decomposes the three differently normalised
//! channel matrices (see [`Normalization`]) at every bin, keeping the
//! components whose ranks are listed in `pca_components` and, when
//! `return_eigenvectors` is set, their sum-normalised eigenvectors.
//!
//! A single requested rank yields plain spectra; several ranks add a leading
//! component axis to every output.

use ndarray::{Array1, Array2, Array3, Axis};

use crate::cpca::{decompose, Normalization};
use crate::multitaper::{EstimationContext, TaperMean};
use crate::types::{Complex, SpectralResult};

/// Eigenvalue spectrum for one or several component ranks.
#[derive(Debug, Clone, PartialEq)]
pub enum RankedSpectrum {
    /// `frequency`
    Single(Array1<f64>),
    /// `component x frequency`
    Multi(Array2<f64>),
}

impl RankedSpectrum {
    fn from_components(values: Array2<f64>) -> Self {
        if values.nrows() == 1 {
            RankedSpectrum::Single(values.index_axis_move(Axis(0), 0))
        } else {
            RankedSpectrum::Multi(values)
        }
    }

    /// Spectrum of the `index`-th requested rank.
    pub fn component(&self, index: usize) -> Option<Array1<f64>> {
        match self {
            RankedSpectrum::Single(v) if index == 0 => Some(v.clone()),
            RankedSpectrum::Multi(v) if index < v.nrows() => Some(v.row(index).to_owned()),
            _ => None,
        }
    }

    pub fn n_components(&self) -> usize {
        match self {
            RankedSpectrum::Single(_) => 1,
            RankedSpectrum::Multi(v) => v.nrows(),
        }
    }

    pub fn into_dyn(self) -> ndarray::ArrayD<f64> {
        match self {
            RankedSpectrum::Single(v) => v.into_dyn(),
            RankedSpectrum::Multi(v) => v.into_dyn(),
        }
    }
}

/// Taper-averaged eigenvectors for one or several component ranks.
#[derive(Debug, Clone, PartialEq)]
pub enum RankedVectors {
    /// `channel x frequency`
    Single(Array2<Complex>),
    /// `component x channel x frequency`
    Multi(Array3<Complex>),
}

impl RankedVectors {
    fn from_components(vectors: Array3<Complex>) -> Self {
        if vectors.len_of(Axis(0)) == 1 {
            RankedVectors::Single(vectors.index_axis_move(Axis(0), 0))
        } else {
            RankedVectors::Multi(vectors)
        }
    }

    pub fn into_dyn(self) -> ndarray::ArrayD<Complex> {
        match self {
            RankedVectors::Single(v) => v.into_dyn(),
            RankedVectors::Multi(v) => v.into_dyn(),
        }
    }
}

/// Eigenvectors of the three decompositions.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedVectors {
    pub spectrum: RankedVectors,
    pub plv: RankedVectors,
    pub itc: RankedVectors,
}

/// Result of [`estimate`].
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedEstimate {
    /// Power
    pub spectrum: RankedSpectrum,
    pub plv: RankedSpectrum,
    pub itc: RankedSpectrum,
    /// Present when `return_eigenvectors` is set
    pub eigenvectors: Option<CombinedVectors>,
}

const PASSES: [Normalization; 3] = [
    Normalization::Power,
    Normalization::PhaseLocking,
    Normalization::Coherence,
];

/// Power, PLV and ITC by cPCA in one pass, with the passband frequencies.
pub fn estimate(ctx: &EstimationContext<'_>) -> SpectralResult<(CombinedEstimate, Array1<f64>)> {
    tracing::info!("Running Multitaper Complex PCA based plv and power estimation");
    let ranks = ctx.params.pca_components();
    ctx.params.check_components(ctx.n_channels())?;
    let keep_vectors = ctx.params.return_eigenvectors();
    tracing::debug!(?ranks, keep_vectors, "component selection");

    let mut fft = ctx.fft();
    let mut values: [TaperMean<f64, ndarray::Ix2>; 3] = Default::default();
    let mut vectors: [TaperMean<Complex, ndarray::Ix3>; 3] = Default::default();

    for k in 0..ctx.n_tapers() {
        tracing::debug!(taper = k, "Doing taper");
        let xw = ctx.transform(k, &mut fft);
        for (pass, normalization) in PASSES.iter().enumerate() {
            let c = normalization.channel_vectors(&xw);
            let (v, w) = decompose(&c, ranks, keep_vectors);
            values[pass].push(v);
            if let Some(w) = w {
                vectors[pass].push(w);
            }
        }
    }

    let n_bins = ctx.grid.n_bins();
    let [spectrum, plv, itc] = values.map(|mean| {
        let full = mean
            .finish()
            .unwrap_or_else(|| Array2::zeros((ranks.len(), n_bins)));
        RankedSpectrum::from_components(ctx.grid.apply_mask(&full, Axis(1)))
    });

    let eigenvectors = if keep_vectors {
        let [spectrum, plv, itc] = vectors.map(|mean| {
            let full = mean
                .finish()
                .unwrap_or_else(|| Array3::zeros((ranks.len(), ctx.n_channels(), n_bins)));
            RankedVectors::from_components(ctx.grid.apply_mask(&full, Axis(2)))
        });
        Some(CombinedVectors { spectrum, plv, itc })
    } else {
        None
    };

    Ok((
        CombinedEstimate {
            spectrum,
            plv,
            itc,
            eigenvectors,
        },
        ctx.grid.passband(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpca;
    use crate::params::SpectralParams;
    use crate::per_channel::tests::tone_trials;
    use crate::recording::Recording;
    use crate::taper::Dpss;
    use crate::types::{ConfigError, SpectralError};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn recording(seed: u64, n_channels: usize) -> Recording {
        let mut rng = StdRng::seed_from_u64(seed);
        let trials: Vec<_> = (0..n_channels)
            .map(|_| tone_trials(&mut rng, 12, 128, 256.0, 40.0, true, 0.5))
            .collect();
        Recording::from(Array3::from_shape_fn((n_channels, 12, 128), |(c, t, i)| trials[c][[t, i]]))
    }

    fn params(ranks: &[usize], vectors: bool) -> SpectralParams {
        SpectralParams::builder()
            .sample_rate(256.0)
            .fpass(20.0, 60.0)
            .pca_components(ranks.to_vec())
            .return_eigenvectors(vectors)
            .build()
            .unwrap()
    }

    #[test]
    fn test_dominant_matches_individual_estimators() {
        let rec = recording(31, 3);
        let params = params(&[1], false);
        let ctx = EstimationContext::new(&rec, &params, &Dpss).unwrap();
        let (combined, f) = estimate(&ctx).unwrap();

        let (cspec, f_s) = cpca::spectrum(&ctx).unwrap();
        let (cplv, _) = cpca::phase_locking(&ctx).unwrap();
        let itc_params = params.with_itc(true);
        let itc_ctx = EstimationContext::new(&rec, &itc_params, &Dpss).unwrap();
        let (citc, _) = cpca::phase_locking(&itc_ctx).unwrap();

        assert_eq!(f, f_s);
        assert_eq!(combined.spectrum, RankedSpectrum::Single(cspec));
        assert_eq!(combined.plv, RankedSpectrum::Single(cplv));
        assert_eq!(combined.itc, RankedSpectrum::Single(citc));
        assert!(combined.eigenvectors.is_none());
    }

    #[test]
    fn test_multi_rank_adds_component_axis() {
        let rec = recording(32, 3);
        let params = params(&[1, 2, 3], true);
        let ctx = EstimationContext::new(&rec, &params, &Dpss).unwrap();
        let (combined, f) = estimate(&ctx).unwrap();

        match &combined.plv {
            RankedSpectrum::Multi(v) => {
                assert_eq!(v.dim(), (3, f.len()));
                // a rank-one matrix per taper: lower components stay near zero
                // while the dominant one carries the locking
                assert!(v.row(0).iter().zip(v.row(1).iter()).all(|(a, b)| a >= b));
            }
            other => panic!("expected component axis, got {other:?}"),
        }
        let vectors = combined.eigenvectors.unwrap();
        match vectors.itc {
            RankedVectors::Multi(v) => assert_eq!(v.dim(), (3, 3, f.len())),
            other => panic!("expected component axis, got {other:?}"),
        }
    }

    #[test]
    fn test_eigenvectors_are_sum_normalised() {
        let rec = recording(33, 2);
        let params = params(&[1], true);
        let ctx = EstimationContext::new(&rec, &params, &Dpss).unwrap();
        let (combined, _) = estimate(&ctx).unwrap();
        let RankedVectors::Single(v) = combined.eigenvectors.unwrap().spectrum else {
            panic!("expected a single component");
        };
        // the average of sum-normalised vectors still sums to one
        for column in v.axis_iter(Axis(1)) {
            let total: Complex = column.iter().sum();
            assert!((total - Complex::new(1.0, 0.0)).norm() < 1e-9);
        }
    }

    #[test]
    fn test_rank_above_channel_count_is_rejected() {
        let rec = recording(34, 2);
        let params = params(&[1, 3], false);
        let ctx = EstimationContext::new(&rec, &params, &Dpss).unwrap();
        assert_eq!(
            estimate(&ctx).unwrap_err(),
            SpectralError::Config(ConfigError::ComponentRankOutOfRange { rank: 3, channels: 2 })
        );
    }
}
