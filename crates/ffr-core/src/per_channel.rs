//! Per-channel multitaper statistics
//!
//! Each estimator reduces the tapered transform `xw` (channels x trials x
//! bins) over trials, independently for every channel, averages the result
//! over tapers and keeps the passband:
//!
//! | estimator | per-taper statistic over trials |
//! |---|---|
//! | [`phase_locking`] (PLV) | `\|mean(x/\|x\|)\|^2` |
//! | [`phase_locking`] (ITC) | `\|mean(x)\|^2 / mean(\|x\|^2)` |
//! | [`spectrum_with_noise_floor`] | `\|mean(x)\|`, `\|mean(x·e^{iθ})\|`, θ ~ U[0, 2π) |
//! | [`phase`] | `arg(mean(x))` |
//! | [`raw_spectrum`] | `mean(\|x\|^2)` |
//! | [`pairwise_phase_consistency`] | `Re mean_pairs(u_i · conj(u_j))` |
//! | [`pairwise_spectrum`] | `Re mean_pairs(x_i · conj(x_j))`, `i != j` |
//!
//! Coefficients of exactly zero magnitude contribute zero wherever they
//! would be unit-normalised.

use ndarray::{Array1, Array2, Array3, Axis, Zip};
use rand::Rng;
use std::f64::consts::TAU;

use crate::multitaper::{EstimationContext, TaperMean};
use crate::recording::ChannelEstimate;
use crate::types::complex_ops::{safe_div_real, unit};
use crate::types::{Complex, SpectralResult};

/// Estimate over channels plus its passband frequency axis.
pub type ChannelOutput = (ChannelEstimate, Array1<f64>);

/// Mean over the trial axis of a `channels x trials x bins` array.
pub(crate) fn trial_mean(xw: &Array3<Complex>) -> Array2<Complex> {
    let n = xw.len_of(Axis(1)) as f64;
    xw.sum_axis(Axis(1)).mapv_into(|z| z / n)
}

/// Mean of `|x|` over trials.
pub(crate) fn trial_mean_magnitude(xw: &Array3<Complex>) -> Array2<f64> {
    let n = xw.len_of(Axis(1)) as f64;
    xw.map(|z| z.norm()).sum_axis(Axis(1)).mapv_into(|v| v / n)
}

/// Mean of the unit-normalised coefficients over trials.
pub(crate) fn trial_mean_unit(xw: &Array3<Complex>) -> Array2<Complex> {
    let n = xw.len_of(Axis(1)) as f64;
    xw.mapv(unit).sum_axis(Axis(1)).mapv_into(|z| z / n)
}

/// `n_pairs` trial-index pairs drawn uniformly with replacement.
pub(crate) fn draw_pairs<R: Rng + ?Sized>(rng: &mut R, n_trials: usize, n_pairs: usize) -> Vec<(usize, usize)> {
    (0..n_pairs)
        .map(|_| (rng.gen_range(0..n_trials), rng.gen_range(0..n_trials)))
        .collect()
}

fn finish(ctx: &EstimationContext<'_>, mean: TaperMean<f64, ndarray::Ix2>) -> Array2<f64> {
    let full = mean
        .finish()
        .unwrap_or_else(|| Array2::zeros((ctx.n_channels(), ctx.grid.n_bins())));
    ctx.grid.apply_mask(&full, Axis(1))
}

fn output(ctx: &EstimationContext<'_>, values: Array2<f64>) -> ChannelOutput {
    (
        ChannelEstimate::from_channels(values, ctx.recording.is_single_channel()),
        ctx.grid.passband(),
    )
}

/// Multitaper phase-locking value, or inter-trial coherence when `itc` is set.
pub fn phase_locking(ctx: &EstimationContext<'_>) -> SpectralResult<ChannelOutput> {
    tracing::info!(itc = ctx.params.itc(), "Running Multitaper PLV Estimation");
    let mut fft = ctx.fft();
    let mut mean = TaperMean::new();

    for k in 0..ctx.n_tapers() {
        tracing::debug!(taper = k, "Doing taper");
        let xw = ctx.transform(k, &mut fft);
        let stat = if ctx.params.itc() {
            let n = xw.len_of(Axis(1)) as f64;
            let power = xw.map(|z| z.norm_sqr()).sum_axis(Axis(1)).mapv_into(|v| v / n);
            let mut itc = trial_mean(&xw).mapv(|z| z.norm_sqr());
            Zip::from(&mut itc)
                .and(&power)
                .for_each(|v, &p| *v = safe_div_real(*v, p));
            itc
        } else {
            trial_mean_unit(&xw).mapv(|z| z.norm_sqr())
        };
        mean.push(stat);
    }

    Ok(output(ctx, finish(ctx, mean)))
}

/// Multitaper spectrum `|mean(x)|` and a Monte-Carlo noise floor obtained by
/// randomising the phase of every coefficient before averaging.
///
/// The phases are drawn from `rng`; reproducible results need a seeded source.
pub fn spectrum_with_noise_floor<R: Rng + ?Sized>(
    ctx: &EstimationContext<'_>,
    rng: &mut R,
) -> SpectralResult<(ChannelEstimate, ChannelEstimate, Array1<f64>)> {
    tracing::info!("Running Multitaper Spectrum and Noise-floor Estimation");
    tracing::warn!(
        "using random phases for noise floor estimate; fine for a single shot \
         estimate, but the floor may be inaccurate under bootstrap resampling"
    );
    let mut fft = ctx.fft();
    let mut spectrum = TaperMean::new();
    let mut noise = TaperMean::new();

    for k in 0..ctx.n_tapers() {
        tracing::debug!(taper = k, "Doing taper");
        let xw = ctx.transform(k, &mut fft);
        spectrum.push(trial_mean(&xw).mapv(|z| z.norm()));

        let randomized = xw.mapv(|z| z * Complex::from_polar(1.0, rng.gen_range(0.0..TAU)));
        noise.push(trial_mean(&randomized).mapv(|z| z.norm()));
    }

    let single = ctx.recording.is_single_channel();
    Ok((
        ChannelEstimate::from_channels(finish(ctx, spectrum), single),
        ChannelEstimate::from_channels(finish(ctx, noise), single),
        ctx.grid.passband(),
    ))
}

/// Multitaper phase `arg(mean(x))`, averaged arithmetically over tapers.
pub fn phase(ctx: &EstimationContext<'_>) -> SpectralResult<ChannelOutput> {
    tracing::info!("Running Multitaper Phase Estimation");
    let mut fft = ctx.fft();
    let mut mean = TaperMean::new();

    for k in 0..ctx.n_tapers() {
        tracing::debug!(taper = k, "Doing taper");
        let xw = ctx.transform(k, &mut fft);
        mean.push(trial_mean(&xw).mapv(|z| z.arg()));
    }

    Ok(output(ctx, finish(ctx, mean)))
}

/// Multitaper spectrum of the raw signal, `mean(|x|^2)`.
pub fn raw_spectrum(ctx: &EstimationContext<'_>) -> SpectralResult<ChannelOutput> {
    tracing::info!("Running Multitaper Raw Spectrum Estimation");
    let mut fft = ctx.fft();
    let mut mean = TaperMean::new();

    for k in 0..ctx.n_tapers() {
        tracing::debug!(taper = k, "Doing taper");
        let xw = ctx.transform(k, &mut fft);
        let n = xw.len_of(Axis(1)) as f64;
        mean.push(xw.map(|z| z.norm_sqr()).sum_axis(Axis(1)).mapv_into(|v| v / n));
    }

    Ok(output(ctx, finish(ctx, mean)))
}

/// Multitaper pairwise phase consistency.
///
/// For every taper a fresh set of `n_pairs` trial pairs is drawn (shared by
/// all channels). Without `itc` the coefficients are unit-normalised before
/// pairing; with `itc` the pair average is normalised by the product of the
/// mean magnitudes.
pub fn pairwise_phase_consistency<R: Rng + ?Sized>(
    ctx: &EstimationContext<'_>,
    rng: &mut R,
) -> SpectralResult<ChannelOutput> {
    let n_pairs = ctx.params.check_pairs()?;
    tracing::info!(n_pairs, itc = ctx.params.itc(), "Running Multitaper Pairwise Phase Consistency Estimate");
    let mut fft = ctx.fft();
    let mut mean = TaperMean::new();
    let n_trials = ctx.n_trials();

    for k in 0..ctx.n_tapers() {
        tracing::debug!(taper = k, "Doing taper");
        let xw = ctx.transform(k, &mut fft);
        let pairs = draw_pairs(rng, n_trials, n_pairs);
        let (n_channels, _, n_bins) = xw.dim();

        let stat = if ctx.params.itc() {
            Array2::from_shape_fn((n_channels, n_bins), |(c, f)| {
                let mut cross = 0.0;
                let mut mag_first = 0.0;
                let mut mag_second = 0.0;
                for &(i, j) in &pairs {
                    let (a, b) = (xw[[c, i, f]], xw[[c, j, f]]);
                    cross += (a * b.conj()).re;
                    mag_first += a.norm();
                    mag_second += b.norm();
                }
                let p = pairs.len() as f64;
                safe_div_real(cross / p, (mag_first / p) * (mag_second / p))
            })
        } else {
            let u = xw.mapv(unit);
            Array2::from_shape_fn((n_channels, n_bins), |(c, f)| {
                let cross: f64 = pairs
                    .iter()
                    .map(|&(i, j)| (u[[c, i, f]] * u[[c, j, f]].conj()).re)
                    .sum();
                cross / pairs.len() as f64
            })
        };
        mean.push(stat);
    }

    Ok(output(ctx, finish(ctx, mean)))
}

/// Multitaper pairwise power spectrum `Re mean(x_i · conj(x_j))`.
///
/// Pairs are drawn per channel and per taper; pairs of a trial with itself
/// are discarded so the estimate carries no noise-power bias.
pub fn pairwise_spectrum<R: Rng + ?Sized>(
    ctx: &EstimationContext<'_>,
    rng: &mut R,
) -> SpectralResult<ChannelOutput> {
    let n_pairs = ctx.params.check_pairs()?;
    tracing::info!(n_pairs, "Running Multitaper Pairwise Power Estimate");
    let mut fft = ctx.fft();
    let mut mean = TaperMean::new();
    let n_trials = ctx.n_trials();

    for k in 0..ctx.n_tapers() {
        let xw = ctx.transform(k, &mut fft);
        let (n_channels, _, n_bins) = xw.dim();
        let mut stat = Array2::<f64>::zeros((n_channels, n_bins));

        for (ch, mut row) in stat.axis_iter_mut(Axis(0)).enumerate() {
            tracing::debug!(channel = ch, taper = k, "Running channel");
            let pairs: Vec<_> = draw_pairs(rng, n_trials, n_pairs)
                .into_iter()
                .filter(|(i, j)| i != j)
                .collect();
            if pairs.is_empty() {
                tracing::warn!(channel = ch, taper = k, "every drawn trial pair was degenerate (i == j)");
                continue;
            }
            let p = pairs.len() as f64;
            for (f, value) in row.iter_mut().enumerate() {
                let cross: f64 = pairs
                    .iter()
                    .map(|&(i, j)| (xw[[ch, i, f]] * xw[[ch, j, f]].conj()).re)
                    .sum();
                *value = cross / p;
            }
        }
        mean.push(stat);
    }

    Ok(output(ctx, finish(ctx, mean)))
}
