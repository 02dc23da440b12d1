//! Input recordings and per-channel outputs
//!
//! A [`Recording`] is the read-only input of every estimator: repeated trials
//! of one channel (`trials x time`) or of several (`channels x trials x time`).
//! Estimators that keep the channel axis return a [`ChannelEstimate`], which
//! mirrors the input variant so single-channel inputs come back without a
//! channel axis.

use ndarray::{Array1, Array2, Array3, ArrayD, ArrayView3, Axis, Ix2, Ix3};

use crate::types::{SpectralError, SpectralResult};

/// Repeated-trial recording.
#[derive(Debug, Clone, PartialEq)]
pub enum Recording {
    /// `trials x time`
    SingleChannel(Array2<f64>),
    /// `channels x trials x time`
    MultiChannel(Array3<f64>),
}

impl Recording {
    /// Build a recording from an array of any rank.
    ///
    /// Rank 2 is read as `trials x time`, rank 3 as
    /// `channels x trials x time`; anything else is a shape error.
    pub fn from_dyn(data: ArrayD<f64>) -> SpectralResult<Self> {
        let recording = match data.ndim() {
            2 => Recording::SingleChannel(
                data.into_dimensionality::<Ix2>()
                    .map_err(|_| SpectralError::Shape { rank: 2 })?,
            ),
            3 => Recording::MultiChannel(
                data.into_dimensionality::<Ix3>()
                    .map_err(|_| SpectralError::Shape { rank: 3 })?,
            ),
            rank => return Err(SpectralError::Shape { rank }),
        };
        recording.validate()?;
        Ok(recording)
    }

    /// Number of channels (1 for a single-channel recording)
    pub fn n_channels(&self) -> usize {
        match self {
            Recording::SingleChannel(_) => 1,
            Recording::MultiChannel(x) => x.len_of(Axis(0)),
        }
    }

    pub fn n_trials(&self) -> usize {
        match self {
            Recording::SingleChannel(x) => x.len_of(Axis(0)),
            Recording::MultiChannel(x) => x.len_of(Axis(1)),
        }
    }

    /// Number of time samples per trial
    pub fn n_samples(&self) -> usize {
        match self {
            Recording::SingleChannel(x) => x.len_of(Axis(1)),
            Recording::MultiChannel(x) => x.len_of(Axis(2)),
        }
    }

    pub fn is_single_channel(&self) -> bool {
        matches!(self, Recording::SingleChannel(_))
    }

    /// Uniform `channels x trials x time` view of the data.
    pub fn as_channels(&self) -> ArrayView3<'_, f64> {
        match self {
            Recording::SingleChannel(x) => x.view().insert_axis(Axis(0)),
            Recording::MultiChannel(x) => x.view(),
        }
    }

    /// Reject recordings without channels, trials or samples.
    pub fn validate(&self) -> SpectralResult<()> {
        if self.n_channels() == 0 {
            return Err(SpectralError::EmptyRecording("channels"));
        }
        if self.n_trials() == 0 {
            return Err(SpectralError::EmptyRecording("trials"));
        }
        if self.n_samples() == 0 {
            return Err(SpectralError::EmptyRecording("samples"));
        }
        Ok(())
    }

    pub(crate) fn log_format(&self) {
        match self {
            Recording::SingleChannel(_) => tracing::info!(
                trials = self.n_trials(),
                samples = self.n_samples(),
                "The data is of format trials x time (single channel)"
            ),
            Recording::MultiChannel(_) => tracing::info!(
                channels = self.n_channels(),
                trials = self.n_trials(),
                samples = self.n_samples(),
                "The data is of format channels x trials x time"
            ),
        }
    }
}

impl From<Array2<f64>> for Recording {
    fn from(data: Array2<f64>) -> Self {
        Recording::SingleChannel(data)
    }
}

impl From<Array3<f64>> for Recording {
    fn from(data: Array3<f64>) -> Self {
        Recording::MultiChannel(data)
    }
}

impl TryFrom<ArrayD<f64>> for Recording {
    type Error = SpectralError;

    fn try_from(data: ArrayD<f64>) -> SpectralResult<Self> {
        Recording::from_dyn(data)
    }
}

/// Per-channel statistic over frequency.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEstimate {
    /// `frequency` (single-channel input)
    Single(Array1<f64>),
    /// `channel x frequency`
    Multi(Array2<f64>),
}

impl ChannelEstimate {
    /// Wrap a `channel x frequency` array, dropping the channel axis when the
    /// input recording was single-channel.
    pub(crate) fn from_channels(values: Array2<f64>, single: bool) -> Self {
        if single {
            ChannelEstimate::Single(values.index_axis_move(Axis(0), 0))
        } else {
            ChannelEstimate::Multi(values)
        }
    }

    pub fn n_channels(&self) -> usize {
        match self {
            ChannelEstimate::Single(_) => 1,
            ChannelEstimate::Multi(v) => v.nrows(),
        }
    }

    pub fn n_freqs(&self) -> usize {
        match self {
            ChannelEstimate::Single(v) => v.len(),
            ChannelEstimate::Multi(v) => v.ncols(),
        }
    }

    /// Values of one channel over frequency.
    pub fn channel(&self, index: usize) -> Option<Array1<f64>> {
        match self {
            ChannelEstimate::Single(v) if index == 0 => Some(v.clone()),
            ChannelEstimate::Single(_) => None,
            ChannelEstimate::Multi(v) if index < v.nrows() => Some(v.row(index).to_owned()),
            ChannelEstimate::Multi(_) => None,
        }
    }

    /// Always-2-D `channel x frequency` copy.
    pub fn to_channels(&self) -> Array2<f64> {
        match self {
            ChannelEstimate::Single(v) => v.clone().insert_axis(Axis(0)),
            ChannelEstimate::Multi(v) => v.clone(),
        }
    }

    pub fn into_dyn(self) -> ArrayD<f64> {
        match self {
            ChannelEstimate::Single(v) => v.into_dyn(),
            ChannelEstimate::Multi(v) => v.into_dyn(),
        }
    }
}
