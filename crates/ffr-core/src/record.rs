//! Named-field estimate records
//!
//! Resampling harnesses collect the output of thousands of calls and look
//! fields up by name. [`EstimateRecord`] is that shape: a map from the
//! established field names (see [`keys`]) to real or complex arrays,
//! serialisable with serde.
//!
//! Records are produced by the methods of
//! [`BootstrapAnalyzer`](crate::analyzer::BootstrapAnalyzer); the numbers in
//! a record are exactly those the positional methods return.

use ndarray::{Array1, Array2, ArrayD, ArrayView1, Ix1};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::combined::{RankedSpectrum, RankedVectors};
use crate::recording::ChannelEstimate;
use crate::types::Complex;

/// Field names used in records.
pub mod keys {
    pub const PLV: &str = "mtplv";
    pub const SPECTRUM: &str = "mtspec";
    pub const NOISE_FLOOR: &str = "mtspec_noise";
    pub const PHASE: &str = "mtphase";
    pub const CPCA_PLV: &str = "mtcplv";
    pub const CPCA_SPECTRUM: &str = "mtcspec";
    pub const CPCA_WAVEFORM: &str = "y_cpc";
    pub const PCA_WAVEFORM: &str = "y_pc";
    pub const PPC: &str = "mtppc";
    pub const RAW_SPECTRUM: &str = "mtspecraw";
    pub const PAIRWISE_SPECTRUM: &str = "pspec";
    pub const COMBINED_SPECTRUM: &str = "spectrum";
    pub const COMBINED_PLV: &str = "plv";
    pub const COMBINED_ITC: &str = "itc";
    pub const COMBINED_SPECTRUM_VECTORS: &str = "spectrumV";
    pub const COMBINED_PLV_VECTORS: &str = "plvV";
    pub const COMBINED_ITC_VECTORS: &str = "itcV";
    pub const FREQUENCIES: &str = "f";
}

/// One field of a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RecordValue {
    Real(ArrayD<f64>),
    Complex(ArrayD<Complex>),
}

impl RecordValue {
    pub fn as_real(&self) -> Option<&ArrayD<f64>> {
        match self {
            RecordValue::Real(v) => Some(v),
            RecordValue::Complex(_) => None,
        }
    }

    pub fn as_complex(&self) -> Option<&ArrayD<Complex>> {
        match self {
            RecordValue::Complex(v) => Some(v),
            RecordValue::Real(_) => None,
        }
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            RecordValue::Real(v) => v.shape(),
            RecordValue::Complex(v) => v.shape(),
        }
    }
}

impl From<Array1<f64>> for RecordValue {
    fn from(v: Array1<f64>) -> Self {
        RecordValue::Real(v.into_dyn())
    }
}

impl From<Array2<f64>> for RecordValue {
    fn from(v: Array2<f64>) -> Self {
        RecordValue::Real(v.into_dyn())
    }
}

impl From<ChannelEstimate> for RecordValue {
    fn from(v: ChannelEstimate) -> Self {
        RecordValue::Real(v.into_dyn())
    }
}

impl From<RankedSpectrum> for RecordValue {
    fn from(v: RankedSpectrum) -> Self {
        RecordValue::Real(v.into_dyn())
    }
}

impl From<RankedVectors> for RecordValue {
    fn from(v: RankedVectors) -> Self {
        RecordValue::Complex(v.into_dyn())
    }
}

/// Named-field estimate.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EstimateRecord {
    fields: BTreeMap<String, RecordValue>,
}

impl EstimateRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a field.
    pub fn with(mut self, key: &str, value: impl Into<RecordValue>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&RecordValue> {
        self.fields.get(key)
    }

    /// Real-valued field
    pub fn real(&self, key: &str) -> Option<&ArrayD<f64>> {
        self.get(key).and_then(RecordValue::as_real)
    }

    /// Complex-valued field
    pub fn complex(&self, key: &str) -> Option<&ArrayD<Complex>> {
        self.get(key).and_then(RecordValue::as_complex)
    }

    /// The frequency axis (`f`), when the record carries one.
    pub fn frequencies(&self) -> Option<ArrayView1<'_, f64>> {
        self.real(keys::FREQUENCIES)
            .and_then(|f| f.view().into_dimensionality::<Ix1>().ok())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Field names in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
