//! # Output of a binning run
//!
//! The core never formats files. Processed bins are handed to a [`BinSink`], once per populated
//! bin index and in no particular order; ordering and serialization are the sink's business.
//!
//! Sinks
//! -----------------
//! * [`MemoryBinSink`] – keeps every bin in a hash map, for tests and in-process consumers.
//! * [`csv_sink::CsvBinSink`] – one CSV row per bin, sorted by bin index on `finish`.
//!
//! See also
//! ------------
//! * [`run_summary::RunSummary`] – Counters and metadata of a finished run.
pub mod csv_sink;
pub mod output_bin;
pub mod run_summary;

use std::collections::HashMap;

use ahash::RandomState;

use crate::{binning_errors::BinningError, constants::BinIndex};
use output_bin::OutputBin;

/// Consumer of processed bins.
pub trait BinSink {
    /// Called once before the first bin with the names of the features to come.
    fn begin(&mut self, _feature_names: &[String]) -> Result<(), BinningError> {
        Ok(())
    }

    /// Receive the features of one bin index.
    fn write(&mut self, index: BinIndex, features: &[f64]) -> Result<(), BinningError>;

    /// Receive one processed bin with its counters.
    fn write_bin(&mut self, bin: &OutputBin) -> Result<(), BinningError> {
        self.write(bin.index, bin.features.as_slice())
    }

    /// Called once after the last bin.
    fn finish(&mut self) -> Result<(), BinningError> {
        Ok(())
    }
}

impl<S: BinSink + ?Sized> BinSink for &mut S {
    fn begin(&mut self, feature_names: &[String]) -> Result<(), BinningError> {
        (**self).begin(feature_names)
    }

    fn write(&mut self, index: BinIndex, features: &[f64]) -> Result<(), BinningError> {
        (**self).write(index, features)
    }

    fn write_bin(&mut self, bin: &OutputBin) -> Result<(), BinningError> {
        (**self).write_bin(bin)
    }

    fn finish(&mut self) -> Result<(), BinningError> {
        (**self).finish()
    }
}

/// In-memory sink keyed by bin index.
#[derive(Debug, Clone, Default)]
pub struct MemoryBinSink {
    feature_names: Vec<String>,
    bins: HashMap<BinIndex, Vec<f64>, RandomState>,
    finished: bool,
}

impl MemoryBinSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn get(&self, index: BinIndex) -> Option<&[f64]> {
        self.bins.get(&index).map(Vec::as_slice)
    }

    /// Value of the named feature in bin `index`.
    pub fn feature(&self, index: BinIndex, name: &str) -> Option<f64> {
        let k = self.feature_names.iter().position(|n| n == name)?;
        self.get(index)?.get(k).copied()
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn into_bins(self) -> HashMap<BinIndex, Vec<f64>, RandomState> {
        self.bins
    }
}

impl BinSink for MemoryBinSink {
    fn begin(&mut self, feature_names: &[String]) -> Result<(), BinningError> {
        self.feature_names = feature_names.to_vec();
        Ok(())
    }

    fn write(&mut self, index: BinIndex, features: &[f64]) -> Result<(), BinningError> {
        self.bins.insert(index, features.to_vec());
        Ok(())
    }

    fn finish(&mut self) -> Result<(), BinningError> {
        self.finished = true;
        Ok(())
    }
}
