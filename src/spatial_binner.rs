//! # Spatial binning of one pass
//!
//! A [`SpatialBinner`] consumes the observations of exactly one source product and accumulates
//! them into per-index [`SpatialBin`]s. Nothing it holds is shared with other passes, so any
//! number of binners can run on separate threads against the same [`BinningContext`].
//!
//! Observation filtering
//! -----------------
//! Observations are filtered in this order, each rejection bumping one counter of [`PassStats`]:
//!
//! 1. fewer values than the pass declares, or a coordinate the grid rejects → `dropped`,
//! 2. outside the configured region → `outside_region`,
//! 3. mask variable equal to zero or NaN → `masked`,
//! 4. a non-finite value in any variable read by an aggregator → `dropped`.
//!
//! A rejected observation never reaches a bin and never fails the pass. Counts are strictly
//! additive: `seen == accepted + dropped + masked + outside_region`.
use std::collections::HashMap;

use ahash::RandomState;

use crate::{
    binning_config::BinningContext,
    binning_errors::BinningError,
    constants::BinIndex,
    observations::{Observation, ObservationValues, PassDescriptor},
    variable_context::SourceMapping,
    vector::FeatureVector,
};

/// Per-pass accumulation state of one bin index.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialBin {
    pub index: BinIndex,
    pub num_obs: u64,
    pub features: FeatureVector,
}

/// Observation counters of one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    pub seen: u64,
    pub accepted: u64,
    pub dropped: u64,
    pub masked: u64,
    pub outside_region: u64,
}

impl PassStats {
    pub fn add(&mut self, other: &PassStats) {
        self.seen += other.seen;
        self.accepted += other.accepted;
        self.dropped += other.dropped;
        self.masked += other.masked;
        self.outside_region += other.outside_region;
    }
}

pub type SpatialBinMap = HashMap<BinIndex, SpatialBin, RandomState>;

/// Finished spatial bins of one pass, ready to be merged.
#[derive(Debug, Clone, Default)]
pub struct SpatialBinSet {
    pub pass_id: String,
    pub time_slot: Option<usize>,
    pub bins: SpatialBinMap,
    pub stats: PassStats,
}

impl SpatialBinSet {
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }
}

pub struct SpatialBinner<'a> {
    ctx: &'a BinningContext,
    pass_id: String,
    time_slot: Option<usize>,
    mapping: SourceMapping,
    bins: SpatialBinMap,
    stats: PassStats,
    scratch: ObservationValues,
}

impl<'a> SpatialBinner<'a> {
    /// Prepare the binning of one pass.
    ///
    /// Return
    /// ----------
    /// * The binner, or a configuration error if the pass lacks a declared variable
    ///   ([`BinningError::UndeclaredVariable`]) or a time series needs its start time
    ///   ([`BinningError::MissingPassTime`]).
    pub fn new(ctx: &'a BinningContext, pass: &PassDescriptor) -> Result<Self, BinningError> {
        let mapping = ctx.variables().source_mapping(pass)?;
        let time_slot = ctx.time_slot(pass)?;
        Ok(SpatialBinner {
            ctx,
            pass_id: pass.id.clone(),
            time_slot,
            mapping,
            bins: HashMap::default(),
            stats: PassStats::default(),
            scratch: ObservationValues::new(),
        })
    }

    /// Fold one observation into its spatial bin, or count it as rejected.
    pub fn consume(&mut self, obs: &Observation) {
        self.stats.seen += 1;

        if self.mapping.gather(obs, &mut self.scratch).is_none() {
            self.stats.dropped += 1;
            return;
        }
        let index = match self.ctx.grid().bin_index(obs.lat, obs.lon) {
            Ok(index) => index,
            Err(_) => {
                self.stats.dropped += 1;
                return;
            }
        };
        if let Some(region) = self.ctx.region() {
            if !region.contains(obs.lat, obs.lon) {
                self.stats.outside_region += 1;
                return;
            }
        }
        if let Some(m) = self.ctx.mask_index() {
            let flag = self.scratch[m];
            if flag == 0.0 || flag.is_nan() {
                self.stats.masked += 1;
                return;
            }
        }

        let bin_manager = self.ctx.bin_manager();
        let values = &self.scratch;
        if bin_manager
            .required_variables()
            .iter()
            .any(|&v| !values[v].is_finite())
        {
            self.stats.dropped += 1;
            return;
        }

        let bin = self
            .bins
            .entry(index)
            .or_insert_with(|| bin_manager.create_spatial_bin(index));
        bin_manager.aggregate_spatial_bin(values, bin);
        self.stats.accepted += 1;
    }

    pub fn consume_all(&mut self, observations: impl IntoIterator<Item = Observation>) {
        for obs in observations {
            self.consume(&obs);
        }
    }

    pub fn stats(&self) -> &PassStats {
        &self.stats
    }

    /// Complete every spatial bin and hand the set over for merging.
    pub fn finish(mut self) -> SpatialBinSet {
        let bin_manager = self.ctx.bin_manager();
        for bin in self.bins.values_mut() {
            bin_manager.complete_spatial_bin(bin);
        }
        log::debug!(
            "pass '{}': {} bins from {} of {} observations (dropped={}, masked={}, outside_region={})",
            self.pass_id,
            self.bins.len(),
            self.stats.accepted,
            self.stats.seen,
            self.stats.dropped,
            self.stats.masked,
            self.stats.outside_region
        );
        SpatialBinSet {
            pass_id: self.pass_id,
            time_slot: self.time_slot,
            bins: self.bins,
            stats: self.stats,
        }
    }
}
