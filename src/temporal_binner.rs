//! # Temporal binning: merging passes into one bin per index
//!
//! The temporal-bin map of a run is split into `num_partitions` shards by `index % num_partitions`.
//! Each shard is a plain map owned by exactly one worker during a merge, so merging never takes a
//! lock on the whole map (nor on any bin):
//!
//! ```text
//! SpatialBinSet ──split by index % P──▶ [bins of shard 0] … [bins of shard P-1]
//!                                             │                     │
//!                                   worker 0 ▼           worker P-1 ▼
//!                                      shard map 0   …      shard map P-1
//! ```
//!
//! With the `parallel` feature the shards are merged on the rayon pool; without it they are
//! merged one after the other. The result does not depend on `num_partitions` nor on the order in
//! which sets are merged (up to floating-point rounding), since every aggregator merge is
//! commutative and associative.
//!
//! Error Semantics
//! -----------------
//! Every spatial bin of a set is checked against the configured layout **before** any shard is
//! touched. A set that fails the check is rejected as a whole with
//! [`BinningError::MergeConsistency`]; bins merged from earlier sets stay valid.
use std::collections::HashMap;

use ahash::RandomState;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::{
    bin_manager::BinManager,
    binning_errors::BinningError,
    constants::BinIndex,
    spatial_binner::{SpatialBin, SpatialBinSet},
    vector::FeatureVector,
};

/// Merged state of one bin index across all passes of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct TemporalBin {
    pub index: BinIndex,
    pub num_obs: u64,
    pub num_passes: u32,
    pub features: FeatureVector,
}

pub type TemporalBinMap = HashMap<BinIndex, TemporalBin, RandomState>;

#[derive(Debug)]
pub struct TemporalBinner<'a> {
    bin_manager: &'a BinManager,
    shards: Vec<TemporalBinMap>,
    num_sets: usize,
}

impl<'a> TemporalBinner<'a> {
    /// Create an empty merger with `num_partitions` shards (at least one).
    pub fn new(bin_manager: &'a BinManager, num_partitions: usize) -> Self {
        TemporalBinner {
            bin_manager,
            shards: (0..num_partitions.max(1))
                .map(|_| TemporalBinMap::default())
                .collect(),
            num_sets: 0,
        }
    }

    pub fn num_partitions(&self) -> usize {
        self.shards.len()
    }

    /// Number of spatial bin sets merged so far.
    pub fn num_sets(&self) -> usize {
        self.num_sets
    }

    /// Number of distinct bin indices populated so far.
    pub fn len(&self) -> usize {
        self.shards.iter().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(HashMap::is_empty)
    }

    /// Merge all bins of one pass.
    ///
    /// Return
    /// ----------
    /// * `Ok(())`, or [`BinningError::MergeConsistency`] with nothing of `set` merged.
    pub fn merge(&mut self, set: &SpatialBinSet) -> Result<(), BinningError> {
        let bm = self.bin_manager;
        for bin in set.bins.values() {
            bm.check_layout(&set.pass_id, bin)?;
        }

        let num_partitions = self.shards.len() as BinIndex;
        let mut buckets: Vec<Vec<&SpatialBin>> = vec![Vec::new(); self.shards.len()];
        for bin in set.bins.values() {
            buckets[(bin.index % num_partitions) as usize].push(bin);
        }

        let merge_shard = |(shard, bins): (&mut TemporalBinMap, &Vec<&SpatialBin>)| {
            for spatial in bins {
                let temporal = shard
                    .entry(spatial.index)
                    .or_insert_with(|| bm.create_temporal_bin(spatial.index));
                bm.merge_spatial_bin(&set.pass_id, set.time_slot, spatial, temporal)?;
            }
            Ok::<(), BinningError>(())
        };

        #[cfg(feature = "parallel")]
        self.shards
            .par_iter_mut()
            .zip(buckets.par_iter())
            .try_for_each(merge_shard)?;

        #[cfg(not(feature = "parallel"))]
        self.shards
            .iter_mut()
            .zip(buckets.iter())
            .try_for_each(merge_shard)?;

        self.num_sets += 1;
        Ok(())
    }

    /// Consume the merger and return the union of all shards.
    pub fn into_bins(self) -> TemporalBinMap {
        let mut shards = self.shards.into_iter();
        let mut bins = shards.next().unwrap_or_default();
        bins.reserve(shards.as_slice().iter().map(HashMap::len).sum());
        for shard in shards {
            bins.extend(shard);
        }
        bins
    }
}

/// Merge a collection of spatial bin sets into one temporal bin per index.
///
/// Arguments
/// -----------------
/// * `bin_manager`: the run's aggregators and layouts.
/// * `sets`: spatial bin sets, in any order.
/// * `num_partitions`: number of index shards merged independently.
///
/// Return
/// ----------
/// * The temporal bin map, or the first [`BinningError::MergeConsistency`]. On error no map is
///   returned at all, so a partially merged run can never reach completion.
pub fn merge_all<'s>(
    bin_manager: &BinManager,
    sets: impl IntoIterator<Item = &'s SpatialBinSet>,
    num_partitions: usize,
) -> Result<TemporalBinMap, BinningError> {
    let mut merger = TemporalBinner::new(bin_manager, num_partitions);
    for set in sets {
        merger.merge(set)?;
    }
    log::debug!(
        "merged {} pass(es) into {} bins over {} partition(s)",
        merger.num_sets(),
        merger.len(),
        merger.num_partitions()
    );
    Ok(merger.into_bins())
}
