//! # Bin manager
//!
//! Owner of the ordered aggregator list of a run and of the three feature layouts derived from
//! it (spatial, temporal, output). Every bin of the run is created, updated, merged and completed
//! through this type, so all bins of a run agree on their layout.
//!
//! Lifecycle of one bin index
//! -----------------
//! ```text
//! create_spatial_bin ─▶ aggregate_spatial_bin* ─▶ complete_spatial_bin      (one per pass)
//!                                                        │
//! create_temporal_bin ─▶ merge_spatial_bin* ◀────────────┘                  (one per run)
//!                              │
//!                     complete_temporal_bin ─▶ OutputBin ─▶ process (cell processor chain)
//! ```
//!
//! Layouts are computed once in [`BinManager::new`] and never change afterwards. A spatial bin
//! whose vector does not match the spatial layout is refused by [`BinManager::merge_spatial_bin`]
//! with [`BinningError::MergeConsistency`] before the temporal bin is touched.
//!
//! See also
//! ------------
//! * [`Aggregator`] – The per-segment reduction rules.
//! * [`CellProcessorChain`] – Post-processing applied to completed bins.
use crate::{
    aggregators::{Aggregator, AggregatorBuildContext, AggregatorConfig, SpatialContribution},
    binning_errors::BinningError,
    cell_processor::{CellProcessorChain, CellProcessorConfig},
    constants::BinIndex,
    output::output_bin::OutputBin,
    spatial_binner::SpatialBin,
    temporal_binner::TemporalBin,
    vector::FeatureLayout,
};

#[derive(Debug)]
pub struct BinManager {
    aggregators: Vec<Box<dyn Aggregator>>,
    spatial_layout: FeatureLayout,
    temporal_layout: FeatureLayout,
    output_layout: FeatureLayout,
    required_variables: Vec<usize>,
    output_names: Vec<String>,
    chain: CellProcessorChain,
}

impl BinManager {
    /// Build the aggregators and the post-processing chain of a run.
    ///
    /// Arguments
    /// -----------------
    /// * `aggregators`: ordered aggregator selection, at least one entry.
    /// * `ctx`: variable context and time window used to resolve the aggregators.
    /// * `cell_processors`: ordered post-processors, possibly empty.
    ///
    /// Return
    /// ----------
    /// * The manager, or the first configuration error met.
    pub fn new(
        aggregators: &[AggregatorConfig],
        ctx: &AggregatorBuildContext<'_>,
        cell_processors: &[CellProcessorConfig],
    ) -> Result<Self, BinningError> {
        let built = aggregators
            .iter()
            .map(|config| config.build(ctx))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_aggregators(built, cell_processors)
    }

    /// Same as [`BinManager::new`] with already instantiated aggregators.
    pub fn from_aggregators(
        aggregators: Vec<Box<dyn Aggregator>>,
        cell_processors: &[CellProcessorConfig],
    ) -> Result<Self, BinningError> {
        if aggregators.is_empty() {
            return Err(BinningError::InvalidAggregatorConfig(
                "at least one aggregator must be configured".into(),
            ));
        }

        let spatial_layout =
            FeatureLayout::from_counts(aggregators.iter().map(|a| a.spatial_feature_names().len()));
        let temporal_layout = FeatureLayout::from_counts(
            aggregators.iter().map(|a| a.temporal_feature_names().len()),
        );
        let output_layout =
            FeatureLayout::from_counts(aggregators.iter().map(|a| a.output_feature_names().len()));

        let mut required_variables: Vec<usize> = aggregators
            .iter()
            .flat_map(|a| a.required_variables().iter().copied())
            .collect();
        required_variables.sort_unstable();
        required_variables.dedup();

        let output_names: Vec<String> = aggregators
            .iter()
            .flat_map(|a| a.output_feature_names().iter().cloned())
            .collect();
        let chain = CellProcessorChain::new(cell_processors, &output_names)?;

        Ok(BinManager {
            aggregators,
            spatial_layout,
            temporal_layout,
            output_layout,
            required_variables,
            output_names,
            chain,
        })
    }

    pub fn aggregators(&self) -> &[Box<dyn Aggregator>] {
        &self.aggregators
    }

    pub fn spatial_layout(&self) -> &FeatureLayout {
        &self.spatial_layout
    }

    pub fn temporal_layout(&self) -> &FeatureLayout {
        &self.temporal_layout
    }

    pub fn output_layout(&self) -> &FeatureLayout {
        &self.output_layout
    }

    /// Sorted, deduplicated context indices read by at least one aggregator.
    pub fn required_variables(&self) -> &[usize] {
        &self.required_variables
    }

    /// Feature names of a completed bin, before post-processing.
    pub fn output_feature_names(&self) -> &[String] {
        &self.output_names
    }

    /// Feature names of the bins handed to the sink (after the cell processor chain).
    pub fn result_feature_names(&self) -> &[String] {
        self.chain.output_feature_names()
    }

    pub fn has_post_processor(&self) -> bool {
        !self.chain.is_empty()
    }

    pub fn create_spatial_bin(&self, index: BinIndex) -> SpatialBin {
        let mut bin = SpatialBin {
            index,
            num_obs: 0,
            features: self.spatial_layout.new_vector(),
        };
        for (i, agg) in self.aggregators.iter().enumerate() {
            agg.init_spatial(bin.features.segment_mut(&self.spatial_layout, i));
        }
        bin
    }

    /// Fold one observation (values in variable-context order) into a spatial bin.
    pub fn aggregate_spatial_bin(&self, values: &[f64], bin: &mut SpatialBin) {
        bin.num_obs += 1;
        for (i, agg) in self.aggregators.iter().enumerate() {
            agg.aggregate_spatial(
                values,
                bin.num_obs,
                bin.features.segment_mut(&self.spatial_layout, i),
            );
        }
    }

    pub fn complete_spatial_bin(&self, bin: &mut SpatialBin) {
        for (i, agg) in self.aggregators.iter().enumerate() {
            agg.complete_spatial(bin.num_obs, bin.features.segment_mut(&self.spatial_layout, i));
        }
    }

    pub fn create_temporal_bin(&self, index: BinIndex) -> TemporalBin {
        let mut bin = TemporalBin {
            index,
            num_obs: 0,
            num_passes: 0,
            features: self.temporal_layout.new_vector(),
        };
        for (i, agg) in self.aggregators.iter().enumerate() {
            agg.init_temporal(bin.features.segment_mut(&self.temporal_layout, i));
        }
        bin
    }

    /// Merge one finished spatial bin into the temporal bin of the same index.
    ///
    /// Arguments
    /// -----------------
    /// * `pass`: identifier of the pass that produced `spatial`, reported on error.
    /// * `time_slot`: time-series slot of that pass, if a time window is configured.
    /// * `spatial`: the finished spatial bin.
    /// * `temporal`: the accumulator, created by [`BinManager::create_temporal_bin`].
    ///
    /// Return
    /// ----------
    /// * `Ok(())`, or [`BinningError::MergeConsistency`] if either vector does not match the
    ///   configured layouts. On error `temporal` is left untouched.
    pub fn merge_spatial_bin(
        &self,
        pass: &str,
        time_slot: Option<usize>,
        spatial: &SpatialBin,
        temporal: &mut TemporalBin,
    ) -> Result<(), BinningError> {
        self.check_layout(pass, spatial)?;
        if temporal.features.len() != self.temporal_layout.len() {
            return Err(BinningError::MergeConsistency {
                index: temporal.index,
                pass: pass.to_string(),
                expected: self.temporal_layout.len(),
                actual: temporal.features.len(),
            });
        }
        debug_assert_eq!(spatial.index, temporal.index);

        for (i, agg) in self.aggregators.iter().enumerate() {
            agg.aggregate_temporal(
                SpatialContribution {
                    features: spatial.features.segment(&self.spatial_layout, i),
                    num_obs: spatial.num_obs,
                    time_slot,
                },
                temporal.features.segment_mut(&self.temporal_layout, i),
            );
        }
        temporal.num_obs += spatial.num_obs;
        temporal.num_passes += 1;
        Ok(())
    }

    /// Verify that a spatial bin has the spatial layout of this run.
    pub fn check_layout(&self, pass: &str, spatial: &SpatialBin) -> Result<(), BinningError> {
        if spatial.features.len() != self.spatial_layout.len() {
            return Err(BinningError::MergeConsistency {
                index: spatial.index,
                pass: pass.to_string(),
                expected: self.spatial_layout.len(),
                actual: spatial.features.len(),
            });
        }
        Ok(())
    }

    /// An empty output bin for `index`.
    pub fn create_output_bin(&self, index: BinIndex) -> OutputBin {
        OutputBin::completed(index, 0, 0, self.output_layout.new_vector())
    }

    pub fn complete_temporal_bin(&self, temporal: &TemporalBin) -> OutputBin {
        let mut out = self.create_output_bin(temporal.index);
        out.num_obs = temporal.num_obs;
        out.num_passes = temporal.num_passes;
        for (i, agg) in self.aggregators.iter().enumerate() {
            agg.complete_temporal(
                temporal.features.segment(&self.temporal_layout, i),
                temporal.num_obs,
                out.features.segment_mut(&self.output_layout, i),
            );
        }
        out
    }

    /// Run the cell processor chain on a completed bin (pass-through without post-processor).
    pub fn process(&self, bin: OutputBin) -> OutputBin {
        self.chain.process(bin)
    }
}
