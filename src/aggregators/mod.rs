//! # Aggregators
//!
//! An aggregator is one statistical reduction (sum, mean, extrema, percentile, …) applied to one
//! measured variable. It owns a fixed segment of every bin's feature vector in each of the three
//! layouts a bin goes through:
//!
//! ```text
//!  observation ──aggregate_spatial──▶ spatial segment ──complete_spatial──▶ (finished pass)
//!                                         │
//!                           aggregate_temporal (once per contributing pass)
//!                                         ▼
//!                                 temporal segment ──complete_temporal──▶ output segment
//! ```
//!
//! The aggregator itself is stateless with respect to bins: all state lives in the slices it is
//! handed, which lets the same instance serve every bin and every worker thread.
//!
//! ## Merge policy
//! -----------------
//! `aggregate_temporal` must be commutative and associative (up to floating-point rounding):
//! spatial bins are merged in whatever order the partitions are processed.
//! * `Sum`, `MinMax` merge trivially.
//! * `Average`/`StdDev` keep Welford state (mean, M2) and merge with the pairwise formula of
//!   Chan et al., weighted by observation counts.
//! * `PercentileHistogram` merges fixed-bucket histograms bucket by bucket, never intermediate
//!   percentiles.
//! * `TimeSeries` accumulates sums and counts per time slot.
//!
//! ## Configuration
//! -----------------
//! Aggregators are selected through [`AggregatorConfig`] (tagged by `"type"` in JSON) and built
//! once by [`AggregatorConfig::build`], where every variable reference is resolved. A reference to
//! an undeclared variable is a configuration error raised before any observation is read.
mod average;
mod min_max;
mod percentile;
mod sum;
mod time_series;

pub use average::{AggregatorAverage, AggregatorStdDev};
pub use min_max::AggregatorMinMax;
pub use percentile::AggregatorPercentile;
pub use sum::AggregatorSum;
pub use time_series::AggregatorTimeSeries;

use serde::{Deserialize, Serialize};

use crate::{binning_errors::BinningError, variable_context::VariableContext};

/// One finished spatial bin segment, as handed to [`Aggregator::aggregate_temporal`].
#[derive(Debug, Clone, Copy)]
pub struct SpatialContribution<'a> {
    /// Spatial segment of this aggregator.
    pub features: &'a [f64],
    /// Number of observations the spatial bin received.
    pub num_obs: u64,
    /// Time-series slot of the pass that produced the bin, when a time window is configured.
    pub time_slot: Option<usize>,
}

/// A statistical reduction rule over one bin.
pub trait Aggregator: std::fmt::Debug + Send + Sync {
    /// Short kind name, e.g. `"AVG"`.
    fn name(&self) -> &str;

    /// Context indices of the variables this aggregator reads.
    ///
    /// An observation with a non-finite value in any of them is dropped before it reaches the bin.
    fn required_variables(&self) -> &[usize];

    fn spatial_feature_names(&self) -> &[String];

    fn temporal_feature_names(&self) -> &[String];

    fn output_feature_names(&self) -> &[String];

    /// Reset a spatial segment to the identity state.
    fn init_spatial(&self, spatial: &mut [f64]);

    /// Fold one observation into the spatial segment.
    ///
    /// Arguments
    /// -----------------
    /// * `values`: observation values in variable-context order.
    /// * `num_obs`: observation count of the bin **including** this observation.
    /// * `spatial`: the segment to update.
    fn aggregate_spatial(&self, values: &[f64], num_obs: u64, spatial: &mut [f64]);

    /// Finalise a spatial segment once its pass is over.
    fn complete_spatial(&self, num_obs: u64, spatial: &mut [f64]);

    /// Reset a temporal segment to the identity state.
    fn init_temporal(&self, temporal: &mut [f64]);

    /// Fold one finished spatial segment into the temporal segment.
    fn aggregate_temporal(&self, spatial: SpatialContribution<'_>, temporal: &mut [f64]);

    /// Produce the output features from a fully merged temporal segment.
    fn complete_temporal(&self, temporal: &[f64], num_obs: u64, output: &mut [f64]);
}

/// Build context shared by all aggregator constructors.
#[derive(Debug, Clone, Copy)]
pub struct AggregatorBuildContext<'a> {
    pub variables: &'a VariableContext,
    /// Number of time-series slots of the run, `None` without a configured time window.
    pub num_time_slots: Option<usize>,
}

fn default_num_buckets() -> usize {
    100
}

/// Declarative aggregator selection, as found in a binning configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AggregatorConfig {
    #[serde(rename = "SUM")]
    Sum { var_name: String },

    #[serde(rename = "AVG")]
    Average { var_name: String },

    #[serde(rename = "STDEV")]
    StdDev { var_name: String },

    #[serde(rename = "MIN_MAX")]
    MinMax { var_name: String },

    #[serde(rename = "PERCENTILE")]
    PercentileHistogram {
        var_name: String,
        percentiles: Vec<u32>,
        #[serde(default = "default_num_buckets")]
        num_buckets: usize,
        min: f64,
        max: f64,
    },

    #[serde(rename = "TIME_SERIES")]
    TimeSeries { var_name: String },
}

impl AggregatorConfig {
    pub fn var_name(&self) -> &str {
        match self {
            AggregatorConfig::Sum { var_name }
            | AggregatorConfig::Average { var_name }
            | AggregatorConfig::StdDev { var_name }
            | AggregatorConfig::MinMax { var_name }
            | AggregatorConfig::PercentileHistogram { var_name, .. }
            | AggregatorConfig::TimeSeries { var_name } => var_name,
        }
    }

    /// Instantiate the aggregator, resolving its variable against the run's context.
    ///
    /// Return
    /// ----------
    /// * The aggregator, or a configuration error ([`BinningError::UndeclaredVariable`],
    ///   [`BinningError::InvalidAggregatorConfig`]).
    pub fn build(
        &self,
        ctx: &AggregatorBuildContext<'_>,
    ) -> Result<Box<dyn Aggregator>, BinningError> {
        let var_index = ctx.variables.require(self.var_name())?;
        let var_name = self.var_name();

        Ok(match self {
            AggregatorConfig::Sum { .. } => Box::new(AggregatorSum::new(var_name, var_index)),
            AggregatorConfig::Average { .. } => {
                Box::new(AggregatorAverage::new(var_name, var_index))
            }
            AggregatorConfig::StdDev { .. } => Box::new(AggregatorStdDev::new(var_name, var_index)),
            AggregatorConfig::MinMax { .. } => Box::new(AggregatorMinMax::new(var_name, var_index)),
            AggregatorConfig::PercentileHistogram {
                percentiles,
                num_buckets,
                min,
                max,
                ..
            } => Box::new(AggregatorPercentile::new(
                var_name,
                var_index,
                percentiles,
                *num_buckets,
                *min,
                *max,
            )?),
            AggregatorConfig::TimeSeries { .. } => {
                let slots = ctx.num_time_slots.ok_or_else(|| {
                    BinningError::InvalidAggregatorConfig(format!(
                        "TIME_SERIES({var_name}) requires start_date and end_date"
                    ))
                })?;
                Box::new(AggregatorTimeSeries::new(var_name, var_index, slots)?)
            }
        })
    }
}

pub(crate) fn feature_names(var_name: &str, suffixes: &[&str]) -> Vec<String> {
    suffixes
        .iter()
        .map(|suffix| format!("{var_name}_{suffix}"))
        .collect()
}

#[cfg(test)]
mod aggregator_config_tests {
    use super::*;

    #[test]
    fn config_round_trips_through_json_tags() {
        let json = r#"[
            {"type": "AVG", "var_name": "chl"},
            {"type": "PERCENTILE", "var_name": "chl", "percentiles": [50, 90], "min": 0.0, "max": 10.0}
        ]"#;
        let configs: Vec<AggregatorConfig> = serde_json::from_str(json).unwrap();
        assert_eq!(
            configs[0],
            AggregatorConfig::Average {
                var_name: "chl".into()
            }
        );
        assert!(matches!(
            configs[1],
            AggregatorConfig::PercentileHistogram {
                num_buckets: 100,
                ..
            }
        ));
    }

    #[test]
    fn unknown_variable_is_a_configuration_error() {
        let vars = VariableContext::new(&["chl".to_string()]).unwrap();
        let ctx = AggregatorBuildContext {
            variables: &vars,
            num_time_slots: None,
        };
        let err = AggregatorConfig::Sum {
            var_name: "sst".into(),
        }
        .build(&ctx)
        .unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn time_series_needs_a_time_window() {
        let vars = VariableContext::new(&["chl".to_string()]).unwrap();
        let ctx = AggregatorBuildContext {
            variables: &vars,
            num_time_slots: None,
        };
        let res = AggregatorConfig::TimeSeries {
            var_name: "chl".into(),
        }
        .build(&ctx);
        assert!(matches!(res, Err(BinningError::InvalidAggregatorConfig(_))));
    }
}
