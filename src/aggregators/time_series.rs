//! Per-slot time series of pass means.
//!
//! Every pass contributes the mean of its observations in a bin to the time slot its start time
//! falls into. Slots are averaged over passes, so the output `<var>_t<i>` is the mean of the pass
//! means of slot `i` (NaN when no pass landed there).
use super::{Aggregator, SpatialContribution};
use crate::binning_errors::BinningError;

#[derive(Debug, Clone)]
pub struct AggregatorTimeSeries {
    var_index: [usize; 1],
    spatial_names: Vec<String>,
    temporal_names: Vec<String>,
    output_names: Vec<String>,
}

impl AggregatorTimeSeries {
    pub fn new(var_name: &str, var_index: usize, num_slots: usize) -> Result<Self, BinningError> {
        if num_slots == 0 {
            return Err(BinningError::InvalidAggregatorConfig(format!(
                "TIME_SERIES({var_name}): the time window holds no slot"
            )));
        }
        let temporal_names = (0..num_slots)
            .flat_map(|i| [format!("{var_name}_t{i}_sum"), format!("{var_name}_t{i}_count")])
            .collect();
        let output_names = (0..num_slots).map(|i| format!("{var_name}_t{i}")).collect();

        Ok(AggregatorTimeSeries {
            var_index: [var_index],
            spatial_names: vec![format!("{var_name}_sum")],
            temporal_names,
            output_names,
        })
    }

    pub fn num_slots(&self) -> usize {
        self.output_names.len()
    }
}

impl Aggregator for AggregatorTimeSeries {
    fn name(&self) -> &str {
        "TIME_SERIES"
    }

    fn required_variables(&self) -> &[usize] {
        &self.var_index
    }

    fn spatial_feature_names(&self) -> &[String] {
        &self.spatial_names
    }

    fn temporal_feature_names(&self) -> &[String] {
        &self.temporal_names
    }

    fn output_feature_names(&self) -> &[String] {
        &self.output_names
    }

    fn init_spatial(&self, spatial: &mut [f64]) {
        spatial[0] = 0.0;
    }

    fn aggregate_spatial(&self, values: &[f64], _num_obs: u64, spatial: &mut [f64]) {
        spatial[0] += values[self.var_index[0]];
    }

    fn complete_spatial(&self, num_obs: u64, spatial: &mut [f64]) {
        if num_obs > 0 {
            spatial[0] /= num_obs as f64;
        }
    }

    fn init_temporal(&self, temporal: &mut [f64]) {
        temporal.fill(0.0);
    }

    fn aggregate_temporal(&self, spatial: SpatialContribution<'_>, temporal: &mut [f64]) {
        // Passes outside the window never reach the merge; the slot check guards misuse only.
        if let Some(slot) = spatial.time_slot.filter(|&s| s < self.num_slots()) {
            if spatial.num_obs > 0 {
                temporal[2 * slot] += spatial.features[0];
                temporal[2 * slot + 1] += 1.0;
            }
        }
    }

    fn complete_temporal(&self, temporal: &[f64], _num_obs: u64, output: &mut [f64]) {
        for (out, slot) in output.iter_mut().zip(temporal.chunks_exact(2)) {
            *out = if slot[1] > 0.0 {
                slot[0] / slot[1]
            } else {
                f64::NAN
            };
        }
    }
}

#[cfg(test)]
mod time_series_tests {
    use super::*;

    #[test]
    fn pass_means_land_in_their_slot() {
        let agg = AggregatorTimeSeries::new("chl", 0, 3).unwrap();
        let mut t = vec![0.0; 6];
        agg.init_temporal(&mut t);

        for (slot, xs) in [(0, vec![1.0, 3.0]), (2, vec![5.0]), (2, vec![7.0])] {
            let mut s = [0.0];
            agg.init_spatial(&mut s);
            for (i, x) in xs.iter().enumerate() {
                agg.aggregate_spatial(&[*x], i as u64 + 1, &mut s);
            }
            agg.complete_spatial(xs.len() as u64, &mut s);
            agg.aggregate_temporal(
                SpatialContribution {
                    features: &s,
                    num_obs: xs.len() as u64,
                    time_slot: Some(slot),
                },
                &mut t,
            );
        }

        let mut out = [0.0; 3];
        agg.complete_temporal(&t, 4, &mut out);
        assert_eq!(out[0], 2.0);
        assert!(out[1].is_nan());
        assert_eq!(out[2], 6.0);
        assert_eq!(agg.temporal_feature_names()[3], "chl_t1_count");
    }

    #[test]
    fn empty_window_is_rejected() {
        assert!(AggregatorTimeSeries::new("chl", 0, 0).is_err());
    }
}
