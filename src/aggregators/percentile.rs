//! # Percentiles from a fixed-bucket histogram
//!
//! Raw samples are never kept. Each bin carries `num_buckets` counters over `[min, max]`, so the
//! state is bounded and two histograms merge by bucket-wise addition in any order.
//!
//! Bucket `k` covers `[min + k·w, min + (k+1)·w)` with `w = (max - min) / num_buckets`; values
//! below `min` (above `max`) are counted in the first (last) bucket.
//!
//! A percentile `P` of `N` merged samples is read as the position where the cumulative count
//! reaches `P·N/100`, interpolated linearly inside the bucket that crosses it. The result is
//! therefore exact to within one bucket width; matching a given legacy output requires matching
//! its bucket boundaries.
use super::{feature_names, Aggregator, SpatialContribution};
use crate::binning_errors::BinningError;

#[derive(Debug, Clone)]
pub struct AggregatorPercentile {
    var_index: [usize; 1],
    percentiles: Vec<u32>,
    min: f64,
    width: f64,
    bucket_names: Vec<String>,
    output_names: Vec<String>,
}

impl AggregatorPercentile {
    /// Build a histogram aggregator.
    ///
    /// Arguments
    /// -----------------
    /// * `var_name`, `var_index`: the variable and its position in the variable context.
    /// * `percentiles`: requested levels in `0..=100`, reported in the given order.
    /// * `num_buckets`: histogram resolution, at least 1.
    /// * `min`, `max`: finite histogram range with `min < max`.
    ///
    /// Return
    /// ----------
    /// * The aggregator, or [`BinningError::InvalidAggregatorConfig`].
    pub fn new(
        var_name: &str,
        var_index: usize,
        percentiles: &[u32],
        num_buckets: usize,
        min: f64,
        max: f64,
    ) -> Result<Self, BinningError> {
        if percentiles.is_empty() {
            return Err(BinningError::InvalidAggregatorConfig(format!(
                "PERCENTILE({var_name}): no percentile requested"
            )));
        }
        if let Some(p) = percentiles.iter().find(|&&p| p > 100) {
            return Err(BinningError::InvalidAggregatorConfig(format!(
                "PERCENTILE({var_name}): percentile {p} is above 100"
            )));
        }
        if num_buckets == 0 {
            return Err(BinningError::InvalidAggregatorConfig(format!(
                "PERCENTILE({var_name}): num_buckets must be at least 1"
            )));
        }
        if !(min.is_finite() && max.is_finite() && min < max) {
            return Err(BinningError::InvalidAggregatorConfig(format!(
                "PERCENTILE({var_name}): invalid histogram range [{min}, {max}]"
            )));
        }

        let bucket_names = (0..num_buckets)
            .map(|k| format!("{var_name}_h{k}"))
            .collect();
        let suffixes: Vec<String> = percentiles.iter().map(|p| format!("p{p}")).collect();
        let suffixes: Vec<&str> = suffixes.iter().map(String::as_str).collect();

        Ok(AggregatorPercentile {
            var_index: [var_index],
            percentiles: percentiles.to_vec(),
            min,
            width: (max - min) / num_buckets as f64,
            bucket_names,
            output_names: feature_names(var_name, &suffixes),
        })
    }

    fn num_buckets(&self) -> usize {
        self.bucket_names.len()
    }

    fn bucket_of(&self, x: f64) -> usize {
        let k = ((x - self.min) / self.width).floor();
        if k <= 0.0 {
            0
        } else {
            (k as usize).min(self.num_buckets() - 1)
        }
    }

    /// Interpolated value at level `p` of a histogram holding `total` samples.
    fn percentile(&self, counts: &[f64], total: f64, p: u32) -> f64 {
        if total <= 0.0 {
            return f64::NAN;
        }
        let target = (p as f64 * total) / 100.0;
        let mut cumulative = 0.0;
        for (k, &count) in counts.iter().enumerate() {
            if count > 0.0 && cumulative + count >= target {
                let frac = ((target - cumulative) / count).clamp(0.0, 1.0);
                return self.min + (k as f64 + frac) * self.width;
            }
            cumulative += count;
        }
        self.min + self.num_buckets() as f64 * self.width
    }
}

impl Aggregator for AggregatorPercentile {
    fn name(&self) -> &str {
        "PERCENTILE"
    }

    fn required_variables(&self) -> &[usize] {
        &self.var_index
    }

    fn spatial_feature_names(&self) -> &[String] {
        &self.bucket_names
    }

    fn temporal_feature_names(&self) -> &[String] {
        &self.bucket_names
    }

    fn output_feature_names(&self) -> &[String] {
        &self.output_names
    }

    fn init_spatial(&self, spatial: &mut [f64]) {
        spatial.fill(0.0);
    }

    fn aggregate_spatial(&self, values: &[f64], _num_obs: u64, spatial: &mut [f64]) {
        spatial[self.bucket_of(values[self.var_index[0]])] += 1.0;
    }

    fn complete_spatial(&self, _num_obs: u64, _spatial: &mut [f64]) {}

    fn init_temporal(&self, temporal: &mut [f64]) {
        temporal.fill(0.0);
    }

    fn aggregate_temporal(&self, spatial: SpatialContribution<'_>, temporal: &mut [f64]) {
        temporal
            .iter_mut()
            .zip(spatial.features)
            .for_each(|(t, s)| *t += s);
    }

    fn complete_temporal(&self, temporal: &[f64], _num_obs: u64, output: &mut [f64]) {
        let total: f64 = temporal.iter().sum();
        for (out, &p) in output.iter_mut().zip(&self.percentiles) {
            *out = self.percentile(temporal, total, p);
        }
    }
}
