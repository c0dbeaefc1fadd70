//! Mean / standard deviation aggregators built on Welford's running moments.
//!
//! Spatial state is `[mean, m2]` where `m2 = Σ (x - mean)²`. It is updated in place for each
//! observation, so the spatial mean is final as soon as the pass ends: `complete_spatial` does
//! nothing and no division happens at merge time.
//!
//! Temporal state is `[mean, m2, weight]`; a spatial bin `(mean_b, m2_b, n_b)` is merged with
//!
//! ```text
//! n     = n_a + n_b
//! delta = mean_b - mean_a
//! mean  = mean_a + delta · n_b / n
//! m2    = m2_a + m2_b + delta² · n_a · n_b / n
//! ```
//!
//! which is symmetric in `a`/`b` and therefore independent of the merge order.
use super::{feature_names, Aggregator, SpatialContribution};

#[inline]
fn welford_update(x: f64, num_obs: u64, state: &mut [f64]) {
    let delta = x - state[0];
    state[0] += delta / num_obs as f64;
    state[1] += delta * (x - state[0]);
}

#[inline]
fn chan_merge(mean_b: f64, m2_b: f64, n_b: f64, state: &mut [f64]) {
    if n_b <= 0.0 {
        return;
    }
    let n_a = state[2];
    let n = n_a + n_b;
    let delta = mean_b - state[0];
    state[0] += delta * n_b / n;
    state[1] += m2_b + delta * delta * n_a * n_b / n;
    state[2] = n;
}

/// Population standard deviation from merged state, NaN for an empty state.
#[inline]
fn sigma(state: &[f64]) -> f64 {
    if state[2] > 0.0 {
        (state[1] / state[2]).max(0.0).sqrt()
    } else {
        f64::NAN
    }
}

#[derive(Debug, Clone)]
struct Moments {
    var_index: [usize; 1],
    spatial_names: Vec<String>,
    temporal_names: Vec<String>,
}

impl Moments {
    fn new(var_name: &str, var_index: usize) -> Self {
        Moments {
            var_index: [var_index],
            spatial_names: feature_names(var_name, &["mean", "m2"]),
            temporal_names: feature_names(var_name, &["mean", "m2", "weights"]),
        }
    }

    fn aggregate_spatial(&self, values: &[f64], num_obs: u64, spatial: &mut [f64]) {
        welford_update(values[self.var_index[0]], num_obs, spatial);
    }

    fn aggregate_temporal(&self, spatial: SpatialContribution<'_>, temporal: &mut [f64]) {
        chan_merge(
            spatial.features[0],
            spatial.features[1],
            spatial.num_obs as f64,
            temporal,
        );
    }
}

/// Arithmetic mean and population standard deviation of a variable.
///
/// Output features: `<var>_mean`, `<var>_sigma`. An empty bin yields NaN for both.
#[derive(Debug, Clone)]
pub struct AggregatorAverage {
    moments: Moments,
    output_names: Vec<String>,
}

impl AggregatorAverage {
    pub fn new(var_name: &str, var_index: usize) -> Self {
        AggregatorAverage {
            moments: Moments::new(var_name, var_index),
            output_names: feature_names(var_name, &["mean", "sigma"]),
        }
    }
}

impl Aggregator for AggregatorAverage {
    fn name(&self) -> &str {
        "AVG"
    }

    fn required_variables(&self) -> &[usize] {
        &self.moments.var_index
    }

    fn spatial_feature_names(&self) -> &[String] {
        &self.moments.spatial_names
    }

    fn temporal_feature_names(&self) -> &[String] {
        &self.moments.temporal_names
    }

    fn output_feature_names(&self) -> &[String] {
        &self.output_names
    }

    fn init_spatial(&self, spatial: &mut [f64]) {
        spatial.fill(0.0);
    }

    fn aggregate_spatial(&self, values: &[f64], num_obs: u64, spatial: &mut [f64]) {
        self.moments.aggregate_spatial(values, num_obs, spatial);
    }

    fn complete_spatial(&self, _num_obs: u64, _spatial: &mut [f64]) {}

    fn init_temporal(&self, temporal: &mut [f64]) {
        temporal.fill(0.0);
    }

    fn aggregate_temporal(&self, spatial: SpatialContribution<'_>, temporal: &mut [f64]) {
        self.moments.aggregate_temporal(spatial, temporal);
    }

    fn complete_temporal(&self, temporal: &[f64], _num_obs: u64, output: &mut [f64]) {
        if temporal[2] > 0.0 {
            output[0] = temporal[0];
            output[1] = sigma(temporal);
        } else {
            output.fill(f64::NAN);
        }
    }
}

/// Population standard deviation of a variable (`<var>_stdev`).
#[derive(Debug, Clone)]
pub struct AggregatorStdDev {
    moments: Moments,
    output_names: Vec<String>,
}

impl AggregatorStdDev {
    pub fn new(var_name: &str, var_index: usize) -> Self {
        AggregatorStdDev {
            moments: Moments::new(var_name, var_index),
            output_names: feature_names(var_name, &["stdev"]),
        }
    }
}

impl Aggregator for AggregatorStdDev {
    fn name(&self) -> &str {
        "STDEV"
    }

    fn required_variables(&self) -> &[usize] {
        &self.moments.var_index
    }

    fn spatial_feature_names(&self) -> &[String] {
        &self.moments.spatial_names
    }

    fn temporal_feature_names(&self) -> &[String] {
        &self.moments.temporal_names
    }

    fn output_feature_names(&self) -> &[String] {
        &self.output_names
    }

    fn init_spatial(&self, spatial: &mut [f64]) {
        spatial.fill(0.0);
    }

    fn aggregate_spatial(&self, values: &[f64], num_obs: u64, spatial: &mut [f64]) {
        self.moments.aggregate_spatial(values, num_obs, spatial);
    }

    fn complete_spatial(&self, _num_obs: u64, _spatial: &mut [f64]) {}

    fn init_temporal(&self, temporal: &mut [f64]) {
        temporal.fill(0.0);
    }

    fn aggregate_temporal(&self, spatial: SpatialContribution<'_>, temporal: &mut [f64]) {
        self.moments.aggregate_temporal(spatial, temporal);
    }

    fn complete_temporal(&self, temporal: &[f64], _num_obs: u64, output: &mut [f64]) {
        output[0] = sigma(temporal);
    }
}
