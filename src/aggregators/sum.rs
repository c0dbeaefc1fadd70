use super::{feature_names, Aggregator, SpatialContribution};

/// Plain sum of a variable over all observations of the bin.
#[derive(Debug, Clone)]
pub struct AggregatorSum {
    var_index: [usize; 1],
    names: Vec<String>,
}

impl AggregatorSum {
    pub fn new(var_name: &str, var_index: usize) -> Self {
        AggregatorSum {
            var_index: [var_index],
            names: feature_names(var_name, &["sum"]),
        }
    }
}

impl Aggregator for AggregatorSum {
    fn name(&self) -> &str {
        "SUM"
    }

    fn required_variables(&self) -> &[usize] {
        &self.var_index
    }

    fn spatial_feature_names(&self) -> &[String] {
        &self.names
    }

    fn temporal_feature_names(&self) -> &[String] {
        &self.names
    }

    fn output_feature_names(&self) -> &[String] {
        &self.names
    }

    fn init_spatial(&self, spatial: &mut [f64]) {
        spatial[0] = 0.0;
    }

    fn aggregate_spatial(&self, values: &[f64], _num_obs: u64, spatial: &mut [f64]) {
        spatial[0] += values[self.var_index[0]];
    }

    fn complete_spatial(&self, _num_obs: u64, _spatial: &mut [f64]) {}

    fn init_temporal(&self, temporal: &mut [f64]) {
        temporal[0] = 0.0;
    }

    fn aggregate_temporal(&self, spatial: SpatialContribution<'_>, temporal: &mut [f64]) {
        temporal[0] += spatial.features[0];
    }

    fn complete_temporal(&self, temporal: &[f64], _num_obs: u64, output: &mut [f64]) {
        output[0] = temporal[0];
    }
}
