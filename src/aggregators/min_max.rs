use super::{feature_names, Aggregator, SpatialContribution};

/// Extrema of a variable, `[<var>_min, <var>_max]` in every layout.
#[derive(Debug, Clone)]
pub struct AggregatorMinMax {
    var_index: [usize; 1],
    names: Vec<String>,
}

impl AggregatorMinMax {
    pub fn new(var_name: &str, var_index: usize) -> Self {
        AggregatorMinMax {
            var_index: [var_index],
            names: feature_names(var_name, &["min", "max"]),
        }
    }
}

#[inline]
fn reset(state: &mut [f64]) {
    state[0] = f64::INFINITY;
    state[1] = f64::NEG_INFINITY;
}

impl Aggregator for AggregatorMinMax {
    fn name(&self) -> &str {
        "MIN_MAX"
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
        reset(spatial);
    }

    fn aggregate_spatial(&self, values: &[f64], _num_obs: u64, spatial: &mut [f64]) {
        let x = values[self.var_index[0]];
        spatial[0] = spatial[0].min(x);
        spatial[1] = spatial[1].max(x);
    }

    fn complete_spatial(&self, _num_obs: u64, _spatial: &mut [f64]) {}

    fn init_temporal(&self, temporal: &mut [f64]) {
        reset(temporal);
    }

    fn aggregate_temporal(&self, spatial: SpatialContribution<'_>, temporal: &mut [f64]) {
        temporal[0] = temporal[0].min(spatial.features[0]);
        temporal[1] = temporal[1].max(spatial.features[1]);
    }

    fn complete_temporal(&self, temporal: &[f64], num_obs: u64, output: &mut [f64]) {
        if num_obs == 0 {
            output.fill(f64::NAN);
        } else {
            output.copy_from_slice(&temporal[..2]);
        }
    }
}

#[cfg(test)]
mod min_max_tests {
    use super::*;

    #[test]
    fn keeps_extrema_across_passes() {
        let agg = AggregatorMinMax::new("sst", 0);
        let mut t = [0.0; 2];
        agg.init_temporal(&mut t);

        for pass in [[3.0, -1.5, 7.0], [2.0, 9.25, 0.0]] {
            let mut s = [0.0; 2];
            agg.init_spatial(&mut s);
            for (i, x) in pass.iter().enumerate() {
                agg.aggregate_spatial(&[*x], i as u64 + 1, &mut s);
            }
            agg.aggregate_temporal(
                SpatialContribution {
                    features: &s,
                    num_obs: 3,
                    time_slot: None,
                },
                &mut t,
            );
        }

        let mut out = [0.0; 2];
        agg.complete_temporal(&t, 6, &mut out);
        assert_eq!(out, [-1.5, 9.25]);
    }
}
