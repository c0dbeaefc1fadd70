#![allow(dead_code)]

use approx::assert_relative_eq;
use hifitime::Epoch;
use l3binning::{
    aggregators::AggregatorConfig,
    binning_config::BinningConfig,
    observations::{observation_batch::ObservationBatch, PassDescriptor},
};

/// One row per observation: `(lat, lon, values…)` in the order of `vars`.
pub fn batch(id: &str, vars: &[&str], rows: &[(f64, f64, &[f64])]) -> ObservationBatch {
    batch_with_descriptor(PassDescriptor::new(id, vars.iter().copied()), rows)
}

pub fn batch_with_descriptor(
    descriptor: PassDescriptor,
    rows: &[(f64, f64, &[f64])],
) -> ObservationBatch {
    let width = descriptor.variables.len();
    let columns = (0..width)
        .map(|k| rows.iter().map(|r| r.2[k]).collect())
        .collect();
    ObservationBatch::new(
        descriptor,
        rows.iter().map(|r| r.0).collect(),
        rows.iter().map(|r| r.1).collect(),
        columns,
    )
    .unwrap()
}

/// Pass descriptor acquired on `2024-03-<day>` between `h0` and `h1` hours UTC.
pub fn timed_pass(id: &str, vars: &[&str], day: u8, h0: u8, h1: u8) -> PassDescriptor {
    PassDescriptor::new(id, vars.iter().copied()).with_time_range(
        Epoch::from_gregorian_utc_hms(2024, 3, day, h0, 0, 0),
        Epoch::from_gregorian_utc_hms(2024, 3, day, h1, 0, 0),
    )
}

pub fn avg(var: &str) -> AggregatorConfig {
    AggregatorConfig::Average {
        var_name: var.into(),
    }
}

pub fn config(num_rows: usize, aggregators: Vec<AggregatorConfig>) -> BinningConfig {
    aggregators
        .into_iter()
        .fold(BinningConfig::builder().num_rows(num_rows), |b, a| b.aggregator(a))
        .build()
        .unwrap()
}

pub fn assert_features_close(actual: &[f64], expected: &[f64], epsilon: f64) {
    assert_eq!(actual.len(), expected.len(), "{actual:?} vs {expected:?}");
    for (a, e) in actual.iter().zip(expected) {
        if e.is_nan() {
            assert!(a.is_nan(), "{actual:?} vs {expected:?}");
        } else {
            assert_relative_eq!(*a, *e, epsilon = epsilon, max_relative = 1e-12);
        }
    }
}
