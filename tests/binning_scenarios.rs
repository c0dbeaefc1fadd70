mod common;

use approx::assert_relative_eq;
use common::{avg, batch, batch_with_descriptor, config, timed_pass};
use l3binning::{
    aggregators::AggregatorConfig,
    binning_config::BinningConfig,
    cell_processor::{gap_filler::GapFilling, CellProcessorConfig},
    observations::{LazySource, Observation, PassDescriptor},
    output::{csv_sink::CsvBinSink, MemoryBinSink},
    Binning, BinningError,
};

#[test]
fn pole_observations_share_the_single_pole_bin() {
    let binning = Binning::new(&config(3, vec![avg("chl")])).unwrap();
    let mut sink = MemoryBinSink::new();
    let summary = binning
        .run(
            vec![batch(
                "p",
                &["chl"],
                &[(89.0, 10.0, &[1.0]), (89.0, -170.0, &[3.0])],
            )],
            &mut sink,
        )
        .unwrap();

    assert_eq!(summary.bins_written, 1);
    assert_eq!(binning.context().grid().num_cols(2), Some(1));
    assert_eq!(sink.feature(4, "chl_mean"), Some(2.0));
}

#[test]
fn two_passes_average_to_three() {
    let binning = Binning::new(&config(3, vec![avg("chl")])).unwrap();
    let a = binning
        .run_spatial_pass(batch("a", &["chl"], &[(0.0, 0.0, &[2.0])]))
        .unwrap();
    let b = binning
        .run_spatial_pass(batch("b", &["chl"], &[(0.0, 0.0, &[4.0])]))
        .unwrap();

    let temporal = binning.merge_all([&a, &b]).unwrap();
    let output = binning.finalize_and_process(temporal);
    assert_eq!(output.len(), 1);

    let bin = output.values().next().unwrap();
    assert_eq!(bin.num_obs, 2);
    assert_eq!(bin.features.as_slice()[0], 3.0);
}

#[test]
fn single_observation_average_is_exact() {
    let binning = Binning::new(&config(180, vec![avg("chl")])).unwrap();
    let value = 0.1 + 0.2;
    let mut sink = MemoryBinSink::new();
    binning
        .run(vec![batch("a", &["chl"], &[(43.6, 1.44, &[value])])], &mut sink)
        .unwrap();

    let index = binning.context().grid().bin_index(43.6, 1.44).unwrap();
    assert_eq!(sink.feature(index, "chl_mean"), Some(value));
    assert_eq!(sink.feature(index, "chl_sigma"), Some(0.0));
}

#[test]
fn nan_measurement_is_dropped_silently() {
    let binning = Binning::new(&config(3, vec![avg("chl")])).unwrap();
    let mut sink = MemoryBinSink::new();
    let summary = binning
        .run(
            vec![batch(
                "a",
                &["chl"],
                &[(0.0, 0.0, &[1.0]), (0.0, 0.0, &[f64::NAN]), (95.0, 0.0, &[1.0])],
            )],
            &mut sink,
        )
        .unwrap();

    assert_eq!(summary.observations.seen, 3);
    assert_eq!(summary.observations.accepted, 1);
    assert_eq!(summary.observations.dropped, 2);
    assert_eq!(summary.bin_count_stats.map(|s| s.max), Some(1));
    assert_eq!(sink.len(), 1);
}

#[test]
fn percentile_of_two_merged_passes_is_within_one_bucket() {
    let config = config(
        3,
        vec![AggregatorConfig::PercentileHistogram {
            var_name: "v".into(),
            percentiles: vec![90],
            num_buckets: 100,
            min: 0.0,
            max: 100.0,
        }],
    );
    let binning = Binning::new(&config).unwrap();

    let rows: Vec<(f64, f64, Vec<f64>)> = (1..=100).map(|v| (0.0, 0.0, vec![v as f64])).collect();
    fn as_rows(r: &[(f64, f64, Vec<f64>)]) -> Vec<(f64, f64, &[f64])> {
        r.iter()
            .map(|(lat, lon, v)| (*lat, *lon, v.as_slice()))
            .collect::<Vec<_>>()
    }
    let first = as_rows(&rows[..50]);
    let second = as_rows(&rows[50..]);

    let mut sink = MemoryBinSink::new();
    binning
        .run(
            vec![batch("a", &["v"], &first), batch("b", &["v"], &second)],
            &mut sink,
        )
        .unwrap();

    let index = binning.context().grid().bin_index(0.0, 0.0).unwrap();
    let p90 = sink.feature(index, "v_p90").unwrap();
    assert!((p90 - 90.0).abs() <= 1.0 + 1e-9, "p90 = {p90}");
}

#[test]
fn pass_through_processing_is_idempotent() {
    let binning = Binning::new(&config(18, vec![avg("chl")])).unwrap();
    let set = binning
        .run_spatial_pass(batch("a", &["chl"], &[(12.0, 5.0, &[0.7]), (12.0, 5.0, &[0.9])]))
        .unwrap();
    let output = binning.finalize_and_process(binning.merge_all([&set]).unwrap());

    let bm = binning.context().bin_manager();
    assert!(!bm.has_post_processor());
    for bin in output.values() {
        let again = bm.process(bin.clone());
        assert_eq!(&again, bin);
    }
}

#[test]
fn passes_outside_the_dates_are_skipped() {
    let config = BinningConfig::builder()
        .num_rows(3)
        .aggregator(avg("chl"))
        .date_range("2024-03-02", "2024-03-03")
        .build()
        .unwrap();
    let binning = Binning::new(&config).unwrap();

    let sources = vec![
        batch_with_descriptor(timed_pass("early", &["chl"], 1, 10, 11), &[(0.0, 0.0, &[10.0])]),
        batch_with_descriptor(timed_pass("in", &["chl"], 3, 10, 11), &[(0.0, 0.0, &[1.0])]),
        batch_with_descriptor(timed_pass("late", &["chl"], 4, 10, 11), &[(0.0, 0.0, &[10.0])]),
        batch_with_descriptor(PassDescriptor::new("untimed", ["chl"]), &[(0.0, 0.0, &[3.0])]),
    ];
    let mut sink = MemoryBinSink::new();
    let summary = binning.run(sources, &mut sink).unwrap();

    assert_eq!(summary.passes_filtered, 2);
    assert_eq!(summary.passes_processed, 2);
    assert_eq!(sink.feature(2, "chl_mean"), Some(2.0));
    assert!(summary.metadata.contains_key("start_time"));
}

#[test]
fn configuration_errors_surface_before_any_observation() {
    let binning = Binning::new(&config(3, vec![avg("chl")])).unwrap();
    fn untouchable() -> Option<Observation> {
        panic!("observations must not be read before all passes are resolved")
    }
    let first = LazySource::new(
        PassDescriptor::new("first", ["chl"]),
        std::iter::from_fn(untouchable as fn() -> Option<Observation>),
    );
    let second = LazySource::new(
        PassDescriptor::new("second", ["sst"]),
        std::iter::from_fn(untouchable as fn() -> Option<Observation>),
    );

    let err = binning
        .run(vec![first, second], MemoryBinSink::new())
        .unwrap_err();
    assert_eq!(
        err,
        BinningError::UndeclaredVariable {
            variable: "chl".into(),
            pass: "pass 'second'".into(),
        }
    );
}

#[test]
fn time_series_requires_pass_times() {
    let config = BinningConfig::builder()
        .num_rows(3)
        .aggregator(AggregatorConfig::TimeSeries {
            var_name: "chl".into(),
        })
        .date_range("2024-03-01", "2024-03-03")
        .build()
        .unwrap();
    let binning = Binning::new(&config).unwrap();
    let err = binning
        .run(
            vec![batch("untimed", &["chl"], &[(0.0, 0.0, &[1.0])])],
            MemoryBinSink::new(),
        )
        .unwrap_err();
    assert_eq!(err, BinningError::MissingPassTime("untimed".into()));
}

#[test]
fn interpolated_percentile_over_daily_series() {
    let config = BinningConfig::builder()
        .num_rows(3)
        .aggregator(AggregatorConfig::TimeSeries {
            var_name: "chl".into(),
        })
        .date_range("2024-03-01", "2024-03-05")
        .cell_processor(CellProcessorConfig::InterpolatedPercentile {
            var_name: "chl".into(),
            percentiles: vec![0, 90],
            gap_filling: GapFilling::Linear,
            start_fallback: 0.0,
            end_fallback: 0.0,
        })
        .build()
        .unwrap();
    let binning = Binning::new(&config).unwrap();
    assert_eq!(
        binning.feature_names(),
        &["chl_p0_threshold", "chl_p90_threshold"]
    );

    // days 1, 3 and 4 observed; day 2 interpolated, day 5 falls back to 0
    let sources = vec![
        batch_with_descriptor(timed_pass("d1", &["chl"], 1, 9, 10), &[(0.0, 0.0, &[2.0]), (0.0, 0.0, &[4.0])]),
        batch_with_descriptor(timed_pass("d3", &["chl"], 3, 9, 10), &[(0.0, 0.0, &[5.0])]),
        batch_with_descriptor(timed_pass("d4", &["chl"], 4, 9, 10), &[(0.0, 0.0, &[8.0])]),
    ];
    let mut sink = MemoryBinSink::new();
    binning.run(sources, &mut sink).unwrap();

    // series 3, 4, 5, 8, 0 -> sorted 0, 3, 4, 5, 8
    assert_eq!(sink.feature(2, "chl_p0_threshold"), Some(0.0));
    assert_eq!(sink.feature(2, "chl_p90_threshold"), Some(8.0));
}

#[test]
fn csv_output_is_sorted_and_labelled() {
    let config = config(
        3,
        vec![
            avg("chl"),
            AggregatorConfig::MinMax {
                var_name: "chl".into(),
            },
        ],
    );
    let binning = Binning::new(&config).unwrap();
    let mut sink = CsvBinSink::new(Vec::new(), binning.context().grid());
    binning
        .run(
            vec![batch(
                "a",
                &["chl"],
                &[(80.0, 0.0, &[1.0]), (-80.0, 0.0, &[2.0]), (0.0, 100.0, &[3.0])],
            )],
            &mut sink,
        )
        .unwrap();

    let csv = String::from_utf8(sink.into_inner().unwrap()).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(
        lines[0],
        "bin_index,lat,lon,num_obs,num_passes,chl_mean,chl_sigma,chl_min,chl_max"
    );
    let indices: Vec<&str> = lines[1..]
        .iter()
        .filter_map(|l| l.split(',').next())
        .collect();
    assert_eq!(indices, vec!["0", "3", "4"]);
}

#[test]
fn json_configuration_drives_a_run() {
    let config = BinningConfig::from_json_str(
        r#"{
            "num_rows": 3,
            "variables": ["chl", "valid"],
            "mask_variable": "valid",
            "aggregators": [{"type": "STDEV", "var_name": "chl"}]
        }"#,
    )
    .unwrap();
    let binning = Binning::new(&config).unwrap();
    let mut sink = MemoryBinSink::new();
    let summary = binning
        .run(
            vec![batch(
                "a",
                &["valid", "chl"],
                &[
                    (0.0, 0.0, &[1.0, 1.0]),
                    (0.0, 0.0, &[1.0, 3.0]),
                    (0.0, 0.0, &[0.0, 100.0]),
                ],
            )],
            &mut sink,
        )
        .unwrap();

    assert_eq!(summary.observations.masked, 1);
    assert_relative_eq!(sink.feature(2, "chl_stdev").unwrap(), 1.0, epsilon = 1e-12);
}

#[test]
fn nan_gap_fill_fallback_is_refused_at_setup() {
    let config = BinningConfig::builder()
        .num_rows(3)
        .aggregator(AggregatorConfig::TimeSeries {
            var_name: "chl".into(),
        })
        .date_range("2024-03-01", "2024-03-04")
        .cell_processor(CellProcessorConfig::InterpolatedPercentile {
            var_name: "chl".into(),
            percentiles: vec![90],
            gap_filling: GapFilling::Linear,
            start_fallback: f64::NAN,
            end_fallback: f64::NAN,
        })
        .build()
        .unwrap();
    assert!(matches!(
        Binning::new(&config),
        Err(BinningError::InvalidCellProcessorConfig(_))
    ));
}

#[test]
fn spline_gap_filling_from_json() {
    let config = BinningConfig::from_json_str(
        r#"{
            "num_rows": 3,
            "start_date": "2024-03-01",
            "end_date": "2024-03-05",
            "aggregators": [{"type": "TIME_SERIES", "var_name": "chl"}],
            "cell_processors": [{
                "type": "INTERPOLATED_PERCENTILE",
                "var_name": "chl",
                "percentiles": [100],
                "gap_filling": "SPLINE",
                "start_fallback": 0.0,
                "end_fallback": 0.0
            }]
        }"#,
    )
    .unwrap();
    let binning = Binning::new(&config).unwrap();

    // knots (0, 0), (2, 1), (4, 0): the filled slots stay below the observed maximum
    let sources = vec![batch_with_descriptor(
        timed_pass("d3", &["chl"], 3, 9, 10),
        &[(0.0, 0.0, &[1.0])],
    )];
    let mut sink = MemoryBinSink::new();
    binning.run(sources, &mut sink).unwrap();
    assert_eq!(sink.feature(2, "chl_p100_threshold"), Some(1.0));
}
