//! # Binning runs
//!
//! [`Binning`] is the entry point of the crate. It holds the resolved [`BinningContext`] of a
//! configuration and exposes the three phases of a run, separately or chained:
//!
//! * [`Binning::run_spatial_pass`] – one source product → [`SpatialBinSet`],
//! * [`Binning::merge_all`] – any number of sets → [`TemporalBinMap`],
//! * [`Binning::finalize_and_process`] – completion + cell processor chain → [`OutputBinMap`],
//! * [`Binning::run`] / [`Binning::run_with_cancel`] – all of the above, writing to a [`BinSink`].
//!
//! ## Execution model
//! -----------------
//! With the `parallel` feature (default) passes are binned concurrently on the rayon pool, one
//! pass per worker, in waves of `current_num_threads()` passes. After each wave its spatial bin
//! sets are merged into the index-partitioned temporal map and dropped, which bounds memory to one
//! wave of spatial bins. Without the feature passes are binned one after the other.
//!
//! ### Cooperative cancellation
//! `run_with_cancel` calls `should_cancel()` between waves, at most once per wall-clock
//! [`POLL_INTERVAL`] (and always before the first wave). A cancelled run returns
//! [`BinningError::Cancelled`] with the number of passes already binned; nothing reaches the
//! sink.
//!
//! ### Progress UI (feature: `progress`)
//! A progress bar over the passes is drawn with `indicatif`.
//!
//! ## Error Semantics
//! -----------------
//! * Configuration errors (undeclared variable of a pass, missing pass time for a time series)
//!   are raised for **all** sources before the first observation is read.
//! * Invalid observations are counted in the [`RunSummary`], never raised.
//! * A merge consistency error aborts the run; no partially merged bin reaches the sink.
//!
//! ## Example
//! -----------------
//! ```rust
//! use l3binning::{
//!     aggregators::AggregatorConfig,
//!     binning::Binning,
//!     binning_config::BinningConfig,
//!     observations::{observation_batch::ObservationBatch, PassDescriptor},
//!     output::MemoryBinSink,
//! };
//!
//! let config = BinningConfig::builder()
//!     .num_rows(3)
//!     .aggregator(AggregatorConfig::Average { var_name: "chl".into() })
//!     .build()
//!     .unwrap();
//! let binning = Binning::new(&config).unwrap();
//!
//! let pass = |id: &str, v: f64| {
//!     ObservationBatch::new(PassDescriptor::new(id, ["chl"]), vec![89.0], vec![10.0], vec![vec![v]])
//!         .unwrap()
//! };
//! let mut sink = MemoryBinSink::new();
//! let summary = binning.run(vec![pass("a", 2.0), pass("b", 4.0)], &mut sink).unwrap();
//!
//! assert_eq!(summary.bins_written, 1);
//! assert_eq!(sink.feature(4, "chl_mean"), Some(3.0));
//! ```
use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use ahash::RandomState;
#[cfg(feature = "progress")]
use indicatif::{ProgressBar, ProgressStyle};
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::{
    binning_config::{BinningConfig, BinningContext},
    binning_errors::BinningError,
    constants::BinIndex,
    observations::ObservationSource,
    output::{output_bin::OutputBin, run_summary::BinCountStats, run_summary::RunSummary, BinSink},
    spatial_binner::{SpatialBinSet, SpatialBinner},
    temporal_binner::{self, TemporalBinMap, TemporalBinner},
};

/// Minimal wall-clock delay between two calls of the cancellation closure.
pub const POLL_INTERVAL: Duration = Duration::from_millis(20);

pub type OutputBinMap = HashMap<BinIndex, OutputBin, RandomState>;

#[derive(Debug)]
pub struct Binning {
    ctx: BinningContext,
}

impl Binning {
    /// Validate `config` and resolve it into a ready-to-run binning.
    pub fn new(config: &BinningConfig) -> Result<Self, BinningError> {
        Ok(Binning {
            ctx: config.create_context()?,
        })
    }

    pub fn from_context(ctx: BinningContext) -> Self {
        Binning { ctx }
    }

    pub fn context(&self) -> &BinningContext {
        &self.ctx
    }

    /// Names of the features handed to the sink.
    pub fn feature_names(&self) -> &[String] {
        self.ctx.bin_manager().result_feature_names()
    }

    /// Bin all observations of one source product.
    ///
    /// A pass outside the configured dates yields an empty set; its observations are not read.
    ///
    /// Return
    /// ----------
    /// * The spatial bins of the pass, or a configuration error for this pass.
    pub fn run_spatial_pass<S: ObservationSource>(
        &self,
        source: S,
    ) -> Result<SpatialBinSet, BinningError> {
        let pass = source.descriptor();
        if !self.ctx.accepts(pass) {
            log::info!("skipping pass '{}': outside the configured time window", pass.id);
            return Ok(SpatialBinSet {
                pass_id: pass.id.clone(),
                ..SpatialBinSet::default()
            });
        }
        let binner = SpatialBinner::new(&self.ctx, pass)?;
        Ok(bin_source(binner, source))
    }

    /// Merge spatial bin sets into one temporal bin per index.
    pub fn merge_all<'s>(
        &self,
        sets: impl IntoIterator<Item = &'s SpatialBinSet>,
    ) -> Result<TemporalBinMap, BinningError> {
        temporal_binner::merge_all(self.ctx.bin_manager(), sets, self.ctx.num_partitions())
    }

    /// Complete every temporal bin and run the cell processor chain on it.
    pub fn finalize_and_process(&self, bins: TemporalBinMap) -> OutputBinMap {
        let bm = self.ctx.bin_manager();

        #[cfg(feature = "parallel")]
        let iter = bins.into_par_iter();
        #[cfg(not(feature = "parallel"))]
        let iter = bins.into_iter();

        iter.map(|(index, temporal)| (index, bm.process(bm.complete_temporal_bin(&temporal))))
            .collect()
    }

    /// Run all phases over `sources` and write the processed bins to `sink`.
    ///
    /// Arguments
    /// -----------------
    /// * `sources`: one observation source per pass; passes outside the configured dates are
    ///   skipped.
    /// * `sink`: receives `begin`, one `write_bin` per populated index, then `finish`.
    ///
    /// Return
    /// ----------
    /// * The [`RunSummary`] of the run, or the first configuration / merge / sink error.
    pub fn run<S, I, K>(&self, sources: I, sink: K) -> Result<RunSummary, BinningError>
    where
        S: ObservationSource + Send,
        I: IntoIterator<Item = S>,
        K: BinSink,
    {
        self.run_with_cancel(sources, sink, || false)
    }

    /// Same as [`Binning::run`], polling `should_cancel()` between passes.
    pub fn run_with_cancel<S, I, K, F>(
        &self,
        sources: I,
        mut sink: K,
        mut should_cancel: F,
    ) -> Result<RunSummary, BinningError>
    where
        S: ObservationSource + Send,
        I: IntoIterator<Item = S>,
        K: BinSink,
        F: FnMut() -> bool,
    {
        let mut summary = RunSummary::new(self.ctx.product_name());

        // Resolve every pass before reading any observation.
        let mut pending = Vec::new();
        for source in sources {
            let pass = source.descriptor();
            if !self.ctx.accepts(pass) {
                log::info!("skipping pass '{}': outside the configured time window", pass.id);
                summary.passes_filtered += 1;
                continue;
            }
            let binner = SpatialBinner::new(&self.ctx, pass)?;
            summary.record_pass_time(pass.start_time, pass.end_time);
            pending.push((binner, source));
        }
        log::info!(
            "binning {} pass(es) ({} filtered) on a {}-row grid",
            pending.len(),
            summary.passes_filtered,
            self.ctx.grid().num_rows()
        );

        #[cfg(feature = "progress")]
        let pb = {
            let pb = ProgressBar::new(pending.len().max(1) as u64);
            if let Ok(style) = ProgressStyle::with_template(
                "{bar:40.cyan/blue} {pos}/{len} passes ({percent:>3}%) | ETA {eta_precise} | {msg}",
            ) {
                pb.set_style(style);
            }
            pb.enable_steady_tick(Duration::from_millis(200));
            pb
        };

        let mut merger = TemporalBinner::new(self.ctx.bin_manager(), self.ctx.num_partitions());
        let mut last_poll: Option<Instant> = None;

        #[cfg(feature = "parallel")]
        let wave_size = rayon::current_num_threads().max(1);
        #[cfg(not(feature = "parallel"))]
        let wave_size = 1;

        let mut pending = pending.into_iter().peekable();
        while pending.peek().is_some() {
            if last_poll.map_or(true, |t| t.elapsed() >= POLL_INTERVAL) {
                if should_cancel() {
                    #[cfg(feature = "progress")]
                    {
                        pb.set_message("Interrupted");
                        pb.disable_steady_tick();
                        pb.finish_and_clear();
                    }
                    log::warn!(
                        "binning cancelled after {} pass(es)",
                        summary.passes_processed
                    );
                    return Err(BinningError::Cancelled(summary.passes_processed));
                }
                last_poll = Some(Instant::now());
            }

            let wave: Vec<_> = pending.by_ref().take(wave_size).collect();

            #[cfg(feature = "parallel")]
            let sets: Vec<SpatialBinSet> = wave
                .into_par_iter()
                .map(|(binner, source)| bin_source(binner, source))
                .collect();
            #[cfg(not(feature = "parallel"))]
            let sets: Vec<SpatialBinSet> = wave
                .into_iter()
                .map(|(binner, source)| bin_source(binner, source))
                .collect();

            for set in &sets {
                merger.merge(set)?;
                summary.observations.add(&set.stats);
                summary.passes_processed += 1;
            }

            #[cfg(feature = "progress")]
            pb.inc(sets.len() as u64);
        }

        #[cfg(feature = "progress")]
        {
            pb.disable_steady_tick();
            pb.finish_and_clear();
        }

        log::info!(
            "merged {} pass(es) into {} bins ({} of {} observations accepted)",
            merger.num_sets(),
            merger.len(),
            summary.observations.accepted,
            summary.observations.seen
        );

        let output = self.finalize_and_process(merger.into_bins());
        summary.bin_count_stats = BinCountStats::from_counts(output.values().map(|b| b.num_obs));
        if output.is_empty() {
            log::warn!("no observation was binned, the output is empty");
        }

        sink.begin(self.feature_names())?;
        for bin in output.values() {
            sink.write_bin(bin)?;
        }
        sink.finish()?;
        summary.bins_written = output.len();

        log::info!("{summary}");
        Ok(summary)
    }
}

fn bin_source<S: ObservationSource>(mut binner: SpatialBinner<'_>, source: S) -> SpatialBinSet {
    binner.consume_all(source);
    binner.finish()
}

#[cfg(test)]
mod binning_tests {
    use super::*;
    use crate::{
        aggregators::AggregatorConfig,
        observations::{observation_batch::ObservationBatch, PassDescriptor},
        output::MemoryBinSink,
    };

    fn binning() -> Binning {
        let config = BinningConfig::builder()
            .num_rows(3)
            .aggregator(AggregatorConfig::Sum {
                var_name: "n".into(),
            })
            .build()
            .unwrap();
        Binning::new(&config).unwrap()
    }

    fn batch(id: &str, obs: &[(f64, f64, f64)]) -> ObservationBatch {
        ObservationBatch::new(
            PassDescriptor::new(id, ["n"]),
            obs.iter().map(|o| o.0).collect(),
            obs.iter().map(|o| o.1).collect(),
            vec![obs.iter().map(|o| o.2).collect()],
        )
        .unwrap()
    }

    #[test]
    fn phases_compose() {
        let b = binning();
        let s1 = b
            .run_spatial_pass(batch("a", &[(89.0, 10.0, 1.0), (0.0, 0.0, 2.0)]))
            .unwrap();
        let s2 = b.run_spatial_pass(batch("b", &[(89.0, -170.0, 3.0)])).unwrap();
        let out = b.finalize_and_process(b.merge_all([&s1, &s2]).unwrap());

        assert_eq!(out.len(), 2);
        assert_eq!(out[&4].features.as_slice(), &[4.0]);
        assert_eq!(out[&4].num_passes, 2);
        assert!(out.values().all(OutputBin::is_processed));
    }

    #[test]
    fn cancelled_run_writes_nothing() {
        let b = binning();
        let mut sink = MemoryBinSink::new();
        let err = b
            .run_with_cancel(vec![batch("a", &[(0.0, 0.0, 1.0)])], &mut sink, || true)
            .unwrap_err();
        assert_eq!(err, BinningError::Cancelled(0));
        assert!(sink.is_empty());
        assert!(!sink.is_finished());
    }

    #[test]
    fn spatial_pass_outside_the_dates_is_empty() {
        let config = BinningConfig::builder()
            .num_rows(3)
            .aggregator(AggregatorConfig::TimeSeries {
                var_name: "n".into(),
            })
            .date_range("2024-03-02", "2024-03-03")
            .build()
            .unwrap();
        let b = Binning::new(&config).unwrap();
        let at = |day, hour| hifitime::Epoch::from_gregorian_utc_hms(2024, 3, day, hour, 0, 0);
        let timed = |id: &str, day| {
            ObservationBatch::new(
                PassDescriptor::new(id, ["n"]).with_time_range(at(day, 9), at(day, 10)),
                vec![0.0],
                vec![0.0],
                vec![vec![5.0]],
            )
            .unwrap()
        };

        let early = b.run_spatial_pass(timed("early", 1)).unwrap();
        assert!(early.is_empty());
        assert_eq!(early.pass_id, "early");
        assert_eq!(early.stats.seen, 0);

        let inside = b.run_spatial_pass(timed("inside", 3)).unwrap();
        assert_eq!(inside.time_slot, Some(1));
        let out = b.finalize_and_process(b.merge_all([&early, &inside]).unwrap());
        assert_eq!(out[&2].num_obs, 1);
        assert_eq!(out[&2].num_passes, 1);
        assert_eq!(out[&2].features.get(1), Some(5.0));
    }
}
