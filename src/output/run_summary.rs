//! # Run summary
//!
//! Counters and metadata gathered while a binning run executes, returned by
//! [`Binning::run`](crate::binning::Binning::run).
//!
//! Metadata
//! -----------------
//! Every summary carries the properties a writer is expected to attach to the product:
//! `product_name`, `processing_time` (UTC, ISO 8601), `software_name`, `software_version`, plus
//! `start_time`/`end_time` when at least one accepted pass had time information.
//!
//! Display
//! -----------------
//! Both types print compactly with `{}` and as an aligned multi-line block with `{:#}`.
use std::{collections::BTreeMap, fmt};

use hifitime::Epoch;
use itertools::Itertools;

use crate::{
    constants::{SOFTWARE_NAME, SOFTWARE_VERSION},
    spatial_binner::PassStats,
};

/// Distribution of the observation count per populated bin.
///
/// Percentiles use the nearest-rank rule `index = round(q · (N - 1))` on the sorted counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinCountStats {
    pub min: u64,
    pub p25: u64,
    pub median: u64,
    pub p95: u64,
    pub max: u64,
}

impl BinCountStats {
    /// Return
    /// ----------
    /// * `None` for an empty input.
    pub fn from_counts(counts: impl IntoIterator<Item = u64>) -> Option<Self> {
        let counts: Vec<u64> = counts.into_iter().sorted_unstable().collect();
        let n = counts.len();
        if n == 0 {
            return None;
        }

        let q_index = |q: f64| ((q * (n as f64 - 1.0)).round() as usize).min(n - 1);
        Some(BinCountStats {
            min: counts[0],
            p25: counts[q_index(0.25)],
            median: counts[q_index(0.50)],
            p95: counts[q_index(0.95)],
            max: counts[n - 1],
        })
    }
}

impl fmt::Display for BinCountStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            writeln!(f, "Observation count per bin")?;
            writeln!(f, "-------------------------")?;
            writeln!(f, "min    : {}", self.min)?;
            writeln!(f, "p25    : {}", self.p25)?;
            writeln!(f, "median : {}", self.median)?;
            writeln!(f, "p95    : {}", self.p95)?;
            write!(f, "max    : {}", self.max)
        } else {
            write!(
                f,
                "min={}, p25={}, median={}, p95={}, max={}",
                self.min, self.p25, self.median, self.p95, self.max
            )
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub passes_processed: usize,
    pub passes_filtered: usize,
    pub observations: PassStats,
    pub bins_written: usize,
    /// Earliest start and latest end of the accepted passes that carried times.
    pub time_range: Option<(Epoch, Epoch)>,
    pub bin_count_stats: Option<BinCountStats>,
    pub metadata: BTreeMap<String, String>,
}

impl RunSummary {
    pub fn new(product_name: &str) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert("product_name".to_string(), product_name.to_string());
        metadata.insert("software_name".to_string(), SOFTWARE_NAME.to_string());
        metadata.insert("software_version".to_string(), SOFTWARE_VERSION.to_string());
        if let Ok(now) = Epoch::now() {
            metadata.insert("processing_time".to_string(), now.to_isoformat());
        }
        RunSummary {
            passes_processed: 0,
            passes_filtered: 0,
            observations: PassStats::default(),
            bins_written: 0,
            time_range: None,
            bin_count_stats: None,
            metadata,
        }
    }

    /// Widen the time range with one accepted pass.
    pub fn record_pass_time(&mut self, start: Option<Epoch>, end: Option<Epoch>) {
        let (Some(start), Some(end)) = (start, end) else {
            return;
        };
        let (lo, hi) = match self.time_range {
            None => (start, end),
            Some((lo, hi)) => (
                if start < lo { start } else { lo },
                if end > hi { end } else { hi },
            ),
        };
        self.time_range = Some((lo, hi));
        self.metadata
            .insert("start_time".to_string(), lo.to_isoformat());
        self.metadata.insert("end_time".to_string(), hi.to_isoformat());
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let obs = &self.observations;
        if f.alternate() {
            writeln!(f, "Binning run summary")?;
            writeln!(f, "-------------------")?;
            writeln!(f, "passes processed : {}", self.passes_processed)?;
            writeln!(f, "passes filtered  : {}", self.passes_filtered)?;
            writeln!(f, "observations     : {}", obs.seen)?;
            writeln!(f, "  accepted       : {}", obs.accepted)?;
            writeln!(f, "  dropped        : {}", obs.dropped)?;
            writeln!(f, "  masked         : {}", obs.masked)?;
            writeln!(f, "  outside region : {}", obs.outside_region)?;
            write!(f, "bins written     : {}", self.bins_written)?;
            if let Some(stats) = &self.bin_count_stats {
                write!(f, "\n{stats:#}")?;
            }
            for (key, value) in &self.metadata {
                write!(f, "\n{key:<17}: {value}")?;
            }
            Ok(())
        } else {
            write!(
                f,
                "passes={} (filtered={}), observations={} (accepted={}, dropped={}, masked={}, outside_region={}), bins={}",
                self.passes_processed,
                self.passes_filtered,
                obs.seen,
                obs.accepted,
                obs.dropped,
                obs.masked,
                obs.outside_region,
                self.bins_written
            )
        }
    }
}

#[cfg(test)]
mod run_summary_tests {
    use super::*;

    #[test]
    fn nearest_rank_quartiles() {
        let stats = BinCountStats::from_counts([5, 1, 3, 2, 4]).unwrap();
        assert_eq!(
            stats,
            BinCountStats {
                min: 1,
                p25: 2,
                median: 3,
                p95: 5,
                max: 5,
            }
        );
        assert_eq!(stats.to_string(), "min=1, p25=2, median=3, p95=5, max=5");
        assert!(BinCountStats::from_counts(Vec::new()).is_none());
    }

    #[test]
    fn time_range_spans_all_passes() {
        let mut summary = RunSummary::new("L3");
        let t = |d| Epoch::from_gregorian_utc_at_midnight(2024, 3, d);
        summary.record_pass_time(Some(t(5)), Some(t(6)));
        summary.record_pass_time(Some(t(2)), Some(t(3)));
        summary.record_pass_time(None, None);
        assert_eq!(summary.time_range, Some((t(2), t(6))));
        assert_eq!(summary.metadata["software_name"], SOFTWARE_NAME);
        assert_eq!(summary.metadata["product_name"], "L3");
    }
}
