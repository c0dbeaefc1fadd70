//! Percentile thresholds over a gap-filled time series.
//!
//! Reads the `<var>_t<i>` features produced by a time series aggregator, fills the missing slots
//! (see [`fill_gaps`]), sorts the filled series and reports, for each requested level `P`,
//!
//! ```text
//! <var>_p<P>_threshold = sorted[min(⌊P/100 · n⌋, n - 1)]
//! ```
use super::{
    gap_filler::{fill_gaps, GapFilling},
    CellProcessor,
};
use crate::binning_errors::BinningError;

#[derive(Debug, Clone)]
pub struct InterpolatedPercentile {
    series: Vec<usize>,
    percentiles: Vec<u32>,
    gap_filling: GapFilling,
    start_fallback: f64,
    end_fallback: f64,
    output_names: Vec<String>,
}

impl InterpolatedPercentile {
    /// Resolve the time series of `var_name` among the input features.
    ///
    /// Return
    /// ----------
    /// * The processor, or [`BinningError::InvalidCellProcessorConfig`] if no `<var>_t0` feature
    ///   exists, a level is outside `0..=100` or a fallback is not finite.
    pub fn new(
        var_name: &str,
        percentiles: &[u32],
        gap_filling: GapFilling,
        start_fallback: f64,
        end_fallback: f64,
        input_names: &[String],
    ) -> Result<Self, BinningError> {
        if percentiles.is_empty() || percentiles.iter().any(|&p| p > 100) {
            return Err(BinningError::InvalidCellProcessorConfig(format!(
                "INTERPOLATED_PERCENTILE({var_name}): percentiles must be a non-empty list in 0..=100"
            )));
        }

        if !(start_fallback.is_finite() && end_fallback.is_finite()) {
            return Err(BinningError::InvalidCellProcessorConfig(format!(
                "INTERPOLATED_PERCENTILE({var_name}): fallback values must be finite, got \
                 start={start_fallback}, end={end_fallback}"
            )));
        }

        let series: Vec<usize> = (0..)
            .map_while(|slot| {
                let name = format!("{var_name}_t{slot}");
                input_names.iter().position(|n| *n == name)
            })
            .collect();
        if series.is_empty() {
            return Err(BinningError::InvalidCellProcessorConfig(format!(
                "INTERPOLATED_PERCENTILE({var_name}): no time series feature '{var_name}_t0' in the input"
            )));
        }

        Ok(InterpolatedPercentile {
            series,
            percentiles: percentiles.to_vec(),
            gap_filling,
            start_fallback,
            end_fallback,
            output_names: percentiles
                .iter()
                .map(|p| format!("{var_name}_p{p}_threshold"))
                .collect(),
        })
    }
}

impl CellProcessor for InterpolatedPercentile {
    fn name(&self) -> &str {
        "INTERPOLATED_PERCENTILE"
    }

    fn output_feature_names(&self) -> &[String] {
        &self.output_names
    }

    fn process(&self, input: &[f64], output: &mut [f64]) {
        let mut values: Vec<f64> = self.series.iter().map(|&i| input[i]).collect();
        fill_gaps(
            &mut values,
            self.gap_filling,
            self.start_fallback,
            self.end_fallback,
        );
        values.sort_by(f64::total_cmp);

        let n = values.len();
        for (out, &p) in output.iter_mut().zip(&self.percentiles) {
            let k = ((p as f64 / 100.0) * n as f64).floor() as usize;
            *out = values[k.min(n - 1)];
        }
    }
}

#[cfg(test)]
mod interpolated_percentile_tests {
    use super::*;

    fn names(var: &str, n: usize) -> Vec<String> {
        let mut v = vec!["other".to_string()];
        v.extend((0..n).map(|i| format!("{var}_t{i}")));
        v
    }

    #[test]
    fn thresholds_of_a_filled_series() {
        let proc =
            InterpolatedPercentile::new("chl", &[0, 50, 100], GapFilling::Linear, 0.0, 0.0, &names("chl", 5))
                .unwrap();
        // series: 4, NaN, 8, 1, NaN -> 4, 6, 8, 1, 0 -> sorted 0, 1, 4, 6, 8
        let input = [99.0, 4.0, f64::NAN, 8.0, 1.0, f64::NAN];
        let mut out = [0.0; 3];
        proc.process(&input, &mut out);
        assert_eq!(out, [0.0, 4.0, 8.0]);
        assert_eq!(proc.output_feature_names()[1], "chl_p50_threshold");
    }

    #[test]
    fn missing_series_is_a_configuration_error() {
        let err = InterpolatedPercentile::new("sst", &[90], GapFilling::Linear, 0.0, 0.0, &names("chl", 3))
            .unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn non_finite_fallback_is_a_configuration_error() {
        for (start, end) in [(f64::NAN, 0.0), (0.0, f64::NAN), (f64::INFINITY, 0.0)] {
            let err = InterpolatedPercentile::new(
                "chl",
                &[90],
                GapFilling::Spline,
                start,
                end,
                &names("chl", 3),
            )
            .unwrap_err();
            assert!(matches!(err, BinningError::InvalidCellProcessorConfig(_)));
        }
    }
}
