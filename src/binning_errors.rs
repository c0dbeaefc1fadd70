use thiserror::Error;

use crate::constants::BinIndex;

#[derive(Error, Debug)]
pub enum BinningError {
    #[error("Invalid grid parameter: {0}")]
    InvalidGridParameter(String),

    #[error("Invalid aggregator configuration: {0}")]
    InvalidAggregatorConfig(String),

    #[error("Invalid cell processor configuration: {0}")]
    InvalidCellProcessorConfig(String),

    #[error("Variable '{variable}' is not declared by {pass}")]
    UndeclaredVariable { variable: String, pass: String },

    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Invalid time range: {0}")]
    InvalidTimeRange(String),

    #[error("Pass '{0}' has no start time but a time series aggregator is configured")]
    MissingPassTime(String),

    #[error("Invalid observation batch: {0}")]
    InvalidObservationBatch(String),

    #[error("Invalid coordinate: lat={lat}, lon={lon}")]
    InvalidCoordinate { lat: f64, lon: f64 },

    #[error("Bin index {0} is outside the grid")]
    BinIndexOutOfRange(BinIndex),

    #[error(
        "Merge consistency error for bin {index} from pass '{pass}': expected {expected} spatial features, got {actual}"
    )]
    MergeConsistency {
        index: BinIndex,
        pass: String,
        expected: usize,
        actual: usize,
    },

    #[error("Binning run cancelled after {0} pass(es)")]
    Cancelled(usize),

    #[error("Unable to parse the binning configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV output error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Unable to perform file operation: {0}")]
    Io(#[from] std::io::Error),
}

impl BinningError {
    /// True for the errors that must abort a run before any observation is consumed.
    pub fn is_configuration_error(&self) -> bool {
        use BinningError::*;
        matches!(
            self,
            InvalidGridParameter(_)
                | InvalidAggregatorConfig(_)
                | InvalidCellProcessorConfig(_)
                | UndeclaredVariable { .. }
                | InvalidDate(_)
                | InvalidTimeRange(_)
                | MissingPassTime(_)
                | InvalidObservationBatch(_)
                | Json(_)
        )
    }
}

impl PartialEq for BinningError {
    fn eq(&self, other: &Self) -> bool {
        use BinningError::*;
        match (self, other) {
            (InvalidGridParameter(a), InvalidGridParameter(b)) => a == b,
            (InvalidAggregatorConfig(a), InvalidAggregatorConfig(b)) => a == b,
            (InvalidCellProcessorConfig(a), InvalidCellProcessorConfig(b)) => a == b,
            (
                UndeclaredVariable {
                    variable: va,
                    pass: pa,
                },
                UndeclaredVariable {
                    variable: vb,
                    pass: pb,
                },
            ) => va == vb && pa == pb,
            (InvalidDate(a), InvalidDate(b)) => a == b,
            (InvalidObservationBatch(a), InvalidObservationBatch(b)) => a == b,
            (InvalidTimeRange(a), InvalidTimeRange(b)) => a == b,
            (MissingPassTime(a), MissingPassTime(b)) => a == b,
            (
                InvalidCoordinate { lat: la, lon: oa },
                InvalidCoordinate { lat: lb, lon: ob },
            ) => la.to_bits() == lb.to_bits() && oa.to_bits() == ob.to_bits(),
            (BinIndexOutOfRange(a), BinIndexOutOfRange(b)) => a == b,
            (
                MergeConsistency {
                    index: ia,
                    pass: pa,
                    expected: ea,
                    actual: aa,
                },
                MergeConsistency {
                    index: ib,
                    pass: pb,
                    expected: eb,
                    actual: ab,
                },
            ) => ia == ib && pa == pb && ea == eb && aa == ab,
            (Cancelled(a), Cancelled(b)) => a == b,

            // Wrapped foreign errors are not comparable: equal if same variant
            (Json(_), Json(_)) => true,
            (Csv(_), Csv(_)) => true,
            (Io(_), Io(_)) => true,

            _ => false,
        }
    }
}
