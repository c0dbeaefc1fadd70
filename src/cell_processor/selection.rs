use super::CellProcessor;
use crate::binning_errors::BinningError;

/// Keep a named subset of the features, in the requested order.
#[derive(Debug, Clone)]
pub struct Selection {
    indices: Vec<usize>,
    names: Vec<String>,
}

impl Selection {
    pub fn new(features: &[String], input_names: &[String]) -> Result<Self, BinningError> {
        if features.is_empty() {
            return Err(BinningError::InvalidCellProcessorConfig(
                "SELECTION: at least one feature must be selected".into(),
            ));
        }
        let indices = features
            .iter()
            .map(|f| {
                input_names.iter().position(|n| n == f).ok_or_else(|| {
                    BinningError::InvalidCellProcessorConfig(format!(
                        "SELECTION: unknown feature '{f}'"
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Selection {
            indices,
            names: features.to_vec(),
        })
    }
}

impl CellProcessor for Selection {
    fn name(&self) -> &str {
        "SELECTION"
    }

    fn output_feature_names(&self) -> &[String] {
        &self.names
    }

    fn process(&self, input: &[f64], output: &mut [f64]) {
        for (out, &i) in output.iter_mut().zip(&self.indices) {
            *out = input[i];
        }
    }
}
