//! # Cell processor chain
//!
//! Optional post-processing of completed bins. Aggregation state is never modified here: a
//! processor reads the output features of a completed bin and writes a new, possibly shorter or
//! longer, feature vector. Processors are applied in configuration order, each one reading what
//! the previous one produced.
//!
//! Stage transition
//! -----------------
//! ```text
//! OutputBin { stage: Completed } ──process──▶ OutputBin { stage: Processed }
//! ```
//! `Completed → Processed` is the only transition. A bin already processed is returned as-is, and
//! an empty chain only flips the stage (the feature vector is moved, not copied).
//!
//! Feature names are resolved once in [`CellProcessorChain::new`]; a reference to a feature the
//! previous stage does not produce is a configuration error.
pub mod gap_filler;
pub mod interpolated_percentile;
pub mod selection;

use serde::{Deserialize, Serialize};

use crate::{
    binning_errors::BinningError,
    output::output_bin::{BinStage, OutputBin},
    vector::FeatureVector,
};
use gap_filler::GapFilling;
use interpolated_percentile::InterpolatedPercentile;
use selection::Selection;

/// A transform from one feature vector to another.
pub trait CellProcessor: std::fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    fn output_feature_names(&self) -> &[String];

    /// Write the derived features of `input` into `output` (sized to the output names).
    fn process(&self, input: &[f64], output: &mut [f64]);
}

fn default_percentiles() -> Vec<u32> {
    vec![90]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CellProcessorConfig {
    #[serde(rename = "INTERPOLATED_PERCENTILE")]
    InterpolatedPercentile {
        var_name: String,
        #[serde(default = "default_percentiles")]
        percentiles: Vec<u32>,
        #[serde(default)]
        gap_filling: GapFilling,
        #[serde(default)]
        start_fallback: f64,
        #[serde(default)]
        end_fallback: f64,
    },

    #[serde(rename = "SELECTION")]
    Selection { features: Vec<String> },
}

impl CellProcessorConfig {
    pub fn build(&self, input_names: &[String]) -> Result<Box<dyn CellProcessor>, BinningError> {
        Ok(match self {
            CellProcessorConfig::InterpolatedPercentile {
                var_name,
                percentiles,
                gap_filling,
                start_fallback,
                end_fallback,
            } => Box::new(InterpolatedPercentile::new(
                var_name,
                percentiles,
                *gap_filling,
                *start_fallback,
                *end_fallback,
                input_names,
            )?),
            CellProcessorConfig::Selection { features } => {
                Box::new(Selection::new(features, input_names)?)
            }
        })
    }
}

#[derive(Debug, Default)]
pub struct CellProcessorChain {
    processors: Vec<Box<dyn CellProcessor>>,
    output_names: Vec<String>,
}

impl CellProcessorChain {
    /// Build the chain on top of the completed-bin features `input_names`.
    pub fn new(
        configs: &[CellProcessorConfig],
        input_names: &[String],
    ) -> Result<Self, BinningError> {
        let mut processors = Vec::with_capacity(configs.len());
        let mut names = input_names.to_vec();
        for config in configs {
            let processor = config.build(&names)?;
            names = processor.output_feature_names().to_vec();
            processors.push(processor);
        }
        Ok(CellProcessorChain {
            processors,
            output_names: names,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    pub fn output_feature_names(&self) -> &[String] {
        &self.output_names
    }

    /// Apply the chain to a completed bin.
    pub fn process(&self, bin: OutputBin) -> OutputBin {
        if bin.stage == BinStage::Processed {
            return bin;
        }
        let mut bin = bin;
        for processor in &self.processors {
            let mut out = vec![0.0; processor.output_feature_names().len()];
            processor.process(bin.features.as_slice(), &mut out);
            bin.features = FeatureVector::from_values(out);
        }
        bin.stage = BinStage::Processed;
        bin
    }
}
