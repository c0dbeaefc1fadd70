use crate::{constants::BinIndex, vector::FeatureVector};

/// Processing stage of an [`OutputBin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinStage {
    /// Aggregators completed; cell processors not applied yet.
    Completed,
    /// Cell processor chain applied (possibly empty). Final.
    Processed,
}

/// A completed bin, as handed to the cell processor chain and then to a sink.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputBin {
    pub index: BinIndex,
    pub num_obs: u64,
    pub num_passes: u32,
    pub features: FeatureVector,
    pub stage: BinStage,
}

impl OutputBin {
    pub fn completed(
        index: BinIndex,
        num_obs: u64,
        num_passes: u32,
        features: FeatureVector,
    ) -> Self {
        OutputBin {
            index,
            num_obs,
            num_passes,
            features,
            stage: BinStage::Completed,
        }
    }

    pub fn is_processed(&self) -> bool {
        self.stage == BinStage::Processed
    }
}
