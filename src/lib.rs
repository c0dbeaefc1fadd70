pub mod aggregators;
pub mod bin_manager;
pub mod binning;
pub mod binning_config;
pub mod binning_errors;
pub mod cell_processor;
pub mod constants;
pub mod observations;
pub mod output;
pub mod planetary_grid;
pub mod spatial_binner;
pub mod temporal_binner;
pub mod variable_context;
pub mod vector;

pub use binning::Binning;
pub use binning_config::BinningConfig;
pub use binning_errors::BinningError;
