//! # Constants and type definitions for l3binning
//!
//! This module centralizes the **grid constants** and the **common type aliases** used
//! throughout the crate, so that every component speaks about bins, angles and epochs with the
//! same vocabulary.
//!
//! ## Overview
//!
//! - Grid sizing constants (default and minimal number of latitude rows)
//! - Core type aliases (bin index, degrees, MJD)
//! - Software identification written into the run metadata

// -------------------------------------------------------------------------------------------------
// Grid constants
// -------------------------------------------------------------------------------------------------

/// Default number of latitude rows (≈ 9.28 km bins at the equator, the SeaWiFS level-3 grid).
pub const DEFAULT_NUM_ROWS: usize = 2160;

/// Smallest accepted number of latitude rows.
pub const MIN_NUM_ROWS: usize = 3;

/// Latitude span covered by the grid, in degrees.
pub const LAT_SPAN: f64 = 180.0;

/// Longitude span covered by one grid row, in degrees.
pub const LON_SPAN: f64 = 360.0;

/// Default width of one time-series slot, in days.
pub const DEFAULT_PERIOD_DAYS: f64 = 1.0;

// -------------------------------------------------------------------------------------------------
// Run metadata
// -------------------------------------------------------------------------------------------------

pub const SOFTWARE_NAME: &str = "l3binning";

pub const SOFTWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Dense, unique identifier of one grid cell in `[0, num_bins)`.
pub type BinIndex = u64;

/// Angle in degrees
pub type Degree = f64;

/// Modified Julian Date (UTC days)
pub type MJD = f64;
