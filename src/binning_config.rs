//! # Binning configuration
//!
//! [`BinningConfig`] is the declarative description of a run (serde, loadable from JSON).
//! [`BinningConfig::create_context`] validates it and resolves everything once into a
//! [`BinningContext`]: the grid, the variable context, the bin manager with its layouts and cell
//! processor chain, and the time window. The context is then threaded explicitly through every
//! component; nothing is kept in process-wide state.
//!
//! ## JSON layout
//! -----------------
//! ```json
//! {
//!   "num_rows": 2160,
//!   "variables": ["chl", "valid"],
//!   "mask_variable": "valid",
//!   "start_date": "2024-03-01",
//!   "end_date": "2024-03-31",
//!   "aggregators": [
//!     { "type": "AVG", "var_name": "chl" },
//!     { "type": "PERCENTILE", "var_name": "chl", "percentiles": [50, 90], "min": 0.0, "max": 10.0 }
//!   ],
//!   "cell_processors": []
//! }
//! ```
//! Omitted fields take their defaults. When `variables` is empty, the variables are the ones
//! referenced by the aggregators and the mask, in order of first reference.
//!
//! ## Time window
//! -----------------
//! `start_date`/`end_date` (`YYYY-MM-DD`, UTC) come together. A pass is accepted when it does not
//! start before `start_date` and does not end after the end of `end_date` (`end_date + 1 day`);
//! passes without time information are always accepted. The window is cut into time-series slots
//! of `period_days` days.
//!
//! ## Example
//! -----------------
//! ```rust
//! use l3binning::{aggregators::AggregatorConfig, binning_config::BinningConfig};
//!
//! let config = BinningConfig::builder()
//!     .num_rows(180)
//!     .aggregator(AggregatorConfig::Average { var_name: "chl".into() })
//!     .build()
//!     .unwrap();
//! let ctx = config.create_context().unwrap();
//! assert_eq!(ctx.variables().names(), &["chl".to_string()]);
//! ```
use std::path::Path;

use hifitime::{Epoch, Unit};
use itertools::Itertools;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    aggregators::{AggregatorBuildContext, AggregatorConfig},
    bin_manager::BinManager,
    binning_errors::BinningError,
    cell_processor::CellProcessorConfig,
    constants::{Degree, DEFAULT_NUM_ROWS, DEFAULT_PERIOD_DAYS, MIN_NUM_ROWS, MJD},
    observations::PassDescriptor,
    planetary_grid::EqualAreaGrid,
    variable_context::VariableContext,
};

/// Latitude/longitude bounding box, bounds included.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoRegion {
    pub lat_min: Degree,
    pub lat_max: Degree,
    pub lon_min: Degree,
    pub lon_max: Degree,
}

impl GeoRegion {
    pub fn new(
        lat_min: Degree,
        lat_max: Degree,
        lon_min: Degree,
        lon_max: Degree,
    ) -> Result<Self, BinningError> {
        let region = GeoRegion {
            lat_min,
            lat_max,
            lon_min,
            lon_max,
        };
        region.validate()?;
        Ok(region)
    }

    fn validate(&self) -> Result<(), BinningError> {
        let lat_ok = (-90.0..=90.0).contains(&self.lat_min)
            && (-90.0..=90.0).contains(&self.lat_max)
            && self.lat_min <= self.lat_max;
        let lon_ok = (-180.0..=180.0).contains(&self.lon_min)
            && (-180.0..=180.0).contains(&self.lon_max)
            && self.lon_min <= self.lon_max;
        if lat_ok && lon_ok {
            Ok(())
        } else {
            Err(BinningError::InvalidGridParameter(format!(
                "invalid region: lat [{}, {}], lon [{}, {}]",
                self.lat_min, self.lat_max, self.lon_min, self.lon_max
            )))
        }
    }

    #[inline]
    pub fn contains(&self, lat: Degree, lon: Degree) -> bool {
        (self.lat_min..=self.lat_max).contains(&lat) && (self.lon_min..=self.lon_max).contains(&lon)
    }
}

/// Parse a `YYYY-MM-DD` date as UTC midnight.
pub fn parse_date(date: &str) -> Result<Epoch, BinningError> {
    let invalid = || BinningError::InvalidDate(date.to_string());
    let re = Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").map_err(|_| invalid())?;
    let (_, [y, m, d]) = re.captures(date.trim()).ok_or_else(invalid)?.extract();

    let year: i32 = y.parse().map_err(|_| invalid())?;
    let month: u8 = m.parse().map_err(|_| invalid())?;
    let day: u8 = d.parse().map_err(|_| invalid())?;
    Epoch::maybe_from_gregorian_utc(year, month, day, 0, 0, 0, 0).map_err(|_| invalid())
}

/// Accepted acquisition period of a run and its time-series slots.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    start: Epoch,
    end: Epoch,
    period_days: f64,
}

impl TimeWindow {
    /// Arguments
    /// -----------------
    /// * `start`, `end`: first and last day of the window (midnight UTC); `end` is inclusive.
    /// * `period_days`: width of one time-series slot, `> 0`.
    pub fn new(start: Epoch, end: Epoch, period_days: f64) -> Result<Self, BinningError> {
        if end < start {
            return Err(BinningError::InvalidTimeRange(format!(
                "end date {end} is before start date {start}"
            )));
        }
        if !(period_days.is_finite() && period_days > 0.0) {
            return Err(BinningError::InvalidTimeRange(format!(
                "period_days must be > 0, got {period_days}"
            )));
        }
        Ok(TimeWindow {
            start,
            end,
            period_days,
        })
    }

    pub fn start(&self) -> Epoch {
        self.start
    }

    /// First instant after the window.
    pub fn end_exclusive(&self) -> Epoch {
        self.end + Unit::Day * 1
    }

    pub fn start_mjd(&self) -> MJD {
        self.start.to_mjd_utc_days()
    }

    pub fn num_slots(&self) -> usize {
        let span = (self.end_exclusive() - self.start).to_unit(Unit::Day);
        ((span / self.period_days).ceil() as usize).max(1)
    }

    /// Date filter of a pass.
    pub fn accepts(&self, pass: &PassDescriptor) -> bool {
        let starts_late_enough = pass.start_time.map_or(true, |t| t >= self.start);
        let ends_early_enough = pass.end_time.map_or(true, |t| t <= self.end_exclusive());
        starts_late_enough && ends_early_enough
    }

    /// Time-series slot of an instant, `None` before the window.
    pub fn slot_of(&self, mjd: MJD) -> Option<usize> {
        let k = ((mjd - self.start_mjd()) / self.period_days).floor();
        if k < 0.0 || k.is_nan() {
            return None;
        }
        Some((k as usize).min(self.num_slots() - 1))
    }
}

fn default_product_name() -> String {
    "l3_binned".to_string()
}

fn default_num_rows() -> usize {
    DEFAULT_NUM_ROWS
}

fn default_period_days() -> f64 {
    DEFAULT_PERIOD_DAYS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinningConfig {
    #[serde(default = "default_product_name")]
    pub product_name: String,
    /// Latitude rows of the grid.
    #[serde(default = "default_num_rows")]
    pub num_rows: usize,
    #[serde(default)]
    pub variables: Vec<String>,
    pub aggregators: Vec<AggregatorConfig>,
    /// Observations whose mask value is zero or NaN are skipped.
    #[serde(default)]
    pub mask_variable: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default = "default_period_days")]
    pub period_days: f64,
    #[serde(default)]
    pub region: Option<GeoRegion>,
    #[serde(default)]
    pub cell_processors: Vec<CellProcessorConfig>,
    /// Index shards of the merge phase; `0` means one per worker thread.
    #[serde(default)]
    pub num_partitions: usize,
}

impl Default for BinningConfig {
    fn default() -> Self {
        BinningConfig {
            product_name: default_product_name(),
            num_rows: DEFAULT_NUM_ROWS,
            variables: Vec::new(),
            aggregators: Vec::new(),
            mask_variable: None,
            start_date: None,
            end_date: None,
            period_days: DEFAULT_PERIOD_DAYS,
            region: None,
            cell_processors: Vec::new(),
            num_partitions: 0,
        }
    }
}

impl BinningConfig {
    pub fn builder() -> BinningConfigBuilder {
        BinningConfigBuilder::new()
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self, BinningError> {
        let config: BinningConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, BinningError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> Result<String, BinningError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check everything that can be checked without building the aggregators.
    pub fn validate(&self) -> Result<(), BinningError> {
        if self.num_rows < MIN_NUM_ROWS {
            return Err(BinningError::InvalidGridParameter(format!(
                "num_rows must be at least {MIN_NUM_ROWS}, got {}",
                self.num_rows
            )));
        }
        if self.aggregators.is_empty() {
            return Err(BinningError::InvalidAggregatorConfig(
                "at least one aggregator must be configured".into(),
            ));
        }
        if let Some(region) = &self.region {
            region.validate()?;
        }
        self.time_window()?;
        Ok(())
    }

    /// Resolve the configured dates.
    ///
    /// Return
    /// ----------
    /// * `None` without dates, the window otherwise, or [`BinningError::InvalidDate`] /
    ///   [`BinningError::InvalidTimeRange`].
    pub fn time_window(&self) -> Result<Option<TimeWindow>, BinningError> {
        match (&self.start_date, &self.end_date) {
            (None, None) => Ok(None),
            (Some(start), Some(end)) => Ok(Some(TimeWindow::new(
                parse_date(start)?,
                parse_date(end)?,
                self.period_days,
            )?)),
            _ => Err(BinningError::InvalidTimeRange(
                "start_date and end_date must be given together".into(),
            )),
        }
    }

    /// Variables of the run: the declared list, or the referenced ones if none is declared.
    pub fn declared_variables(&self) -> Vec<String> {
        if !self.variables.is_empty() {
            return self.variables.clone();
        }
        self.aggregators
            .iter()
            .map(|a| a.var_name())
            .chain(self.mask_variable.as_deref())
            .unique()
            .map(str::to_string)
            .collect()
    }

    /// Validate the configuration and resolve it into a run context.
    pub fn create_context(&self) -> Result<BinningContext, BinningError> {
        self.validate()?;

        let grid = EqualAreaGrid::new(self.num_rows)?;
        let variables = VariableContext::new(&self.declared_variables())?;
        let mask_index = self
            .mask_variable
            .as_deref()
            .map(|m| variables.require(m))
            .transpose()?;
        let time_window = self.time_window()?;

        let bin_manager = BinManager::new(
            &self.aggregators,
            &AggregatorBuildContext {
                variables: &variables,
                num_time_slots: time_window.map(|w| w.num_slots()),
            },
            &self.cell_processors,
        )?;
        let needs_time_slots = self
            .aggregators
            .iter()
            .any(|a| matches!(a, AggregatorConfig::TimeSeries { .. }));

        Ok(BinningContext {
            product_name: self.product_name.clone(),
            grid,
            variables,
            bin_manager,
            mask_index,
            region: self.region,
            time_window,
            needs_time_slots,
            num_partitions: resolve_partitions(self.num_partitions),
        })
    }
}

fn resolve_partitions(requested: usize) -> usize {
    if requested > 0 {
        return requested;
    }
    #[cfg(feature = "parallel")]
    {
        rayon::current_num_threads().max(1)
    }
    #[cfg(not(feature = "parallel"))]
    {
        1
    }
}

/// Builder for [`BinningConfig`], with validation.
#[derive(Debug, Clone, Default)]
pub struct BinningConfigBuilder {
    config: BinningConfig,
}

impl BinningConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn product_name(mut self, v: impl Into<String>) -> Self {
        self.config.product_name = v.into();
        self
    }

    pub fn num_rows(mut self, v: usize) -> Self {
        self.config.num_rows = v;
        self
    }

    pub fn variables<S: Into<String>>(mut self, v: impl IntoIterator<Item = S>) -> Self {
        self.config.variables = v.into_iter().map(Into::into).collect();
        self
    }

    pub fn aggregator(mut self, v: AggregatorConfig) -> Self {
        self.config.aggregators.push(v);
        self
    }

    pub fn mask_variable(mut self, v: impl Into<String>) -> Self {
        self.config.mask_variable = Some(v.into());
        self
    }

    /// Inclusive date range, both `YYYY-MM-DD`.
    pub fn date_range(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.config.start_date = Some(start.into());
        self.config.end_date = Some(end.into());
        self
    }

    pub fn period_days(mut self, v: f64) -> Self {
        self.config.period_days = v;
        self
    }

    pub fn region(mut self, v: GeoRegion) -> Self {
        self.config.region = Some(v);
        self
    }

    pub fn cell_processor(mut self, v: CellProcessorConfig) -> Self {
        self.config.cell_processors.push(v);
        self
    }

    pub fn num_partitions(mut self, v: usize) -> Self {
        self.config.num_partitions = v;
        self
    }

    pub fn build(self) -> Result<BinningConfig, BinningError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Fully resolved, immutable state shared by all passes of a run.
#[derive(Debug)]
pub struct BinningContext {
    product_name: String,
    grid: EqualAreaGrid,
    variables: VariableContext,
    bin_manager: BinManager,
    mask_index: Option<usize>,
    region: Option<GeoRegion>,
    time_window: Option<TimeWindow>,
    needs_time_slots: bool,
    num_partitions: usize,
}

impl BinningContext {
    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    pub fn grid(&self) -> &EqualAreaGrid {
        &self.grid
    }

    pub fn variables(&self) -> &VariableContext {
        &self.variables
    }

    pub fn bin_manager(&self) -> &BinManager {
        &self.bin_manager
    }

    pub fn mask_index(&self) -> Option<usize> {
        self.mask_index
    }

    pub fn region(&self) -> Option<&GeoRegion> {
        self.region.as_ref()
    }

    pub fn time_window(&self) -> Option<&TimeWindow> {
        self.time_window.as_ref()
    }

    pub fn num_partitions(&self) -> usize {
        self.num_partitions
    }

    /// Date filter; every pass is accepted without a time window.
    pub fn accepts(&self, pass: &PassDescriptor) -> bool {
        self.time_window.map_or(true, |w| w.accepts(pass))
    }

    /// Time-series slot of a pass.
    ///
    /// Return
    /// ----------
    /// * `Ok(None)` when no time series is configured, the slot otherwise, or
    ///   [`BinningError::MissingPassTime`] for a pass without start time.
    pub fn time_slot(&self, pass: &PassDescriptor) -> Result<Option<usize>, BinningError> {
        let Some(window) = self.time_window.as_ref().filter(|_| self.needs_time_slots) else {
            return Ok(None);
        };
        let mjd = pass
            .start_mjd()
            .ok_or_else(|| BinningError::MissingPassTime(pass.id.clone()))?;
        Ok(window.slot_of(mjd))
    }
}
