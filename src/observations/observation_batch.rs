//! # Column-oriented observation batch
//!
//! [`ObservationBatch`] stores one pass as parallel columns (`lat`, `lon`, one column per
//! measured variable) and replays them as [`Observation`]s.
//!
//! Invariants
//! -----------------
//! * `lat.len() == lon.len() == columns[k].len()` for every column.
//! * `columns.len() == descriptor.variables.len()`.
//! * Angles are in **degrees**; invalid values are kept as-is and rejected later by the binner.
use crate::{
    binning_errors::BinningError,
    constants::Degree,
    observations::{Observation, ObservationSource, PassDescriptor},
};

#[derive(Debug, Clone)]
pub struct ObservationBatch {
    descriptor: PassDescriptor,
    lat: Vec<Degree>,
    lon: Vec<Degree>,
    columns: Vec<Vec<f64>>,
    cursor: usize,
}

impl ObservationBatch {
    /// Build a batch from owned columns.
    ///
    /// Arguments
    /// -----------------
    /// * `descriptor`: identity and column names of the pass.
    /// * `lat`, `lon`: positions in degrees.
    /// * `columns`: one value column per name in `descriptor.variables`, same order.
    ///
    /// Return
    /// ----------
    /// * The batch, or [`BinningError::InvalidObservationBatch`] if the column shapes disagree.
    pub fn new(
        descriptor: PassDescriptor,
        lat: Vec<Degree>,
        lon: Vec<Degree>,
        columns: Vec<Vec<f64>>,
    ) -> Result<Self, BinningError> {
        if lat.len() != lon.len() {
            return Err(BinningError::InvalidObservationBatch(format!(
                "pass '{}': {} latitudes for {} longitudes",
                descriptor.id,
                lat.len(),
                lon.len()
            )));
        }
        if columns.len() != descriptor.variables.len() {
            return Err(BinningError::InvalidObservationBatch(format!(
                "pass '{}': {} value columns for {} declared variables",
                descriptor.id,
                columns.len(),
                descriptor.variables.len()
            )));
        }
        if let Some((k, col)) = columns.iter().enumerate().find(|(_, c)| c.len() != lat.len()) {
            return Err(BinningError::InvalidObservationBatch(format!(
                "pass '{}': column '{}' has {} values, expected {}",
                descriptor.id,
                descriptor.variables[k],
                col.len(),
                lat.len()
            )));
        }

        Ok(ObservationBatch {
            descriptor,
            lat,
            lon,
            columns,
            cursor: 0,
        })
    }

    /// Number of observations in the batch (consumed or not).
    pub fn len(&self) -> usize {
        self.lat.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lat.is_empty()
    }
}

impl Iterator for ObservationBatch {
    type Item = Observation;

    fn next(&mut self) -> Option<Observation> {
        let i = self.cursor;
        if i >= self.lat.len() {
            return None;
        }
        self.cursor += 1;
        Some(Observation::new(
            self.lat[i],
            self.lon[i],
            self.columns.iter().map(|c| c[i]),
        ))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rest = self.lat.len() - self.cursor;
        (rest, Some(rest))
    }
}

impl ExactSizeIterator for ObservationBatch {}

impl ObservationSource for ObservationBatch {
    fn descriptor(&self) -> &PassDescriptor {
        &self.descriptor
    }
}
