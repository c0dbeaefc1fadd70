//! # Observations and their sources
//!
//! The binning core never reads files itself. It consumes **observation sources**: one source per
//! source product ("pass"), each yielding `(lat, lon, values…)` tuples exactly once.
//!
//! Data Model
//! -----------------
//! * [`Observation`] – one pixel: geographic position in degrees plus the measured values, in the
//!   column order declared by the pass.
//! * [`PassDescriptor`] – identity of the pass, optional acquisition time range (UTC
//!   [`Epoch`]s) and the names of its value columns.
//! * [`ObservationSource`] – an iterator of observations that also exposes its descriptor.
//!
//! Implementations
//! -----------------
//! * [`observation_batch::ObservationBatch`] – owned, column-oriented in-memory batch.
//! * [`LazySource`] – wraps any iterator (e.g. a streaming reader) together with a descriptor.
pub mod observation_batch;

use hifitime::Epoch;
use smallvec::SmallVec;

use crate::constants::{Degree, MJD};

/// Values of one observation; inline storage covers the usual handful of bands.
pub type ObservationValues = SmallVec<[f64; 8]>;

/// One geolocated measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub lat: Degree,
    pub lon: Degree,
    pub values: ObservationValues,
}

impl Observation {
    pub fn new(lat: Degree, lon: Degree, values: impl IntoIterator<Item = f64>) -> Self {
        Observation {
            lat,
            lon,
            values: values.into_iter().collect(),
        }
    }
}

/// Identity and schema of one source product.
#[derive(Debug, Clone, PartialEq)]
pub struct PassDescriptor {
    pub id: String,
    pub start_time: Option<Epoch>,
    pub end_time: Option<Epoch>,
    pub variables: Vec<String>,
}

impl PassDescriptor {
    pub fn new<S: Into<String>>(id: impl Into<String>, variables: impl IntoIterator<Item = S>) -> Self {
        PassDescriptor {
            id: id.into(),
            start_time: None,
            end_time: None,
            variables: variables.into_iter().map(Into::into).collect(),
        }
    }

    /// Attach the acquisition time range of the pass.
    pub fn with_time_range(mut self, start: Epoch, end: Epoch) -> Self {
        self.start_time = Some(start);
        self.end_time = Some(end);
        self
    }

    /// Start time of the pass as MJD (UTC), if known.
    pub fn start_mjd(&self) -> Option<MJD> {
        self.start_time.map(|t| t.to_mjd_utc_days())
    }
}

/// A source of observations for exactly one binning pass.
///
/// The iterator is consumed at most once per pass; restarting a product means building a new
/// source.
pub trait ObservationSource: Iterator<Item = Observation> {
    fn descriptor(&self) -> &PassDescriptor;
}

/// Adapter turning any observation iterator into an [`ObservationSource`].
pub struct LazySource<I> {
    descriptor: PassDescriptor,
    iter: I,
}

impl<I> LazySource<I>
where
    I: Iterator<Item = Observation>,
{
    pub fn new(descriptor: PassDescriptor, iter: I) -> Self {
        LazySource { descriptor, iter }
    }
}

impl<I> Iterator for LazySource<I>
where
    I: Iterator<Item = Observation>,
{
    type Item = Observation;

    #[inline]
    fn next(&mut self) -> Option<Observation> {
        self.iter.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}

impl<I> ObservationSource for LazySource<I>
where
    I: Iterator<Item = Observation>,
{
    fn descriptor(&self) -> &PassDescriptor {
        &self.descriptor
    }
}
