//! # Feature vectors and their layout
//!
//! Every bin carries one flat `f64` buffer holding the state (or output) of all configured
//! aggregators back to back. A [`FeatureLayout`] records where each aggregator's segment starts;
//! it is computed once when the bin manager is configured and shared by all bins of a run.
//!
//! ```text
//! aggregators:   [ Average(chl)        ][ MinMax(sst) ][ Sum(n) ]
//! spatial layout: chl_mean, chl_m2,       sst_min, sst_max, n_sum
//! offsets:        0                       2                 4
//! ```
use std::ops::Range;

use smallvec::SmallVec;

/// Segment boundaries of the aggregators inside a feature vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureLayout {
    offsets: SmallVec<[usize; 8]>,
    len: usize,
}

impl FeatureLayout {
    /// Build a layout from the per-aggregator segment lengths, in aggregator order.
    pub fn from_counts(counts: impl IntoIterator<Item = usize>) -> Self {
        let mut offsets = SmallVec::new();
        let mut len = 0;
        for count in counts {
            offsets.push(len);
            len += count;
        }
        FeatureLayout { offsets, len }
    }

    /// Total vector length.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of segments (one per aggregator).
    #[inline]
    pub fn num_segments(&self) -> usize {
        self.offsets.len()
    }

    /// Index range of segment `i`.
    #[inline]
    pub fn segment(&self, i: usize) -> Range<usize> {
        let start = self.offsets[i];
        let end = self.offsets.get(i + 1).copied().unwrap_or(self.len);
        start..end
    }

    /// Allocate a zero-filled vector with this layout.
    pub fn new_vector(&self) -> FeatureVector {
        FeatureVector(vec![0.0; self.len])
    }
}

/// Fixed-length numeric record of one bin.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    pub fn from_values(values: Vec<f64>) -> Self {
        FeatureVector(values)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn get(&self, i: usize) -> Option<f64> {
        self.0.get(i).copied()
    }

    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.0
    }

    /// Read-only view on segment `i` of `layout`.
    #[inline]
    pub fn segment(&self, layout: &FeatureLayout, i: usize) -> &[f64] {
        &self.0[layout.segment(i)]
    }

    /// Writable view on segment `i` of `layout`.
    #[inline]
    pub fn segment_mut(&mut self, layout: &FeatureLayout, i: usize) -> &mut [f64] {
        &mut self.0[layout.segment(i)]
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

impl From<Vec<f64>> for FeatureVector {
    fn from(values: Vec<f64>) -> Self {
        FeatureVector(values)
    }
}
