//! # Equal-area planetary grid
//!
//! Deterministic mapping from a geographic coordinate to a dense bin index.
//!
//! ## Layout
//! -----------------
//! * The sphere is cut into `num_rows` latitude bands of equal height `180° / num_rows`,
//!   enumerated from the south pole (row 0) to the north pole (row `num_rows - 1`).
//! * Row `r` holds `max(1, ⌊num_rows · cos φ_r⌋)` columns, where `φ_r` is the centre latitude of
//!   the row. The column count therefore shrinks toward the poles, keeping the cell area roughly
//!   constant, and never increases moving poleward.
//! * Bin indices are assigned row-major: `index = base_bin[row] + col`, so the indices of a grid
//!   enumerate `[0, num_bins)` without holes.
//!
//! All per-row quantities are computed once in [`EqualAreaGrid::new`]; a lookup only performs a
//! couple of floor divisions.
//!
//! ## Edge rules
//! -----------------
//! * `lat == +90°` belongs to the northernmost row.
//! * `lon == +180°` wraps onto column 0 of its row (same meridian as `-180°`).
//! * Any NaN/infinite coordinate, or a value outside `[-90, 90] × [-180, 180]`, is rejected with
//!   [`BinningError::InvalidCoordinate`]. Nothing is clamped silently.
//!
//! ## Example
//! -----------------
//! ```rust
//! use l3binning::planetary_grid::EqualAreaGrid;
//!
//! let grid = EqualAreaGrid::new(3).unwrap();
//! assert_eq!(grid.num_bins(), 5);
//! assert_eq!(grid.bin_index(89.0, 10.0).unwrap(), grid.bin_index(89.0, -170.0).unwrap());
//! ```
use crate::{
    binning_errors::BinningError,
    constants::{BinIndex, Degree, LAT_SPAN, LON_SPAN, MIN_NUM_ROWS},
};

#[derive(Debug, Clone, PartialEq)]
pub struct EqualAreaGrid {
    num_rows: usize,
    row_height: Degree,
    base_bin: Vec<BinIndex>,
    num_cols: Vec<usize>,
    lat_center: Vec<Degree>,
    num_bins: BinIndex,
}

impl EqualAreaGrid {
    /// Build the grid for a given number of latitude rows.
    ///
    /// Arguments
    /// -----------------
    /// * `num_rows`: number of latitude bands, at least [`MIN_NUM_ROWS`].
    ///
    /// Return
    /// ----------
    /// * The immutable grid, or [`BinningError::InvalidGridParameter`] for a too small row count.
    pub fn new(num_rows: usize) -> Result<Self, BinningError> {
        if num_rows < MIN_NUM_ROWS {
            return Err(BinningError::InvalidGridParameter(format!(
                "num_rows must be at least {MIN_NUM_ROWS}, got {num_rows}"
            )));
        }

        let row_height = LAT_SPAN / num_rows as f64;
        let mut base_bin = Vec::with_capacity(num_rows);
        let mut num_cols = Vec::with_capacity(num_rows);
        let mut lat_center = Vec::with_capacity(num_rows);
        let mut next_base: BinIndex = 0;

        for row in 0..num_rows {
            // Fold onto the southern half so both hemispheres get bit-identical values.
            let folded = row.min(num_rows - 1 - row);
            let abs_lat = 90.0 - (folded as f64 + 0.5) * row_height;
            let lat = match (2 * row + 1).cmp(&num_rows) {
                std::cmp::Ordering::Less => -abs_lat,
                std::cmp::Ordering::Equal => 0.0,
                std::cmp::Ordering::Greater => abs_lat,
            };

            let cols = ((num_rows as f64 * abs_lat.to_radians().cos()).floor() as usize).max(1);

            base_bin.push(next_base);
            num_cols.push(cols);
            lat_center.push(lat);
            next_base += cols as BinIndex;
        }

        Ok(EqualAreaGrid {
            num_rows,
            row_height,
            base_bin,
            num_cols,
            lat_center,
            num_bins: next_base,
        })
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Total number of cells; valid indices are `0..num_bins()`.
    pub fn num_bins(&self) -> BinIndex {
        self.num_bins
    }

    /// Number of columns of `row`, or `None` outside the grid.
    pub fn num_cols(&self, row: usize) -> Option<usize> {
        self.num_cols.get(row).copied()
    }

    /// First bin index of `row`.
    pub fn base_bin(&self, row: usize) -> Option<BinIndex> {
        self.base_bin.get(row).copied()
    }

    /// Centre latitude of `row`, in degrees.
    pub fn center_lat(&self, row: usize) -> Option<Degree> {
        self.lat_center.get(row).copied()
    }

    /// Map a coordinate to its bin index.
    ///
    /// Arguments
    /// -----------------
    /// * `lat`: latitude in degrees, `[-90, 90]`.
    /// * `lon`: longitude in degrees, `[-180, 180]`.
    ///
    /// Return
    /// ----------
    /// * The bin index in `[0, num_bins)`, or [`BinningError::InvalidCoordinate`].
    pub fn bin_index(&self, lat: Degree, lon: Degree) -> Result<BinIndex, BinningError> {
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            // NaN fails `contains` as well.
            return Err(BinningError::InvalidCoordinate { lat, lon });
        }

        let row = (((lat + 90.0) / self.row_height).floor() as usize).min(self.num_rows - 1);
        let cols = self.num_cols[row];

        let col = if lon == 180.0 {
            0
        } else {
            (((lon + 180.0) / LON_SPAN * cols as f64).floor() as usize).min(cols - 1)
        };

        Ok(self.base_bin[row] + col as BinIndex)
    }

    /// Row containing `index`.
    pub fn row_of(&self, index: BinIndex) -> Result<usize, BinningError> {
        if index >= self.num_bins {
            return Err(BinningError::BinIndexOutOfRange(index));
        }
        Ok(self.base_bin.partition_point(|&base| base <= index) - 1)
    }

    /// Geographic centre `(lat, lon)` of a bin, in degrees.
    ///
    /// See also
    /// ------------
    /// * [`EqualAreaGrid::bin_index`] – inverse mapping; `bin_index(center_of(i)) == i`.
    pub fn center_of(&self, index: BinIndex) -> Result<(Degree, Degree), BinningError> {
        let row = self.row_of(index)?;
        let col = index - self.base_bin[row];
        let cols = self.num_cols[row] as f64;
        let lon = -180.0 + (col as f64 + 0.5) * LON_SPAN / cols;
        Ok((self.lat_center[row], lon))
    }
}

#[cfg(test)]
mod planetary_grid_tests {
    use super::*;
    use crate::constants::DEFAULT_NUM_ROWS;

    #[test]
    fn three_row_grid_merges_the_poles() {
        let grid = EqualAreaGrid::new(3).unwrap();
        assert_eq!(grid.num_cols(0), Some(1));
        assert_eq!(grid.num_cols(1), Some(3));
        assert_eq!(grid.num_cols(2), Some(1));
        assert_eq!(grid.num_bins(), 5);

        let a = grid.bin_index(89.0, 10.0).unwrap();
        let b = grid.bin_index(89.0, -170.0).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, 4);
        assert_eq!(grid.bin_index(-89.0, 120.0).unwrap(), 0);
    }

    #[test]
    fn rejects_too_few_rows() {
        assert!(matches!(
            EqualAreaGrid::new(0),
            Err(BinningError::InvalidGridParameter(_))
        ));
        assert!(EqualAreaGrid::new(2).is_err());
    }

    #[test]
    fn poles_and_antimeridian() {
        let grid = EqualAreaGrid::new(180).unwrap();
        let north = grid.bin_index(90.0, 0.0).unwrap();
        assert_eq!(grid.row_of(north).unwrap(), 179);
        let south = grid.bin_index(-90.0, 0.0).unwrap();
        assert_eq!(grid.row_of(south).unwrap(), 0);

        let row = grid.row_of(grid.bin_index(10.0, 0.0).unwrap()).unwrap();
        let east = grid.bin_index(10.0, 180.0).unwrap();
        let west = grid.bin_index(10.0, -180.0).unwrap();
        assert_eq!(east, west);
        assert_eq!(east, grid.base_bin(row).unwrap());
    }

    #[test]
    fn invalid_coordinates_are_rejected() {
        let grid = EqualAreaGrid::new(18).unwrap();
        for (lat, lon) in [
            (f64::NAN, 0.0),
            (0.0, f64::NAN),
            (90.0001, 0.0),
            (-91.0, 0.0),
            (0.0, 180.5),
            (0.0, f64::INFINITY),
        ] {
            assert!(matches!(
                grid.bin_index(lat, lon),
                Err(BinningError::InvalidCoordinate { .. })
            ));
        }
    }

    #[test]
    fn columns_never_grow_poleward() {
        let grid = EqualAreaGrid::new(DEFAULT_NUM_ROWS).unwrap();
        let n = grid.num_rows();
        for row in 0..n {
            assert_eq!(grid.num_cols(row), grid.num_cols(n - 1 - row));
        }
        for row in 1..n / 2 {
            assert!(grid.num_cols(row - 1).unwrap() <= grid.num_cols(row).unwrap());
        }
        for row in n / 2..n - 1 {
            assert!(grid.num_cols(row + 1).unwrap() <= grid.num_cols(row).unwrap());
        }
    }

    #[test]
    fn centers_map_back_to_their_bin() {
        let grid = EqualAreaGrid::new(36).unwrap();
        for index in 0..grid.num_bins() {
            let (lat, lon) = grid.center_of(index).unwrap();
            assert_eq!(grid.bin_index(lat, lon).unwrap(), index);
        }
        assert_eq!(
            grid.center_of(grid.num_bins()),
            Err(BinningError::BinIndexOutOfRange(grid.num_bins()))
        );
    }
}
