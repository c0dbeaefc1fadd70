//! CSV rendering of processed bins.
//!
//! Columns: `bin_index, lat, lon, num_obs, num_passes, <feature…>`, where `lat`/`lon` are the bin
//! centre. Rows are buffered and written sorted by bin index on [`BinSink::finish`], so two runs
//! over the same input produce byte-identical files whatever the merge order was.
use std::{fs::File, io::Write, path::Path};

use crate::{
    binning_errors::BinningError,
    constants::BinIndex,
    output::{output_bin::OutputBin, BinSink},
    planetary_grid::EqualAreaGrid,
};

struct Row {
    index: BinIndex,
    num_obs: u64,
    num_passes: u32,
    features: Vec<f64>,
}

pub struct CsvBinSink<W: Write> {
    writer: csv::Writer<W>,
    grid: EqualAreaGrid,
    header: Vec<String>,
    rows: Vec<Row>,
}

impl<W: Write> CsvBinSink<W> {
    pub fn new(writer: W, grid: &EqualAreaGrid) -> Self {
        CsvBinSink {
            writer: csv::Writer::from_writer(writer),
            grid: grid.clone(),
            header: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Recover the underlying writer once the sink is finished.
    pub fn into_inner(self) -> Result<W, BinningError> {
        self.writer
            .into_inner()
            .map_err(|e| BinningError::Io(e.into_error()))
    }
}

impl CsvBinSink<File> {
    pub fn create(path: impl AsRef<Path>, grid: &EqualAreaGrid) -> Result<Self, BinningError> {
        Ok(Self::new(File::create(path)?, grid))
    }
}

impl<W: Write> BinSink for CsvBinSink<W> {
    fn begin(&mut self, feature_names: &[String]) -> Result<(), BinningError> {
        self.header = ["bin_index", "lat", "lon", "num_obs", "num_passes"]
            .iter()
            .map(|s| s.to_string())
            .chain(feature_names.iter().cloned())
            .collect();
        Ok(())
    }

    fn write(&mut self, index: BinIndex, features: &[f64]) -> Result<(), BinningError> {
        self.rows.push(Row {
            index,
            num_obs: 0,
            num_passes: 0,
            features: features.to_vec(),
        });
        Ok(())
    }

    fn write_bin(&mut self, bin: &OutputBin) -> Result<(), BinningError> {
        self.rows.push(Row {
            index: bin.index,
            num_obs: bin.num_obs,
            num_passes: bin.num_passes,
            features: bin.features.as_slice().to_vec(),
        });
        Ok(())
    }

    fn finish(&mut self) -> Result<(), BinningError> {
        self.rows.sort_unstable_by_key(|r| r.index);

        if !self.header.is_empty() {
            self.writer.write_record(&self.header)?;
        }
        for row in self.rows.drain(..) {
            let (lat, lon) = self.grid.center_of(row.index)?;
            let mut record = vec![
                row.index.to_string(),
                format!("{lat:.6}"),
                format!("{lon:.6}"),
                row.num_obs.to_string(),
                row.num_passes.to_string(),
            ];
            record.extend(row.features.iter().map(f64::to_string));
            self.writer.write_record(&record)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
