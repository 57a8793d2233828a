//! Readers that produce the MS1 scans of a spectra file.
//!
//! Vendor formats are out of scope; the on-disk format read here is a
//! long-form table with one peak per row:
//!
//! ```text
//! Scan    RetentionTime   Mz      Intensity
//! 0       0.01            400.2   1200.0
//! ```
//!
//! Retention times are in minutes.

use crate::errors::IndexingError;
use crate::indexing::Ms1Scan;
use crate::spectra_file::SpectraFileInfo;
use serde::Deserialize;
use std::collections::{
    BTreeMap,
    HashMap,
};
use std::path::PathBuf;
use tracing::{
    debug,
    info,
};

/// Anything that can hand over the MS1 scans of a file.
pub trait SpectraSource: Send + Sync {
    fn read_ms1_scans(&self, file: &SpectraFileInfo) -> Result<Vec<Ms1Scan>, IndexingError>;
}

/// Scans held in memory, keyed by file path.
#[derive(Debug, Clone, Default)]
pub struct InMemorySpectra {
    scans: HashMap<PathBuf, Vec<Ms1Scan>>,
}

impl InMemorySpectra {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, file: &SpectraFileInfo, scans: Vec<Ms1Scan>) {
        self.scans.insert(file.path.clone(), scans);
    }

    pub fn with_file(mut self, file: &SpectraFileInfo, scans: Vec<Ms1Scan>) -> Self {
        self.insert(file, scans);
        self
    }
}

impl SpectraSource for InMemorySpectra {
    fn read_ms1_scans(&self, file: &SpectraFileInfo) -> Result<Vec<Ms1Scan>, IndexingError> {
        self.scans
            .get(&file.path)
            .cloned()
            .ok_or(IndexingError::MissingSpectra {
                path: file.path.clone(),
            })
    }
}

#[derive(Debug, Deserialize)]
struct PeakRow {
    #[serde(rename = "Scan")]
    scan: u32,
    #[serde(rename = "RetentionTime")]
    retention_time: f64,
    #[serde(rename = "Mz")]
    mz: f64,
    #[serde(rename = "Intensity")]
    intensity: f64,
}

/// Reads the tab-separated peak table pointed at by each file's path.
#[derive(Debug, Clone, Copy, Default)]
pub struct TsvSpectraReader;

impl SpectraSource for TsvSpectraReader {
    fn read_ms1_scans(&self, file: &SpectraFileInfo) -> Result<Vec<Ms1Scan>, IndexingError> {
        info!("Reading MS1 peaks from: {}", file.path.display());
        let fh = std::fs::File::open(&file.path).map_err(|e| IndexingError::Io {
            path: file.path.clone(),
            source: e,
        })?;
        let mut rdr = csv::ReaderBuilder::new().delimiter(b'\t').from_reader(fh);

        let mut by_scan: BTreeMap<u32, Ms1Scan> = BTreeMap::new();
        let mut num_rows = 0usize;
        for row in rdr.deserialize() {
            let row: PeakRow = row?;
            num_rows += 1;
            let scan = by_scan
                .entry(row.scan)
                .or_insert_with(|| Ms1Scan::new(row.retention_time, Vec::new(), Vec::new()));
            scan.mz.push(row.mz);
            scan.intensity.push(row.intensity);
        }
        debug!(
            "Read {} peaks in {} scans from {}",
            num_rows,
            by_scan.len(),
            file.path.display()
        );
        Ok(by_scan.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_tsv_reader_groups_by_scan() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp, "Scan\tRetentionTime\tMz\tIntensity").unwrap();
        writeln!(tmp, "1\t0.2\t400.0\t10.0").unwrap();
        writeln!(tmp, "0\t0.1\t400.0\t5.0").unwrap();
        writeln!(tmp, "1\t0.2\t401.0\t3.0").unwrap();
        tmp.flush().unwrap();

        let file = SpectraFileInfo::new(tmp.path(), "a", 0, 0, 0);
        let scans = TsvSpectraReader.read_ms1_scans(&file).unwrap();
        assert_eq!(scans.len(), 2);
        assert_eq!(scans[0].retention_time, 0.1);
        assert_eq!(scans[1].mz, vec![400.0, 401.0]);
    }

    #[test]
    fn test_missing_in_memory_file() {
        let spectra = InMemorySpectra::new();
        let file = SpectraFileInfo::new("nope.tsv", "a", 0, 0, 0);
        assert!(matches!(
            spectra.read_ms1_scans(&file),
            Err(IndexingError::MissingSpectra { .. })
        ));
    }
}
