use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToleranceError {
    #[error("Tolerance has to be strictly positive, got {0}")]
    NonPositive(f64),
    #[error("Tolerance has to be finite, got {0}")]
    NotFinite(f64),
}

#[derive(Error, Debug)]
pub enum IndexingError {
    #[error("Invalid tolerance: {0}")]
    InvalidTolerance(#[from] ToleranceError),
    #[error("No MS1 scans found in {path:?}")]
    NoScans { path: PathBuf },
    #[error("Non-finite {field} in scan {scan}")]
    NonFiniteValue { scan: usize, field: &'static str },
    #[error("Scan {scan} has {num_mz} m/z values but {num_intensity} intensities")]
    MismatchedLengths {
        scan: usize,
        num_mz: usize,
        num_intensity: usize,
    },
    #[error("Retention times are not sorted")]
    UnsortedRetentionTimes,
    #[error("Scan index {index} out of bounds for {num_scans} scans")]
    ScanOutOfBounds { index: u32, num_scans: usize },
    #[error("No spectra registered for {path:?}")]
    MissingSpectra { path: PathBuf },
    #[error("Error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Error parsing spectra table: {0}")]
    Csv(#[from] csv::Error),
}
