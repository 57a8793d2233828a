pub mod errors;
pub mod indexing;
pub mod rt_mapping;
pub mod source;
pub mod spectra_file;
pub mod tolerance;
pub mod utils;

#[doc(inline)]
pub use crate::errors::{
    IndexingError,
    ToleranceError,
};
#[doc(inline)]
pub use crate::indexing::{
    IndexBuildingStats,
    IndexedPeak,
    Ms1Scan,
    PeakIndexingEngine,
    XicQuery,
};
#[doc(inline)]
pub use crate::rt_mapping::{
    ScanIndex,
    ScanToRtMapping,
};
#[doc(inline)]
pub use crate::source::{
    InMemorySpectra,
    SpectraSource,
    TsvSpectraReader,
};
#[doc(inline)]
pub use crate::spectra_file::SpectraFileInfo;
#[doc(inline)]
pub use crate::tolerance::MzTolerance;
