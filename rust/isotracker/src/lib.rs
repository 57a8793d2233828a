//! Label-free MS1 quantification of peptide identifications, with tracking
//! of isobaric peptides across runs.
//!
//! The entry point is [`QuantificationEngine`]: give it identifications and
//! settings, run it over a [`xicindex::SpectraSource`] and write the
//! resulting tables with [`write_results`].

// Declare modules
pub mod errors;
pub mod isobaric;
pub mod isotopes;
pub mod models;
pub mod output;
pub mod quantification;
pub mod results;
pub mod serde;
pub mod utils;
pub mod xic;
pub mod xic_groups;

// Re-export main structures
pub use crate::isobaric::IsobaricPeptideGroup;
pub use crate::models::{
    ChromatographicPeak,
    DetectionType,
    Identification,
    Peptide,
    ProteinGroup,
};
pub use crate::output::write_results;
pub use crate::quantification::{
    EngineSettings,
    IsoTrackerSettings,
    QuantificationEngine,
};
pub use crate::results::{
    ProteinQuant,
    QuantificationResults,
};
pub use crate::serde::read_identifications;

// Re-export errors
pub use crate::errors::{
    ConfigurationError,
    DataProcessingError,
    IsoTrackerError,
};

pub use xicindex;
