mod chromatographic_peak;
mod detection;
mod identification;
mod peptide;

pub use chromatographic_peak::{
    ChromatographicPeak,
    IsotopicEnvelope,
    PEAK_TABLE_HEADER,
};
pub use detection::{
    DetectionType,
    PeakResolution,
};
pub use identification::{
    Identification,
    ProteinGroup,
};
pub(crate) use identification::join_protein_field;
pub use peptide::Peptide;
