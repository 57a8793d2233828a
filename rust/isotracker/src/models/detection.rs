use serde::{
    Deserialize,
    Serialize,
};
use std::fmt::Display;

/// How a quantity in a given file came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetectionType {
    /// Peak found around an MS2 identification in the same file.
    Msms,
    /// Peak transferred from another file by match-between-runs.
    MatchBetweenRuns,
    /// Isobaric peak backed by an identification in this file.
    IsoTrackMsms,
    /// Isobaric peak with identifications only in other files.
    IsoTrackMbr,
    /// Isobaric peak claimed by more than one modified form.
    IsoTrackAmbiguous,
    /// Peak shared by several peptides; its quantity is not attributable.
    MsmsAmbiguousPeakfinding,
    MsmsIdentifiedButNotQuantified,
    NotDetected,
}

impl DetectionType {
    pub fn is_isotrack(&self) -> bool {
        matches!(
            self,
            DetectionType::IsoTrackMsms
                | DetectionType::IsoTrackMbr
                | DetectionType::IsoTrackAmbiguous
        )
    }

    /// The tag shown at peptide level.
    ///
    /// An isobaric peak that has its own identification reads as a plain
    /// MS2 detection; every other kind is shown as is.
    pub fn peptide_level(&self) -> Self {
        match self {
            DetectionType::IsoTrackMsms => DetectionType::Msms,
            other => *other,
        }
    }
}

impl Display for DetectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DetectionType::Msms => "MSMS",
            DetectionType::MatchBetweenRuns => "MBR",
            DetectionType::IsoTrackMsms => "IsoTrack_MSMS",
            DetectionType::IsoTrackMbr => "IsoTrack_MBR",
            DetectionType::IsoTrackAmbiguous => "IsoTrack_Ambiguous",
            DetectionType::MsmsAmbiguousPeakfinding => "MSMSAmbiguousPeakfinding",
            DetectionType::MsmsIdentifiedButNotQuantified => "MSMSIdentifiedButNotQuantified",
            DetectionType::NotDetected => "NotDetected",
        };
        write!(f, "{}", s)
    }
}

/// Whether the identity of a peak has been settled.
///
/// A peak only moves forward: once merged into an ambiguous peak it never
/// goes back to a resolved state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PeakResolution {
    #[default]
    Unresolved,
    Resolved,
    MergedAmbiguous,
}

impl PeakResolution {
    pub fn resolve(self, num_distinct_sequences: usize) -> Self {
        match self {
            PeakResolution::MergedAmbiguous => PeakResolution::MergedAmbiguous,
            _ if num_distinct_sequences > 1 => PeakResolution::MergedAmbiguous,
            _ => PeakResolution::Resolved,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_tags() {
        assert_eq!(DetectionType::IsoTrackAmbiguous.to_string(), "IsoTrack_Ambiguous");
        assert_eq!(DetectionType::MatchBetweenRuns.to_string(), "MBR");
        assert_eq!(
            DetectionType::MsmsAmbiguousPeakfinding.to_string(),
            "MSMSAmbiguousPeakfinding"
        );
    }

    #[test]
    fn test_peptide_level_tags() {
        assert_eq!(DetectionType::IsoTrackMsms.peptide_level(), DetectionType::Msms);
        assert_eq!(
            DetectionType::IsoTrackMbr.peptide_level(),
            DetectionType::IsoTrackMbr
        );
    }

    #[test]
    fn test_resolution_never_goes_back() {
        let merged = PeakResolution::Unresolved.resolve(2);
        assert_eq!(merged, PeakResolution::MergedAmbiguous);
        assert_eq!(merged.resolve(1), PeakResolution::MergedAmbiguous);
        assert_eq!(PeakResolution::Unresolved.resolve(1), PeakResolution::Resolved);
    }
}
