use crate::models::{
    ChromatographicPeak,
    DetectionType,
    PeakResolution,
};
use std::collections::HashMap;
use tracing::debug;
use xicindex::ScanIndex;

/// Reconciles the peaks of one file so no two claim the same apex.
///
/// MS2 peaks sharing an apex are merged. A match-between-runs peak never
/// displaces an MS2 peak; two of them sharing an apex are merged when they
/// are the same peptide and otherwise the higher scoring one is kept. Merged
/// peaks claimed by several sequences become ambiguous.
pub fn run_error_checking(
    peaks: Vec<ChromatographicPeak>,
    integrate: bool,
) -> Vec<ChromatographicPeak> {
    let num_in = peaks.len();
    let mut peaks: Vec<ChromatographicPeak> = peaks
        .into_iter()
        .filter(|x| !(x.is_mbr() && x.envelopes.is_empty()))
        .collect();
    // Stable: MS2 peaks claim their apex before any transferred peak is seen.
    peaks.sort_by_key(|x| x.is_mbr());

    let mut no_apex = Vec::new();
    let mut kept: Vec<ChromatographicPeak> = Vec::new();
    let mut by_apex: HashMap<(ScanIndex, u64), usize> = HashMap::new();
    for mut peak in peaks {
        peak.calculate_intensity(integrate);
        peak.resolution = peak.resolution.resolve(peak.num_full_sequences());
        let Some(apex) = peak.apex else {
            if !peak.is_mbr() {
                no_apex.push(peak);
            }
            continue;
        };

        let key = apex.peak.key();
        let Some(&slot) = by_apex.get(&key) else {
            by_apex.insert(key, kept.len());
            kept.push(peak);
            continue;
        };
        let stored = &mut kept[slot];
        match (stored.is_mbr(), peak.is_mbr()) {
            (false, false) => stored.merge_with(peak, integrate),
            (true, true) => {
                let same_peptide = stored.identifications.first().map(|x| &x.modified_sequence)
                    == peak.identifications.first().map(|x| &x.modified_sequence);
                if same_peptide {
                    stored.merge_with(peak, integrate);
                } else if peak.mbr_score.unwrap_or(0.0) > stored.mbr_score.unwrap_or(0.0) {
                    *stored = peak;
                }
            }
            _ => {}
        }
    }

    for peak in kept.iter_mut() {
        if peak.resolution == PeakResolution::MergedAmbiguous && !peak.is_mbr() {
            peak.detection_type = DetectionType::MsmsAmbiguousPeakfinding;
        }
    }

    no_apex.extend(kept);
    debug!("Error checking kept {} of {} peaks", no_apex.len(), num_in);
    no_apex
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Identification,
        IsotopicEnvelope,
    };
    use std::sync::Arc;
    use xicindex::{
        IndexedPeak,
        SpectraFileInfo,
    };

    fn file() -> Arc<SpectraFileInfo> {
        Arc::new(SpectraFileInfo::new("a.mzML", "a", 0, 0, 0))
    }

    fn peak(seq: &str, detection: DetectionType, apex_scan: u32, intensity: f64) -> ChromatographicPeak {
        let id = Arc::new(Identification::new(file(), "PEPTIDEK", seq, 900.0, 10.0, 2, vec![]));
        let mut peak = ChromatographicPeak::new(id, file(), detection);
        peak.envelopes = vec![IsotopicEnvelope::new(
            IndexedPeak {
                mz: 451.0,
                intensity,
                scan_index: ScanIndex::new(apex_scan),
                retention_time: 10.0,
            },
            2,
            intensity,
        )];
        peak
    }

    #[test]
    fn test_ms2_peaks_sharing_an_apex_merge() {
        let out = run_error_checking(
            vec![
                peak("PEPTIDEK", DetectionType::Msms, 3, 100.0),
                peak("PEPTIDKE", DetectionType::Msms, 3, 100.0),
                peak("PEPTIDEK", DetectionType::Msms, 9, 50.0),
            ],
            false,
        );
        assert_eq!(out.len(), 2);
        let merged = out.iter().find(|x| x.identifications.len() == 2).unwrap();
        assert_eq!(merged.resolution, PeakResolution::MergedAmbiguous);
        assert_eq!(merged.detection_type, DetectionType::MsmsAmbiguousPeakfinding);
        assert_eq!(merged.envelopes.len(), 1);
    }

    #[test]
    fn test_mbr_never_displaces_ms2() {
        let mut mbr = peak("OTHERK", DetectionType::MatchBetweenRuns, 3, 100.0);
        mbr.mbr_score = Some(0.9);
        let out = run_error_checking(
            vec![mbr, peak("PEPTIDEK", DetectionType::Msms, 3, 100.0)],
            false,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].detection_type, DetectionType::Msms);
    }

    #[test]
    fn test_best_scoring_mbr_wins() {
        let mut low = peak("AAAK", DetectionType::MatchBetweenRuns, 3, 100.0);
        low.mbr_score = Some(0.2);
        let mut high = peak("CCCK", DetectionType::MatchBetweenRuns, 3, 100.0);
        high.mbr_score = Some(0.8);
        let mut empty = peak("DDDK", DetectionType::MatchBetweenRuns, 5, 100.0);
        empty.envelopes.clear();
        let mut unquantified = peak("EEEK", DetectionType::Msms, 5, 100.0);
        unquantified.envelopes.clear();

        let out = run_error_checking(vec![low, high, empty, unquantified], false);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].identifications[0].modified_sequence, "EEEK");
        assert_eq!(out[1].identifications[0].modified_sequence, "CCCK");
    }
}
