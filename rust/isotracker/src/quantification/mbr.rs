//! Match-between-runs: transfers identifications to runs that did not
//! identify them, at a retention time predicted from the runs that did.

use super::peakfinding::{
    PeakFinder,
    cut_peak,
};
use crate::errors::{
    DataProcessingError,
    Result,
};
use crate::models::{
    ChromatographicPeak,
    DetectionType,
    Identification,
};
use crate::utils::median;
use std::collections::{
    BTreeMap,
    HashMap,
    HashSet,
};
use std::sync::Arc;
use tracing::debug;
use xicindex::utils::TupleRange;
use xicindex::{
    MzTolerance,
    SpectraFileInfo,
};

#[derive(Debug, Clone, Copy)]
pub struct MbrSettings {
    pub ppm_tolerance: f64,
    /// Full width (min) of the window searched around the predicted time.
    pub rt_window: f64,
    pub require_msms_id_in_condition: bool,
}

fn is_donor(peak: &ChromatographicPeak) -> bool {
    peak.detection_type == DetectionType::Msms
        && peak.num_full_sequences() == 1
        && peak.intensity > 0.0
        && peak.apex.is_some()
}

// Apex time of the most intense donor-grade peak of each sequence.
fn best_apexes(peaks: &[ChromatographicPeak]) -> HashMap<&str, (f64, f64)> {
    let mut out: HashMap<&str, (f64, f64)> = HashMap::new();
    for peak in peaks.iter().filter(|x| is_donor(x)) {
        let (Some(id), Some(apex_rt)) = (peak.identifications.first(), peak.apex_retention_time())
        else {
            continue;
        };
        let entry = out
            .entry(id.modified_sequence.as_str())
            .or_insert((peak.intensity, apex_rt));
        if peak.intensity > entry.0 {
            *entry = (peak.intensity, apex_rt);
        }
    }
    out
}

/// Median retention time difference (acceptor minus donor) over the
/// sequences both runs quantified from their own MS2 scans. Zero when they
/// share none.
pub fn rt_offset(donor: &[ChromatographicPeak], acceptor: &[ChromatographicPeak]) -> f64 {
    let donor_apexes = best_apexes(donor);
    let acceptor_apexes = best_apexes(acceptor);
    let diffs: Vec<f64> = acceptor_apexes
        .iter()
        .filter_map(|(seq, (_, rt))| donor_apexes.get(seq).map(|(_, d)| rt - d))
        .collect();
    median(&diffs).unwrap_or(0.0)
}

/// Confidence in a transferred peak, between 0 and 1.
///
/// Falls linearly with the distance of the apex from the predicted time
/// (zero at the window edge) and with the mass error (zero at the tolerance).
pub fn mbr_score(
    apex_rt: f64,
    predicted_rt: f64,
    half_window: f64,
    mass_error_ppm: f64,
    ppm_tolerance: f64,
) -> f64 {
    let rt_score = (1.0 - (apex_rt - predicted_rt).abs() / half_window).max(0.0);
    let mass_score = (1.0 - mass_error_ppm.abs() / ppm_tolerance).max(0.0);
    rt_score * mass_score
}

/// Searches the run indexed by `finder` for every sequence quantified from
/// MS2 elsewhere but not identified in this run.
pub fn find_mbr_peaks(
    finder: &PeakFinder<'_>,
    peaks: &BTreeMap<Arc<SpectraFileInfo>, Vec<ChromatographicPeak>>,
    ids: &[Arc<Identification>],
    settings: &MbrSettings,
) -> Result<Vec<ChromatographicPeak>> {
    let acceptor = finder.file();
    let identified_here: HashSet<&str> = ids
        .iter()
        .filter(|x| x.file == *acceptor)
        .map(|x| x.modified_sequence.as_str())
        .collect();
    let identified_in_condition: HashSet<&str> = ids
        .iter()
        .filter(|x| x.file.condition == acceptor.condition)
        .map(|x| x.modified_sequence.as_str())
        .collect();

    let mut donors: BTreeMap<&str, &ChromatographicPeak> = BTreeMap::new();
    for (file, file_peaks) in peaks.iter() {
        if file == acceptor {
            continue;
        }
        for peak in file_peaks.iter().filter(|x| is_donor(x)) {
            let Some(id) = peak.identifications.first() else {
                continue;
            };
            let seq = id.modified_sequence.as_str();
            if identified_here.contains(seq) {
                continue;
            }
            if settings.require_msms_id_in_condition && !identified_in_condition.contains(seq) {
                continue;
            }
            let best = donors.entry(seq).or_insert(peak);
            if peak.intensity > best.intensity {
                *best = peak;
            }
        }
    }

    let tolerance = MzTolerance::Ppm(settings.ppm_tolerance);
    let half_window = settings.rt_window / 2.0;
    let acceptor_peaks = peaks.get(acceptor).map_or(&[][..], Vec::as_slice);
    let mut offsets: HashMap<&Arc<SpectraFileInfo>, f64> = HashMap::new();
    let mut out = Vec::new();
    for donor in donors.into_values() {
        let (Some(apex), Some(id)) = (donor.apex, donor.identifications.first()) else {
            continue;
        };
        let offset = *offsets.entry(&donor.file).or_insert_with(|| {
            let donor_peaks = peaks.get(&donor.file).map_or(&[][..], Vec::as_slice);
            rt_offset(donor_peaks, acceptor_peaks)
        });
        let predicted_rt = apex.peak.retention_time + offset;
        let window = TupleRange::try_new(predicted_rt - half_window, predicted_rt + half_window)
            .map_err(|_| DataProcessingError::ExpectedFiniteNonNanData {
                context: format!("match-between-runs window around {}", predicted_rt),
            })?;

        let xic = finder
            .index
            .get_xic_in_window(id.peakfinding_mass, apex.charge, &tolerance, window)?;
        let envelopes = finder.isotopic_envelopes(&xic, id, apex.charge)?;
        if envelopes.is_empty() {
            continue;
        }

        let mut peak =
            ChromatographicPeak::new(id.clone(), acceptor.clone(), DetectionType::MatchBetweenRuns);
        peak.envelopes = envelopes;
        peak.calculate_intensity(finder.integrate);
        cut_peak(
            &mut peak,
            predicted_rt,
            finder.discrimination_factor,
            finder.integrate,
        );
        if let (Some(apex_rt), Some(ppm)) = (peak.apex_retention_time(), peak.mass_error_ppm) {
            peak.mbr_score = Some(mbr_score(
                apex_rt,
                predicted_rt,
                half_window,
                ppm,
                settings.ppm_tolerance,
            ));
        }
        out.push(peak);
    }
    debug!("Transferred {} peaks into {}", out.len(), acceptor);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IsotopicEnvelope;
    use xicindex::{
        IndexedPeak,
        ScanIndex,
    };

    fn file(name: &str) -> Arc<SpectraFileInfo> {
        Arc::new(SpectraFileInfo::new(name, "a", 0, 0, 0))
    }

    fn msms_peak(file: &Arc<SpectraFileInfo>, seq: &str, apex_rt: f64) -> ChromatographicPeak {
        let id = Arc::new(Identification::new(file.clone(), seq, seq, 900.0, apex_rt, 2, vec![]));
        let mut peak = ChromatographicPeak::new(id, file.clone(), DetectionType::Msms);
        peak.envelopes = vec![IsotopicEnvelope::new(
            IndexedPeak {
                mz: 451.0,
                intensity: 1e5,
                scan_index: ScanIndex::new(0),
                retention_time: apex_rt,
            },
            2,
            1e5,
        )];
        peak.calculate_intensity(false);
        peak
    }

    #[test]
    fn test_rt_offset_is_median_of_shared_sequences() {
        let a = file("a.mzML");
        let b = file("b.mzML");
        let donor = vec![
            msms_peak(&a, "AAAK", 10.0),
            msms_peak(&a, "CCCK", 20.0),
            msms_peak(&a, "DDDK", 30.0),
            msms_peak(&a, "EEEK", 40.0),
        ];
        let acceptor = vec![
            msms_peak(&b, "AAAK", 10.5),
            msms_peak(&b, "CCCK", 20.4),
            msms_peak(&b, "DDDK", 32.0),
        ];
        assert!((rt_offset(&donor, &acceptor) - 0.5).abs() < 1e-9);
        assert_eq!(rt_offset(&donor, &[]), 0.0);
    }

    #[test]
    fn test_mbr_score() {
        assert_eq!(mbr_score(10.0, 10.0, 1.25, 0.0, 10.0), 1.0);
        assert!((mbr_score(10.5, 10.0, 1.0, 5.0, 10.0) - 0.25).abs() < 1e-12);
        assert_eq!(mbr_score(12.0, 10.0, 1.0, 0.0, 10.0), 0.0);
        assert_eq!(mbr_score(10.0, 10.0, 1.0, -20.0, 10.0), 0.0);
    }
}
