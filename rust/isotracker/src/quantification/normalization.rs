use crate::models::{
    ChromatographicPeak,
    DetectionType,
};
use crate::utils::median;
use std::collections::{
    BTreeMap,
    HashMap,
};
use std::sync::Arc;
use tracing::{
    info,
    warn,
};
use xicindex::SpectraFileInfo;

fn best_intensities(peaks: &[ChromatographicPeak]) -> HashMap<&str, f64> {
    let mut out: HashMap<&str, f64> = HashMap::new();
    for peak in peaks.iter() {
        if peak.detection_type != DetectionType::Msms
            || peak.num_full_sequences() != 1
            || peak.intensity <= 0.0
        {
            continue;
        }
        let Some(id) = peak.identifications.first() else {
            continue;
        };
        let entry = out.entry(id.modified_sequence.as_str()).or_insert(0.0);
        *entry = entry.max(peak.intensity);
    }
    out
}

/// Per-file intensity scaling factors relative to the first file.
///
/// Each factor is the median ratio between the first file and the given one
/// over the peptides both quantified from their own MS2 scans. Files sharing
/// nothing with the first one keep a factor of 1.
pub fn normalization_factors(
    peaks: &BTreeMap<Arc<SpectraFileInfo>, Vec<ChromatographicPeak>>,
) -> HashMap<Arc<SpectraFileInfo>, f64> {
    let mut out = HashMap::new();
    let mut files = peaks.iter();
    let Some((first_file, first_peaks)) = files.next() else {
        return out;
    };
    out.insert(first_file.clone(), 1.0);
    let reference = best_intensities(first_peaks);

    for (file, file_peaks) in files {
        let ratios: Vec<f64> = best_intensities(file_peaks)
            .iter()
            .filter_map(|(seq, intensity)| reference.get(seq).map(|r| r / intensity))
            .collect();
        let factor = match median(&ratios) {
            Some(x) if x.is_finite() && x > 0.0 => x,
            _ => {
                warn!(
                    "No peptides shared between {} and {}, leaving it unnormalized",
                    file, first_file
                );
                1.0
            }
        };
        info!("Normalization factor for {}: {:.4}", file, factor);
        out.insert(file.clone(), factor);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Identification,
        IsotopicEnvelope,
    };
    use xicindex::{
        IndexedPeak,
        ScanIndex,
    };

    fn peak(file: &Arc<SpectraFileInfo>, seq: &str, intensity: f64) -> ChromatographicPeak {
        let id = Arc::new(Identification::new(file.clone(), seq, seq, 900.0, 10.0, 2, vec![]));
        let mut peak = ChromatographicPeak::new(id, file.clone(), DetectionType::Msms);
        peak.envelopes = vec![IsotopicEnvelope::new(
            IndexedPeak {
                mz: 451.0,
                intensity,
                scan_index: ScanIndex::new(0),
                retention_time: 10.0,
            },
            2,
            intensity,
        )];
        peak.calculate_intensity(false);
        peak
    }

    #[test]
    fn test_factors_are_median_ratios() {
        let a = Arc::new(SpectraFileInfo::new("a.mzML", "a", 0, 0, 0));
        let b = Arc::new(SpectraFileInfo::new("b.mzML", "a", 1, 0, 0));
        let c = Arc::new(SpectraFileInfo::new("c.mzML", "a", 2, 0, 0));
        let mut peaks = BTreeMap::new();
        peaks.insert(
            a.clone(),
            vec![peak(&a, "AAAK", 100.0), peak(&a, "CCCK", 200.0), peak(&a, "DDDK", 400.0)],
        );
        peaks.insert(
            b.clone(),
            vec![peak(&b, "AAAK", 50.0), peak(&b, "CCCK", 100.0), peak(&b, "DDDK", 800.0)],
        );
        peaks.insert(c.clone(), vec![peak(&c, "EEEK", 100.0)]);

        let factors = normalization_factors(&peaks);
        assert_eq!(factors[&a], 1.0);
        assert_eq!(factors[&b], 2.0);
        assert_eq!(factors[&c], 1.0);
    }
}
