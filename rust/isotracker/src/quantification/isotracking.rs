//! Tracking of isobaric peptide groups across runs.
//!
//! For every group a chromatogram of the shared precursor is extracted in
//! every run, the chromatograms are aligned and the peaks seen in most runs
//! become the regions the group is quantified in.

use crate::errors::{
    DataProcessingError,
    Result,
};
use crate::isobaric::IsobaricPeptideGroup;
use crate::models::{
    ChromatographicPeak,
    DetectionType,
    Identification,
    IsotopicEnvelope,
    PeakResolution,
};
use crate::xic::Xic;
use crate::xic::extrema::PeakRegion;
use crate::xic_groups::{
    SharedPeakSettings,
    XicGroups,
};
use std::collections::{
    BTreeMap,
    BTreeSet,
};
use std::sync::Arc;
use tracing::{
    debug,
    warn,
};
use xicindex::utils::{
    TupleRange,
    to_mz,
};
use xicindex::{
    IndexedPeak,
    MzTolerance,
    PeakIndexingEngine,
    ScanIndex,
    SpectraFileInfo,
};

#[derive(Debug, Clone)]
pub struct IsoTrackingSettings {
    pub tolerance: MzTolerance,
    pub xic_rt_padding: f64,
    pub integrate: bool,
    pub shared_peaks: SharedPeakSettings,
}

/// One shared region and the peak found in it in each run.
#[derive(Debug, Clone)]
pub struct TrackedPeak {
    /// On the reference timeline.
    pub region: PeakRegion,
    /// Identifications falling in the region once aligned.
    pub identifications: Vec<Arc<Identification>>,
    pub peaks: Vec<ChromatographicPeak>,
}

impl TrackedPeak {
    /// Modified sequences of the region, sorted and distinct.
    pub fn modified_sequences(&self) -> BTreeSet<&str> {
        self.identifications
            .iter()
            .map(|x| x.modified_sequence.as_str())
            .collect()
    }

    pub fn peak_in(&self, file: &Arc<SpectraFileInfo>) -> Option<&ChromatographicPeak> {
        self.peaks.iter().find(|x| x.file == *file)
    }
}

/// The result of tracking one isobaric group.
#[derive(Debug, Clone)]
pub struct IsobaricPeakGroup {
    pub group: IsobaricPeptideGroup,
    pub rt_shifts: Vec<(Arc<SpectraFileInfo>, f64)>,
    /// Ordered by apex time.
    pub tracked_peaks: Vec<TrackedPeak>,
}

impl IsobaricPeakGroup {
    pub fn base_sequence(&self) -> &str {
        &self.group.base_sequence
    }

    pub fn rt_shift(&self, file: &Arc<SpectraFileInfo>) -> Option<f64> {
        self.rt_shifts
            .iter()
            .find(|(f, _)| f == file)
            .map(|(_, s)| *s)
    }
}

// Window covering every identification of the group, padded on both sides.
fn extraction_window(group: &IsobaricPeptideGroup, padding: f64) -> Result<TupleRange<f64>> {
    let (lo, hi) = group
        .members()
        .iter()
        .map(|x| x.ms2_retention_time)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), rt| {
            (lo.min(rt), hi.max(rt))
        });
    TupleRange::try_new(lo - padding, hi + padding).map_err(|_| {
        DataProcessingError::ExpectedFiniteNonNanData {
            context: format!("extraction window of {}", group.base_sequence),
        }
        .into()
    })
}

/// The chromatogram of one run, with a zero-intensity point for every scan
/// in the window that has no matching peak. Scans sharing a retention time
/// collapse into their most intense point.
///
/// `None` when the run has no signal at all in the window.
fn extract_filled_xic(
    index: &PeakIndexingEngine,
    mass: f64,
    charge: i32,
    tolerance: &MzTolerance,
    window: TupleRange<f64>,
) -> Result<Option<Vec<IndexedPeak>>> {
    let found = index.get_xic_in_window(mass, charge, tolerance, window)?;
    if found.is_empty() {
        return Ok(None);
    }
    let target_mz = to_mz(mass, charge);
    let rts = index.scan_to_rt().retention_times();
    let mut found = found.into_iter().peekable();
    let mut out = Vec::new();
    for scan in index.scan_to_rt().scans_in_range(window) {
        let scan_index = ScanIndex::new(scan as u32);
        match found.next_if(|x| x.scan_index == scan_index) {
            Some(peak) => out.push(peak),
            None => out.push(IndexedPeak {
                mz: target_mz,
                intensity: 0.0,
                scan_index,
                retention_time: rts[scan],
            }),
        }
    }
    out.dedup_by(|later, kept| {
        if later.retention_time != kept.retention_time {
            return false;
        }
        if later.intensity > kept.intensity {
            *kept = *later;
        }
        true
    });
    if out.len() < 2 {
        return Ok(None);
    }
    Ok(Some(out))
}

/// Tracks one isobaric group over the runs that have an index.
///
/// Returns `None` when no shared region holds a peak.
pub fn track_group(
    group: &IsobaricPeptideGroup,
    indices: &BTreeMap<Arc<SpectraFileInfo>, PeakIndexingEngine>,
    settings: &IsoTrackingSettings,
) -> Result<Option<IsobaricPeakGroup>> {
    let charge = group.dominant_charge();
    let mass = group.peakfinding_mass();
    let window = extraction_window(group, settings.xic_rt_padding)?;

    // Runs without an identification of their own borrow those of the run
    // with the most.
    let lender: Vec<Arc<Identification>> = indices
        .keys()
        .map(|f| group.ids_in_file(f).cloned().collect::<Vec<_>>())
        .fold(Vec::new(), |best, ids| if ids.len() > best.len() { ids } else { best });

    let mut candidates = Vec::new();
    for (file, index) in indices.iter() {
        let Some(peaks) = extract_filled_xic(index, mass, charge, &settings.tolerance, window)?
        else {
            continue;
        };
        let own: Vec<Arc<Identification>> = group.ids_in_file(file).cloned().collect();
        let ids = if own.is_empty() { lender.clone() } else { own };
        candidates.push((file.clone(), peaks, ids));
    }
    if candidates.is_empty() {
        return Ok(None);
    }

    let target_mz = to_mz(mass, charge);
    let mut xics = Vec::with_capacity(candidates.len());
    for (file, peaks, ids) in candidates {
        match Xic::new(peaks, target_mz, file.clone(), false, ids) {
            Ok(xic) => xics.push(xic),
            Err(e) => warn!(
                "{}: dropping the chromatogram of {}: {}",
                group.base_sequence, file, e
            ),
        }
    }
    if xics.is_empty() {
        return Ok(None);
    }

    // The reference is the first run with the most identifications of its own.
    let mut reference_pos = 0;
    for (i, xic) in xics.iter().enumerate() {
        if xic.num_own_ids() > xics[reference_pos].num_own_ids() {
            reference_pos = i;
        }
    }
    xics[reference_pos].is_reference = true;

    let groups = XicGroups::new(xics, &settings.shared_peaks)?;

    let mut tracked_peaks = Vec::new();
    for region in groups.shared_peaks() {
        let mut region_ids: Vec<Arc<Identification>> = Vec::new();
        for moved in groups.id_list() {
            if region.contains(moved.moved_retention_time())
                && !region_ids.iter().any(|x| Arc::ptr_eq(x, &moved.id))
            {
                region_ids.push(moved.id.clone());
            }
        }
        let Some(first_id) = region_ids.first().cloned() else {
            debug!(
                "{}: no identification in region at {:.2}, dropped",
                group.base_sequence, region.apex_rt
            );
            continue;
        };
        let num_sequences = region_ids
            .iter()
            .map(|x| x.modified_sequence.as_str())
            .collect::<BTreeSet<_>>()
            .len();

        let mut peaks = Vec::new();
        for xic in groups.xics() {
            let run_region = region.in_run_time(xic.rt_shift());
            let envelopes: Vec<IsotopicEnvelope> = xic
                .peaks()
                .iter()
                .filter(|x| x.intensity > 0.0 && run_region.contains(x.retention_time))
                .map(|x| IsotopicEnvelope::new(*x, charge, x.intensity))
                .collect();
            if envelopes.is_empty() {
                continue;
            }
            let detection_type = if num_sequences > 1 {
                DetectionType::IsoTrackAmbiguous
            } else if xic
                .own_ids()
                .any(|x| run_region.contains(x.ms2_retention_time))
            {
                DetectionType::IsoTrackMsms
            } else {
                DetectionType::IsoTrackMbr
            };
            let mut peak = ChromatographicPeak::new(first_id.clone(), xic.file().clone(), detection_type)
                .with_identifications(region_ids.clone());
            peak.envelopes = envelopes;
            peak.calculate_intensity(settings.integrate);
            peak.resolution = PeakResolution::Unresolved.resolve(num_sequences);
            peaks.push(peak);
        }
        if !peaks.is_empty() {
            tracked_peaks.push(TrackedPeak {
                region: *region,
                identifications: region_ids,
                peaks,
            });
        }
    }

    if tracked_peaks.is_empty() {
        return Ok(None);
    }
    tracked_peaks.sort_by(|a, b| a.region.apex_rt.total_cmp(&b.region.apex_rt));
    let rt_shifts = groups
        .xics()
        .iter()
        .map(|x| (x.file().clone(), x.rt_shift()))
        .collect();
    Ok(Some(IsobaricPeakGroup {
        group: group.clone(),
        rt_shifts,
        tracked_peaks,
    }))
}
