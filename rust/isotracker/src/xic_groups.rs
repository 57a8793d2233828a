//! Cross-run grouping of the chromatograms of one isobaric target.
//!
//! All chromatograms are aligned to a reference, their extrema are pooled on
//! the reference timeline, and extrema seen in enough runs become the
//! boundaries of the shared peaks.

use crate::errors::{
    DataProcessingError,
    Result,
};
use crate::models::Identification;
use crate::xic::Xic;
use crate::xic::alignment::DEFAULT_MAX_RT_SHIFT;
use crate::xic::extrema::{
    Extremum,
    ExtremumKind,
    PeakRegion,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharedPeakSettings {
    /// Fraction of the runs an extremum has to be seen in to be shared.
    pub count_threshold: f64,
    /// Max distance (min) from the first extremum of a cluster.
    pub rt_tolerance: f64,
    /// Extrema below this intensity are ignored.
    pub intensity_cutoff: f64,
    pub trimming_window: f64,
    pub min_peak_width: f64,
    /// Largest alignment shift (min) searched between two runs.
    pub max_rt_shift: f64,
}

impl Default for SharedPeakSettings {
    fn default() -> Self {
        Self {
            count_threshold: 0.55,
            rt_tolerance: 0.10,
            intensity_cutoff: 30000.0,
            trimming_window: 0.3,
            min_peak_width: 0.3,
            max_rt_shift: DEFAULT_MAX_RT_SHIFT,
        }
    }
}

/// An identification moved onto the reference timeline.
#[derive(Debug, Clone)]
pub struct MovedIdentification {
    pub id: Arc<Identification>,
    pub rt_shift: f64,
}

impl MovedIdentification {
    pub fn moved_retention_time(&self) -> f64 {
        self.id.ms2_retention_time + self.rt_shift
    }
}

#[derive(Debug, Clone)]
pub struct XicGroups {
    xics: Vec<Xic>,
    reference_index: usize,
    rt_shifts: Vec<f64>,
    shared_extrema: Vec<Extremum>,
    extrema_in_ref: Vec<(f64, f64)>,
    shared_peaks: Vec<PeakRegion>,
    id_list: Vec<MovedIdentification>,
}

impl XicGroups {
    pub fn new(mut xics: Vec<Xic>, settings: &SharedPeakSettings) -> Result<Self> {
        let reference_index = xics.iter().position(|x| x.is_reference).ok_or(
            DataProcessingError::ExpectedSetField {
                field: "is_reference",
                context: "XicGroups::new needs one reference chromatogram".to_string(),
            },
        )?;

        let rt_shifts: Vec<f64> = {
            let reference = &xics[reference_index];
            xics.iter()
                .map(|x| x.alignment_shift(reference, settings.max_rt_shift))
                .collect()
        };
        for (xic, shift) in xics.iter_mut().zip(rt_shifts.iter()) {
            xic.set_rt_shift(*shift);
            xic.find_extrema();
        }

        let mut out = Self {
            xics,
            reference_index,
            rt_shifts,
            shared_extrema: Vec::new(),
            extrema_in_ref: Vec::new(),
            shared_peaks: Vec::new(),
            id_list: Vec::new(),
        };
        out.find_shared_extrema(settings);
        out.project_extrema_in_ref();
        out.build_shared_peaks(settings.min_peak_width);
        out.build_id_list();
        debug!(
            "Grouped {} chromatograms: {} shared extrema, {} shared peaks",
            out.xics.len(),
            out.shared_extrema.len(),
            out.shared_peaks.len()
        );
        Ok(out)
    }

    pub fn xics(&self) -> &[Xic] {
        &self.xics
    }

    pub fn reference(&self) -> &Xic {
        &self.xics[self.reference_index]
    }

    pub fn rt_shifts(&self) -> &[f64] {
        &self.rt_shifts
    }

    pub fn shared_extrema(&self) -> &[Extremum] {
        &self.shared_extrema
    }

    /// Shared extrema as (retention time, smoothed reference intensity).
    pub fn extrema_in_ref(&self) -> &[(f64, f64)] {
        &self.extrema_in_ref
    }

    pub fn shared_peaks(&self) -> &[PeakRegion] {
        &self.shared_peaks
    }

    pub fn id_list(&self) -> &[MovedIdentification] {
        &self.id_list
    }

    fn find_shared_extrema(&mut self, settings: &SharedPeakSettings) {
        let mut minima = Vec::new();
        let mut maxima = Vec::new();
        for (xic_idx, xic) in self.xics.iter().enumerate() {
            for extremum in xic.extrema() {
                if extremum.intensity < settings.intensity_cutoff {
                    continue;
                }
                match extremum.kind {
                    ExtremumKind::Minimum => minima.push((xic_idx, *extremum)),
                    ExtremumKind::Maximum => maxima.push((xic_idx, *extremum)),
                }
            }
        }

        let min_members = settings.count_threshold * self.xics.len() as f64;
        let mut shared = cluster_extrema(minima, settings.rt_tolerance, min_members);
        shared.extend(cluster_extrema(maxima, settings.rt_tolerance, min_members));
        shared.sort_by(|a, b| a.retention_time.total_cmp(&b.retention_time));
        self.shared_extrema = shared;
        self.trim_shared_extrema(settings.trimming_window);
    }

    // Of two consecutive extrema of the same kind close in time, the first is
    // dropped when the smoothed reference rises between two minima or falls
    // between two maxima. Otherwise both are kept.
    fn trim_shared_extrema(&mut self, window: f64) {
        let reference = &self.xics[self.reference_index];
        let mut i = 0;
        while i + 1 < self.shared_extrema.len() {
            let curr = self.shared_extrema[i];
            let next = self.shared_extrema[i + 1];
            let intensity = reference.smoothed_intensity(curr.retention_time);
            let intensity_next = reference.smoothed_intensity(next.retention_time);
            let within_window = next.retention_time - curr.retention_time < window;
            let same_min = curr.kind == ExtremumKind::Minimum && next.kind == curr.kind;
            let same_max = curr.kind == ExtremumKind::Maximum && next.kind == curr.kind;
            let goes_up = intensity_next > intensity;
            let goes_down = intensity_next < intensity;

            if within_window && ((same_min && goes_up) || (same_max && goes_down)) {
                self.shared_extrema.remove(i);
            } else {
                i += 1;
            }
        }
    }

    fn project_extrema_in_ref(&mut self) {
        let reference = &self.xics[self.reference_index];
        self.extrema_in_ref = self
            .shared_extrema
            .iter()
            .map(|x| (x.retention_time, reference.smoothed_intensity(x.retention_time)))
            .collect();
    }

    fn build_shared_peaks(&mut self, min_width: f64) {
        let extrema = &self.shared_extrema;
        let (Some(first), Some(last)) = (extrema.first(), extrema.last()) else {
            self.shared_peaks = Vec::new();
            return;
        };
        let default_start = first.retention_time - 1.0;
        let default_end = last.retention_time + 1.0;

        let mut peaks = Vec::new();
        for (i, extremum) in extrema.iter().enumerate() {
            if !extremum.is_maximum() {
                continue;
            }
            let start = match i.checked_sub(1).map(|j| extrema[j]) {
                Some(prev) if prev.kind == ExtremumKind::Minimum => prev.retention_time,
                Some(prev) => (extremum.retention_time + prev.retention_time) / 2.0,
                None => default_start,
            };
            let end = match extrema.get(i + 1) {
                Some(next) if next.kind == ExtremumKind::Minimum => next.retention_time,
                Some(next) => (extremum.retention_time + next.retention_time) / 2.0,
                None => default_end,
            };
            peaks.push(PeakRegion::new(extremum.retention_time, start, end));
        }
        peaks.retain(|x| x.width() >= min_width);
        self.shared_peaks = peaks;
    }

    fn build_id_list(&mut self) {
        self.id_list = self
            .xics
            .iter()
            .flat_map(|xic| {
                xic.own_ids().map(|id| MovedIdentification {
                    id: id.clone(),
                    rt_shift: xic.rt_shift(),
                })
            })
            .collect();
    }
}

// Greedy anchored clustering of extrema sorted by time: each cluster starts
// at the first unclustered extremum and takes everything within `tolerance`
// of it. A cluster is kept when enough distinct runs contribute to it; it is
// represented by its anchor. Runs are counted rather than extrema so that a
// noisy run with several nearby extrema cannot make a cluster shared alone.
fn cluster_extrema(
    mut extrema: Vec<(usize, Extremum)>,
    tolerance: f64,
    min_members: f64,
) -> Vec<Extremum> {
    extrema.sort_by(|a, b| a.1.retention_time.total_cmp(&b.1.retention_time));
    let mut out = Vec::new();
    let mut index = 0;
    while index < extrema.len() {
        let anchor = extrema[index].1;
        let mut members = BTreeSet::new();
        members.insert(extrema[index].0);
        let mut next = index + 1;
        while next < extrema.len()
            && extrema[next].1.retention_time - anchor.retention_time <= tolerance
        {
            members.insert(extrema[next].0);
            next += 1;
        }
        if members.len() as f64 >= min_members {
            out.push(anchor);
        }
        index = next;
    }
    out
}
