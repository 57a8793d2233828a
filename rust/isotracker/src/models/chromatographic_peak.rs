use super::detection::{
    DetectionType,
    PeakResolution,
};
use super::identification::{
    Identification,
    join_protein_field,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use xicindex::utils::{
    ppm_error,
    to_mass,
    to_mz,
};
use xicindex::{
    IndexedPeak,
    SpectraFileInfo,
};

/// Signal of one isotope cluster at one point in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IsotopicEnvelope {
    /// The peak of the peak-finding isotope.
    pub peak: IndexedPeak,
    pub charge: i32,
    /// Summed (or single-isotope) intensity of the cluster.
    pub intensity: f64,
}

impl IsotopicEnvelope {
    pub fn new(peak: IndexedPeak, charge: i32, intensity: f64) -> Self {
        Self {
            peak,
            charge,
            intensity,
        }
    }

    fn same_signal(&self, other: &Self) -> bool {
        self.charge == other.charge && self.peak.key() == other.peak.key()
    }
}

pub const PEAK_TABLE_HEADER: [&str; 22] = [
    "File Name",
    "Base Sequence",
    "Full Sequence",
    "Protein Group",
    "Peptide Monoisotopic Mass",
    "MS2 Retention Time",
    "Precursor Charge",
    "Theoretical MZ",
    "Peak intensity",
    "Peak RT Start",
    "Peak RT Apex",
    "Peak RT End",
    "Peak MZ",
    "Peak Charge",
    "Num Charge States Observed",
    "Peak Detection Type",
    "MBR Score",
    "PSMs Mapped",
    "Base Sequences Mapped",
    "Full Sequences Mapped",
    "Peak Split Valley RT",
    "Peak Apex Mass Error (ppm)",
];

/// A chromatographic feature in one file, with the identifications it
/// has been attributed to.
#[derive(Debug, Clone)]
pub struct ChromatographicPeak {
    pub file: Arc<SpectraFileInfo>,
    pub identifications: Vec<Arc<Identification>>,
    pub envelopes: Vec<IsotopicEnvelope>,
    pub intensity: f64,
    pub apex: Option<IsotopicEnvelope>,
    pub detection_type: DetectionType,
    pub resolution: PeakResolution,
    pub split_rt: Option<f64>,
    pub mbr_score: Option<f64>,
    pub mass_error_ppm: Option<f64>,
    pub num_charge_states_observed: usize,
}

impl ChromatographicPeak {
    pub fn new(
        id: Arc<Identification>,
        file: Arc<SpectraFileInfo>,
        detection_type: DetectionType,
    ) -> Self {
        Self {
            file,
            identifications: vec![id],
            envelopes: Vec::new(),
            intensity: 0.0,
            apex: None,
            detection_type,
            resolution: PeakResolution::Unresolved,
            split_rt: None,
            mbr_score: None,
            mass_error_ppm: None,
            num_charge_states_observed: 0,
        }
    }

    pub fn with_identifications(mut self, ids: Vec<Arc<Identification>>) -> Self {
        self.identifications = ids;
        self
    }

    pub fn is_mbr(&self) -> bool {
        matches!(
            self.detection_type,
            DetectionType::MatchBetweenRuns | DetectionType::IsoTrackMbr
        )
    }

    /// Picks the apex envelope and recomputes the quantities derived from it.
    pub fn calculate_intensity(&mut self, integrate: bool) {
        let mut apex: Option<IsotopicEnvelope> = None;
        for env in self.envelopes.iter() {
            match apex {
                Some(curr) if curr.intensity >= env.intensity => {}
                _ => apex = Some(*env),
            }
        }
        self.apex = apex;
        self.intensity = match (integrate, apex) {
            (_, None) => 0.0,
            (true, Some(_)) => self.envelopes.iter().map(|x| x.intensity).sum(),
            (false, Some(a)) => a.intensity,
        };

        self.mass_error_ppm = apex.and_then(|a| {
            let observed = to_mass(a.peak.mz, a.charge);
            self.identifications
                .iter()
                .map(|id| ppm_error(observed, id.peakfinding_mass))
                .min_by(|x, y| x.abs().total_cmp(&y.abs()))
        });

        let charges: BTreeSet<i32> = self.envelopes.iter().map(|x| x.charge).collect();
        self.num_charge_states_observed = charges.len();
    }

    /// Absorbs another peak of the same file.
    ///
    /// Identifications and envelopes are unioned; the resolution only ever
    /// moves towards ambiguous.
    pub fn merge_with(&mut self, other: ChromatographicPeak, integrate: bool) {
        for id in other.identifications {
            if !self.identifications.iter().any(|x| Arc::ptr_eq(x, &id)) {
                self.identifications.push(id);
            }
        }
        for env in other.envelopes {
            if !self.envelopes.iter().any(|x| x.same_signal(&env)) {
                self.envelopes.push(env);
            }
        }
        if other.resolution == PeakResolution::MergedAmbiguous {
            self.resolution = PeakResolution::MergedAmbiguous;
        }
        self.calculate_intensity(integrate);
        self.resolution = self.resolution.resolve(self.num_full_sequences());
    }

    pub fn full_sequences(&self) -> BTreeSet<&str> {
        self.identifications
            .iter()
            .map(|x| x.modified_sequence.as_str())
            .collect()
    }

    pub fn base_sequences(&self) -> BTreeSet<&str> {
        self.identifications
            .iter()
            .map(|x| x.base_sequence.as_str())
            .collect()
    }

    pub fn num_full_sequences(&self) -> usize {
        self.full_sequences().len()
    }

    pub fn apex_retention_time(&self) -> Option<f64> {
        self.apex.map(|x| x.peak.retention_time)
    }

    pub fn rt_start(&self) -> Option<f64> {
        self.envelopes
            .iter()
            .map(|x| x.peak.retention_time)
            .min_by(|a, b| a.total_cmp(b))
    }

    pub fn rt_end(&self) -> Option<f64> {
        self.envelopes
            .iter()
            .map(|x| x.peak.retention_time)
            .max_by(|a, b| a.total_cmp(b))
    }

    pub fn scale_intensity(&mut self, factor: f64) {
        self.intensity *= factor;
        for env in self.envelopes.iter_mut() {
            env.intensity *= factor;
        }
        if let Some(apex) = self.apex.as_mut() {
            apex.intensity *= factor;
        }
    }

    pub fn to_row(&self) -> Vec<String> {
        let fmt_opt = |x: Option<f64>| x.map(|v| v.to_string()).unwrap_or_default();
        let first = self.identifications.first();

        let mut proteins = Vec::new();
        for id in self.identifications.iter() {
            proteins.extend(id.protein_groups.iter().cloned());
        }
        let masses: BTreeSet<String> = self
            .identifications
            .iter()
            .map(|x| x.monoisotopic_mass.to_string())
            .collect();
        let charges: BTreeSet<i32> = self
            .identifications
            .iter()
            .map(|x| x.precursor_charge)
            .collect();
        let ms2_rts = if self.detection_type == DetectionType::Msms
            || self.detection_type == DetectionType::MsmsAmbiguousPeakfinding
            || self.detection_type == DetectionType::IsoTrackMsms
        {
            self.identifications
                .iter()
                .filter(|x| x.file == self.file)
                .map(|x| x.ms2_retention_time.to_string())
                .collect::<Vec<_>>()
                .join("|")
        } else {
            String::new()
        };
        let theoretical_mz = first
            .map(|x| to_mz(x.peakfinding_mass, x.precursor_charge).to_string())
            .unwrap_or_default();

        vec![
            self.file.filename_without_extension(),
            self.base_sequences().into_iter().collect::<Vec<_>>().join("|"),
            self.full_sequences().into_iter().collect::<Vec<_>>().join("|"),
            join_protein_field(&proteins, |x| &x.name),
            masses.into_iter().collect::<Vec<_>>().join("|"),
            ms2_rts,
            charges
                .iter()
                .map(|x| x.to_string())
                .collect::<Vec<_>>()
                .join("|"),
            theoretical_mz,
            self.intensity.to_string(),
            fmt_opt(self.rt_start()),
            fmt_opt(self.apex_retention_time()),
            fmt_opt(self.rt_end()),
            fmt_opt(self.apex.map(|x| x.peak.mz)),
            self.apex.map(|x| x.charge.to_string()).unwrap_or_default(),
            self.num_charge_states_observed.to_string(),
            self.detection_type.to_string(),
            fmt_opt(self.mbr_score),
            self.identifications.len().to_string(),
            self.base_sequences().len().to_string(),
            self.full_sequences().len().to_string(),
            fmt_opt(self.split_rt),
            fmt_opt(self.mass_error_ppm),
        ]
    }
}
