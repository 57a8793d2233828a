//! Roll-up of per-file peaks into peptide and protein quantities.

use crate::models::{
    ChromatographicPeak,
    DetectionType,
    Identification,
    Peptide,
    ProteinGroup,
};
use crate::quantification::isotracking::IsobaricPeakGroup;
use std::collections::{
    BTreeMap,
    BTreeSet,
    HashMap,
};
use std::sync::Arc;
use tracing::debug;
use xicindex::SpectraFileInfo;

/// Share of a peptide's signal an ambiguous peak has to carry before the
/// peptide is reported as ambiguous.
const AMBIGUOUS_FRACTION_CUTOFF: f64 = 0.3;

/// Peptides making up the protein quantity.
const TOP_N_PEPTIDES: usize = 3;

#[derive(Debug, Clone)]
pub struct ProteinQuant {
    pub protein_group: Arc<ProteinGroup>,
    intensities: HashMap<Arc<SpectraFileInfo>, f64>,
}

impl ProteinQuant {
    pub fn new(protein_group: Arc<ProteinGroup>) -> Self {
        Self {
            protein_group,
            intensities: HashMap::new(),
        }
    }

    pub fn intensity(&self, file: &Arc<SpectraFileInfo>) -> f64 {
        self.intensities.get(file).copied().unwrap_or(0.0)
    }

    pub fn table_header(files: &[Arc<SpectraFileInfo>]) -> Vec<String> {
        let mut out: Vec<String> = ["Protein Groups", "Gene Name", "Organism"]
            .iter()
            .map(|x| x.to_string())
            .collect();
        for file in files {
            out.push(format!("Intensity_{}", file.filename_without_extension()));
        }
        out
    }

    pub fn to_row(&self, files: &[Arc<SpectraFileInfo>]) -> Vec<String> {
        let mut out = vec![
            self.protein_group.name.clone(),
            self.protein_group.gene_name.clone(),
            self.protein_group.organism.clone(),
        ];
        for file in files {
            out.push(self.intensity(file).to_string());
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct QuantificationResults {
    pub files: Vec<Arc<SpectraFileInfo>>,
    pub peaks: BTreeMap<Arc<SpectraFileInfo>, Vec<ChromatographicPeak>>,
    pub peptides: BTreeMap<String, Peptide>,
    pub proteins: BTreeMap<String, ProteinQuant>,
    pub isobaric_groups: Vec<IsobaricPeakGroup>,
}

impl QuantificationResults {
    pub fn new(
        files: Vec<Arc<SpectraFileInfo>>,
        peaks: BTreeMap<Arc<SpectraFileInfo>, Vec<ChromatographicPeak>>,
        isobaric_groups: Vec<IsobaricPeakGroup>,
    ) -> Self {
        Self {
            files,
            peaks,
            peptides: BTreeMap::new(),
            proteins: BTreeMap::new(),
            isobaric_groups,
        }
    }

    /// Fills the peptide table from the peaks.
    ///
    /// Every non-decoy modified sequence gets a row; the members of tracked
    /// isobaric groups are then replaced by one row per shared peak.
    pub fn calculate_peptide_results(
        &mut self,
        identifications: &[Arc<Identification>],
        quantify_ambiguous_peptides: bool,
    ) {
        self.peptides = peptides_from_identifications(identifications);
        self.assign_peak_quantities(quantify_ambiguous_peptides);
        if !quantify_ambiguous_peptides {
            self.handle_ambiguity_in_fractions();
        }
        self.revise_isobaric_peptides();
    }

    fn assign_peak_quantities(&mut self, quantify_ambiguous_peptides: bool) {
        let Self {
            peaks, peptides, ..
        } = self;
        for (file, file_peaks) in peaks.iter() {
            let file_peaks: Vec<&ChromatographicPeak> = file_peaks
                .iter()
                .filter(|x| !x.detection_type.is_isotrack())
                .collect();

            let mut best: HashMap<&str, &ChromatographicPeak> = HashMap::new();
            for peak in file_peaks.iter().copied().filter(|x| x.num_full_sequences() == 1) {
                let Some(id) = peak.identifications.first() else {
                    continue;
                };
                let entry = best.entry(id.modified_sequence.as_str()).or_insert(peak);
                if peak.intensity > entry.intensity {
                    *entry = peak;
                }
            }
            for (seq, peak) in best {
                let Some(peptide) = peptides.get_mut(seq) else {
                    continue;
                };
                let detected = peak.intensity > 0.0;
                let detection_type = match (peak.is_mbr(), detected) {
                    (true, true) => DetectionType::MatchBetweenRuns,
                    (false, true) => DetectionType::Msms,
                    (false, false) => DetectionType::MsmsIdentifiedButNotQuantified,
                    (true, false) => DetectionType::NotDetected,
                };
                peptide.set_intensity(file, peak.intensity);
                peptide.set_detection_type(file, detection_type);
                if detected && let Some(rt) = peak.apex_retention_time() {
                    peptide.set_retention_time(file, rt);
                }
            }

            for peak in file_peaks.iter().copied().filter(|x| x.num_full_sequences() > 1) {
                for seq in peak.full_sequences() {
                    let Some(peptide) = peptides.get_mut(seq) else {
                        continue;
                    };
                    let already = peptide.intensity(file);
                    let fraction = peak.intensity / (already + peak.intensity);
                    if quantify_ambiguous_peptides {
                        if already == 0.0 {
                            peptide.set_intensity(file, peak.intensity);
                            peptide.set_detection_type(file, DetectionType::MsmsAmbiguousPeakfinding);
                            if let Some(rt) = peak.apex_retention_time() {
                                peptide.set_retention_time(file, rt);
                            }
                        } else if fraction > AMBIGUOUS_FRACTION_CUTOFF {
                            peptide.set_detection_type(file, DetectionType::MsmsAmbiguousPeakfinding);
                        }
                    } else if fraction > AMBIGUOUS_FRACTION_CUTOFF {
                        peptide.set_intensity(file, 0.0);
                        peptide.set_detection_type(file, DetectionType::MsmsAmbiguousPeakfinding);
                        if let Some(rt) = peak.apex_retention_time() {
                            peptide.set_retention_time(file, rt);
                        }
                    }
                }
            }
        }
    }

    // A fractionated sample reports a peptide in the fraction where it is
    // most intense; when that fraction is ambiguous the whole sample is.
    fn handle_ambiguity_in_fractions(&mut self) {
        let mut samples: BTreeMap<(&str, u32), Vec<&Arc<SpectraFileInfo>>> = BTreeMap::new();
        for file in self.files.iter() {
            samples
                .entry((file.condition.as_str(), file.biological_replicate))
                .or_default()
                .push(file);
        }

        for sample_files in samples.values() {
            let fractions: BTreeSet<u32> = sample_files.iter().map(|x| x.fraction).collect();
            if fractions.len() <= 1 {
                continue;
            }
            for (seq, peptide) in self.peptides.iter_mut() {
                let ambiguous_somewhere = sample_files
                    .iter()
                    .any(|f| peptide.detection_type(f) == DetectionType::MsmsAmbiguousPeakfinding);
                if !ambiguous_somewhere {
                    continue;
                }
                let mut best: Option<(f64, DetectionType)> = None;
                for file in sample_files.iter() {
                    let intensity: f64 = self
                        .peaks
                        .get(*file)
                        .into_iter()
                        .flatten()
                        .filter(|x| x.full_sequences().contains(seq.as_str()))
                        .map(|x| x.intensity)
                        .sum();
                    if best.is_none_or(|(b, _)| intensity > b) {
                        best = Some((intensity, peptide.detection_type(file)));
                    }
                }
                if let Some((_, DetectionType::MsmsAmbiguousPeakfinding)) = best {
                    for file in sample_files.iter() {
                        peptide.set_intensity(file, 0.0);
                    }
                }
            }
        }
    }

    fn revise_isobaric_peptides(&mut self) {
        let mut iso_group_index = 1;
        for group in self.isobaric_groups.iter() {
            let base_sequence = group.base_sequence();
            let tracked_sequences: BTreeSet<&str> = group
                .tracked_peaks
                .iter()
                .flat_map(|x| x.modified_sequences())
                .collect();
            let template = tracked_sequences
                .iter()
                .find_map(|x| self.peptides.get(*x))
                .map(|x| (x.use_for_protein_quant, x.protein_groups.clone()));
            let (use_for_protein_quant, protein_groups) = match template {
                Some(x) => x,
                None => (
                    true,
                    group
                        .group
                        .members()
                        .first()
                        .map(|x| x.protein_groups.clone())
                        .unwrap_or_default(),
                ),
            };
            for seq in tracked_sequences.iter() {
                self.peptides.remove(*seq);
            }

            let num_peaks = group.tracked_peaks.len();
            for (i, tracked) in group.tracked_peaks.iter().enumerate() {
                let joined = tracked
                    .modified_sequences()
                    .into_iter()
                    .collect::<Vec<_>>()
                    .join(" | ");
                let sequence = if num_peaks == 1 {
                    joined
                } else {
                    format!("{} Isopeptide_peak{}", joined, i + 1)
                };
                let mut peptide = Peptide::new(
                    sequence.clone(),
                    base_sequence,
                    use_for_protein_quant,
                    protein_groups.clone(),
                );
                peptide.peak_order = Some(i + 1);
                peptide.iso_group_index = Some(iso_group_index);
                for file in self.files.iter() {
                    let Some(peak) = tracked.peak_in(file) else {
                        continue;
                    };
                    peptide.set_intensity(file, peak.intensity);
                    peptide.set_detection_type(file, peak.detection_type.peptide_level());
                    if let Some(rt) = peak.apex_retention_time() {
                        peptide.set_retention_time(file, rt);
                    }
                }
                self.peptides.insert(sequence, peptide);
            }
            iso_group_index += 1;
        }
        debug!("Peptide table has {} rows", self.peptides.len());
    }

    /// Top-3 protein quantification.
    ///
    /// Each protein group is quantified in each file as the sum of its three
    /// most intense peptides. Peptides shared between protein groups only
    /// count when `use_shared_peptides` is set.
    pub fn calculate_protein_results(&mut self, use_shared_peptides: bool) {
        let mut members: BTreeMap<&str, (Arc<ProteinGroup>, Vec<&Peptide>)> = BTreeMap::new();
        for peptide in self.peptides.values() {
            let num_groups = peptide
                .protein_groups
                .iter()
                .map(|x| x.name.as_str())
                .collect::<BTreeSet<_>>()
                .len();
            let counts = peptide.use_for_protein_quant && (use_shared_peptides || num_groups == 1);
            for group in peptide.protein_groups.iter() {
                let entry = members
                    .entry(group.name.as_str())
                    .or_insert_with(|| (group.clone(), Vec::new()));
                if counts {
                    entry.1.push(peptide);
                }
            }
        }

        let mut proteins = BTreeMap::new();
        for (name, (group, peptides)) in members {
            let mut quant = ProteinQuant::new(group);
            for file in self.files.iter() {
                let mut intensities: Vec<f64> = peptides.iter().map(|x| x.intensity(file)).collect();
                intensities.sort_by(|a, b| b.total_cmp(a));
                let total = intensities.iter().take(TOP_N_PEPTIDES).sum();
                quant.intensities.insert(file.clone(), total);
            }
            proteins.insert(name.to_string(), quant);
        }
        self.proteins = proteins;
    }

    /// Isobaric rows first, by group and peak order, then the rest by sequence.
    pub fn peptides_in_output_order(&self) -> Vec<&Peptide> {
        let mut out: Vec<&Peptide> = self.peptides.values().collect();
        out.sort_by_key(|x| (x.iso_group_index.unwrap_or(usize::MAX), x.peak_order));
        out
    }

    /// All peaks, ordered by file, sequence and apex time.
    pub fn peaks_in_output_order(&self) -> Vec<&ChromatographicPeak> {
        let mut out: Vec<&ChromatographicPeak> = self.peaks.values().flatten().collect();
        out.sort_by(|a, b| {
            a.file
                .cmp(&b.file)
                .then_with(|| a.full_sequences().cmp(&b.full_sequences()))
                .then_with(|| {
                    let a_rt = a.apex_retention_time().unwrap_or(f64::NEG_INFINITY);
                    let b_rt = b.apex_retention_time().unwrap_or(f64::NEG_INFINITY);
                    a_rt.total_cmp(&b_rt)
                })
        });
        out
    }
}

fn peptides_from_identifications(identifications: &[Arc<Identification>]) -> BTreeMap<String, Peptide> {
    let mut out: BTreeMap<String, Peptide> = BTreeMap::new();
    for id in identifications.iter().filter(|x| !x.is_decoy) {
        let peptide = out.entry(id.modified_sequence.clone()).or_insert_with(|| {
            Peptide::new(
                id.modified_sequence.clone(),
                id.base_sequence.clone(),
                id.use_for_protein_quant,
                Vec::new(),
            )
        });
        peptide.use_for_protein_quant &= id.use_for_protein_quant;
        for group in id.protein_groups.iter() {
            if !peptide.protein_groups.iter().any(|x| x.name == group.name) {
                peptide.protein_groups.push(group.clone());
            }
        }
    }
    out
}
