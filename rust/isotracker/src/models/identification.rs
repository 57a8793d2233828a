use serde::{
    Deserialize,
    Serialize,
};
use std::sync::Arc;
use xicindex::SpectraFileInfo;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProteinGroup {
    pub name: String,
    pub gene_name: String,
    pub organism: String,
}

impl ProteinGroup {
    pub fn new(
        name: impl Into<String>,
        gene_name: impl Into<String>,
        organism: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            gene_name: gene_name.into(),
            organism: organism.into(),
        }
    }
}

/// One peptide-spectrum match, as handed over by the search engine.
#[derive(Debug, Clone)]
pub struct Identification {
    pub file: Arc<SpectraFileInfo>,
    pub base_sequence: String,
    pub modified_sequence: String,
    pub monoisotopic_mass: f64,
    /// Retention time of the MS2 scan, in minutes.
    pub ms2_retention_time: f64,
    pub precursor_charge: i32,
    pub protein_groups: Vec<Arc<ProteinGroup>>,
    pub is_decoy: bool,
    pub psm_score: f64,
    pub q_value: f64,
    pub use_for_protein_quant: bool,
    /// Mass of the most abundant isotope; filled in by the engine.
    pub peakfinding_mass: f64,
}

impl Identification {
    pub fn new(
        file: Arc<SpectraFileInfo>,
        base_sequence: impl Into<String>,
        modified_sequence: impl Into<String>,
        monoisotopic_mass: f64,
        ms2_retention_time: f64,
        precursor_charge: i32,
        protein_groups: Vec<Arc<ProteinGroup>>,
    ) -> Self {
        Self {
            file,
            base_sequence: base_sequence.into(),
            modified_sequence: modified_sequence.into(),
            monoisotopic_mass,
            ms2_retention_time,
            precursor_charge,
            protein_groups,
            is_decoy: false,
            psm_score: 0.0,
            q_value: 0.0,
            use_for_protein_quant: true,
            peakfinding_mass: monoisotopic_mass,
        }
    }

    pub fn with_decoy(mut self, is_decoy: bool) -> Self {
        self.is_decoy = is_decoy;
        self
    }

    pub fn with_scores(mut self, psm_score: f64, q_value: f64) -> Self {
        self.psm_score = psm_score;
        self.q_value = q_value;
        self
    }

    pub fn with_protein_quant(mut self, use_for_protein_quant: bool) -> Self {
        self.use_for_protein_quant = use_for_protein_quant;
        self
    }

    pub fn is_modified(&self) -> bool {
        self.modified_sequence != self.base_sequence
    }

    /// Protein group names joined the way the output tables show them.
    pub fn protein_group_names(&self) -> String {
        join_protein_field(&self.protein_groups, |x| &x.name)
    }
}

/// Joins a field of distinct protein groups with `;`, ordered by name.
pub(crate) fn join_protein_field(
    groups: &[Arc<ProteinGroup>],
    field: impl Fn(&ProteinGroup) -> &str,
) -> String {
    let mut sorted: Vec<&Arc<ProteinGroup>> = groups.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));
    sorted.dedup_by(|a, b| a.name == b.name);
    sorted
        .iter()
        .map(|x| field(x))
        .collect::<Vec<_>>()
        .join(";")
}
