use super::detection::DetectionType;
use super::identification::{
    ProteinGroup,
    join_protein_field,
};
use std::collections::HashMap;
use std::sync::Arc;
use xicindex::SpectraFileInfo;

/// Per-file quantity of one peptide row of the output.
#[derive(Debug, Clone)]
pub struct Peptide {
    pub sequence: String,
    pub base_sequence: String,
    pub protein_groups: Vec<Arc<ProteinGroup>>,
    pub use_for_protein_quant: bool,
    /// Position of this row among the peaks of its isobaric group, if any.
    pub peak_order: Option<usize>,
    pub iso_group_index: Option<usize>,
    intensities: HashMap<Arc<SpectraFileInfo>, f64>,
    retention_times: HashMap<Arc<SpectraFileInfo>, f64>,
    detection_types: HashMap<Arc<SpectraFileInfo>, DetectionType>,
}

impl Peptide {
    pub fn new(
        sequence: impl Into<String>,
        base_sequence: impl Into<String>,
        use_for_protein_quant: bool,
        protein_groups: Vec<Arc<ProteinGroup>>,
    ) -> Self {
        Self {
            sequence: sequence.into(),
            base_sequence: base_sequence.into(),
            protein_groups,
            use_for_protein_quant,
            peak_order: None,
            iso_group_index: None,
            intensities: HashMap::new(),
            retention_times: HashMap::new(),
            detection_types: HashMap::new(),
        }
    }

    pub fn intensity(&self, file: &Arc<SpectraFileInfo>) -> f64 {
        self.intensities.get(file).copied().unwrap_or(0.0)
    }

    pub fn set_intensity(&mut self, file: &Arc<SpectraFileInfo>, intensity: f64) {
        self.intensities.insert(file.clone(), intensity);
    }

    pub fn retention_time(&self, file: &Arc<SpectraFileInfo>) -> Option<f64> {
        self.retention_times.get(file).copied()
    }

    pub fn set_retention_time(&mut self, file: &Arc<SpectraFileInfo>, rt: f64) {
        self.retention_times.insert(file.clone(), rt);
    }

    pub fn detection_type(&self, file: &Arc<SpectraFileInfo>) -> DetectionType {
        self.detection_types
            .get(file)
            .copied()
            .unwrap_or(DetectionType::NotDetected)
    }

    pub fn set_detection_type(&mut self, file: &Arc<SpectraFileInfo>, detection: DetectionType) {
        self.detection_types.insert(file.clone(), detection);
    }

    pub fn is_isobaric(&self) -> bool {
        self.iso_group_index.is_some()
    }

    pub fn table_header(files: &[Arc<SpectraFileInfo>]) -> Vec<String> {
        let mut out: Vec<String> = [
            "Sequence",
            "Base Sequence",
            "Peak Order",
            "Protein Groups",
            "Gene Names",
            "Organism",
        ]
        .iter()
        .map(|x| x.to_string())
        .collect();
        for file in files {
            out.push(format!("Intensity_{}", file.filename_without_extension()));
        }
        for file in files {
            out.push(format!("RetentionTime (min)_{}", file.filename_without_extension()));
        }
        for file in files {
            out.push(format!("Detection Type_{}", file.filename_without_extension()));
        }
        out
    }

    pub fn to_row(&self, files: &[Arc<SpectraFileInfo>]) -> Vec<String> {
        let mut out = vec![
            self.sequence.clone(),
            self.base_sequence.clone(),
            self.peak_order.map(|x| x.to_string()).unwrap_or_default(),
            join_protein_field(&self.protein_groups, |x| &x.name),
            join_protein_field(&self.protein_groups, |x| &x.gene_name),
            join_protein_field(&self.protein_groups, |x| &x.organism),
        ];
        for file in files {
            out.push(self.intensity(file).to_string());
        }
        for file in files {
            out.push(
                self.retention_time(file)
                    .map(|x| x.to_string())
                    .unwrap_or_default(),
            );
        }
        for file in files {
            out.push(self.detection_type(file).to_string());
        }
        out
    }
}
