//! Isobaric peptide groups: modified forms of one base sequence that share
//! a precursor mass and cannot be told apart from MS1 alone.

use crate::errors::ConfigurationError;
use crate::isotopes::{
    C13_MINUS_C12,
    IsotopeDistribution,
};
use crate::models::Identification;
use regex::Regex;
use std::collections::{
    BTreeMap,
    BTreeSet,
    HashMap,
};
use std::hash::{
    Hash,
    Hasher,
};
use std::sync::Arc;
use xicindex::SpectraFileInfo;
use xicindex::utils::to_mz;

/// Width (Da) of the bins monoisotopic masses are rounded to when grouping.
pub const MASS_BUCKET_WIDTH: f64 = 0.0001;

pub fn mass_bucket(mass: f64) -> i64 {
    (mass / MASS_BUCKET_WIDTH).round() as i64
}

/// Keeps only identifications modified on one of the given residues.
#[derive(Debug, Clone)]
pub struct IsoTrackerIdFilter {
    motifs: Vec<char>,
    pattern: Regex,
}

impl IsoTrackerIdFilter {
    /// ```
    /// use isotracker::isobaric::IsoTrackerIdFilter;
    ///
    /// let filter = IsoTrackerIdFilter::new(&['S', 'T', 'Y']).unwrap();
    /// assert!(filter.accepts("PEPS[Phospho]TIDE"));
    /// assert!(!filter.accepts("PEPM[Oxidation]TIDE"));
    /// ```
    pub fn new(motifs: &[char]) -> Result<Self, ConfigurationError> {
        let motif_string: String = motifs.iter().collect();
        if motifs.is_empty() || motifs.iter().any(|c| !c.is_ascii_alphabetic()) {
            return Err(ConfigurationError::InvalidSetting {
                field: "isotracker.motifs",
                reason: format!("expected residue letters, got {:?}", motif_string),
            });
        }
        let class: String = motifs
            .iter()
            .map(|c| regex::escape(&c.to_string()))
            .collect();
        let pattern = Regex::new(&format!(r"[{}]\[", class)).map_err(|e| {
            ConfigurationError::InvalidMotif {
                motif: motif_string,
                source: e,
            }
        })?;
        Ok(Self {
            motifs: motifs.to_vec(),
            pattern,
        })
    }

    pub fn motifs(&self) -> &[char] {
        &self.motifs
    }

    pub fn accepts(&self, modified_sequence: &str) -> bool {
        self.pattern.is_match(modified_sequence)
    }
}

/// Modified identifications sharing a base sequence and a (bucketed) mass.
///
/// Equality and hashing only look at the key, not the members.
#[derive(Debug, Clone)]
pub struct IsobaricPeptideGroup {
    pub base_sequence: String,
    mass_bucket: i64,
    members: Vec<Arc<Identification>>,
}

impl PartialEq for IsobaricPeptideGroup {
    fn eq(&self, other: &Self) -> bool {
        self.base_sequence == other.base_sequence && self.mass_bucket == other.mass_bucket
    }
}

impl Eq for IsobaricPeptideGroup {}

impl Hash for IsobaricPeptideGroup {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.base_sequence.hash(state);
        self.mass_bucket.hash(state);
    }
}

impl IsobaricPeptideGroup {
    pub fn key(&self) -> (&str, i64) {
        (&self.base_sequence, self.mass_bucket)
    }

    pub fn members(&self) -> &[Arc<Identification>] {
        &self.members
    }

    /// Mean monoisotopic mass of the members.
    pub fn monoisotopic_mass(&self) -> f64 {
        self.members.iter().map(|x| x.monoisotopic_mass).sum::<f64>() / self.members.len() as f64
    }

    pub fn peakfinding_mass(&self) -> f64 {
        self.members.iter().map(|x| x.peakfinding_mass).sum::<f64>() / self.members.len() as f64
    }

    /// Most common precursor charge, ties going to the lower charge.
    pub fn dominant_charge(&self) -> i32 {
        let mut counts: BTreeMap<i32, usize> = BTreeMap::new();
        for id in self.members.iter() {
            *counts.entry(id.precursor_charge).or_default() += 1;
        }
        let mut best = (0usize, 1i32);
        for (charge, count) in counts {
            if count > best.0 {
                best = (count, charge);
            }
        }
        best.1
    }

    pub fn modified_sequences(&self) -> BTreeSet<&str> {
        self.members
            .iter()
            .map(|x| x.modified_sequence.as_str())
            .collect()
    }

    pub fn contains_sequence(&self, modified_sequence: &str) -> bool {
        self.members
            .iter()
            .any(|x| x.modified_sequence == modified_sequence)
    }

    pub fn ids_in_file<'a>(
        &'a self,
        file: &'a Arc<SpectraFileInfo>,
    ) -> impl Iterator<Item = &'a Arc<Identification>> {
        self.members.iter().filter(move |x| x.file == *file)
    }

    pub fn files(&self) -> BTreeSet<Arc<SpectraFileInfo>> {
        self.members.iter().map(|x| x.file.clone()).collect()
    }

    /// Whether at least one run has two or more identifications of the group.
    pub fn has_multiple_ids_in_one_file(&self) -> bool {
        let mut counts: HashMap<&SpectraFileInfo, usize> = HashMap::new();
        for id in self.members.iter() {
            *counts.entry(id.file.as_ref()).or_default() += 1;
        }
        counts.values().any(|x| *x >= 2)
    }

    /// The m/z values the peak index has to keep for this group, at each
    /// member charge.
    pub fn target_mz(&self, num_isotopes_required: usize) -> Vec<f64> {
        let charges: BTreeSet<i32> = self.members.iter().map(|x| x.precursor_charge).collect();
        envelope_target_mz(self.monoisotopic_mass(), charges, num_isotopes_required)
    }
}

/// Every isotope of the envelope of `mass`, plus guard masses one spacing
/// below the lightest isotope and two spacings above the heaviest, converted
/// at each charge.
pub fn envelope_target_mz(
    mass: f64,
    charges: impl IntoIterator<Item = i32>,
    num_isotopes_required: usize,
) -> Vec<f64> {
    let dist = IsotopeDistribution::averagine(mass, num_isotopes_required);
    let mut shifts = dist.mass_shifts.clone();
    shifts.push(dist.min_shift() - C13_MINUS_C12);
    shifts.push(dist.max_shift() + C13_MINUS_C12);
    shifts.push(dist.max_shift() + 2.0 * C13_MINUS_C12);

    let mut out: Vec<f64> = charges
        .into_iter()
        .flat_map(|z| shifts.iter().map(move |s| to_mz(mass + s, z)))
        .collect();
    dedup_sorted(&mut out);
    out
}

pub(crate) fn dedup_sorted(values: &mut Vec<f64>) {
    values.sort_by(|a, b| a.total_cmp(b));
    values.dedup_by(|a, b| (*a - *b).abs() < 1e-9);
}

/// Groups modified, non-decoy identifications by base sequence and mass.
///
/// When a filter is given only identifications it accepts are grouped.
/// Groups come out ordered by key.
pub fn build_isobaric_groups(
    ids: &[Arc<Identification>],
    filter: Option<&IsoTrackerIdFilter>,
) -> Vec<IsobaricPeptideGroup> {
    let mut groups: BTreeMap<(String, i64), Vec<Arc<Identification>>> = BTreeMap::new();
    for id in ids {
        if id.is_decoy || !id.is_modified() {
            continue;
        }
        if let Some(f) = filter
            && !f.accepts(&id.modified_sequence)
        {
            continue;
        }
        groups
            .entry((id.base_sequence.clone(), mass_bucket(id.monoisotopic_mass)))
            .or_default()
            .push(id.clone());
    }
    groups
        .into_iter()
        .map(|((base_sequence, mass_bucket), members)| IsobaricPeptideGroup {
            base_sequence,
            mass_bucket,
            members,
        })
        .collect()
}

/// All target m/z values of a set of groups, deduplicated.
pub fn get_target_mz(groups: &[IsobaricPeptideGroup], num_isotopes_required: usize) -> Vec<f64> {
    let mut out: Vec<f64> = groups
        .iter()
        .flat_map(|x| x.target_mz(num_isotopes_required))
        .collect();
    dedup_sorted(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> Arc<SpectraFileInfo> {
        Arc::new(SpectraFileInfo::new(name, "a", 0, 0, 0))
    }

    fn id(file: &Arc<SpectraFileInfo>, seq: &str, mass: f64) -> Arc<Identification> {
        Arc::new(Identification::new(file.clone(), "PEPTIDE", seq, mass, 10.0, 2, vec![]))
    }

    #[test]
    fn test_same_mass_forms_one_group() {
        let f = file("a.raw");
        let ids = vec![
            id(&f, "PEP[Ox]TIDE", 500.0),
            id(&f, "PEPT[Ox]IDE", 500.0),
            id(&f, "PEPTI[Ox]DE", 500.0),
        ];
        let groups = build_isobaric_groups(&ids, None);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].members().len(), 3);
        assert_eq!(groups[0].target_mz(2).len(), 5);
        assert_eq!(get_target_mz(&groups, 2).len(), 5);
    }

    #[test]
    fn test_distinct_masses_form_distinct_groups() {
        let f = file("a.raw");
        let ids = vec![
            id(&f, "PEP[Ox]TIDE", 500.0096),
            id(&f, "PEPT[Ox]IDE", 500.0104),
            id(&f, "PEPTI[Ox]DE", 500.0100),
        ];
        let groups = build_isobaric_groups(&ids, None);
        assert_eq!(groups.len(), 3);
        assert!(groups.iter().all(|x| x.members().len() == 1));
        assert_eq!(get_target_mz(&groups, 2).len(), 15);
    }

    #[test]
    fn test_unmodified_and_decoys_are_skipped() {
        let f = file("a.raw");
        let decoy = Arc::new(
            Identification::new(f.clone(), "PEPTIDE", "PEP[Ox]TIDE", 500.0, 10.0, 2, vec![])
                .with_decoy(true),
        );
        let ids = vec![id(&f, "PEPTIDE", 500.0), decoy];
        assert!(build_isobaric_groups(&ids, None).is_empty());
    }

    #[test]
    fn test_motif_filter() {
        let f = file("a.raw");
        let ids = vec![
            id(&f, "PEPS[Phospho]TIDE", 580.0),
            id(&f, "PEPM[Ox]TIDE", 580.0),
        ];
        let filter = IsoTrackerIdFilter::new(&['S', 'T', 'Y']).unwrap();
        let groups = build_isobaric_groups(&ids, Some(&filter));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].members().len(), 1);
        assert!(IsoTrackerIdFilter::new(&[]).is_err());
        assert!(IsoTrackerIdFilter::new(&['[']).is_err());
    }

    #[test]
    fn test_multiple_ids_in_one_file() {
        let f1 = file("a.raw");
        let f2 = file("b.raw");
        let single = build_isobaric_groups(
            &[id(&f1, "PEP[Ox]TIDE", 500.0), id(&f2, "PEPT[Ox]IDE", 500.0)],
            None,
        );
        assert!(!single[0].has_multiple_ids_in_one_file());
        let double = build_isobaric_groups(
            &[id(&f1, "PEP[Ox]TIDE", 500.0), id(&f1, "PEPT[Ox]IDE", 500.0)],
            None,
        );
        assert!(double[0].has_multiple_ids_in_one_file());
    }

    #[test]
    fn test_group_identity_is_the_key() {
        let f = file("a.raw");
        let a = build_isobaric_groups(&[id(&f, "PEP[Ox]TIDE", 500.0)], None);
        let b = build_isobaric_groups(
            &[id(&f, "PEPT[Ox]IDE", 500.0), id(&f, "PEP[Ox]TIDE", 500.0)],
            None,
        );
        assert_eq!(a[0], b[0]);
    }
}
