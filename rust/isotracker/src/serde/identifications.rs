use crate::errors::{
    IsoTrackerError,
    Result,
};
use crate::models::{
    Identification,
    ProteinGroup,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{
    info,
    warn,
};
use xicindex::SpectraFileInfo;

/// Columns every identification table must have.
pub const IDENTIFICATION_COLUMNS: [&str; 7] = [
    "File Name",
    "Base Sequence",
    "Full Sequence",
    "Peptide Monoisotopic Mass",
    "Scan Retention Time",
    "Precursor Charge",
    "Protein Accession",
];

#[derive(Debug, Clone, Deserialize)]
struct IdentificationRow {
    #[serde(rename = "File Name")]
    file_name: String,
    #[serde(rename = "Base Sequence")]
    base_sequence: String,
    #[serde(rename = "Full Sequence")]
    full_sequence: String,
    // Ambiguous matches list several masses separated by '|'.
    #[serde(rename = "Peptide Monoisotopic Mass")]
    monoisotopic_mass: String,
    #[serde(rename = "Scan Retention Time")]
    retention_time: f64,
    #[serde(rename = "Precursor Charge")]
    precursor_charge: f64,
    #[serde(rename = "Protein Accession")]
    protein_accession: String,
    #[serde(rename = "Gene Name", default)]
    gene_name: String,
    #[serde(rename = "Organism", default)]
    organism: String,
    #[serde(rename = "Decoy", default)]
    decoy: String,
    #[serde(rename = "QValue", default)]
    q_value: Option<f64>,
    #[serde(rename = "Score", default)]
    score: Option<f64>,
}

fn file_stem(name: &str) -> &str {
    Path::new(name)
        .file_stem()
        .and_then(|x| x.to_str())
        .unwrap_or(name)
}

fn parse_decoy(field: &str) -> bool {
    matches!(
        field.trim().to_ascii_lowercase().as_str(),
        "y" | "yes" | "true" | "1" | "d"
    )
}

fn parse_mass(field: &str, line: usize) -> Result<f64> {
    let first = field.split('|').next().unwrap_or_default().trim();
    first.parse::<f64>().map_err(|e| IsoTrackerError::ParseError {
        msg: format!("line {}: bad monoisotopic mass {:?}: {}", line, field, e),
    })
}

#[derive(Default)]
struct ProteinGroupCache {
    groups: HashMap<String, Arc<ProteinGroup>>,
}

impl ProteinGroupCache {
    // Accession, gene and organism fields are '|' separated and aligned.
    fn groups_for(&mut self, row: &IdentificationRow) -> Vec<Arc<ProteinGroup>> {
        let genes: Vec<&str> = row.gene_name.split('|').collect();
        let organisms: Vec<&str> = row.organism.split('|').collect();
        let mut out: Vec<Arc<ProteinGroup>> = Vec::new();
        for (i, accession) in row.protein_accession.split('|').enumerate() {
            let accession = accession.trim();
            if accession.is_empty() {
                continue;
            }
            let group = self
                .groups
                .entry(accession.to_string())
                .or_insert_with(|| {
                    Arc::new(ProteinGroup::new(
                        accession,
                        genes.get(i).copied().unwrap_or_default().trim(),
                        organisms.get(i).copied().unwrap_or_default().trim(),
                    ))
                })
                .clone();
            if !out.iter().any(|x| Arc::ptr_eq(x, &group)) {
                out.push(group);
            }
        }
        out
    }
}

/// Reads a tab separated identification table.
///
/// Rows are matched to `files` by file name without extension; rows from
/// files not in the list are skipped.
pub fn read_identifications(
    path: impl AsRef<Path>,
    files: &[Arc<SpectraFileInfo>],
) -> Result<Vec<Identification>> {
    let path = path.as_ref();
    let file_handle = std::fs::File::open(path).map_err(|source| IsoTrackerError::Io {
        source,
        path: Some(path.to_path_buf()),
    })?;
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_reader(file_handle);

    let headers = rdr.headers()?.clone();
    if let Some(missing) = IDENTIFICATION_COLUMNS
        .iter()
        .find(|col| !headers.iter().any(|h| h == **col))
    {
        return Err(IsoTrackerError::ParseError {
            msg: format!("{} is missing the {:?} column", path.display(), missing),
        });
    }

    let by_stem: HashMap<String, &Arc<SpectraFileInfo>> = files
        .iter()
        .map(|x| (x.filename_without_extension(), x))
        .collect();

    let mut proteins = ProteinGroupCache::default();
    let mut unknown_files: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::new();
    for (i, row) in rdr.deserialize::<IdentificationRow>().enumerate() {
        let row = row?;
        // Header is line 1.
        let line = i + 2;
        let Some(file) = by_stem.get(file_stem(row.file_name.trim())) else {
            *unknown_files.entry(row.file_name.clone()).or_default() += 1;
            continue;
        };
        let mass = parse_mass(&row.monoisotopic_mass, line)?;
        let groups = proteins.groups_for(&row);
        let mut id = Identification::new(
            (*file).clone(),
            row.base_sequence.trim(),
            row.full_sequence.trim(),
            mass,
            row.retention_time,
            row.precursor_charge.round() as i32,
            groups,
        )
        .with_decoy(parse_decoy(&row.decoy));
        if row.q_value.is_some() || row.score.is_some() {
            id = id.with_scores(row.score.unwrap_or(0.0), row.q_value.unwrap_or(0.0));
        }
        out.push(id);
    }

    for (name, count) in unknown_files.iter() {
        warn!(
            "Skipped {} identifications from {}, which is not among the spectra files",
            count, name
        );
    }
    info!(
        "Read {} identifications over {} protein groups from {}",
        out.len(),
        proteins.groups.len(),
        path.display()
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "File Name\tBase Sequence\tFull Sequence\tPeptide Monoisotopic Mass\tScan Retention Time\tPrecursor Charge\tProtein Accession\tGene Name\tOrganism";

    fn write_table(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", HEADER).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file.flush().unwrap();
        file
    }

    fn files() -> Vec<Arc<SpectraFileInfo>> {
        vec![
            Arc::new(SpectraFileInfo::new("/data/run1.mzML", "a", 0, 0, 0)),
            Arc::new(SpectraFileInfo::new("/data/run2.mzML", "a", 1, 0, 0)),
        ]
    }

    #[test]
    fn test_read_identifications() {
        let table = write_table(&[
            "run1.raw\tPEPTIDEK\tPEPTIDEK\t927.4549\t20.5\t2\tP1|P2\tG1|G2\tHuman|Human",
            "run2\tPEPTIDEK\tPEPT[Phospho]IDEK\t1007.4212|1007.5\t21.0\t2.0\tP1\tG1\tHuman",
            "run3\tAAAK\tAAAK\t400.0\t5.0\t1\tP3\tG3\tHuman",
        ]);
        let files = files();
        let ids = read_identifications(table.path(), &files).unwrap();
        assert_eq!(ids.len(), 2);

        assert_eq!(ids[0].file, files[0]);
        assert_eq!(ids[0].protein_groups.len(), 2);
        assert_eq!(ids[0].protein_groups[1].gene_name, "G2");
        assert!(!ids[0].is_modified());

        assert_eq!(ids[1].file, files[1]);
        assert_eq!(ids[1].monoisotopic_mass, 1007.4212);
        assert_eq!(ids[1].precursor_charge, 2);
        assert!(ids[1].is_modified());
        // Same accession, same group.
        assert!(Arc::ptr_eq(
            &ids[0].protein_groups[0],
            &ids[1].protein_groups[0]
        ));
    }

    #[test]
    fn test_missing_column_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "File Name\tBase Sequence").unwrap();
        writeln!(file, "run1\tPEPTIDEK").unwrap();
        file.flush().unwrap();
        assert!(read_identifications(file.path(), &files()).is_err());
    }

    #[test]
    fn test_bad_mass_is_an_error() {
        let table = write_table(&["run1\tPEPTIDEK\tPEPTIDEK\tnope\t20.5\t2\tP1\tG1\tHuman"]);
        assert!(read_identifications(table.path(), &files()).is_err());
    }
}
