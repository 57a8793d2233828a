//! Tab-separated result tables.
//!
//! All three tables are built and checked before the first one is written,
//! so a failed run never leaves a partial set of files behind.

use crate::errors::{
    DataProcessingError,
    IsoTrackerError,
    Result,
};
use crate::models::{
    PEAK_TABLE_HEADER,
    Peptide,
};
use crate::results::{
    ProteinQuant,
    QuantificationResults,
};
use csv::{
    QuoteStyle,
    WriterBuilder,
};
use std::path::{
    Path,
    PathBuf,
};
use tracing::info;

pub const PEAKS_FILENAME: &str = "peaks.tsv";
pub const PEPTIDES_FILENAME: &str = "peptides.tsv";
pub const PROTEINS_FILENAME: &str = "proteins.tsv";

/// Header first, then one row per line.
pub type Table = Vec<Vec<String>>;

pub fn peak_table(results: &QuantificationResults) -> Table {
    let mut out = vec![PEAK_TABLE_HEADER.iter().map(|x| x.to_string()).collect()];
    out.extend(results.peaks_in_output_order().iter().map(|x| x.to_row()));
    out
}

pub fn peptide_table(results: &QuantificationResults) -> Table {
    let mut out = vec![Peptide::table_header(&results.files)];
    out.extend(
        results
            .peptides_in_output_order()
            .iter()
            .map(|x| x.to_row(&results.files)),
    );
    out
}

pub fn protein_table(results: &QuantificationResults) -> Table {
    let mut out = vec![ProteinQuant::table_header(&results.files)];
    out.extend(results.proteins.values().map(|x| x.to_row(&results.files)));
    out
}

/// Every row has as many fields as the header, and no field holds a tab or
/// a line break.
pub fn validate_table(name: &str, table: &Table) -> Result<()> {
    let Some(header) = table.first() else {
        return Err(DataProcessingError::ExpectedNonEmptyData {
            context: Some(format!("{} has no header", name)),
        }
        .into());
    };
    for (i, row) in table.iter().enumerate() {
        if row.len() != header.len() {
            return Err(DataProcessingError::ExpectedSlicesSameLength {
                expected: header.len(),
                other: row.len(),
                context: format!("{} row {}", name, i),
            }
            .into());
        }
        if let Some(field) = row
            .iter()
            .find(|x| x.contains(['\t', '\n', '\r']))
        {
            return Err(IsoTrackerError::ParseError {
                msg: format!("{} row {} has a field with a separator: {:?}", name, i, field),
            });
        }
    }
    Ok(())
}

fn write_table(path: &Path, table: &Table) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(QuoteStyle::Never)
        .from_path(path)?;
    for row in table {
        writer.write_record(row)?;
    }
    writer.flush().map_err(|source| IsoTrackerError::Io {
        source,
        path: Some(path.to_path_buf()),
    })?;
    Ok(())
}

/// Writes the peak, peptide and protein tables into `directory`.
///
/// Returns the paths written, in that order.
pub fn write_results(results: &QuantificationResults, directory: &Path) -> Result<Vec<PathBuf>> {
    let tables = [
        (PEAKS_FILENAME, peak_table(results)),
        (PEPTIDES_FILENAME, peptide_table(results)),
        (PROTEINS_FILENAME, protein_table(results)),
    ];
    for (name, table) in tables.iter() {
        validate_table(name, table)?;
    }

    std::fs::create_dir_all(directory).map_err(|source| IsoTrackerError::Io {
        source,
        path: Some(directory.to_path_buf()),
    })?;
    let mut written = Vec::with_capacity(tables.len());
    for (name, table) in tables.iter() {
        let path = directory.join(name);
        write_table(&path, table)?;
        info!("Wrote {} rows to {}", table.len() - 1, path.display());
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_table() {
        let good: Table = vec![
            vec!["a".into(), "b".into()],
            vec!["1".into(), "2".into()],
        ];
        assert!(validate_table("good", &good).is_ok());

        let short: Table = vec![vec!["a".into(), "b".into()], vec!["1".into()]];
        assert!(validate_table("short", &short).is_err());

        let tabbed: Table = vec![vec!["a".into()], vec!["1\t2".into()]];
        assert!(validate_table("tabbed", &tabbed).is_err());

        assert!(validate_table("empty", &Vec::new()).is_err());
    }
}
