use serde::{
    Deserialize,
    Serialize,
};
use std::fmt::Display;
use std::path::{
    Path,
    PathBuf,
};

/// Experimental design metadata for one raw data file.
///
/// Ordering follows the experimental design (condition, biological
/// replicate, fraction, technical replicate) so that sorted collections of
/// files come out in the order the output tables expect.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpectraFileInfo {
    pub condition: String,
    pub biological_replicate: u32,
    pub fraction: u32,
    pub technical_replicate: u32,
    pub path: PathBuf,
}

impl SpectraFileInfo {
    pub fn new(
        path: impl Into<PathBuf>,
        condition: impl Into<String>,
        biological_replicate: u32,
        fraction: u32,
        technical_replicate: u32,
    ) -> Self {
        Self {
            condition: condition.into(),
            biological_replicate,
            fraction,
            technical_replicate,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn filename_without_extension(&self) -> String {
        self.path
            .file_stem()
            .map(|x| x.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

impl Display for SpectraFileInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.filename_without_extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_follows_design() {
        let a = SpectraFileInfo::new("z.mzML", "a", 0, 0, 0);
        let b = SpectraFileInfo::new("a.mzML", "a", 1, 0, 0);
        let c = SpectraFileInfo::new("b.mzML", "b", 0, 0, 0);
        let mut files = vec![c.clone(), b.clone(), a.clone()];
        files.sort();
        assert_eq!(files, vec![a, b, c]);
    }

    #[test]
    fn test_filename_without_extension() {
        let file = SpectraFileInfo::new("/data/run_01.mzML", "a", 0, 0, 0);
        assert_eq!(file.filename_without_extension(), "run_01");
        assert_eq!(file.to_string(), "run_01");
    }
}
