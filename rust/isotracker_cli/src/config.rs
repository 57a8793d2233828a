use isotracker::EngineSettings;
use serde::{
    Deserialize,
    Serialize,
};
use std::collections::HashSet;
use std::path::PathBuf;
use xicindex::SpectraFileInfo;

use crate::cli::RunArgs;
use crate::error::CliError;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub input: InputConfig,
    #[serde(default)]
    pub settings: EngineSettings,
    pub output: Option<OutputConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct InputConfig {
    pub identifications: Option<PathBuf>,
    pub spectra: Vec<SpectraFileConfig>,
}

/// One spectra file and where it sits in the experimental design.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SpectraFileConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub condition: String,
    #[serde(default)]
    pub biological_replicate: u32,
    #[serde(default)]
    pub fraction: u32,
    #[serde(default)]
    pub technical_replicate: u32,
}

impl From<&SpectraFileConfig> for SpectraFileInfo {
    fn from(x: &SpectraFileConfig) -> Self {
        SpectraFileInfo::new(
            x.path.clone(),
            x.condition.clone(),
            x.biological_replicate,
            x.fraction,
            x.technical_replicate,
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OutputConfig {
    pub directory: PathBuf,
}

impl Config {
    /// Command line values take precedence over the file.
    pub fn with_cli_args(mut self, args: &RunArgs) -> Self {
        if let Some(path) = &args.identifications {
            self.input.identifications = Some(path.clone());
        }
        if let Some(dir) = &args.output_dir {
            self.output = Some(OutputConfig {
                directory: dir.clone(),
            });
        }
        if let Some(threads) = args.threads {
            self.settings.max_threads = Some(threads);
        }
        self
    }

    pub fn identifications_path(&self) -> Result<&PathBuf, CliError> {
        self.input.identifications.as_ref().ok_or_else(|| {
            CliError::Config(
                "No identifications provided, please provide them in either the config file or with the --identifications flag".to_string(),
            )
        })
    }

    pub fn output_directory(&self) -> Result<&PathBuf, CliError> {
        self.output.as_ref().map(|x| &x.directory).ok_or_else(|| {
            CliError::Config(
                "No output directory provided, please provide one in either the config file or with the --output-dir flag".to_string(),
            )
        })
    }

    pub fn spectra_files(&self) -> Result<Vec<SpectraFileInfo>, CliError> {
        if self.input.spectra.is_empty() {
            return Err(CliError::Config("No spectra files listed".to_string()));
        }
        let mut files: Vec<SpectraFileInfo> = self.input.spectra.iter().map(|x| x.into()).collect();
        files.sort();
        // Output columns and identification rows refer to files by name.
        let mut names = HashSet::new();
        for file in files.iter() {
            let name = file.filename_without_extension();
            if !names.insert(name.clone()) {
                return Err(CliError::Config(format!(
                    "Two spectra files share the name {}",
                    name
                )));
            }
        }
        Ok(files)
    }

    pub fn template() -> Self {
        let spectra = (0..2)
            .map(|i| SpectraFileConfig {
                path: PathBuf::from(format!("spectra/run{}.tsv", i + 1)),
                condition: "control".to_string(),
                biological_replicate: i,
                fraction: 0,
                technical_replicate: 0,
            })
            .collect();
        let mut settings = EngineSettings::default();
        settings.isotracker.enabled = true;
        Self {
            input: InputConfig {
                identifications: Some(PathBuf::from("identifications.tsv")),
                spectra,
            },
            settings,
            output: Some(OutputConfig {
                directory: PathBuf::from("isotracker_results"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_round_trips() {
        let text = serde_json::to_string_pretty(&Config::template()).unwrap();
        let config: Config = serde_json::from_str(&text).unwrap();
        assert_eq!(config.spectra_files().unwrap().len(), 2);
        assert!(config.settings.isotracker.enabled);
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let text = r#"{
            "input": { "identifications": null, "spectra": [ { "path": "a.tsv" } ] },
            "output": null
        }"#;
        let config: Config = serde_json::from_str(text).unwrap();
        assert_eq!(config.settings, EngineSettings::default());
        assert!(config.identifications_path().is_err());
        assert!(config.output_directory().is_err());

        let args = RunArgs {
            config: PathBuf::from("config.json"),
            identifications: Some(PathBuf::from("ids.tsv")),
            output_dir: Some(PathBuf::from("out")),
            threads: Some(2),
        };
        let config = config.with_cli_args(&args);
        assert_eq!(config.identifications_path().unwrap(), &PathBuf::from("ids.tsv"));
        assert_eq!(config.output_directory().unwrap(), &PathBuf::from("out"));
        assert_eq!(config.settings.max_threads, Some(2));
    }

    #[test]
    fn test_duplicate_file_names_are_rejected() {
        let text = r#"{
            "input": {
                "identifications": "ids.tsv",
                "spectra": [ { "path": "a/run.tsv" }, { "path": "b/run.tsv", "biological_replicate": 1 } ]
            },
            "output": null
        }"#;
        let config: Config = serde_json::from_str(text).unwrap();
        assert!(config.spectra_files().is_err());
    }
}
