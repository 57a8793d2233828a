use isotracker::serde::IDENTIFICATION_COLUMNS;
use isotracker::{
    QuantificationEngine,
    read_identifications,
    write_results,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{
    info,
    instrument,
};
use xicindex::{
    SpectraFileInfo,
    TsvSpectraReader,
};

use crate::cli::{
    RunArgs,
    WriteTemplateArgs,
};
use crate::config::Config;
use crate::error::CliError;

fn read_config(path: &Path) -> Result<Config, CliError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Main function for the 'run' subcommand.
#[instrument(skip_all)]
pub fn main_run(args: RunArgs) -> Result<(), CliError> {
    let config = read_config(&args.config)?.with_cli_args(&args);
    info!("Parsed configuration: {:#?}", config);

    let files: Vec<Arc<SpectraFileInfo>> = config
        .spectra_files()?
        .into_iter()
        .map(Arc::new)
        .collect();
    let identifications = read_identifications(config.identifications_path()?, &files)?;

    let engine = QuantificationEngine::new(identifications, config.settings.clone())?
        .with_spectra_files(files.iter().map(|x| x.as_ref().clone()));
    let results = engine.run(&TsvSpectraReader)?;

    let written = write_results(&results, config.output_directory()?)?;
    for path in written {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

/// Main function for the 'write-template' subcommand.
pub fn main_write_template(args: WriteTemplateArgs) -> Result<(), CliError> {
    let target_dir = args.output_path;
    std::fs::create_dir_all(&target_dir)?;

    let config_path = target_dir.join("isotracker_config.json");
    std::fs::write(&config_path, serde_json::to_string_pretty(&Config::template())?)?;
    println!("Wrote config template to: {}", config_path.display());

    // Header only, the columns every identification table needs.
    let ids_path = target_dir.join("identifications_template.tsv");
    std::fs::write(&ids_path, format!("{}\n", IDENTIFICATION_COLUMNS.join("\t")))?;
    println!(
        "Wrote identification table template to: {}",
        ids_path.display()
    );
    Ok(())
}
