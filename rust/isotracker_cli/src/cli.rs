use clap::{
    Parser,
    Subcommand,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Quantify identifications over a set of spectra files.
    Run(RunArgs),
    /// Write a template configuration file.
    WriteTemplate(WriteTemplateArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to the JSON configuration file.
    #[arg(short, long)]
    pub config: PathBuf,

    /// Path to the identification table (will over-write the config file).
    #[arg(short, long)]
    pub identifications: Option<PathBuf>,

    /// Path to the output directory (will over-write the config file).
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Number of worker threads (will over-write the config file).
    #[arg(short, long)]
    pub threads: Option<usize>,
}

#[derive(Parser, Debug)]
pub struct WriteTemplateArgs {
    /// The path to the output files.
    #[arg(short, long)]
    pub output_path: PathBuf,
}
