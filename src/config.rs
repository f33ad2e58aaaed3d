use clap::Parser;
use std::path::{Path, PathBuf};

/// Trait for reading configuration parameters
pub trait Config {
    fn input_path(&self) -> &Path;
    fn output_path(&self) -> Option<&Path>;
}

/// CLI configuration
#[derive(Parser, Debug)]
#[command(
    name = "flowsim",
    about = "Simulates money flowing through a graph of accounts from a CSV action log",
    version
)]
pub struct CliConfig {
    /// Path to the input CSV file containing timestamped actions
    #[arg(value_name = "INPUT_FILE")]
    input_file: PathBuf,

    /// Write snapshot rows to this file instead of stdout
    #[arg(short, long, value_name = "OUTPUT_FILE")]
    output: Option<PathBuf>,
}

impl Config for CliConfig {
    fn input_path(&self) -> &Path {
        &self.input_file
    }

    fn output_path(&self) -> Option<&Path> {
        self.output.as_deref()
    }
}
