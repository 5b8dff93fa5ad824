use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "cpx", version, about = "Pack, unpack and identify CPX framed streams")]
pub struct Args {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
    /// More logging; repeat for even more
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compress a file, or stdin
    Compress {
        /// Input file; stdin if omitted
        input: Option<PathBuf>,
        /// Output file; stdout if omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Output format; bare `--format` uses the configured default
        #[arg(short, long, value_name = "FORMAT", num_args = 0..=1, require_equals = true)]
        format: Option<Option<String>>,
    },
    /// Decompress a file, or stdin, detecting its format
    Decompress {
        /// Input file; stdin if omitted
        input: Option<PathBuf>,
        /// Output file; stdout if omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the detected format of each file
    Detect {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}
