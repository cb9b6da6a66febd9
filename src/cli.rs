use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "clipforge")]
#[command(author, version, about = "Natural-language video editing via skill pipelines")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply an instruction to one video
    Edit {
        /// Natural-language edit instruction
        #[arg(required = true)]
        instruction: String,

        /// Primary input file
        #[arg(short, long, required = true)]
        input: PathBuf,

        /// Extra media inputs (overlays, watermarks, audio tracks), in
        /// binding order
        #[arg(long = "with")]
        extra: Vec<PathBuf>,

        /// Output file
        #[arg(short, long, required = true)]
        output: PathBuf,

        /// Show the planned invocation without running the engine
        #[arg(long)]
        dry_run: bool,
    },

    /// Apply one instruction across many files
    Batch {
        /// Natural-language edit instruction
        #[arg(required = true)]
        instruction: String,

        /// Input files
        #[arg(short, long, required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,

        /// Directory for edited outputs
        #[arg(short, long, required = true)]
        output_dir: PathBuf,

        /// Override configured concurrency
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// List available skills
    Skills {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
