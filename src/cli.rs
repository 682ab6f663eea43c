use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{ColumnCheck, FailurePolicy};
use crate::process::Mode;

#[derive(Parser, Debug)]
#[command(name = "sql-lineage")]
#[command(version, about = "Build table metadata and data lineage from SQL statement facts")]
pub struct Cli {
    /// Config file (defaults to ./lineage.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// SQLite metadata store
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process every fact file of a directory
    Process {
        /// Directory containing JSONL fact files
        input_dir: PathBuf,

        /// Clear the store first, or add to it
        #[arg(short, long, value_enum)]
        mode: Option<Mode>,

        /// Only process these scripts (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        include: Option<Vec<String>>,

        /// Skip these scripts (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        exclude: Option<Vec<String>>,

        /// What to do after a script fails
        #[arg(long, value_enum)]
        policy: Option<FailurePolicy>,

        /// How DML columns missing from a table definition are treated
        #[arg(long, value_enum)]
        column_check: Option<ColumnCheck>,

        /// Longest detail path followed for summary lineage
        #[arg(long)]
        max_path_length: Option<u32>,

        /// Directory for node-link JSON exports
        #[arg(long)]
        export_dir: Option<PathBuf>,

        /// Cross-script lineage file
        #[arg(long)]
        lineage_json: Option<PathBuf>,

        /// Skip JSON exports
        #[arg(long)]
        no_export: bool,

        /// Show the terminal dashboard
        #[arg(long)]
        tui: bool,
    },

    /// Process a single fact file
    File {
        /// JSONL fact file
        facts: PathBuf,

        /// Directory for node-link JSON exports
        #[arg(long)]
        export_dir: Option<PathBuf>,

        /// Skip JSON exports
        #[arg(long)]
        no_export: bool,
    },

    /// Export whole-repository detail and summary lineage from the store
    Export {
        /// Output directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Drop and recreate every table of the store
    Reset,

    /// Print row counts of the store
    Stats,
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
