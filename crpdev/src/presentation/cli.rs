use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "crpdev: corpus research project tooling", long_about = None)]
pub struct Cli {
    /// JSON settings file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Project base directory (overrides the settings file)
    #[arg(long, global = true)]
    pub base: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum ProjectCommands {
    /// Load a project and print its directories
    Show { project: String, user: String },
    /// List project descriptors in a user's area without loading them
    Discover { user: String },
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(subcommand)]
    Project(ProjectCommands),

    /// Print hit totals from a project's count table
    Counts {
        project: String,
        user: String,
        /// Only this QC (1-based)
        #[arg(long)]
        qc: Option<usize>,
    },

    /// Resolve one page of hits to their storage locations (JSON on stdout)
    Resolve {
        project: String,
        user: String,
        #[arg(long, default_value_t = 1)]
        qc: usize,
        /// Restrict to one sub-category
        #[arg(long = "sub")]
        sub_category: Option<String>,
        #[arg(long, default_value_t = 0)]
        start: u64,
        #[arg(long, default_value_t = 50)]
        count: u64,
        /// Scan cursor file: read before resolving, rewritten afterwards
        #[arg(long)]
        cursor: Option<PathBuf>,
    },

    /// Reassemble a chunked upload from fragment files named `<name>.<chunk number>`
    Assemble {
        user: String,
        /// Name of the reassembled file
        file: String,
        /// Declared number of chunks
        #[arg(long)]
        total: u32,
        /// Directory receiving the reassembled file
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
        fragments: Vec<PathBuf>,
    },
}
