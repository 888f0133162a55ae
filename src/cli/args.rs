use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// PhotoPrune: find near-duplicate photos and pick the best of each group
#[derive(Parser, Debug)]
#[command(
    name = "photoprune",
    version,
    about = "Find near-duplicate photos and pick the best shot in each group",
    long_about = "PhotoPrune fingerprints your photos, groups visually similar shots\n\
                   and picks a keeper per group by resolution, sharpness and file size.\n\
                   It never deletes anything: it writes a keep/delete decision file.",
    after_help = "EXAMPLES:\n  \
        photoprune scan ~/Pictures                       Find similar photos\n  \
        photoprune scan ~/Pictures --threshold 8         Stricter matching\n  \
        photoprune scan . --from 2024-01-01 --to 2024-12-31\n  \
        photoprune scan . --output decisions.json        Save the keep/delete plan\n  \
        photoprune plan decisions.json                   Review a saved (or edited) plan\n  \
        photoprune config show                           Show current configuration"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(long, global = true, default_value = "human")]
    pub format: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Quiet mode, minimal output
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan a directory for near-duplicate photos
    Scan {
        /// Directory to scan
        #[arg(default_value = ".")]
        path: String,

        /// Max Hamming distance (0-64) between similar photos [default: from config, 15]
        #[arg(long)]
        threshold: Option<u32>,

        /// Downsample images larger than this before hashing (0 = off)
        #[arg(long, value_name = "PIXELS")]
        max_dimension: Option<u32>,

        /// Fingerprint worker threads (0 = one per core)
        #[arg(long)]
        workers: Option<usize>,

        /// Minimum file size to consider (in bytes)
        #[arg(long)]
        min_size: Option<u64>,

        /// Only photos dated on or after this day (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        from: Option<String>,

        /// Only photos dated on or before this day (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        to: Option<String>,

        /// Write the keep/delete decision file here
        #[arg(long, short, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Show every photo in each group
        #[arg(long)]
        detailed: bool,
    },

    /// Review a saved decision file without recomputing anything
    Plan {
        /// Decision file (current or legacy layout)
        file: PathBuf,

        /// Show every path in each group
        #[arg(long)]
        detailed: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Print the config file location
    Path,

    /// Reset to default configuration
    Reset,

    /// Write a default config file if none exists
    Init,
}

#[derive(ValueEnum, Clone, Debug, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
    Quiet,
}
