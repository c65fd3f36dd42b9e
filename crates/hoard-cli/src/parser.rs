//! Main CLI parser and top-level argument handling.

use clap::Parser;

use crate::commands::Commands;

/// Download media and manage hoard's local caches.
#[derive(Parser)]
#[command(name = "hoard")]
#[command(about = "Download media and manage local caches")]
#[command(version)]
pub struct Cli {
    /// Maximum concurrent downloads
    #[arg(long, global = true, env = "HOARD_CONCURRENCY")]
    pub concurrency: Option<u32>,

    /// Thumbnail cache budget in bytes
    #[arg(long = "thumbnail-budget", global = true, env = "HOARD_THUMBNAIL_BUDGET")]
    pub thumbnail_budget: Option<u64>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
