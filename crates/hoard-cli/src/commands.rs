//! Subcommand definitions.

use std::path::PathBuf;

use clap::Subcommand;

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download one or more direct media URLs
    Download {
        /// URLs to download
        #[arg(required = true)]
        urls: Vec<String>,
        /// Destination directory
        #[arg(long, short = 'd')]
        dest: PathBuf,
        /// Queue the URLs as one group with this group type
        #[arg(long)]
        group: Option<String>,
    },

    /// Inspect or clear the caches
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },

    /// Thumbnail cache operations
    Thumbs {
        #[command(subcommand)]
        command: ThumbsCommand,
    },
}

/// `hoard cache ...`
#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Show entry counts and sizes
    Stats,
    /// Clear caches (everything when no selector is given)
    Clear {
        /// Clear a single TTL cache namespace
        #[arg(long)]
        namespace: Option<String>,
        /// Clear the thumbnail cache
        #[arg(long)]
        thumbnails: bool,
        /// Clear the post/pool cache
        #[arg(long)]
        posts: bool,
    },
}

/// `hoard thumbs ...`
#[derive(Subcommand, Debug)]
pub enum ThumbsCommand {
    /// Resolve URLs through the cache and print local paths
    Fetch {
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Fetch URLs into the cache in the background
    Warm {
        #[arg(required = true)]
        urls: Vec<String>,
    },
}
