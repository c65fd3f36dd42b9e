//! Destination path planning for downloads.
//!
//! A transfer writes into `<output><suffix>` and renames onto the output path
//! once the body is complete, so a file at the output path is always whole.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use hoard_core::{DownloadError, MediaItem};

/// A planned download destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadDestination {
    /// Final file path.
    pub output_path: PathBuf,
    /// In-progress file path.
    pub part_path: PathBuf,
}

impl DownloadDestination {
    /// Plan the destination of `item` inside `directory`.
    pub fn plan(directory: &Path, item: &MediaItem, part_suffix: &str) -> Self {
        Self::for_output(directory.join(item.default_file_name()), part_suffix)
    }

    /// Destination for an already chosen output path.
    pub fn for_output(output_path: PathBuf, part_suffix: &str) -> Self {
        let mut part: OsString = output_path.clone().into_os_string();
        part.push(part_suffix);
        Self {
            output_path,
            part_path: PathBuf::from(part),
        }
    }

    /// Ensure the parent directory exists, creating it if necessary.
    pub async fn ensure_dir(&self) -> Result<(), DownloadError> {
        if let Some(parent) = self.output_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }

    /// Length of the in-progress file, 0 if there is none.
    pub async fn part_len(&self) -> u64 {
        tokio::fs::metadata(&self.part_path)
            .await
            .map_or(0, |m| m.len())
    }

    /// Delete the in-progress file if present.
    pub async fn remove_part(&self) {
        if let Err(e) = tokio::fs::remove_file(&self.part_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    target: "hoard.download",
                    path = %self.part_path.display(),
                    error = %e,
                    "Failed to remove partial file"
                );
            }
        }
    }
}
