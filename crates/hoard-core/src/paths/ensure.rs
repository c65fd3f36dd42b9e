//! Directory creation and verification utilities.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use super::error::PathError;

/// Strategy for how to handle missing directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirectoryCreationStrategy {
    /// Create directories automatically if they are missing.
    #[default]
    AutoCreate,
    /// Do not create directories; return an error if missing.
    Disallow,
}

/// Ensure the directory exists and is writable according to the chosen strategy.
pub fn ensure_directory(path: &Path, strategy: DirectoryCreationStrategy) -> Result<(), PathError> {
    if path.as_os_str().is_empty() {
        return Err(PathError::EmptyPath);
    }

    if path.exists() {
        if !path.is_dir() {
            return Err(PathError::NotADirectory(path.to_path_buf()));
        }
    } else {
        match strategy {
            DirectoryCreationStrategy::AutoCreate => {
                fs::create_dir_all(path).map_err(|e| PathError::io("create", path, e))?;
            }
            DirectoryCreationStrategy::Disallow => {
                return Err(PathError::Missing(path.to_path_buf()));
            }
        }
    }

    verify_writable(path)
}

/// Verify a directory is writable by creating and removing a marker file.
pub fn verify_writable(path: &Path) -> Result<(), PathError> {
    let marker = path.join(".hoard_write_test");
    let not_writable = |e| PathError::io("write to", path, e);

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&marker)
        .map_err(not_writable)?;
    file.write_all(b"ok").map_err(not_writable)?;
    drop(file);
    let _ = fs::remove_file(&marker);
    Ok(())
}
