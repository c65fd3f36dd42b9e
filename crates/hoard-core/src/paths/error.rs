//! Errors from data-directory resolution.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Why a storage location could not be resolved or prepared.
#[derive(Debug, Error)]
pub enum PathError {
    /// The OS reports no location of the given kind (`"home"`, `"data"`).
    #[error("No {0} directory is available on this system")]
    NoBaseDir(&'static str),

    /// The location exists but is a file.
    #[error("{0} exists but is not a directory")]
    NotADirectory(PathBuf),

    /// The location is missing and may not be created.
    #[error("Directory {0} does not exist")]
    Missing(PathBuf),

    /// A filesystem call on the location failed.
    #[error("Cannot {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Blank path or override.
    #[error("Path cannot be empty")]
    EmptyPath,

    /// A relative path could not be anchored.
    #[error("Cannot determine current directory: {0}")]
    CurrentDir(#[source] io::Error),
}

impl PathError {
    pub(crate) fn io(action: &'static str, path: &std::path::Path, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}
