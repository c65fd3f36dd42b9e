//! CLI-specific error types and mappings.
//!
//! Maps `CoreError` to exit codes and user-facing messages.

use hoard_core::{CacheError, CoreError, PathError, SettingsError};
use thiserror::Error;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Core domain error.
    #[error("{0}")]
    Core(String),

    /// Argument error.
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// IO error (file not found, permission denied, etc.).
    #[error("IO error: {0}")]
    Io(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Cache storage error.
    #[error("Cache error: {0}")]
    Cache(String),

    /// One or more downloads did not complete.
    #[error("{failed} download(s) failed")]
    Downloads {
        /// Number of failed leaf jobs.
        failed: usize,
    },
}

impl CliError {
    /// Map error to appropriate exit code.
    ///
    /// Exit codes follow Unix conventions:
    /// - 0: Success
    /// - 1: General error
    /// - 2: Misuse of shell command (invalid arguments)
    /// - 64-78: Reserved for specific error categories (see sysexits.h)
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Core(_) | Self::Downloads { .. } => 1,
            Self::Arguments(_) => 2, // EX_USAGE
            Self::Io(_) => 74,       // EX_IOERR
            Self::Config(_) => 78,   // EX_CONFIG
            Self::Cache(_) => 73,    // EX_CANTCREAT (closest fit)
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Cache(e) => Self::Cache(e.to_string()),
            CoreError::Settings(e) => Self::Config(e.to_string()),
            CoreError::Path(e) => Self::Config(e.to_string()),
            CoreError::Download(e) => Self::Core(e.user_message()),
            CoreError::Platform(e) => Self::Core(format!("Platform: {e}")),
        }
    }
}

impl From<CacheError> for CliError {
    fn from(err: CacheError) -> Self {
        CoreError::from(err).into()
    }
}

impl From<PathError> for CliError {
    fn from(err: PathError) -> Self {
        CoreError::from(err).into()
    }
}

impl From<SettingsError> for CliError {
    fn from(err: SettingsError) -> Self {
        CoreError::from(err).into()
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(CliError::Arguments("x".into()).exit_code(), 2);
        assert_eq!(CliError::Downloads { failed: 1 }.exit_code(), 1);
        assert_eq!(CliError::Config("x".into()).exit_code(), 78);
    }

    #[test]
    fn core_errors_map_to_categories() {
        let err: CliError = CacheError::Storage("disk".into()).into();
        assert!(matches!(err, CliError::Cache(_)));

        let err: CliError = PathError::EmptyPath.into();
        assert!(matches!(err, CliError::Config(_)));

        let err: CliError = SettingsError::InvalidConcurrency(0).into();
        assert_eq!(err.exit_code(), 78);

        let err: CliError = CoreError::from(hoard_core::DownloadError::url_unavailable("7")).into();
        assert!(matches!(err, CliError::Core(msg) if msg.contains('7')));
    }
}
