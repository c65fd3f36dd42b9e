//! Data root resolution.

use std::env;
use std::path::PathBuf;

use super::error::PathError;

/// Environment variable overriding the data root.
pub const DATA_DIR_ENV: &str = "HOARD_DATA_DIR";

/// Get the root directory for application data.
///
/// Resolution order:
/// 1. `HOARD_DATA_DIR` environment variable
/// 2. System data directory (e.g., `~/.local/share/hoard`)
///
/// The directory is not created here; callers use
/// [`ensure_directory`](super::ensure_directory) on the specific storage unit.
pub fn data_root() -> Result<PathBuf, PathError> {
    if let Ok(path) = env::var(DATA_DIR_ENV) {
        if !path.trim().is_empty() {
            return normalize_user_path(&path);
        }
    }

    let data_dir = dirs::data_local_dir().ok_or(PathError::NoBaseDir("data"))?;
    Ok(data_dir.join("hoard"))
}

/// Normalize a user-provided path, expanding `~` and making it absolute.
pub fn normalize_user_path(raw: &str) -> Result<PathBuf, PathError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PathError::EmptyPath);
    }

    let expanded = if trimmed.starts_with("~/") || trimmed == "~" {
        let home = dirs::home_dir().ok_or(PathError::NoBaseDir("home"))?;
        if trimmed == "~" {
            home
        } else {
            home.join(trimmed.trim_start_matches("~/"))
        }
    } else {
        PathBuf::from(trimmed)
    };

    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        env::current_dir()
            .map(|cwd| cwd.join(expanded))
            .map_err(PathError::CurrentDir)
    }
}
