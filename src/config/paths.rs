//! Path management for clubdues
//!
//! Provides XDG-compliant path resolution for configuration and data files.
//!
//! ## Path Resolution Order
//!
//! 1. `CLUBDUES_DATA_DIR` environment variable (if set)
//! 2. Unix (Linux/macOS): `$XDG_CONFIG_HOME/clubdues` or `~/.config/clubdues`
//! 3. Windows: `%APPDATA%\clubdues`

use std::path::PathBuf;

use crate::error::DuesError;

/// Manages all paths used by clubdues
#[derive(Debug, Clone)]
pub struct DuesPaths {
    /// Base directory for all clubdues data
    base_dir: PathBuf,
}

impl DuesPaths {
    /// Create a new DuesPaths instance
    ///
    /// Path resolution:
    /// 1. `CLUBDUES_DATA_DIR` env var (explicit override)
    /// 2. Unix: `$XDG_CONFIG_HOME/clubdues` or `~/.config/clubdues`
    /// 3. Windows: `%APPDATA%\clubdues`
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self, DuesError> {
        let base_dir = if let Ok(custom) = std::env::var("CLUBDUES_DATA_DIR") {
            PathBuf::from(custom)
        } else {
            resolve_default_path()?
        };

        Ok(Self { base_dir })
    }

    /// Create DuesPaths with a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory (~/.config/clubdues/ or equivalent)
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the data directory (~/.config/clubdues/data/)
    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join("data")
    }

    /// Get the path to the settings file
    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the path to the audit log
    pub fn audit_log(&self) -> PathBuf {
        self.base_dir.join("audit.log")
    }

    /// Get the path to parents.json
    pub fn parents_file(&self) -> PathBuf {
        self.data_dir().join("parents.json")
    }

    /// Get the path to members.json
    pub fn members_file(&self) -> PathBuf {
        self.data_dir().join("members.json")
    }

    /// Get the path to costs.json
    pub fn costs_file(&self) -> PathBuf {
        self.data_dir().join("costs.json")
    }

    /// Get the path to payments.json
    pub fn payments_file(&self) -> PathBuf {
        self.data_dir().join("payments.json")
    }

    /// Get the path to allocations.json
    pub fn allocations_file(&self) -> PathBuf {
        self.data_dir().join("allocations.json")
    }

    /// Get the path to statements.json
    pub fn statements_file(&self) -> PathBuf {
        self.data_dir().join("statements.json")
    }

    /// Get the path to transactions.json
    pub fn transactions_file(&self) -> PathBuf {
        self.data_dir().join("transactions.json")
    }

    /// Get the path to cost_types.json
    pub fn cost_types_file(&self) -> PathBuf {
        self.data_dir().join("cost_types.json")
    }

    /// Ensure all required directories exist
    pub fn ensure_directories(&self) -> Result<(), DuesError> {
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| DuesError::Io(format!("Failed to create base directory: {}", e)))?;

        std::fs::create_dir_all(self.data_dir())
            .map_err(|e| DuesError::Io(format!("Failed to create data directory: {}", e)))?;

        Ok(())
    }

    /// Check if clubdues has been initialized (config file exists)
    pub fn is_initialized(&self) -> bool {
        self.settings_file().exists()
    }
}

/// Resolve the default data directory path based on platform
#[cfg(not(windows))]
fn resolve_default_path() -> Result<PathBuf, DuesError> {
    // Unix (Linux/macOS): Use XDG_CONFIG_HOME if set, otherwise ~/.config
    let config_base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").expect("HOME environment variable not set");
            PathBuf::from(home).join(".config")
        });
    Ok(config_base.join("clubdues"))
}

/// Resolve the default data directory path based on platform
#[cfg(windows)]
fn resolve_default_path() -> Result<PathBuf, DuesError> {
    // Windows: Use APPDATA
    let appdata = std::env::var("APPDATA")
        .map_err(|_| DuesError::Storage("Could not determine APPDATA directory".into()))?;
    Ok(PathBuf::from(appdata).join("clubdues"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_custom_base_dir() {
        let temp_dir = TempDir::new().unwrap();
        let paths = DuesPaths::with_base_dir(temp_dir.path().to_path_buf());

        assert_eq!(paths.base_dir(), temp_dir.path());
        assert_eq!(paths.data_dir(), temp_dir.path().join("data"));
    }

    #[test]
    fn test_ensure_directories() {
        let temp_dir = TempDir::new().unwrap();
        let paths = DuesPaths::with_base_dir(temp_dir.path().to_path_buf());

        paths.ensure_directories().unwrap();

        assert!(paths.data_dir().exists());
    }

    #[test]
    fn test_file_paths() {
        let temp_dir = TempDir::new().unwrap();
        let paths = DuesPaths::with_base_dir(temp_dir.path().to_path_buf());

        assert_eq!(paths.settings_file(), temp_dir.path().join("config.json"));
        assert_eq!(
            paths.costs_file(),
            temp_dir.path().join("data").join("costs.json")
        );
    }
}
