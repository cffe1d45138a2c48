//! User settings for clubdues
//!
//! Manages host-application preferences: club identity for generated
//! notices, currency code, and recurring-generation bounds.

use serde::{Deserialize, Serialize};

use super::paths::DuesPaths;
use crate::error::DuesError;

/// User settings for clubdues
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Club name used to sign dunning notices
    #[serde(default = "default_club_name")]
    pub club_name: String,

    /// Currency code statements are expected in
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Recurring scheduler look-ahead window in days
    #[serde(default = "default_lookahead_days")]
    pub lookahead_days: i64,

    /// Safety bound on instances generated per template per scheduler run
    #[serde(default = "default_max_generations")]
    pub max_generations_per_run: u32,
}

fn default_schema_version() -> u32 {
    1
}

fn default_club_name() -> String {
    "The club".to_string()
}

fn default_currency() -> String {
    "EUR".to_string()
}

fn default_lookahead_days() -> i64 {
    30
}

fn default_max_generations() -> u32 {
    12
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            club_name: default_club_name(),
            currency: default_currency(),
            lookahead_days: default_lookahead_days(),
            max_generations_per_run: default_max_generations(),
        }
    }
}

impl Settings {
    /// Load settings from disk, or create default settings if file doesn't exist
    pub fn load_or_create(paths: &DuesPaths) -> Result<Self, DuesError> {
        let settings_path = paths.settings_file();

        if settings_path.exists() {
            let contents = std::fs::read_to_string(&settings_path)
                .map_err(|e| DuesError::Io(format!("Failed to read settings file: {}", e)))?;

            let settings: Settings = serde_json::from_str(&contents)
                .map_err(|e| DuesError::Json(format!("Failed to parse settings file: {}", e)))?;

            Ok(settings)
        } else {
            // Don't save yet - let caller decide when to persist
            Ok(Settings::default())
        }
    }

    /// Save settings to disk
    pub fn save(&self, paths: &DuesPaths) -> Result<(), DuesError> {
        paths.ensure_directories()?;

        let settings_path = paths.settings_file();
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| DuesError::Json(format!("Failed to serialize settings: {}", e)))?;

        std::fs::write(&settings_path, contents)
            .map_err(|e| DuesError::Io(format!("Failed to write settings file: {}", e)))?;

        Ok(())
    }
}
