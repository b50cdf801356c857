//! Application settings persisted as JSON in the platform config directory.
//!
//! A missing or unreadable file yields [`AppSettings::default`]; the path can be
//! overridden with the [`CONFIG_ENV_VAR`] environment variable.

use crate::error::{FastmigError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV_VAR: &str = "FASTMIG_CONFIG";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct AppSettings {
    /// Rows shown by previews (default: 5)
    pub preview_row_limit: usize,
    /// Maximum undo entries kept; `None` keeps everything
    pub history_depth: Option<usize>,
    /// Field delimiter for CSV input and output
    pub csv_delimiter: char,
    /// Where recorded macros are saved when no directory is given
    pub macro_dir: PathBuf,
    /// Default `env_logger` filter, used when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            preview_row_limit: 5,
            history_depth: None,
            csv_delimiter: ',',
            macro_dir: PathBuf::from("."),
            log_level: "warn".to_owned(),
        }
    }
}

impl AppSettings {
    /// The delimiter as the single byte the CSV reader expects.
    ///
    /// # Errors
    ///
    /// [`FastmigError::Config`] when `csv_delimiter` is not an ASCII character.
    pub fn delimiter_byte(&self) -> Result<u8> {
        u8::try_from(self.csv_delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| {
                FastmigError::Config(format!(
                    "csv_delimiter must be a single ASCII character, got {:?}",
                    self.csv_delimiter
                ))
            })
    }
}

pub fn get_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR)
        && !path.is_empty()
    {
        return PathBuf::from(path);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fastmig")
        .join("config.json")
}

/// Loads settings from [`get_config_path`], falling back to defaults when the
/// file is missing or unreadable.
pub fn load_app_config() -> AppSettings {
    let path = get_config_path();
    if !path.exists() {
        return AppSettings::default();
    }

    match std::fs::read_to_string(&path)
        .map_err(|e| e.to_string())
        .and_then(|content| {
            serde_json::from_str::<AppSettings>(&content).map_err(|e| e.to_string())
        }) {
        Ok(settings) => settings,
        Err(e) => {
            log::warn!("Ignoring config at {}: {e}", path.display());
            AppSettings::default()
        }
    }
}

/// Writes `settings` as pretty JSON to [`get_config_path`], creating the
/// parent directory first.
///
/// # Errors
///
/// [`FastmigError::Config`] if the directory or file cannot be written.
pub fn save_app_config(settings: &AppSettings) -> Result<()> {
    let path = get_config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| FastmigError::Config(e.to_string()))?;
    }
    let content =
        serde_json::to_string_pretty(settings).map_err(|e| FastmigError::Config(e.to_string()))?;
    std::fs::write(&path, content).map_err(|e| FastmigError::Config(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = AppSettings::default();
        assert_eq!(settings.preview_row_limit, 5);
        assert_eq!(settings.history_depth, None);
        assert_eq!(settings.delimiter_byte().ok(), Some(b','));
        assert_eq!(settings.log_level, "warn");
    }

    #[test]
    fn test_partial_file_fills_defaults() -> Result<()> {
        let settings: AppSettings =
            serde_json::from_str(r#"{"history_depth": 20, "csv_delimiter": ";"}"#)
                .map_err(|e| FastmigError::Config(e.to_string()))?;
        assert_eq!(settings.history_depth, Some(20));
        assert_eq!(settings.delimiter_byte()?, b';');
        assert_eq!(settings.preview_row_limit, 5);
        Ok(())
    }

    #[test]
    fn test_non_ascii_delimiter_rejected() {
        let settings = AppSettings {
            csv_delimiter: '§',
            ..AppSettings::default()
        };
        assert!(matches!(
            settings.delimiter_byte(),
            Err(FastmigError::Config(_))
        ));
    }
}
