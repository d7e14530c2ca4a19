//! Persisted config (picker wording, filename policy) in the app data directory.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::app_data;
use crate::picker::PickerOptions;

pub const CONFIG_FILENAME: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Wording shown by the folder chooser.
    pub picker: PickerConfig,
    /// Append ` (2)`, ` (3)`, ... instead of overwriting a note saved in the same second.
    pub unique_filenames: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PickerConfig {
    pub prompt: String,
    pub message: String,
}

impl Default for PickerConfig {
    fn default() -> Self {
        Self {
            prompt: "Select Notes Folder".to_string(),
            message: "Choose the folder where your notes should be saved:".to_string(),
        }
    }
}

impl Config {
    /// Options for the folder chooser: directories only, creation allowed.
    pub fn picker_options(&self) -> PickerOptions {
        PickerOptions {
            prompt: self.picker.prompt.clone(),
            message: self.picker.message.clone(),
            directories_only: true,
            allow_create: true,
        }
    }
}

/// Load config from the app data directory. Returns default config if missing or invalid.
pub fn load_config() -> Config {
    match app_data::app_data_dir() {
        Some(dir) => load_config_from(&dir.join(CONFIG_FILENAME)),
        None => Config::default(),
    }
}

/// Load config from an explicit file. Returns default config if missing or invalid.
pub fn load_config_from(path: &Path) -> Config {
    let Ok(s) = std::fs::read_to_string(path) else {
        return Config::default();
    };
    match toml::from_str(&s) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring invalid config");
            Config::default()
        }
    }
}

/// Save config to the app data directory.
pub fn save_config(config: &Config) -> Result<(), ConfigError> {
    let data_dir = app_data::app_data_dir().ok_or(ConfigError::NoDataDir)?;
    save_config_to(config, &data_dir.join(CONFIG_FILENAME))
}

pub fn save_config_to(config: &Config, path: &Path) -> Result<(), ConfigError> {
    let s = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;
    std::fs::write(path, s).map_err(ConfigError::Write)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine app data directory")]
    NoDataDir,
    #[error("failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("failed to write config: {0}")]
    Write(std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join(CONFIG_FILENAME));
        assert_eq!(config, Config::default());
        assert!(!config.unique_filenames);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "unique_filenames = true\n[picker]\nprompt = \"Pick vault\"\n").unwrap();

        let config = load_config_from(&path);
        assert!(config.unique_filenames);
        assert_eq!(config.picker.prompt, "Pick vault");
        assert_eq!(config.picker.message, PickerConfig::default().message);
    }

    #[test]
    fn invalid_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "unique_filenames = \"maybe\"").unwrap();
        assert_eq!(load_config_from(&path), Config::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        let config = Config {
            unique_filenames: true,
            ..Config::default()
        };
        save_config_to(&config, &path).unwrap();
        assert_eq!(load_config_from(&path), config);
    }

    #[test]
    fn picker_options_are_directory_only() {
        let opts = Config::default().picker_options();
        assert!(opts.directories_only);
        assert!(opts.allow_create);
    }
}
