use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::card::PostponePolicy;
use crate::utils;

/// Current configuration version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// Rows of the card list shown while browsing
    #[serde(default = "default_browser_height")]
    pub browser_height: u16,
    #[serde(default)]
    pub postpone_policy: PostponePolicy,
    #[serde(default)]
    pub key_bindings: KeyBindings,
    #[serde(default)]
    pub theme: Theme,
    /// Editor command; falls back to `$EDITOR`, then `vi`
    #[serde(default)]
    pub editor: Option<String>,
    #[serde(default = "default_config_version")]
    pub config_version: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyBindings {
    #[serde(default = "default_review")]
    pub review: String,
    #[serde(default = "default_quit")]
    pub quit: String,
    #[serde(default = "default_up")]
    pub up: String,
    #[serde(default = "default_down")]
    pub down: String,
    #[serde(default = "default_edit")]
    pub edit: String,
    #[serde(default = "default_edit_tags")]
    pub edit_tags: String,
    #[serde(default = "default_toggle_delete")]
    pub toggle_delete: String,
    #[serde(default = "default_postpone")]
    pub postpone: String,
    #[serde(default = "default_new_basic")]
    pub new_basic: String,
    #[serde(default = "default_new_verses")]
    pub new_verses: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    #[serde(default = "default_fg")]
    pub fg: String,
    #[serde(default = "default_bg")]
    pub bg: String,
    #[serde(default = "default_highlight_bg")]
    pub highlight_bg: String,
    /// Colour of cards due today or earlier
    #[serde(default = "default_due")]
    pub due: String,
    /// Colour of cards flagged deleted
    #[serde(default = "default_deleted")]
    pub deleted: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            browser_height: default_browser_height(),
            postpone_policy: PostponePolicy::default(),
            key_bindings: KeyBindings::default(),
            theme: Theme::default(),
            editor: None,
            config_version: Some(CURRENT_CONFIG_VERSION),
        }
    }
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            review: default_review(),
            quit: default_quit(),
            up: default_up(),
            down: default_down(),
            edit: default_edit(),
            edit_tags: default_edit_tags(),
            toggle_delete: default_toggle_delete(),
            postpone: default_postpone(),
            new_basic: default_new_basic(),
            new_verses: default_new_verses(),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            fg: default_fg(),
            bg: default_bg(),
            highlight_bg: default_highlight_bg(),
            due: default_due(),
            deleted: default_deleted(),
        }
    }
}

// Default value functions
fn default_database_path() -> String {
    // This is a fallback - actual profile will be determined at load time
    if let Some(data_dir) = utils::get_data_dir(utils::Profile::Prod) {
        data_dir.join("cards.db").to_string_lossy().to_string()
    } else {
        "~/.local/share/sprout/cards.db".to_string()
    }
}

fn default_browser_height() -> u16 {
    6
}

fn default_review() -> String {
    "r".to_string()
}

fn default_quit() -> String {
    "q".to_string()
}

fn default_up() -> String {
    "k".to_string()
}

fn default_down() -> String {
    "j".to_string()
}

fn default_edit() -> String {
    "e".to_string()
}

fn default_edit_tags() -> String {
    "t".to_string()
}

fn default_toggle_delete() -> String {
    "d".to_string()
}

fn default_postpone() -> String {
    "+".to_string()
}

fn default_new_basic() -> String {
    "b".to_string()
}

fn default_new_verses() -> String {
    "v".to_string()
}

fn default_fg() -> String {
    "white".to_string()
}

fn default_bg() -> String {
    "black".to_string()
}

fn default_highlight_bg() -> String {
    "blue".to_string()
}

fn default_due() -> String {
    "yellow".to_string()
}

fn default_deleted() -> String {
    "darkgray".to_string()
}

fn default_config_version() -> Option<u32> {
    Some(CURRENT_CONFIG_VERSION)
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config directory: {0}")]
    ConfigDirError(String),
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to write config file: {0}")]
    WriteError(String),
}

impl Config {
    /// Load configuration from file, or create default if missing
    /// Uses the provided profile to determine config and database paths
    pub fn load_with_profile(profile: utils::Profile) -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path(profile)?;
        Self::load_from(&config_path, profile)
    }

    /// Load configuration from an explicit file path, creating it with
    /// defaults if missing. A database path left empty in the file is
    /// resolved against the profile.
    pub fn load_from(config_path: &Path, profile: utils::Profile) -> Result<Self, ConfigError> {
        if config_path.exists() {
            let contents = fs::read_to_string(config_path)
                .map_err(|e| ConfigError::ReadError(e.to_string()))?;
            let mut config: Config = toml::from_str(&contents)?;

            if config.database_path.trim().is_empty() {
                config.database_path = Self::default_database_path_for_profile(profile);
            }
            if config.browser_height == 0 {
                log::warn!("browser_height must be at least 1, using {}", default_browser_height());
                config.browser_height = default_browser_height();
            }
            if config.config_version != Some(CURRENT_CONFIG_VERSION) {
                log::warn!(
                    "config version {:?} differs from {}, missing fields use defaults",
                    config.config_version,
                    CURRENT_CONFIG_VERSION
                );
            }

            Ok(config)
        } else {
            // Create default config and save it
            let mut config = Config::default();
            config.database_path = Self::default_database_path_for_profile(profile);
            config.save_to(config_path)?;
            log::info!("wrote default config to {}", config_path.display());
            Ok(config)
        }
    }

    pub fn save_to(&mut self, config_path: &Path) -> Result<(), ConfigError> {
        // Ensure config version is set before saving
        self.config_version = Some(CURRENT_CONFIG_VERSION);

        // Create parent directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteError(e.to_string()))?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::WriteError(format!("Failed to serialize config: {}", e)))?;

        fs::write(config_path, toml_string)
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the config file
    pub fn get_config_path(profile: utils::Profile) -> Result<PathBuf, ConfigError> {
        let config_dir = utils::get_config_dir(profile)
            .ok_or_else(|| ConfigError::ConfigDirError("Could not determine config directory".to_string()))?;
        Ok(config_dir.join("config.toml"))
    }

    /// Get default database path for a specific profile
    fn default_database_path_for_profile(profile: utils::Profile) -> String {
        if let Some(data_dir) = utils::get_data_dir(profile) {
            data_dir.join("cards.db").to_string_lossy().to_string()
        } else {
            // Fallback paths - platform-specific
            #[cfg(target_os = "macos")]
            {
                match profile {
                    utils::Profile::Dev => "~/Library/Application Support/sprout-dev/cards.db".to_string(),
                    utils::Profile::Prod => "~/Library/Application Support/sprout/cards.db".to_string(),
                }
            }
            #[cfg(not(target_os = "macos"))]
            {
                match profile {
                    utils::Profile::Dev => "~/.local/share/sprout-dev/cards.db".to_string(),
                    utils::Profile::Prod => "~/.local/share/sprout/cards.db".to_string(),
                }
            }
        }
    }

    /// Get the expanded database path (with ~ expansion)
    pub fn get_database_path(&self) -> PathBuf {
        utils::expand_path(&self.database_path)
    }

    /// The command used to edit card text
    pub fn editor_command(&self) -> String {
        self.editor
            .clone()
            .filter(|cmd| !cmd.trim().is_empty())
            .or_else(|| std::env::var("EDITOR").ok().filter(|cmd| !cmd.trim().is_empty()))
            .unwrap_or_else(|| "vi".to_string())
    }
}
