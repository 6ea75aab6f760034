use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;

/// Files below this size are treated as broken by `clean`.
pub const DEFAULT_MIN_FILE_SIZE: u64 = 100 * 1024;

/// Application configuration loaded from TOML config file.
/// Every field has a default, so the file itself is optional.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Force simulate-only mode for every command, regardless of `--dry-run`.
    pub simulate_only: bool,
    /// Minimum size in bytes for a file to survive `clean`.
    pub min_file_size: u64,
    /// Name patterns used to discover audio files (`*.mp3` style).
    pub audio_patterns: Vec<String>,
    /// Folder name used when an artist sanitizes to nothing.
    pub fallback_artist_folder: String,
    /// File stem used when "artist - title" sanitizes to nothing.
    pub fallback_file_name: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            simulate_only: false,
            min_file_size: DEFAULT_MIN_FILE_SIZE,
            audio_patterns: crate::AUDIO_PATTERNS.iter().map(|p| p.to_string()).collect(),
            fallback_artist_folder: "Unknown_Artist".to_string(),
            fallback_file_name: "unknown_file".to_string(),
        }
    }
}

impl AppConfig {
    /// Load config from `~/.config/tunesort/config.toml`.
    /// Returns default config if file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Load config from an explicit path, falling back to defaults on failure.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(config) => {
                    log::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    log::warn!(
                        "Failed to parse {}: {}. Using defaults.",
                        path.display(),
                        e
                    );
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!(
                    "Failed to read {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Discovery patterns as borrowed slices, ready for the filesystem layer.
    pub fn patterns(&self) -> Vec<&str> {
        self.audio_patterns.iter().map(String::as_str).collect()
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
