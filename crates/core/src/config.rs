use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::Result;
use crate::rhythm::metronome::Metronome;

/// Startup defaults for a metronome session.
///
/// Only these defaults are persisted; the live timeline (origins, nudges,
/// tapped tempo) is rebuilt from scratch every run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Initial tempo in beats per minute
    pub bpm: f64,
    /// Initial time signature in beats per bar
    pub beats_per_bar: u32,
    /// Frames per second of the control loop that takes snapshots
    pub target_fps: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            beats_per_bar: 4,
            target_fps: 60,
        }
    }
}

impl Settings {
    /// Build a metronome from these settings, reading time from `clock`.
    pub fn metronome<C: Clock>(&self, clock: C) -> Result<Metronome<C>> {
        Metronome::with_signature(self.bpm, self.beats_per_bar, clock)
    }
}

/// Configuration manager for metronome settings
/// Separates the schema (valid ranges, descriptions) from the persisted values.
/// Configuration is stored in metro.json in the working directory by default
pub struct ConfigManager {
    config_path: PathBuf,
    settings: Settings,
}

/// Available configuration options with validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSchema {
    pub bpm: ConfigOption<f64>,
    pub beats_per_bar: ConfigOption<u32>,
    pub target_fps: ConfigOption<u32>,
}

/// Configuration option with its default and valid range
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigOption<T> {
    pub default: T,
    pub valid_range: Option<(T, T)>,
    pub description: String,
}

/// Persisted configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    pub settings: Settings,
    pub created_at: String,
    pub modified_at: String,
}

impl ConfigManager {
    /// Create a new configuration manager
    /// If no path is provided, defaults to 'metro.json' in the current working directory
    pub fn new(config_path: Option<PathBuf>) -> Self {
        let config_path = config_path.unwrap_or_else(|| PathBuf::from("metro.json"));

        Self {
            config_path,
            settings: Settings::default(),
        }
    }

    /// Load settings from configuration file
    /// Writes a default file if none exists yet
    pub fn load(&mut self) -> std::result::Result<Settings, ConfigError> {
        if !self.config_path.exists() {
            log::info!(
                "No config at {}, writing defaults",
                self.config_path.display()
            );
            self.save()?;
            return Ok(self.settings.clone());
        }

        let content = fs::read_to_string(&self.config_path)
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;

        let config_file: ConfigFile =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if config_file.version != env!("CARGO_PKG_VERSION") {
            log::warn!(
                "Config file version {} doesn't match application version {}. Using defaults for new settings.",
                config_file.version,
                env!("CARGO_PKG_VERSION")
            );
        }

        Self::validate_settings(&config_file.settings).map_err(ConfigError::ValidationError)?;

        self.settings = config_file.settings;
        Ok(self.settings.clone())
    }

    /// Save current settings to configuration file
    pub fn save(&self) -> std::result::Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            if parent != Path::new("") && parent != Path::new(".") {
                fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError(e.to_string()))?;
            }
        }

        let now = chrono::Utc::now().to_rfc3339();
        let created_at = self.existing_created_at().unwrap_or_else(|| now.clone());
        let config_file = ConfigFile {
            version: env!("CARGO_PKG_VERSION").to_string(),
            settings: self.settings.clone(),
            created_at,
            modified_at: now,
        };

        let content = serde_json::to_string_pretty(&config_file)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        fs::write(&self.config_path, content)
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }

    fn existing_created_at(&self) -> Option<String> {
        let content = fs::read_to_string(&self.config_path).ok()?;
        let file: ConfigFile = serde_json::from_str(&content).ok()?;
        Some(file.created_at)
    }

    /// Validate, then update settings and save to file
    pub fn update_settings(&mut self, settings: Settings) -> std::result::Result<(), ConfigError> {
        Self::validate_settings(&settings).map_err(ConfigError::ValidationError)?;
        self.settings = settings;
        self.save()
    }

    /// Get current settings
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Get configuration file path
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Get configuration schema with available options
    pub fn schema() -> ConfigSchema {
        ConfigSchema {
            bpm: ConfigOption {
                default: 120.0,
                valid_range: Some((20.0, 999.0)),
                description: "Initial tempo in beats per minute".to_string(),
            },
            beats_per_bar: ConfigOption {
                default: 4,
                valid_range: Some((1, 32)),
                description: "Initial time signature in beats per bar".to_string(),
            },
            target_fps: ConfigOption {
                default: 60,
                valid_range: Some((1, 240)),
                description: "Snapshots taken per second by the frame loop".to_string(),
            },
        }
    }

    /// Validate settings against schema
    pub fn validate_settings(settings: &Settings) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let schema = Self::schema();

        if let Some((min, max)) = schema.bpm.valid_range {
            // contains() also rejects NaN
            if !(min..=max).contains(&settings.bpm) {
                errors.push(format!("bpm must be between {} and {}", min, max));
            }
        }

        if let Some((min, max)) = schema.beats_per_bar.valid_range {
            if settings.beats_per_bar < min || settings.beats_per_bar > max {
                errors.push(format!("beats_per_bar must be between {} and {}", min, max));
            }
        }

        if let Some((min, max)) = schema.target_fps.valid_range {
            if settings.target_fps < min || settings.target_fps > max {
                errors.push(format!("target_fps must be between {} and {}", min, max));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Reset settings to defaults
    pub fn reset_to_defaults(&mut self) -> std::result::Result<(), ConfigError> {
        self.settings = Settings::default();
        self.save()
    }
}

/// Configuration error types
#[derive(Debug)]
pub enum ConfigError {
    ReadError(String),
    WriteError(String),
    ParseError(String),
    SerializeError(String),
    ValidationError(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(msg) => write!(f, "Failed to read config file: {}", msg),
            ConfigError::WriteError(msg) => write!(f, "Failed to write config file: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "Failed to parse config file: {}", msg),
            ConfigError::SerializeError(msg) => write!(f, "Failed to serialize config: {}", msg),
            ConfigError::ValidationError(errors) => {
                write!(f, "Config validation errors: {}", errors.join(", "))
            }
        }
    }
}

impl std::error::Error for ConfigError {}
