//! Configuration management
//!
//! This module handles loading, validation, and management of the Labbot configuration.
//! Configuration is stored in TOML format at ~/.labbot/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Log level, data directory, database file name
//! - **dialogue**: Message language and the trigger-word sets used for branching
//! - **report**: Presentation settings for the calculation report
//! - **telegram**: Telegram transport settings (optional)
//!
//! The Telegram bot token is never stored in the file; it is read from the
//! `LABBOT_TELEGRAM_TOKEN` environment variable.
//!
//! # Examples
//!
//! ```no_run
//! use labbot_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//!
//! println!("Database: {:?}", config.db_path());
//! println!("Markers: {:?}", config.dialogue.instrument_markers);
//! # Ok(())
//! # }
//! ```

use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::dialogue::{Language, Lexicon};

/// Environment variable holding the Telegram bot token
pub const TELEGRAM_TOKEN_ENV: &str = "LABBOT_TELEGRAM_TOKEN";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Core engine settings
    pub core: CoreConfig,

    /// Dialogue vocabulary and limits
    #[serde(default)]
    pub dialogue: DialogueConfig,

    /// Report presentation
    #[serde(default)]
    pub report: ReportConfig,

    /// Telegram transport (optional)
    #[serde(default)]
    pub telegram: TelegramConfig,
}

/// Core engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Data directory path (supports ~ expansion)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// SQLite database file name, relative to `data_dir`
    #[serde(default = "default_db_file")]
    pub db_file: String,
}

/// Dialogue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueConfig {
    /// Language of outbound messages (en, mn)
    #[serde(default)]
    pub language: Language,

    /// Words that start the instrument-error part of a measurement message
    #[serde(default = "default_instrument_markers")]
    pub instrument_markers: Vec<String>,

    /// Words that skip the instrument error
    #[serde(default = "default_skip_words")]
    pub skip_words: Vec<String>,

    /// Messages that reset the calculation
    #[serde(default = "default_reset_words")]
    pub reset_words: Vec<String>,

    /// Maximum chained follow-up steps per user message
    #[serde(default = "default_max_follow_ups")]
    pub max_follow_ups: usize,

    /// Seconds an untouched session is kept in memory
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            language: Language::default(),
            instrument_markers: default_instrument_markers(),
            skip_words: default_skip_words(),
            reset_words: default_reset_words(),
            max_follow_ups: default_max_follow_ups(),
            session_idle_secs: default_session_idle_secs(),
        }
    }
}

impl DialogueConfig {
    /// Build the trigger-word lexicon
    pub fn lexicon(&self) -> Lexicon {
        Lexicon::new(
            self.instrument_markers.iter().map(String::as_str),
            self.skip_words.iter().map(String::as_str),
            self.reset_words.iter().map(String::as_str),
        )
    }
}

/// Report configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Significant digits for reported values
    #[serde(default = "default_significant_digits")]
    pub significant_digits: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            significant_digits: default_significant_digits(),
        }
    }
}

/// Telegram transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Enable the Telegram bot
    #[serde(default)]
    pub enabled: bool,

    /// User ids allowed to talk to the bot (empty allows everyone)
    #[serde(default)]
    pub allowed_users: Vec<i64>,

    /// Long-poll timeout in seconds
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            allowed_users: Vec::new(),
            poll_timeout_secs: default_poll_timeout(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.labbot")
}

fn default_db_file() -> String {
    "lab_data.db".to_string()
}

fn default_instrument_markers() -> Vec<String> {
    Lexicon::DEFAULT_INSTRUMENT_MARKERS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_skip_words() -> Vec<String> {
    Lexicon::DEFAULT_SKIP_WORDS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_reset_words() -> Vec<String> {
    Lexicon::DEFAULT_RESET_WORDS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_max_follow_ups() -> usize {
    4
}

fn default_session_idle_secs() -> u64 {
    60 * 60
}

fn default_significant_digits() -> usize {
    6
}

fn default_poll_timeout() -> u64 {
    30
}

impl Config {
    /// Load configuration from the default location (~/.labbot/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load_or_create() -> Result<Self, EngineError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate_and_process()?;

        Ok(config)
    }

    /// Create default configuration and save to path
    fn create_default(path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        // Serialize before processing so the file keeps the portable ~ path
        let mut config = Self::default_config();
        let toml_string = toml::to_string_pretty(&config)
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| EngineError::Config(format!("Failed to write config file: {}", e)))?;

        config.validate_and_process()?;

        Ok(config)
    }

    /// Get the default configuration file path (~/.labbot/config.toml)
    fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".labbot").join("config.toml"))
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            core: CoreConfig {
                log_level: default_log_level(),
                data_dir: default_data_dir(),
                db_file: default_db_file(),
            },
            dialogue: DialogueConfig::default(),
            report: ReportConfig::default(),
            telegram: TelegramConfig::default(),
        }
    }

    /// Full path of the SQLite database file
    pub fn db_path(&self) -> PathBuf {
        self.core.data_dir.join(&self.core.db_file)
    }

    /// Telegram bot token from the environment
    pub fn telegram_token(&self) -> Result<String, EngineError> {
        std::env::var(TELEGRAM_TOKEN_ENV)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                EngineError::Config(format!("{} is not set", TELEGRAM_TOKEN_ENV))
            })
    }

    /// Validate and process configuration
    ///
    /// This method:
    /// - Validates the log level, word lists and numeric limits
    /// - Expands ~ in the data directory
    /// - Creates the data directory if it doesn't exist
    fn validate_and_process(&mut self) -> Result<(), EngineError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        if self.core.db_file.trim().is_empty() {
            return Err(EngineError::Config("db_file must not be empty".to_string()));
        }

        for (name, words) in [
            ("instrument_markers", &self.dialogue.instrument_markers),
            ("skip_words", &self.dialogue.skip_words),
            ("reset_words", &self.dialogue.reset_words),
        ] {
            if words.iter().all(|w| w.trim().is_empty()) {
                return Err(EngineError::Config(format!(
                    "{} must contain at least one word",
                    name
                )));
            }
        }

        if self.dialogue.max_follow_ups == 0 {
            return Err(EngineError::Config(
                "max_follow_ups must be at least 1".to_string(),
            ));
        }

        if self.dialogue.session_idle_secs == 0 {
            return Err(EngineError::Config(
                "session_idle_secs must be at least 1".to_string(),
            ));
        }

        if !(1..=17).contains(&self.report.significant_digits) {
            return Err(EngineError::Config(
                "significant_digits must be between 1 and 17".to_string(),
            ));
        }

        self.core.data_dir = expand_path(&self.core.data_dir)?;

        if !self.core.data_dir.exists() {
            fs::create_dir_all(&self.core.data_dir).map_err(|e| {
                EngineError::Config(format!("Failed to create data directory: {}", e))
            })?;
        }

        self.core.data_dir = self
            .core
            .data_dir
            .canonicalize()
            .map_err(|e| EngineError::PathCanonicalization(self.core.data_dir.clone(), e.to_string()))?;

        Ok(())
    }
}

/// Expand ~ in path to user's home directory
fn expand_path(path: &Path) -> Result<PathBuf, EngineError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| EngineError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}
