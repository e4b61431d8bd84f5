use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::constants::{DEFAULT_MIN_GENRE_SUPPORT, DEFAULT_POSTER_BASE_URL};
use crate::domain::Rgb;
use crate::error::{PipelineError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineSettings,
    pub color: ColorSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineSettings {
    /// Prefix joined onto the relative `poster_path` of each movie
    pub poster_base_url: String,
    /// Minimum number of movies a genre needs to keep its indicator column
    pub min_genre_support: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            poster_base_url: DEFAULT_POSTER_BASE_URL.to_string(),
            min_genre_support: DEFAULT_MIN_GENRE_SUPPORT,
        }
    }
}

/// What to do with a record whose poster could not be fetched or decoded
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FetchFailurePolicy {
    Exclude,
    DefaultColor,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ColorSettings {
    pub concurrency: usize,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    /// Optional outgoing request budget; unset means unthrottled
    pub requests_per_minute: Option<u64>,
    pub on_failure: FetchFailurePolicy,
    pub default_color: [u8; 3],
}

impl Default for ColorSettings {
    fn default() -> Self {
        Self {
            concurrency: 8,
            request_timeout_secs: 10,
            max_retries: 3,
            backoff_base_ms: 250,
            requests_per_minute: None,
            on_failure: FetchFailurePolicy::Exclude,
            default_color: [0, 0, 0],
        }
    }
}

impl ColorSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn default_rgb(&self) -> Rgb {
        Rgb::from(self.default_color)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    pub directory: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: "logs".to_string(),
        }
    }
}

impl Config {
    /// Load `config.toml` from the working directory, falling back to defaults
    /// when the file does not exist.
    pub fn load() -> Result<Self> {
        if Path::new(DEFAULT_CONFIG_PATH).exists() {
            Self::load_from(DEFAULT_CONFIG_PATH)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config_content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let config = Self::from_toml(&config_content)?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pipeline.poster_base_url.trim().is_empty() {
            return Err(PipelineError::Config(
                "pipeline.poster_base_url must not be empty".to_string(),
            ));
        }
        if self.pipeline.min_genre_support == 0 {
            return Err(PipelineError::Config(
                "pipeline.min_genre_support must be at least 1".to_string(),
            ));
        }
        if self.color.concurrency == 0 {
            return Err(PipelineError::Config(
                "color.concurrency must be at least 1".to_string(),
            ));
        }
        if self.color.requests_per_minute == Some(0) {
            return Err(PipelineError::Config(
                "color.requests_per_minute must be positive when set".to_string(),
            ));
        }
        Ok(())
    }
}
