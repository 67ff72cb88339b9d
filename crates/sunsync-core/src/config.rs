use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a single-line summary of all errors
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the weather database; defaults to the config file's directory
    #[serde(default)]
    pub config_dir: PathBuf,

    #[serde(default)]
    pub weather: WeatherConfig,

    #[serde(default)]
    pub notifications: NotificationsConfig,

    #[serde(default)]
    pub companion: CompanionConfig,
}

/// Temperature unit preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Metric,
    Imperial,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Where to fetch the forecast for.
///
/// Coordinates take precedence over the place name when both are set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationConfig {
    /// Free-form place query, e.g. "94043,USA" or "Berlin"
    #[serde(default)]
    pub place: String,

    #[serde(default)]
    pub coordinates: Option<Coordinates>,
}

impl LocationConfig {
    pub fn named(place: impl Into<String>) -> Self {
        Self {
            place: place.into(),
            coordinates: None,
        }
    }

    pub fn at(latitude: f64, longitude: f64) -> Self {
        Self {
            place: String::new(),
            coordinates: Some(Coordinates {
                latitude,
                longitude,
            }),
        }
    }

    /// Human-readable form for log lines
    pub fn describe(&self) -> String {
        match self.coordinates {
            Some(c) => format!("{:.4},{:.4}", c.latitude, c.longitude),
            None => self.place.clone(),
        }
    }
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self::named("94043,USA")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// Daily forecast endpoint
    pub base_url: String,

    /// API key sent as `appid` when present
    pub api_key: Option<String>,

    pub units: TemperatureUnit,

    /// Number of forecast days requested
    pub forecast_days: u8,

    /// Refresh interval in minutes
    pub refresh_minutes: u32,

    /// HTTP request timeout in seconds
    pub timeout_secs: u64,

    pub location: LocationConfig,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openweathermap.org/data/2.5/forecast/daily".to_string(),
            api_key: None,
            units: TemperatureUnit::Metric,
            forecast_days: 14,
            refresh_minutes: 180,
            timeout_secs: 10,
            location: LocationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    /// User preference: show "new weather" notifications
    pub enabled: bool,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanionConfig {
    /// Base URL of the paired companion device; unset means not paired
    pub peer_url: Option<String>,

    /// Bound on handshake and push, in seconds
    pub timeout_secs: u64,
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self {
            peer_url: None,
            timeout_secs: 5,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sunsync");

        Self {
            config_dir,
            weather: WeatherConfig::default(),
            notifications: NotificationsConfig::default(),
            companion: CompanionConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path, writing defaults if it doesn't exist
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            let mut config = Self::default();
            if let Some(parent) = config_path.parent() {
                config.config_dir = parent.to_path_buf();
            }
            config.save_to(config_path)?;
            return Ok(config);
        }

        let contents =
            std::fs::read_to_string(config_path).context("Failed to read config file")?;

        let mut config: Config =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if config.config_dir.as_os_str().is_empty() {
            if let Some(parent) = config_path.parent() {
                config.config_dir = parent.to_path_buf();
            }
        }

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns an error if validation fails with critical errors; warnings are logged.
    pub fn load_validated(config_path: Option<&Path>) -> Result<(Self, ValidationResult)> {
        let config = match config_path {
            Some(path) => Self::load_from(path)?,
            None => Self::load()?,
        };
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()).into());
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.weather.base_url, "weather.base_url", &mut result);

        let location = &self.weather.location;
        match location.coordinates {
            Some(c) => {
                if !(-90.0..=90.0).contains(&c.latitude) {
                    result.add_error(
                        "weather.location.coordinates.latitude",
                        "Latitude must be between -90 and 90",
                    );
                }
                if !(-180.0..=180.0).contains(&c.longitude) {
                    result.add_error(
                        "weather.location.coordinates.longitude",
                        "Longitude must be between -180 and 180",
                    );
                }
            }
            None if location.place.trim().is_empty() => {
                result.add_error(
                    "weather.location",
                    "Either a place name or coordinates must be set",
                );
            }
            None => {}
        }

        if self.weather.forecast_days == 0 {
            result.add_error("weather.forecast_days", "Must request at least one day");
        } else if self.weather.forecast_days > 16 {
            result.add_warning(
                "weather.forecast_days",
                "Most providers cap daily forecasts at 16 days",
            );
        }

        if self.weather.refresh_minutes == 0 {
            result.add_warning(
                "weather.refresh_minutes",
                "Periodic refresh disabled (0 minutes)",
            );
        } else if self.weather.refresh_minutes > 1440 {
            result.add_warning(
                "weather.refresh_minutes",
                "Weather refresh interval is more than 24 hours",
            );
        }

        if self.weather.timeout_secs == 0 {
            result.add_error("weather.timeout_secs", "Timeout must be greater than 0");
        }

        match &self.companion.peer_url {
            Some(peer) => {
                self.validate_url(peer, "companion.peer_url", &mut result);
                if self.companion.timeout_secs == 0 {
                    result.add_error("companion.timeout_secs", "Timeout must be greater than 0");
                }
            }
            None => result.add_warning(
                "companion.peer_url",
                "No companion device paired - mirroring disabled",
            ),
        }

        result
    }

    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if url.port() == Some(0) {
                    result.add_error(field_name, "Port cannot be 0");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Path of the SQLite database holding the snapshot and notification state
    pub fn store_path(&self) -> PathBuf {
        self.config_dir.join("weather.db")
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("sunsync");

        Ok(config_dir.join("config.toml"))
    }
}
