//! Configuration file parser for ~/.config/tasalert/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde but logged as warnings, since they are
//! usually typos.
use crate::feed::AllowList;
use crate::geo::Coordinate;
use crate::tas::TasFilters;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    /// A value parsed but is out of range.
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// The default home is Hobart.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub latitude: f64,
    pub longitude: f64,

    /// Only report incidents within this many kilometres. Unset = anywhere.
    pub radius_km: Option<f64>,

    /// Allowed `feedType` values (e.g. "warning", "incident"). Unset = all.
    pub feed_types: Option<Vec<String>>,

    /// Allowed `alertLevel` values. Unset = all.
    pub alert_levels: Option<Vec<String>>,

    /// Seconds between polls.
    pub refresh_interval_seconds: u64,

    /// Seconds allowed for one fetch, body included.
    pub request_timeout_seconds: u64,

    /// Alternative feed endpoint. Defaults to the public TasALERT URL.
    pub feed_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            latitude: -42.8821,
            longitude: 147.3272,
            radius_km: None,
            feed_types: None,
            alert_levels: None,
            refresh_interval_seconds: 300,
            request_timeout_seconds: 30,
            feed_url: None,
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 8] = [
        "latitude",
        "longitude",
        "radius_km",
        "feed_types",
        "alert_levels",
        "refresh_interval_seconds",
        "request_timeout_seconds",
        "feed_url",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    ///
    /// Ranges are not checked here; call [`Config::validate`] once any
    /// command-line overrides have been applied.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            home = %config.home(),
            radius_km = ?config.radius_km,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Checks ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ConfigError::Invalid {
                key: "latitude",
                reason: format!("{} is not between -90 and 90", self.latitude),
            });
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ConfigError::Invalid {
                key: "longitude",
                reason: format!("{} is not between -180 and 180", self.longitude),
            });
        }
        if let Some(radius) = self.radius_km {
            if !radius.is_finite() || radius <= 0.0 {
                return Err(ConfigError::Invalid {
                    key: "radius_km",
                    reason: format!("{radius} is not a positive distance"),
                });
            }
        }
        if self.refresh_interval_seconds == 0 {
            return Err(ConfigError::Invalid {
                key: "refresh_interval_seconds",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.request_timeout_seconds == 0 {
            return Err(ConfigError::Invalid {
                key: "request_timeout_seconds",
                reason: "must be at least 1".to_string(),
            });
        }
        if let Some(url) = &self.feed_url {
            let parsed = Url::parse(url).map_err(|e| ConfigError::Invalid {
                key: "feed_url",
                reason: e.to_string(),
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ConfigError::Invalid {
                    key: "feed_url",
                    reason: format!("unsupported scheme {} (only http/https)", parsed.scheme()),
                });
            }
        }
        Ok(())
    }

    pub fn home(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }

    pub fn filters(&self) -> TasFilters {
        TasFilters {
            radius: self.radius_km,
            feed_types: AllowList::new(self.feed_types.clone()),
            alert_levels: AllowList::new(self.alert_levels.clone()),
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

// ============================================================================
// Tests
// ============================================================================
