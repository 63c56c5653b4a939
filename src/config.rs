//! # Configuration
//!
//! One TOML file, every field optional:
//!
//! ```toml
//! log_level = "info"
//!
//! [encoders]
//! enc1 = { pin_a = 18, pin_b = 16 }
//! enc2 = { pin_a = 24, pin_b = 22 }
//! ambiguous_policy = "literal"   # or "raw_delta"
//!
//! [polling]
//! thread_name = "enc"
//! idle_interval_us = 0
//! stats_interval_secs = 10
//!
//! [publish]
//! attribute_path = "/run/encodio/enc/dot"
//! refresh_interval_ms = 50
//! ```
//!
//! Lookup order is an explicit path, then `<config dir>/encodio/encodio.toml`.
//! Without a file the built-in defaults apply.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::encoder::PollingSettings;
use crate::gpio::{EncodersConfig, GpioError};
use crate::publish::PublishSettings;

const CONFIG_DIR: &str = "encodio";
const CONFIG_FILE: &str = "encodio.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl From<GpioError> for ConfigError {
    fn from(e: GpioError) -> Self {
        ConfigError::Invalid(e.to_string())
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct EncodioConfig {
    pub log_level: String,
    pub encoders: EncodersConfig,
    pub polling: PollingSettings,
    pub publish: PublishSettings,
}

impl Default for EncodioConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            encoders: EncodersConfig::default(),
            polling: PollingSettings::default(),
            publish: PublishSettings::default(),
        }
    }
}

/// Where the active configuration came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults,
}

impl EncodioConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Load from `explicit` if given, else from the default location if it
    /// exists, else fall back to defaults.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, ConfigSource), ConfigError> {
        if let Some(path) = explicit {
            return Ok((Self::from_file(path)?, ConfigSource::File(path.to_path_buf())));
        }

        match default_config_path() {
            Some(path) if path.is_file() => {
                let config = Self::from_file(&path)?;
                Ok((config, ConfigSource::File(path)))
            }
            _ => Ok((Self::default(), ConfigSource::Defaults)),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.encoders.validate()?;
        if self.publish.refresh_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "publish.refresh_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.polling.thread_name.is_empty() {
            return Err(ConfigError::Invalid(
                "polling.thread_name must not be empty".to_string(),
            ));
        }
        self.level()?;
        Ok(())
    }

    pub fn level(&self) -> Result<Level, ConfigError> {
        Level::from_str(&self.log_level)
            .map_err(|_| ConfigError::Invalid(format!("unknown log level '{}'", self.log_level)))
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::AmbiguousPolicy;
    use crate::gpio::PinPair;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = EncodioConfig::from_toml_str("").unwrap();
        assert_eq!(config, EncodioConfig::default());
        assert_eq!(config.level().unwrap(), Level::INFO);
    }

    #[test]
    fn test_partial_file_overrides() {
        let config = EncodioConfig::from_toml_str(
            r#"
            log_level = "debug"

            [encoders]
            enc2 = { pin_a = 5, pin_b = 6 }
            ambiguous_policy = "raw_delta"

            [polling]
            idle_interval_us = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.level().unwrap(), Level::DEBUG);
        assert_eq!(config.encoders.enc1, PinPair { pin_a: 18, pin_b: 16 });
        assert_eq!(config.encoders.enc2, PinPair { pin_a: 5, pin_b: 6 });
        assert_eq!(config.encoders.ambiguous_policy, AmbiguousPolicy::RawDelta);
        assert_eq!(config.polling.idle_interval_us, 250);
        assert_eq!(config.polling.thread_name, "enc");
        assert_eq!(config.publish, PublishSettings::default());
    }

    #[test]
    fn test_duplicate_pins_invalid() {
        let result = EncodioConfig::from_toml_str(
            r#"
            [encoders]
            enc1 = { pin_a = 4, pin_b = 4 }
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_refresh_invalid() {
        let result = EncodioConfig::from_toml_str(
            r#"
            [publish]
            refresh_interval_ms = 0
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_unknown_policy_is_parse_error() {
        let result = EncodioConfig::from_toml_str(
            r#"
            [encoders]
            ambiguous_policy = "coin_flip"
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_bad_log_level_invalid() {
        let result = EncodioConfig::from_toml_str(r#"log_level = "loud""#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_explicit_file_is_read_error() {
        let path = Path::new("/nonexistent/encodio/encodio.toml");
        assert!(matches!(
            EncodioConfig::load(Some(path)),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_round_trip_through_toml() {
        let config = EncodioConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        assert_eq!(EncodioConfig::from_toml_str(&text).unwrap(), config);
    }
}
