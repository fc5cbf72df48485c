//! Configuration management for Rollcall.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

/// Main application configuration.
///
/// This is loaded from `~/.config/rollcall/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Scan pacing and flood-control settings
    pub scanning: ScanningConfig,
    /// Report storage settings
    pub storage: StorageConfig,
    /// CSV export settings
    pub export: ExportConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(&config_path)?;
            let config: Self = toml::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `ROLLCALL_PAGE_SIZE`: Override the roster page size
    /// - `ROLLCALL_INSPECT_DELAY_MS`: Override the base per-member pacing delay
    /// - `ROLLCALL_DATABASE`: Override the report database path
    /// - `ROLLCALL_EXPORT_LOCALE`: Override the CSV header locale (`en`/`vi`)
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to an already loaded config.
    pub fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("ROLLCALL_PAGE_SIZE") {
            if let Ok(page_size) = val.parse() {
                self.scanning.page_size = page_size;
                tracing::debug!("Override scanning.page_size from env: {}", page_size);
            }
        }

        if let Ok(val) = std::env::var("ROLLCALL_INSPECT_DELAY_MS") {
            if let Ok(delay) = val.parse() {
                self.scanning.inspect_delay_ms = delay;
                tracing::debug!("Override scanning.inspect_delay_ms from env: {}", delay);
            }
        }

        if let Ok(val) = std::env::var("ROLLCALL_DATABASE") {
            if !val.is_empty() {
                tracing::debug!("Override storage.database_path from env: {}", val);
                self.storage.database_path = Some(PathBuf::from(val));
            }
        }

        if let Ok(val) = std::env::var("ROLLCALL_EXPORT_LOCALE") {
            if let Ok(locale) = val.parse() {
                self.export.locale = locale;
                tracing::debug!("Override export.locale from env: {}", locale);
            }
        }
    }

    /// Check values that would make a scan misbehave.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.scanning.page_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scanning.page_size".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.scanning.default_flood_wait_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scanning.default_flood_wait_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/rollcall/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }

    /// Get the data directory path.
    ///
    /// Uses XDG base directories: `~/.local/share/rollcall`
    pub fn data_dir() -> ConfigResult<PathBuf> {
        Ok(project_dirs()?.data_dir().to_path_buf())
    }

    /// Resolve the report database path, honouring `storage.database_path`.
    pub fn database_path(&self) -> ConfigResult<PathBuf> {
        match &self.storage.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::data_dir()?.join("reports.db")),
        }
    }
}

fn project_dirs() -> ConfigResult<ProjectDirs> {
    ProjectDirs::from("com", "rollcall", "rollcall").ok_or(ConfigError::NoConfigDir)
}

/// Scan pacing and flood-control settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanningConfig {
    /// Maximum number of members requested per roster page
    pub page_size: u32,
    /// Base delay between profile lookups in milliseconds (scaled by roster size)
    pub inspect_delay_ms: u64,
    /// Extra seconds slept on top of every provider-reported flood wait
    pub flood_padding_secs: u64,
    /// Wait used when a flood signal carries no usable duration
    pub default_flood_wait_secs: u64,
    /// Skip profile lookups for members already known to have a public phone
    pub skip_known_phones: bool,
}

impl Default for ScanningConfig {
    fn default() -> Self {
        Self {
            page_size: 200,
            inspect_delay_ms: 500,
            flood_padding_secs: 1,
            default_flood_wait_secs: 30,
            skip_known_phones: true,
        }
    }
}

/// Report storage settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the SQLite report database (defaults to `<data_dir>/reports.db`)
    pub database_path: Option<PathBuf>,
}

/// CSV export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Language of the CSV header row
    pub locale: ExportLocale,
    /// Window of the "recently joined" filter in days
    pub recent_days: u32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            locale: ExportLocale::English,
            recent_days: 60,
        }
    }
}

/// Language of exported header rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExportLocale {
    /// English headers
    #[default]
    #[serde(rename = "en")]
    English,
    /// Vietnamese headers
    #[serde(rename = "vi")]
    Vietnamese,
}

impl FromStr for ExportLocale {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Ok(Self::English),
            "vi" | "vietnamese" => Ok(Self::Vietnamese),
            other => Err(ConfigError::InvalidValue {
                field: "export.locale".to_string(),
                reason: format!("unsupported locale '{other}'"),
            }),
        }
    }
}

impl fmt::Display for ExportLocale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::English => write!(f, "en"),
            Self::Vietnamese => write!(f, "vi"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.scanning.page_size, 200);
        assert_eq!(config.scanning.flood_padding_secs, 1);
        assert!(config.scanning.skip_known_phones);
        assert_eq!(config.export.locale, ExportLocale::English);
        assert_eq!(config.export.recent_days, 60);
        assert!(config.storage.database_path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("[scanning]"));
        assert!(toml_str.contains("[export]"));
        assert!(toml_str.contains("locale = \"en\""));

        let parsed: AppConfig = toml::from_str(&toml_str).expect("parse serialized config");
        assert_eq!(parsed.scanning.page_size, config.scanning.page_size);
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().expect("create temp dir");
        let config_path = tmp.path().join("config.toml");

        let mut config = AppConfig::default();
        config.scanning.inspect_delay_ms = 1500;
        config.export.locale = ExportLocale::Vietnamese;

        let contents = toml::to_string_pretty(&config).expect("serialize config");
        fs::write(&config_path, contents).expect("write config file");

        let loaded_contents = fs::read_to_string(&config_path).expect("read config file");
        let loaded: AppConfig = toml::from_str(&loaded_contents).expect("parse loaded config");

        assert_eq!(loaded.scanning.inspect_delay_ms, 1500);
        assert_eq!(loaded.export.locale, ExportLocale::Vietnamese);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[scanning]
page_size = 100

[storage]
database_path = "/tmp/reports.db"
"#;

        let config: AppConfig = toml::from_str(toml_str).expect("parse partial config");
        assert_eq!(config.scanning.page_size, 100);
        assert_eq!(
            config.storage.database_path,
            Some(PathBuf::from("/tmp/reports.db"))
        );
        // These should be defaults
        assert_eq!(config.scanning.default_flood_wait_secs, 30);
        assert_eq!(config.export.recent_days, 60);
    }

    #[test]
    fn test_database_path_override() {
        let mut config = AppConfig::default();
        config.storage.database_path = Some(PathBuf::from("/var/lib/rollcall/r.db"));
        assert_eq!(
            config.database_path().expect("explicit path"),
            PathBuf::from("/var/lib/rollcall/r.db")
        );
    }

    #[test]
    fn test_validate_rejects_zero_page_size() {
        let mut config = AppConfig::default();
        config.scanning.page_size = 0;
        let err = config.validate().expect_err("zero page size is invalid");
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "scanning.page_size"));
    }

    #[test]
    fn test_locale_parse() {
        assert_eq!("vi".parse::<ExportLocale>().expect("vi"), ExportLocale::Vietnamese);
        assert_eq!(" EN ".parse::<ExportLocale>().expect("en"), ExportLocale::English);
        assert!("fr".parse::<ExportLocale>().is_err());
    }
}
