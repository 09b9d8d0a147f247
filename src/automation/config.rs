//! Configuration for the bot.
//!
//! Loads settings from config.json at startup: device connection, polling
//! cadence, thresholds, and the directories the bot reads and writes.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::paths;

const CONFIG_FILE: &str = "config.json";

/// Complete bot configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// adb executable (name on PATH or full path)
    pub adb_path: PathBuf,
    /// Device serial passed as `adb -s`, e.g. `emulator-5554`
    pub device_serial: Option<String>,
    /// Package force-stopped by the close-game action
    pub app_package: Option<String>,
    /// Delay between iterations (milliseconds)
    pub poll_interval_ms: u64,
    /// Stop after this many iterations (unbounded when absent)
    pub max_iterations: Option<u64>,
    /// Correlation threshold for the built-in states' template criteria
    pub default_threshold: f32,
    /// Threshold actions locate buttons with (each action has its own default)
    pub action_threshold: Option<f32>,
    /// Sub-goal handed to actions through the run context
    pub target_activity: Option<String>,
    pub screenshots_dir: PathBuf,
    pub unknown_states_dir: PathBuf,
    /// Root of the per-state template folders
    pub states_dir: PathBuf,
    pub logs_dir: PathBuf,
    /// Keep every capture as `screen_<iteration>.png` instead of overwriting
    pub unique_screenshots: bool,
    /// Explicit Tesseract executable
    pub tesseract_path: Option<PathBuf>,
    pub ocr_language: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            adb_path: PathBuf::from("adb"),
            device_serial: None,
            app_package: Some("com.klab.captain283.global".to_string()),
            poll_interval_ms: 2000,
            max_iterations: None,
            default_threshold: 0.8,
            action_threshold: None,
            target_activity: None,
            screenshots_dir: PathBuf::from("screenshots"),
            unknown_states_dir: PathBuf::from("unknown_states"),
            states_dir: PathBuf::from("states"),
            logs_dir: PathBuf::from("logs"),
            unique_screenshots: false,
            tesseract_path: None,
            ocr_language: "eng".to_string(),
        }
    }
}

impl BotConfig {
    /// Reads and parses one config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads the configuration.
    ///
    /// An explicit path must exist and parse. Otherwise `config.json` is
    /// looked up next to the executable, then in the user config directory;
    /// a missing or broken file falls back to defaults.
    ///
    /// Nothing is logged here since logging is configured from the result.
    /// Call [`ConfigSource::log`] once the subscriber is installed.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, ConfigSource), ConfigError> {
        match explicit {
            Some(path) => {
                let config = Self::from_file(path)?;
                Ok((config, ConfigSource::Explicit(path.to_path_buf())))
            }
            None => Ok(Self::search(&Self::search_paths())),
        }
    }

    /// First existing candidate wins, even when it fails to parse.
    fn search(candidates: &[PathBuf]) -> (Self, ConfigSource) {
        let Some(path) = candidates.iter().find(|p| p.exists()) else {
            return (Self::default(), ConfigSource::NotFound);
        };
        match Self::from_file(path) {
            Ok(config) => (config, ConfigSource::Found(path.clone())),
            Err(e) => (Self::default(), ConfigSource::Fallback(e)),
        }
    }

    fn search_paths() -> Vec<PathBuf> {
        let mut candidates = vec![paths::get_exe_dir().join(CONFIG_FILE)];
        if let Some(dir) = dirs::config_dir() {
            candidates.push(dir.join("ldplayer-bot").join(CONFIG_FILE));
        }
        candidates
    }

    pub fn screenshots_path(&self) -> PathBuf {
        paths::resolve(&self.screenshots_dir)
    }

    pub fn unknown_states_path(&self) -> PathBuf {
        paths::resolve(&self.unknown_states_dir)
    }

    pub fn states_path(&self) -> PathBuf {
        paths::resolve(&self.states_dir)
    }

    pub fn logs_path(&self) -> PathBuf {
        paths::resolve(&self.logs_dir)
    }

    /// Ensures all output directories exist. Call at startup.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        fs::create_dir_all(self.logs_path())?;
        fs::create_dir_all(self.screenshots_path())?;
        fs::create_dir_all(self.unknown_states_path())?;
        Ok(())
    }
}

/// Where the loaded configuration came from.
#[derive(Debug)]
pub enum ConfigSource {
    Explicit(PathBuf),
    Found(PathBuf),
    /// A config file exists but could not be used
    Fallback(ConfigError),
    NotFound,
}

impl ConfigSource {
    pub fn log(&self) {
        match self {
            Self::Fallback(_) => warn!("{}", self),
            _ => info!("{}", self),
        }
    }
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Explicit(path) | Self::Found(path) => {
                write!(f, "Config loaded from {}", path.display())
            }
            Self::Fallback(e) => write!(f, "{}. Using defaults.", e),
            Self::NotFound => write!(f, "config.json not found. Using default config."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "device_serial": "emulator-5554", "poll_interval_ms": 500, "max_iterations": 10 }"#,
        )
        .unwrap();

        let (config, source) = BotConfig::load(Some(path.as_path())).unwrap();
        assert!(matches!(source, ConfigSource::Explicit(p) if p == path));
        assert_eq!(config.device_serial.as_deref(), Some("emulator-5554"));
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.max_iterations, Some(10));
        assert_eq!(config.adb_path, PathBuf::from("adb"));
        assert_eq!(config.default_threshold, 0.8);
        assert_eq!(config.ocr_language, "eng");
    }

    #[test]
    fn test_explicit_path_errors() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            BotConfig::load(Some(missing.as_path())),
            Err(ConfigError::Read { .. })
        ));

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{ not json").unwrap();
        assert!(matches!(
            BotConfig::load(Some(broken.as_path())),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_round_trip_through_json() {
        let config = BotConfig {
            target_activity: Some("main_story".to_string()),
            action_threshold: Some(0.75),
            ..BotConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: BotConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_relative_dirs_resolve_against_exe_dir() {
        let config = BotConfig::default();
        assert_eq!(config.logs_path(), paths::get_exe_dir().join("logs"));

        let dir = tempdir().unwrap();
        let absolute = BotConfig {
            states_dir: dir.path().to_path_buf(),
            ..BotConfig::default()
        };
        assert_eq!(absolute.states_path(), dir.path());
    }

    #[test]
    fn test_search_reports_broken_file_instead_of_logging() {
        let dir = tempdir().unwrap();
        let absent = dir.path().join("absent.json");
        let broken = dir.path().join("broken.json");
        let good = dir.path().join("good.json");
        std::fs::write(&broken, "{ not json").unwrap();
        std::fs::write(&good, r#"{ "poll_interval_ms": 100 }"#).unwrap();

        let (config, source) = BotConfig::search(&[absent.clone(), broken.clone(), good]);
        assert_eq!(config, BotConfig::default());
        assert!(matches!(source, ConfigSource::Fallback(ConfigError::Parse { .. })));
        let message = source.to_string();
        assert!(message.contains("broken.json"), "{message}");
        assert!(message.ends_with("Using defaults."), "{message}");

        let (_, source) = BotConfig::search(&[absent]);
        assert!(matches!(source, ConfigSource::NotFound));
    }

    #[test]
    fn test_search_takes_first_existing_file() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("first.json");
        let second = dir.path().join("second.json");
        std::fs::write(&first, r#"{ "poll_interval_ms": 100 }"#).unwrap();
        std::fs::write(&second, r#"{ "poll_interval_ms": 200 }"#).unwrap();

        let (config, source) = BotConfig::search(&[first.clone(), second]);
        assert_eq!(config.poll_interval_ms, 100);
        assert_eq!(source.to_string(), format!("Config loaded from {}", first.display()));
    }
}
