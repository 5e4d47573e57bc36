/// Configuration module for Dock Hider.
///
/// This module provides functionality for managing the tool's own settings,
/// including:
/// - How long to wait for an application to quit before giving up
/// - How often to check whether it has quit, and how long to wait before
///   relaunching it
/// - Which toggle strategy to use by default
/// - An optional override for the Dock preferences file
///
/// The configuration is saved to and loaded from a `config.json` file located
/// in the platform-specific application data directory
/// (~/Library/Application Support/DockHider/ on macOS).
///
/// # Example
///
/// ```rust,no_run
/// use dock_hider_core::config::{load_config, save_config};
///
/// // Load existing config or get defaults
/// let mut config = load_config();
///
/// // Modify config
/// config.termination_timeout_ms = 5_000;
///
/// // Save changes
/// save_config(&config).expect("Failed to save config");
/// ```
use crate::dock::default_dock_preferences;
use crate::lifecycle::{Timing, ToggleStrategy};
use anyhow::{anyhow, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Tool settings
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    /// Give up waiting for an app to quit after this long
    pub termination_timeout_ms: u64,
    /// Interval between exit checks
    pub poll_interval_ms: u64,
    /// Pause between confirmed exit and relaunch
    pub relaunch_delay_ms: u64,
    /// Strategy used by `toggle` when none is given
    pub default_strategy: ToggleStrategy,
    /// Read pinned apps from here instead of the user's Dock preferences
    pub dock_preferences: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            termination_timeout_ms: 10_000,
            poll_interval_ms: 100,
            relaunch_delay_ms: 500,
            default_strategy: ToggleStrategy::Restart,
            dock_preferences: None,
        }
    }
}

impl AppConfig {
    /// Controller timings. The poll interval is at least 1ms and the
    /// termination timeout at least one poll interval.
    pub fn timing(&self) -> Timing {
        let poll_interval_ms = self.poll_interval_ms.max(1);
        Timing {
            poll_interval: Duration::from_millis(poll_interval_ms),
            termination_timeout: Duration::from_millis(
                self.termination_timeout_ms.max(poll_interval_ms),
            ),
            relaunch_delay: Duration::from_millis(self.relaunch_delay_ms),
        }
    }

    /// Configured Dock preferences path, else the user's own
    pub fn dock_preferences_path(&self) -> Option<PathBuf> {
        self.dock_preferences.clone().or_else(default_dock_preferences)
    }
}

/// Get the application's data directory
/// Returns ~/Library/Application Support/DockHider/ on macOS
/// Creates directory if it doesn't exist
pub fn get_data_directory() -> Result<PathBuf> {
    let project_dirs = ProjectDirs::from("", "", "DockHider")
        .ok_or_else(|| anyhow!("Failed to determine user data directory"))?;

    let data_dir = project_dirs.data_dir();

    // Create directory if it doesn't exist
    fs::create_dir_all(data_dir)
        .map_err(|e| anyhow!("Failed to create data directory: {}", e))?;

    Ok(data_dir.to_path_buf())
}

/// Location of config.json
pub fn config_path() -> Result<PathBuf> {
    Ok(get_data_directory()?.join("config.json"))
}

/// Load application configuration from config.json
/// Returns default config if file doesn't exist or on error
pub fn load_config() -> AppConfig {
    let Ok(config_path) = config_path() else {
        return AppConfig::default();
    };

    // If file doesn't exist, return default config
    if !config_path.exists() {
        return AppConfig::default();
    }

    // Read and parse JSON
    let Ok(contents) = fs::read_to_string(&config_path) else {
        return AppConfig::default();
    };

    match serde_json::from_str(&contents) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Ignoring invalid {:?}: {}", config_path, e);
            AppConfig::default()
        }
    }
}

/// Save application configuration to config.json
pub fn save_config(config: &AppConfig) -> Result<PathBuf> {
    let config_path = config_path()?;

    // Serialize to pretty-printed JSON
    let json = serde_json::to_string_pretty(config)
        .map_err(|e| anyhow!("Failed to serialize config: {}", e))?;

    fs::write(&config_path, json)
        .map_err(|e| anyhow!("Failed to write {}: {}", config_path.display(), e))?;

    Ok(config_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.default_strategy, ToggleStrategy::Restart);
        assert_eq!(config.dock_preferences, None);
        assert_eq!(config.timing(), Timing::default());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "relaunch_delay_ms": 750, "default_strategy": "immediate" }"#)
                .unwrap();
        assert_eq!(config.relaunch_delay_ms, 750);
        assert_eq!(config.default_strategy, ToggleStrategy::Immediate);
        assert_eq!(config.termination_timeout_ms, 10_000);
    }

    #[test]
    fn test_zero_poll_interval_is_clamped() {
        let config = AppConfig {
            poll_interval_ms: 0,
            ..AppConfig::default()
        };
        assert_eq!(config.timing().poll_interval, Duration::from_millis(1));
    }

    #[test]
    fn test_zero_termination_timeout_is_clamped_to_poll_interval() {
        let config = AppConfig {
            termination_timeout_ms: 0,
            poll_interval_ms: 25,
            ..AppConfig::default()
        };
        let timing = config.timing();
        assert_eq!(timing.termination_timeout, Duration::from_millis(25));
        assert!(timing.termination_timeout >= timing.poll_interval);
    }

    #[test]
    fn test_dock_preferences_override() {
        let config = AppConfig {
            dock_preferences: Some(PathBuf::from("/tmp/dock.plist")),
            ..AppConfig::default()
        };
        assert_eq!(
            config.dock_preferences_path(),
            Some(PathBuf::from("/tmp/dock.plist"))
        );
    }

    #[test]
    fn test_get_data_directory() {
        let result = get_data_directory();
        assert!(result.is_ok());

        let path = result.unwrap();
        assert!(path.to_string_lossy().to_lowercase().contains("dockhider"));
    }

    #[test]
    fn test_config_path_is_inside_data_directory() {
        let path = config_path().unwrap();
        assert_eq!(path.file_name().unwrap(), "config.json");
        assert_eq!(path.parent().unwrap(), get_data_directory().unwrap());
    }
}
