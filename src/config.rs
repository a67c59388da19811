//! # Configuration Module
//!
//! Handles loading, validating and saving configuration from TOML files.
//!
//! The file holds the global idle/alert policy shared by every controller
//! and a table of per-controller preferences keyed by Bluetooth address.
//! Missing sections and fields fall back to built-in defaults.

use serde::de::Error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::bluetooth::normalize_address;
use crate::error::{ManagerError, Result};

/// Directory name used under the user's config directory
pub const CONFIG_DIR_NAME: &str = "dualsense-manager";

/// File name of the configuration file
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Main configuration structure
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub policy: GlobalPolicy,

    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Per-controller preferences keyed by normalized link address
    #[serde(default)]
    pub controllers: BTreeMap<String, ControllerConfig>,
}

/// Policy shared read-only by every controller session
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct GlobalPolicy {
    /// Minutes without input before the link is dropped (0 = disabled)
    #[serde(default = "default_idle_minutes")]
    pub idle_minutes: u32,

    /// Battery percent at or below which an alert is raised (0 = disabled)
    #[serde(default = "default_battery_alert")]
    pub battery_alert: u8,
}

/// Device discovery configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct DiscoveryConfig {
    #[serde(default = "default_scan_interval_ms")]
    pub scan_interval_ms: u64,
}

/// Per-controller preferences
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Minimum absolute axis value that counts as real input
    #[serde(default = "default_deadzone")]
    pub deadzone: i32,

    #[serde(default)]
    pub led_player: PlayerLedMode,

    #[serde(default)]
    pub led_rgb: RgbLedMode,

    /// Hex color (`RRGGBB`, leading `#` optional) used in static mode
    #[serde(default = "default_led_rgb_static")]
    pub led_rgb_static: String,
}

/// What the five player LEDs display
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlayerLedMode {
    /// Bar graph of the battery level, charging animation while charging
    #[default]
    Battery,
    /// Fixed pattern for the assigned display index
    Number,
}

/// What the RGB indicator displays
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RgbLedMode {
    /// Red to green gradient of the battery level, pulsing while charging
    #[default]
    Battery,
    /// The configured static color
    Static,
    /// Indicator switched off
    Off,
}

// Default value functions
fn default_idle_minutes() -> u32 { 10 }
fn default_battery_alert() -> u8 { 15 }

fn default_scan_interval_ms() -> u64 { 2000 }

fn default_deadzone() -> i32 { 1500 }
fn default_led_rgb_static() -> String { "#0000FF".to_string() }

impl Default for GlobalPolicy {
    fn default() -> Self {
        Self {
            idle_minutes: default_idle_minutes(),
            battery_alert: default_battery_alert(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            scan_interval_ms: default_scan_interval_ms(),
        }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            deadzone: default_deadzone(),
            led_player: PlayerLedMode::default(),
            led_rgb: RgbLedMode::default(),
            led_rgb_static: default_led_rgb_static(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use dualsense_manager::config::Config;
    ///
    /// let config = Config::load("config.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;
        config.normalize_addresses();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration, creating the file with defaults when absent
    ///
    /// A file that exists but cannot be parsed or fails validation is
    /// reported and replaced in memory by the defaults; it is left untouched
    /// on disk so the user can fix it.
    ///
    /// # Errors
    ///
    /// Returns error only when the file is missing and the defaults cannot
    /// be written (for example an unwritable config directory).
    pub fn load_or_init<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            let config = Config::default();
            config.save(path)?;
            info!("Wrote default configuration to {}", path.display());
            return Ok(config);
        }

        match Self::load(path) {
            Ok(config) => {
                debug!("Loaded configuration from {}", path.display());
                Ok(config)
            }
            Err(e) => {
                warn!("Ignoring configuration at {}: {}", path.display(), e);
                Ok(Config::default())
            }
        }
    }

    /// Save configuration to a TOML file, creating parent directories
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails or the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Default configuration file location
    ///
    /// `$XDG_CONFIG_HOME/dualsense-manager/config.toml`, falling back to
    /// `$HOME/.config/dualsense-manager/config.toml`.
    pub fn default_path() -> PathBuf {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME)
    }

    /// Preferences for the controller with the given address
    ///
    /// Unknown addresses (including the empty address of a controller whose
    /// identity could not be read) get the defaults.
    pub fn controller(&self, address: &str) -> ControllerConfig {
        self.controllers
            .get(&normalize_address(address))
            .cloned()
            .unwrap_or_default()
    }

    /// Store preferences for a controller, replacing any previous entry
    pub fn set_controller(&mut self, address: &str, controller: ControllerConfig) {
        self.controllers.insert(normalize_address(address), controller);
    }

    /// Rewrite the controller table keys to the uppercase colon form
    fn normalize_addresses(&mut self) {
        let controllers = std::mem::take(&mut self.controllers);
        for (address, controller) in controllers {
            let key = normalize_address(&address);
            if self.controllers.insert(key, controller).is_some() {
                warn!("Duplicate controller entry for {}, keeping the last one", address);
            }
        }
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.policy.battery_alert > 100 {
            return Err(ManagerError::Config(
                toml::de::Error::custom("battery_alert must be between 0 and 100")
            ));
        }

        if self.discovery.scan_interval_ms < 100 || self.discovery.scan_interval_ms > 60000 {
            return Err(ManagerError::Config(
                toml::de::Error::custom("scan_interval_ms must be between 100 and 60000")
            ));
        }

        for (address, controller) in &self.controllers {
            if !(0..=i32::from(i16::MAX)).contains(&controller.deadzone) {
                return Err(ManagerError::Config(
                    toml::de::Error::custom(format!("deadzone for {} must be between 0 and 32767", address))
                ));
            }
        }

        Ok(())
    }
}
