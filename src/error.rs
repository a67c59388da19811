//! # Error Types
//!
//! Custom error types for DualSense Manager using `thiserror`.

use thiserror::Error;

/// Main error type for DualSense Manager
#[derive(Debug, Error)]
pub enum ManagerError {
    /// Configuration parse or validation errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Configuration could not be serialized for saving
    #[error("Configuration serialization error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No power_supply entry exists for the controller
    #[error("Battery not found for {0}")]
    BatteryNotFound(String),

    /// An attribute held text that could not be parsed
    #[error("Invalid value {value:?} in {path}")]
    InvalidAttribute { path: String, value: String },

    /// The controller exposes no LED class directory
    #[error("LED indicator not found for {0}")]
    LedNotFound(String),

    /// The wireless link could not be dropped
    #[error("Disconnect of {address} failed: {reason}")]
    Disconnect { address: String, reason: String },
}

/// Result type alias for DualSense Manager
pub type Result<T> = std::result::Result<T, ManagerError>;
