//! # Battery Module
//!
//! Reads the controller battery through the `power_supply` class.
//!
//! The hid-playstation driver registers one supply per controller, named
//! `ps-controller-battery-<address>`, below the HID device:
//!
//! ```text
//! /sys/class/input/js0/device/device/power_supply/ps-controller-battery-xx/capacity
//! /sys/class/input/js0/device/device/power_supply/ps-controller-battery-xx/status
//! ```

use std::fmt;
use std::path::PathBuf;

use crate::controller::device::DeviceNode;
use crate::error::{ManagerError, Result};
use crate::sysfs::ControlSurface;

/// Name pattern of the controller's power supply directory
const BATTERY_DIR_PATTERN: &str = "ps-controller-battery-*";

/// Status reported while the battery is charging
pub const STATUS_CHARGING: &str = "Charging";

/// Status reported once the battery is full
pub const STATUS_FULL: &str = "Full";

/// What the battery poller last saw for a controller
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PowerState {
    /// No poll has completed yet
    #[default]
    Searching,
    /// The battery could not be read; the controller is probably gone
    NotFound,
    /// Kernel charging status (`Charging`, `Discharging`, `Full`, ...)
    Reported(String),
}

impl PowerState {
    /// Whether the controller is absent or not yet seen
    pub fn is_absent(&self) -> bool {
        matches!(self, PowerState::Searching | PowerState::NotFound)
    }

    /// Whether the status says the controller is on a charger
    pub fn is_on_charger(&self) -> bool {
        match self {
            PowerState::Reported(status) => {
                status.contains(STATUS_CHARGING) || status.contains(STATUS_FULL)
            }
            _ => false,
        }
    }

    /// Whether the battery is actively charging
    pub fn is_charging(&self) -> bool {
        matches!(self, PowerState::Reported(status) if status == STATUS_CHARGING)
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerState::Searching => write!(f, "Searching..."),
            PowerState::NotFound => write!(f, "DualSense not found"),
            PowerState::Reported(status) => write!(f, "{}", status),
        }
    }
}

/// Locate the power supply directory of a controller
///
/// # Errors
///
/// Returns `BatteryNotFound` when no matching directory exists.
pub fn battery_dir(surface: &dyn ControlSurface, node: &DeviceNode) -> Result<PathBuf> {
    surface
        .glob(&node.power_supply_dir().join(BATTERY_DIR_PATTERN))?
        .into_iter()
        .next()
        .ok_or_else(|| ManagerError::BatteryNotFound(node.to_string()))
}

/// Read the battery level in percent (clamped to 100)
///
/// # Errors
///
/// Returns error if the battery is missing, unreadable or not a number.
pub fn read_capacity(surface: &dyn ControlSurface, node: &DeviceNode) -> Result<u8> {
    let path = battery_dir(surface, node)?.join("capacity");
    let raw = surface.read_attr(&path)?;
    let level: u32 = raw.parse().map_err(|_| ManagerError::InvalidAttribute {
        path: path.display().to_string(),
        value: raw.clone(),
    })?;
    Ok(level.min(100) as u8)
}

/// Read the charging status string
///
/// # Errors
///
/// Returns error if the battery is missing or unreadable.
pub fn read_status(surface: &dyn ControlSurface, node: &DeviceNode) -> Result<String> {
    let path = battery_dir(surface, node)?.join("status");
    Ok(surface.read_attr(&path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sysfs::mocks::FakeSurface;

    const SUPPLY: &str =
        "/sys/class/input/js0/device/device/power_supply/ps-controller-battery-aa:bb:cc:dd:ee:ff";

    #[test]
    fn test_read_capacity_and_status() {
        let surface = FakeSurface::new();
        surface.set_file(format!("{}/capacity", SUPPLY), "85\n");
        surface.set_file(format!("{}/status", SUPPLY), "Charging\n");

        let node = DeviceNode::new("/dev/input/js0");
        assert_eq!(read_capacity(&surface, &node).unwrap(), 85);
        assert_eq!(read_status(&surface, &node).unwrap(), "Charging");
    }

    #[test]
    fn test_missing_battery() {
        let surface = FakeSurface::new();
        let node = DeviceNode::new("/dev/input/js0");

        match read_capacity(&surface, &node) {
            Err(ManagerError::BatteryNotFound(path)) => assert_eq!(path, "/dev/input/js0"),
            other => panic!("Expected BatteryNotFound, got: {:?}", other),
        }
        assert!(read_status(&surface, &node).is_err());
    }

    #[test]
    fn test_garbage_capacity() {
        let surface = FakeSurface::new();
        surface.set_file(format!("{}/capacity", SUPPLY), "lots");

        let node = DeviceNode::new("/dev/input/js0");
        assert!(matches!(
            read_capacity(&surface, &node),
            Err(ManagerError::InvalidAttribute { .. })
        ));
    }

    #[test]
    fn test_capacity_clamped() {
        let surface = FakeSurface::new();
        surface.set_file(format!("{}/capacity", SUPPLY), "140");

        let node = DeviceNode::new("/dev/input/js0");
        assert_eq!(read_capacity(&surface, &node).unwrap(), 100);
    }

    #[test]
    fn test_power_state_predicates() {
        assert!(PowerState::Searching.is_absent());
        assert!(PowerState::NotFound.is_absent());
        assert!(!PowerState::Reported("Discharging".into()).is_absent());

        assert!(PowerState::Reported("Charging".into()).is_on_charger());
        assert!(PowerState::Reported("Full".into()).is_on_charger());
        assert!(!PowerState::Reported("Discharging".into()).is_on_charger());
        assert!(!PowerState::Reported("Not charging".into()).is_on_charger());
        assert!(!PowerState::NotFound.is_on_charger());

        assert!(PowerState::Reported("Charging".into()).is_charging());
        assert!(!PowerState::Reported("Full".into()).is_charging());
    }

    #[test]
    fn test_power_state_display() {
        assert_eq!(PowerState::Searching.to_string(), "Searching...");
        assert_eq!(PowerState::NotFound.to_string(), "DualSense not found");
        assert_eq!(PowerState::Reported("Full".into()).to_string(), "Full");
    }
}
