//! # Controller Discovery
//!
//! Finds DualSense joystick nodes and resolves their Bluetooth address.
//!
//! ## Controller Detection
//!
//! A `/dev/input/js*` node is a controller when the name reported in sysfs
//! (case-insensitive) contains one of:
//! - `sony`
//! - `dualsense`
//!
//! The same hardware exposes a second joystick for its accelerometer and
//! gyroscope, named `... Motion Sensors`. That node never counts.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::bluetooth::normalize_address;
use crate::controller::device::{DeviceNode, JOYSTICK_GLOB};
use crate::error::Result;
use crate::sysfs::ControlSurface;

/// Name markers identifying a DualSense, lowercase
const CONTROLLER_MARKERS: &[&str] = &["sony", "dualsense"];

/// Name marker of the motion sensor companion endpoint, lowercase
const MOTION_SENSORS_MARKER: &str = "motion sensors";

/// Whether a reported device name belongs to a supervised controller
///
/// # Examples
///
/// ```
/// use dualsense_manager::controller::discovery::is_controller_name;
///
/// assert!(is_controller_name("Sony Interactive Entertainment Wireless Controller"));
/// assert!(is_controller_name("DualSense Wireless Controller"));
/// assert!(!is_controller_name("DualSense Wireless Controller Motion Sensors"));
/// assert!(!is_controller_name("Xbox Wireless Controller"));
/// ```
pub fn is_controller_name(name: &str) -> bool {
    let name = name.to_lowercase();
    CONTROLLER_MARKERS.iter().any(|marker| name.contains(marker))
        && !name.contains(MOTION_SENSORS_MARKER)
}

/// List the joystick nodes that belong to a controller, sorted by path
///
/// A node whose name cannot be read is skipped; it does not fail the scan.
///
/// # Errors
///
/// Returns error if the joystick nodes cannot be enumerated.
pub fn find_controllers(surface: &dyn ControlSurface) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();

    for path in surface.glob(Path::new(JOYSTICK_GLOB))? {
        let node = DeviceNode::new(&path);
        let name_path = node.name_path();

        let name = match surface.read_attr(&name_path) {
            Ok(name) => name,
            Err(e) => {
                debug!("Unable to read {}: {}", name_path.display(), e);
                continue;
            }
        };

        debug!("Found joystick: {} ({})", path.display(), name);

        if is_controller_name(&name) {
            found.push(path);
        }
    }

    Ok(found)
}

/// Resolve the link address of a controller
///
/// Reads `uniq`, falling back to `address`. Returns an empty string when
/// neither attribute yields a value.
pub fn resolve_link_address(surface: &dyn ControlSurface, node: &DeviceNode) -> String {
    for attr in [node.uniq_path(), node.address_path()] {
        match surface.read_attr(&attr) {
            Ok(raw) if !raw.trim().is_empty() => return normalize_address(&raw),
            Ok(_) => debug!("{} is empty", attr.display()),
            Err(e) => debug!("Unable to read {}: {}", attr.display(), e),
        }
    }

    String::new()
}
