//! Mapping from a joystick device node to its sysfs attributes.
//!
//! Controllers are supervised through their `/dev/input/jsN` node. Every
//! attribute the manager reads or writes hangs off
//! `/sys/class/input/jsN/device`: the input device itself (name, uniq) and,
//! one level further, the HID device that owns the LEDs and the battery.

use std::path::{Path, PathBuf};

/// Root of the input class in sysfs
pub const SYS_CLASS_INPUT: &str = "/sys/class/input";

/// Pattern for joystick device nodes
pub const JOYSTICK_GLOB: &str = "/dev/input/js*";

/// A joystick device node and the sysfs directory that describes it
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceNode {
    path: PathBuf,
    sys_dir: PathBuf,
}

impl DeviceNode {
    /// Describe the device node at `path` (e.g. `/dev/input/js0`)
    ///
    /// # Examples
    ///
    /// ```
    /// use dualsense_manager::controller::device::DeviceNode;
    /// use std::path::Path;
    ///
    /// let node = DeviceNode::new("/dev/input/js0");
    /// assert_eq!(node.name_path(), Path::new("/sys/class/input/js0/device/name"));
    /// ```
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let node_name = path.file_name().map(|name| name.to_os_string()).unwrap_or_default();
        let sys_dir = Path::new(SYS_CLASS_INPUT).join(node_name).join("device");
        Self { path, sys_dir }
    }

    /// The `/dev/input/jsN` path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `/sys/class/input/jsN/device`
    pub fn sys_dir(&self) -> &Path {
        &self.sys_dir
    }

    /// Human-readable device name reported by the driver
    pub fn name_path(&self) -> PathBuf {
        self.sys_dir.join("name")
    }

    /// Unique identifier; the Bluetooth address for wireless controllers
    pub fn uniq_path(&self) -> PathBuf {
        self.sys_dir.join("uniq")
    }

    /// Fallback identity attribute
    pub fn address_path(&self) -> PathBuf {
        self.sys_dir.join("address")
    }

    /// Directory holding the controller's `power_supply` entries
    pub fn power_supply_dir(&self) -> PathBuf {
        self.sys_dir.join("device").join("power_supply")
    }

    /// Candidate LED class directories, most specific first
    pub fn led_dir_candidates(&self) -> [PathBuf; 2] {
        [
            self.sys_dir.join("leds"),
            self.sys_dir.join("device").join("leds"),
        ]
    }
}

impl std::fmt::Display for DeviceNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}
