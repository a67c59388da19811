//! # Bluetooth Module
//!
//! Dropping the wireless link of an idle controller, and the address
//! helpers shared with discovery.
//!
//! The link is dropped by asking BlueZ to call `org.bluez.Device1.Disconnect`
//! on the device object. The call goes through `dbus-send`, which ships with
//! every BlueZ installation.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{ManagerError, Result};

/// Adapter used when none is configured
pub const DEFAULT_ADAPTER: &str = "hci0";

/// How long `dbus-send` waits for BlueZ to answer, in milliseconds
pub const DISCONNECT_REPLY_TIMEOUT_MS: u32 = 5000;

/// Requests a wireless disconnect for a controller
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DisconnectBridge: Send + Sync {
    /// Disconnect the device with the given colon-separated address
    async fn disconnect(&self, address: &str) -> Result<()>;
}

/// BlueZ disconnect through the system bus
#[derive(Debug, Clone)]
pub struct BluezBridge {
    adapter: String,
}

impl Default for BluezBridge {
    fn default() -> Self {
        Self::new(DEFAULT_ADAPTER)
    }
}

impl BluezBridge {
    pub fn new(adapter: &str) -> Self {
        Self {
            adapter: adapter.to_string(),
        }
    }

    /// D-Bus object path of a device, e.g. `/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF`
    pub fn object_path(&self, address: &str) -> String {
        format!("/org/bluez/{}/dev_{}", self.adapter, address.replace(':', "_"))
    }
}

#[async_trait]
impl DisconnectBridge for BluezBridge {
    async fn disconnect(&self, address: &str) -> Result<()> {
        if address.is_empty() {
            return Err(ManagerError::Disconnect {
                address: address.to_string(),
                reason: "unknown address".to_string(),
            });
        }

        let object_path = self.object_path(address);
        debug!("Calling org.bluez.Device1.Disconnect on {}", object_path);

        let output = Command::new("dbus-send")
            .arg("--system")
            .arg("--print-reply")
            .arg(format!("--reply-timeout={}", DISCONNECT_REPLY_TIMEOUT_MS))
            .arg("--dest=org.bluez")
            .arg(&object_path)
            .arg("org.bluez.Device1.Disconnect")
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ManagerError::Disconnect {
                address: address.to_string(),
                reason: format!("failed to run dbus-send: {}", e),
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(ManagerError::Disconnect {
                address: address.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

/// Normalize a link address to uppercase colon-separated hex
///
/// Accepts colon, dash or no separators. Anything that is not six hex
/// octets is returned trimmed and uppercased.
///
/// # Examples
///
/// ```
/// use dualsense_manager::bluetooth::normalize_address;
///
/// assert_eq!(normalize_address("aa:bb:cc:dd:ee:ff\n"), "AA:BB:CC:DD:EE:FF");
/// assert_eq!(normalize_address("a4-ae-12-00-01-02"), "A4:AE:12:00:01:02");
/// assert_eq!(normalize_address("a4ae12000102"), "A4:AE:12:00:01:02");
/// ```
pub fn normalize_address(raw: &str) -> String {
    let trimmed = raw.trim().to_uppercase();
    let digits: String = trimmed.chars().filter(|c| *c != ':' && *c != '-').collect();

    if digits.len() == 12 && digits.chars().all(|c| c.is_ascii_hexdigit()) {
        digits
            .as_bytes()
            .chunks(2)
            .map(|pair| String::from_utf8_lossy(pair).into_owned())
            .collect::<Vec<_>>()
            .join(":")
    } else {
        trimmed
    }
}

/// Last five characters of an address, used to label controllers
///
/// # Examples
///
/// ```
/// use dualsense_manager::bluetooth::short_address;
///
/// assert_eq!(short_address("AA:BB:CC:DD:EE:FF"), "EE:FF");
/// assert_eq!(short_address("FF"), "FF");
/// ```
pub fn short_address(address: &str) -> &str {
    match address.char_indices().rev().nth(4) {
        Some((start, _)) => &address[start..],
        None => address,
    }
}
