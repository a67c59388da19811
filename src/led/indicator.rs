//! Resolution of a controller's LED attributes and the writes to them.
//!
//! hid-playstation registers the LEDs in the `leds` class, named after the
//! input device they belong to:
//!
//! ```text
//! .../leds/input12:white:player-1/brightness
//! .../leds/input12:rgb:indicator/multi_intensity
//! .../leds/input12:rgb:indicator/brightness
//! ```
//!
//! The `leds` directory sits either directly below the input device or one
//! level further down, depending on the kernel. The numbering is never
//! hard-coded; it is found by pattern match once per session.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::controller::device::DeviceNode;
use crate::error::{ManagerError, Result};
use crate::led::patterns::{PlayerPattern, Rgb, PLAYER_SEGMENTS};
use crate::sysfs::ControlSurface;

const BRIGHTNESS: &str = "brightness";
const MULTI_INTENSITY: &str = "multi_intensity";
const RGB_PATTERN: &str = "*:rgb:indicator";

/// Brightness written together with every color
const RGB_FULL_BRIGHTNESS: &str = "255";

/// Resolved LED attribute directories of one controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedPaths {
    /// Player segment directories in write order
    player: Vec<(u8, PathBuf)>,
    rgb: Option<PathBuf>,
}

impl LedPaths {
    /// Find the LED directories of a controller
    ///
    /// Probes both candidate `leds` directories and keeps the first one that
    /// holds at least one controller LED.
    ///
    /// # Errors
    ///
    /// Returns `LedNotFound` when neither candidate holds any LED.
    pub fn resolve(surface: &dyn ControlSurface, node: &DeviceNode) -> Result<Self> {
        for base in node.led_dir_candidates() {
            if !surface.exists(&base) {
                continue;
            }

            let paths = Self::scan(surface, &base)?;
            if paths.has_player() || paths.has_rgb() {
                debug!("LEDs of {} found in {}", node, base.display());
                return Ok(paths);
            }
        }

        Err(ManagerError::LedNotFound(node.to_string()))
    }

    fn scan(surface: &dyn ControlSurface, base: &Path) -> Result<Self> {
        let mut player = Vec::with_capacity(PLAYER_SEGMENTS.len());
        for segment in PLAYER_SEGMENTS {
            let pattern = base.join(format!("*:player-{}", segment));
            if let Some(dir) = surface.glob(&pattern)?.into_iter().next() {
                player.push((segment, dir));
            }
        }

        let rgb = surface.glob(&base.join(RGB_PATTERN))?.into_iter().next();
        Ok(Self { player, rgb })
    }

    pub fn has_player(&self) -> bool {
        !self.player.is_empty()
    }

    pub fn has_rgb(&self) -> bool {
        self.rgb.is_some()
    }

    /// Write a player pattern, segments 1, 5, 2, 4, 3 in that order
    ///
    /// # Errors
    ///
    /// Returns the first failed write; the remaining segments are skipped.
    pub fn write_player(&self, surface: &dyn ControlSurface, pattern: PlayerPattern) -> Result<()> {
        for (segment, dir) in &self.player {
            let value = if pattern.is_lit(*segment) { "1" } else { "0" };
            surface.write_attr(&dir.join(BRIGHTNESS), value)?;
        }
        Ok(())
    }

    /// Set the RGB indicator color at full brightness
    ///
    /// # Errors
    ///
    /// Returns `LedNotFound` without an RGB indicator, or the failed write.
    pub fn write_rgb(&self, surface: &dyn ControlSurface, color: Rgb) -> Result<()> {
        let dir = self
            .rgb
            .as_ref()
            .ok_or_else(|| ManagerError::LedNotFound(RGB_PATTERN.to_string()))?;

        surface.write_attr(&dir.join(MULTI_INTENSITY), &color.to_string())?;
        surface.write_attr(&dir.join(BRIGHTNESS), RGB_FULL_BRIGHTNESS)?;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::add_leds;
    use super::*;
    use crate::sysfs::mocks::FakeSurface;
    use std::io;

    const LEDS: &str = "/sys/class/input/js0/device/leds";

    fn resolved(surface: &FakeSurface) -> LedPaths {
        LedPaths::resolve(surface, &DeviceNode::new("/dev/input/js0")).unwrap()
    }

    #[test]
    fn test_resolve_direct_leds() {
        let surface = FakeSurface::new();
        add_leds(&surface, "js0", false);

        let paths = resolved(&surface);
        assert!(paths.has_player());
        assert!(paths.has_rgb());
        assert_eq!(paths.player.len(), 5);
    }

    #[test]
    fn test_resolve_nested_leds() {
        let surface = FakeSurface::new();
        add_leds(&surface, "js0", true);

        let paths = resolved(&surface);
        assert_eq!(
            paths.rgb,
            Some(PathBuf::from("/sys/class/input/js0/device/device/leds/input9:rgb:indicator"))
        );
    }

    #[test]
    fn test_resolve_skips_empty_leds_dir() {
        let surface = FakeSurface::new();
        surface.add_dir(LEDS);
        add_leds(&surface, "js0", true);

        assert!(resolved(&surface).has_rgb());
    }

    #[test]
    fn test_resolve_without_leds() {
        let surface = FakeSurface::new();
        let result = LedPaths::resolve(&surface, &DeviceNode::new("/dev/input/js0"));
        assert!(matches!(result, Err(ManagerError::LedNotFound(_))));
    }

    #[test]
    fn test_write_player_order_and_values() {
        let surface = FakeSurface::new();
        add_leds(&surface, "js0", false);
        let paths = resolved(&surface);

        paths.write_player(&surface, PlayerPattern::MIDDLE_CENTER).unwrap();

        let writes = surface.get_writes();
        let expected = [(1, "0"), (5, "0"), (2, "1"), (4, "1"), (3, "1")];
        assert_eq!(writes.len(), expected.len());
        for ((path, value), (segment, want)) in writes.iter().zip(expected) {
            assert_eq!(
                path,
                &PathBuf::from(format!("{}/input9:white:player-{}/brightness", LEDS, segment))
            );
            assert_eq!(value, want);
        }
    }

    #[test]
    fn test_write_rgb_sets_color_then_brightness() {
        let surface = FakeSurface::new();
        add_leds(&surface, "js0", false);
        let paths = resolved(&surface);

        paths.write_rgb(&surface, Rgb::new(255, 51, 0)).unwrap();

        let writes = surface.get_writes();
        assert_eq!(
            writes,
            vec![
                (
                    PathBuf::from(format!("{}/input9:rgb:indicator/multi_intensity", LEDS)),
                    "255 51 0".to_string()
                ),
                (
                    PathBuf::from(format!("{}/input9:rgb:indicator/brightness", LEDS)),
                    "255".to_string()
                ),
            ]
        );
    }

    #[test]
    fn test_write_failure_is_reported() {
        let surface = FakeSurface::new();
        add_leds(&surface, "js0", false);
        let paths = resolved(&surface);

        surface.set_write_error(Some(io::ErrorKind::PermissionDenied));
        assert!(matches!(
            paths.write_rgb(&surface, Rgb::BLUE),
            Err(ManagerError::Io(_))
        ));
        assert!(paths.write_player(&surface, PlayerPattern::ALL).is_err());
    }
}
