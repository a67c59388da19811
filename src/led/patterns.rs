//! # LED Patterns
//!
//! Pure functions deciding what the indicators show. Nothing here touches
//! hardware, see [`crate::led::indicator`] for the writes.
//!
//! ## Player LEDs
//!
//! Five white segments in a row. The driver only allows symmetric use, so a
//! pattern is described by three groups:
//!
//! | Group | Segments |
//! |-------|----------|
//! | outer | 1 and 5 |
//! | middle | 2 and 4 |
//! | center | 3 |
//!
//! ## Battery Gradient
//!
//! Red at 0%, orange around 25%, yellow at 50%, green at 100%:
//! - `percent > 50`: red = `255 * (100 - percent) / 50`, green = 255
//! - `percent <= 50`: red = 255, green = `255 * percent / 50`
//! - blue is always 0

use std::f64::consts::TAU;
use std::fmt;

/// Player LED segments in the order they are written
pub const PLAYER_SEGMENTS: [u8; 5] = [1, 5, 2, 4, 3];

/// Phase increment of the charging pulse per frame
pub const PULSE_STEP: f64 = 0.1;

/// State of the five player LEDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlayerPattern {
    /// Segments 1 and 5
    pub outer: bool,
    /// Segments 2 and 4
    pub middle: bool,
    /// Segment 3
    pub center: bool,
}

impl PlayerPattern {
    pub const OFF: Self = Self::new(false, false, false);
    pub const CENTER: Self = Self::new(false, false, true);
    pub const MIDDLE: Self = Self::new(false, true, false);
    pub const MIDDLE_CENTER: Self = Self::new(false, true, true);
    pub const OUTER_MIDDLE: Self = Self::new(true, true, false);
    pub const ALL: Self = Self::new(true, true, true);

    pub const fn new(outer: bool, middle: bool, center: bool) -> Self {
        Self { outer, middle, center }
    }

    /// Whether segment `n` (1-5) is lit
    pub fn is_lit(&self, segment: u8) -> bool {
        match segment {
            1 | 5 => self.outer,
            2 | 4 => self.middle,
            3 => self.center,
            _ => false,
        }
    }
}

impl fmt::Display for PlayerPattern {
    /// Renders as five characters, `X` lit and `-` dark
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in 1..=5 {
            write!(f, "{}", if self.is_lit(segment) { 'X' } else { '-' })?;
        }
        Ok(())
    }
}

/// An RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const OFF: Self = Self::new(0, 0, 0);
    pub const BLUE: Self = Self::new(0, 0, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Rgb {
    /// The `multi_intensity` format: `"R G B"`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.r, self.g, self.b)
    }
}

/// Bar graph of the battery level
///
/// Below 20% the bar blinks: `blink_on` selects the visible half of the
/// cycle. Callers flip it once per second for a 1 Hz blink.
///
/// | Level | Pattern |
/// |-------|---------|
/// | >= 75 | `XXXXX` |
/// | >= 50 | `-XXX-` |
/// | >= 20 | `--X--` |
/// | >= 10 | `-XXX-` blinking |
/// | < 10 | `--X--` blinking |
///
/// # Examples
///
/// ```
/// use dualsense_manager::led::patterns::{battery_bar, PlayerPattern};
///
/// assert_eq!(battery_bar(80, true), PlayerPattern::ALL);
/// assert_eq!(battery_bar(5, true), PlayerPattern::CENTER);
/// assert_eq!(battery_bar(5, false), PlayerPattern::OFF);
/// ```
pub fn battery_bar(percent: u8, blink_on: bool) -> PlayerPattern {
    let (pattern, blink) = match percent {
        75.. => (PlayerPattern::ALL, false),
        50..=74 => (PlayerPattern::MIDDLE_CENTER, false),
        20..=49 => (PlayerPattern::CENTER, false),
        10..=19 => (PlayerPattern::MIDDLE_CENTER, true),
        _ => (PlayerPattern::CENTER, true),
    };

    if blink && !blink_on {
        PlayerPattern::OFF
    } else {
        pattern
    }
}

/// Fixed pattern showing the controller's display index
///
/// # Examples
///
/// ```
/// use dualsense_manager::led::patterns::{player_number, PlayerPattern};
///
/// assert_eq!(player_number(1), PlayerPattern::CENTER);
/// assert_eq!(player_number(7), PlayerPattern::ALL);
/// ```
pub fn player_number(index: usize) -> PlayerPattern {
    match index {
        1 => PlayerPattern::CENTER,
        2 => PlayerPattern::MIDDLE,
        3 => PlayerPattern::MIDDLE_CENTER,
        4 => PlayerPattern::OUTER_MIDDLE,
        _ => PlayerPattern::ALL,
    }
}

/// Frame of the player LED charging animation: `--X--`, `-XXX-`, `XXXXX`
pub fn charging_stage(step: usize) -> PlayerPattern {
    match step % 3 {
        0 => PlayerPattern::CENTER,
        1 => PlayerPattern::MIDDLE_CENTER,
        _ => PlayerPattern::ALL,
    }
}

/// Red to green color of the battery level, truncating division
///
/// # Examples
///
/// ```
/// use dualsense_manager::led::patterns::{battery_gradient, Rgb};
///
/// assert_eq!(battery_gradient(100), Rgb::new(0, 255, 0));
/// assert_eq!(battery_gradient(50), Rgb::new(255, 255, 0));
/// assert_eq!(battery_gradient(10), Rgb::new(255, 51, 0));
/// ```
pub fn battery_gradient(percent: u8) -> Rgb {
    let percent = u32::from(percent.min(100));
    if percent > 50 {
        Rgb::new((255 * (100 - percent) / 50) as u8, 255, 0)
    } else {
        Rgb::new(255, (255 * percent / 50) as u8, 0)
    }
}

/// Parse `RRGGBB` (leading `#` optional); anything else is black
///
/// # Examples
///
/// ```
/// use dualsense_manager::led::patterns::{hex_to_rgb, Rgb};
///
/// assert_eq!(hex_to_rgb("FF0000"), Rgb::new(255, 0, 0));
/// assert_eq!(hex_to_rgb("#00FF00"), Rgb::new(0, 255, 0));
/// assert_eq!(hex_to_rgb("GARBAGE"), Rgb::OFF);
/// ```
pub fn hex_to_rgb(hex: &str) -> Rgb {
    let hex = hex.trim();
    let hex = hex.strip_prefix('#').unwrap_or(hex);

    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Rgb::OFF;
    }

    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).unwrap_or(0);
    Rgb::new(channel(0..2), channel(2..4), channel(4..6))
}

/// Color used in static mode; an empty setting means blue
pub fn static_color(hex: &str) -> Rgb {
    if hex.trim().is_empty() {
        Rgb::BLUE
    } else {
        hex_to_rgb(hex)
    }
}

/// Scale `base` by a sine brightness between 0.2 and 1.0 (center 0.6)
pub fn pulse(base: Rgb, theta: f64) -> Rgb {
    let brightness = 0.6 + 0.4 * theta.sin();
    let scale = |channel: u8| (f64::from(channel) * brightness) as u8;
    Rgb::new(scale(base.r), scale(base.g), scale(base.b))
}

/// Advance the pulse phase, wrapping after a full turn
pub fn next_phase(theta: f64) -> f64 {
    let next = theta + PULSE_STEP;
    if next > TAU {
        0.0
    } else {
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_battery_gradient_reference_points() {
        assert_eq!(battery_gradient(100), Rgb::new(0, 255, 0));
        assert_eq!(battery_gradient(75), Rgb::new(127, 255, 0));
        assert_eq!(battery_gradient(50), Rgb::new(255, 255, 0));
        assert_eq!(battery_gradient(25), Rgb::new(255, 127, 0));
        assert_eq!(battery_gradient(10), Rgb::new(255, 51, 0));
        assert_eq!(battery_gradient(0), Rgb::new(255, 0, 0));
    }

    #[test]
    fn test_battery_gradient_blue_always_zero() {
        for percent in 0..=100 {
            assert_eq!(battery_gradient(percent).b, 0);
        }
    }

    #[test]
    fn test_battery_gradient_clamps() {
        assert_eq!(battery_gradient(200), battery_gradient(100));
    }

    #[test]
    fn test_player_number_patterns() {
        assert_eq!(player_number(1).to_string(), "--X--");
        assert_eq!(player_number(2).to_string(), "-X-X-");
        assert_eq!(player_number(3).to_string(), "-XXX-");
        assert_eq!(player_number(4).to_string(), "XX-XX");
        assert_eq!(player_number(5).to_string(), "XXXXX");
        assert_eq!(player_number(12), PlayerPattern::ALL);
    }

    #[test]
    fn test_battery_bar_steady_levels() {
        for blink_on in [true, false] {
            assert_eq!(battery_bar(100, blink_on), PlayerPattern::ALL);
            assert_eq!(battery_bar(75, blink_on), PlayerPattern::ALL);
            assert_eq!(battery_bar(74, blink_on), PlayerPattern::MIDDLE_CENTER);
            assert_eq!(battery_bar(50, blink_on), PlayerPattern::MIDDLE_CENTER);
            assert_eq!(battery_bar(49, blink_on), PlayerPattern::CENTER);
            assert_eq!(battery_bar(20, blink_on), PlayerPattern::CENTER);
        }
    }

    #[test]
    fn test_battery_bar_blinking_levels() {
        assert_eq!(battery_bar(19, true), PlayerPattern::MIDDLE_CENTER);
        assert_eq!(battery_bar(10, true), PlayerPattern::MIDDLE_CENTER);
        assert_eq!(battery_bar(10, false), PlayerPattern::OFF);
        assert_eq!(battery_bar(9, true), PlayerPattern::CENTER);
        assert_eq!(battery_bar(0, true), PlayerPattern::CENTER);
        assert_eq!(battery_bar(0, false), PlayerPattern::OFF);
    }

    #[test]
    fn test_charging_stages_cycle() {
        assert_eq!(charging_stage(0), PlayerPattern::CENTER);
        assert_eq!(charging_stage(1), PlayerPattern::MIDDLE_CENTER);
        assert_eq!(charging_stage(2), PlayerPattern::ALL);
        assert_eq!(charging_stage(3), PlayerPattern::CENTER);
    }

    #[test]
    fn test_hex_to_rgb() {
        assert_eq!(hex_to_rgb("FF0000"), Rgb::new(255, 0, 0));
        assert_eq!(hex_to_rgb("00FF00"), Rgb::new(0, 255, 0));
        assert_eq!(hex_to_rgb("#0000FF"), Rgb::new(0, 0, 255));
        assert_eq!(hex_to_rgb("#0a1B2c"), Rgb::new(10, 27, 44));
        assert_eq!(hex_to_rgb("GARBAGE"), Rgb::OFF);
        assert_eq!(hex_to_rgb("GGGGGG"), Rgb::OFF);
        assert_eq!(hex_to_rgb("+F0000"), Rgb::OFF);
        assert_eq!(hex_to_rgb("ééé"), Rgb::OFF);
        assert_eq!(hex_to_rgb(""), Rgb::OFF);
    }

    #[test]
    fn test_static_color_default_blue() {
        assert_eq!(static_color(""), Rgb::BLUE);
        assert_eq!(static_color("#FF00FF"), Rgb::new(255, 0, 255));
    }

    #[test]
    fn test_rgb_display_is_multi_intensity_format() {
        assert_eq!(Rgb::new(100, 150, 200).to_string(), "100 150 200");
    }

    #[test]
    fn test_pulse_range() {
        let base = Rgb::new(255, 255, 0);
        assert_eq!(pulse(base, 0.0), Rgb::new(153, 153, 0));
        assert_eq!(pulse(base, std::f64::consts::FRAC_PI_2), base);

        let mut theta = 0.0;
        for _ in 0..200 {
            let color = pulse(base, theta);
            assert!(color.r >= 51 && color.g >= 51, "Brightness never drops below 0.2");
            theta = next_phase(theta);
        }
    }

    #[test]
    fn test_next_phase_wraps() {
        assert!((next_phase(0.0) - PULSE_STEP).abs() < 1e-9);
        assert_eq!(next_phase(TAU - 0.05), 0.0);
        assert!(next_phase(TAU - 0.15) <= TAU);
    }
}
