//! # Controller Module
//!
//! Per-device access to an attached DualSense controller.
//!
//! This module handles:
//! - Mapping `/dev/input/jsN` nodes to their sysfs attributes
//! - Detecting controllers and resolving their Bluetooth address
//! - Reading battery level and charging status
//! - Decoding raw joystick events into activity notifications

pub mod battery;
pub mod device;
pub mod discovery;
pub mod input;
