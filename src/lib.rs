//! # DualSense Manager Library
//!
//! Supervises DualSense controllers attached to a Linux host.
//!
//! For every controller the library runs a session of three tasks: an input
//! reader that detects real activity, a power monitor that drives the player
//! LEDs and RGB indicator from the battery, and an idle monitor that drops
//! the Bluetooth link of a controller left alone too long.
//! [`manager::ControllerManager`] discovers controllers and owns the
//! sessions.

pub mod bluetooth;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod led;
pub mod manager;
pub mod session;
pub mod shutdown;
pub mod sysfs;
