//! # LED Module
//!
//! Everything that drives the controller's indicators:
//! - `patterns`: what to show, as pure functions
//! - `indicator`: where the LED attributes live and how they are written
//! - `animation`: charging animations running as their own tasks

pub mod animation;
pub mod indicator;
pub mod patterns;

pub use animation::{Animation, AnimationSlot};
pub use indicator::LedPaths;
pub use patterns::{PlayerPattern, Rgb};
