//! # Charging Animations
//!
//! Background tasks that overwrite an indicator while the controller charges.
//!
//! Each animation runs under two cancellation scopes: its own, so the power
//! monitor can stop it when charging ends, and the session's, so it dies with
//! the controller. Dropping an [`Animation`] stops it.
//!
//! | Indicator | Period | Frames |
//! |-----------|--------|--------|
//! | Player LEDs | 800ms | `--X--`, `-XXX-`, `XXXXX` |
//! | RGB | 25ms | battery color, sine brightness 0.2 to 1.0 |

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, trace};

use crate::led::indicator::LedPaths;
use crate::led::patterns::{battery_gradient, charging_stage, next_phase, pulse};
use crate::shutdown::{self, Shutdown, ShutdownTrigger};
use crate::sysfs::ControlSurface;

/// Time each player LED stage stays lit
pub const PLAYER_STAGE_PERIOD: Duration = Duration::from_millis(800);

/// RGB pulse frame period
pub const RGB_FRAME_PERIOD: Duration = Duration::from_millis(25);

/// Handle to a running animation task
#[derive(Debug)]
pub struct Animation {
    stop: ShutdownTrigger,
    task: Option<JoinHandle<()>>,
}

impl Animation {
    /// Cycle the player LEDs through the charging stages
    pub fn spawn_player(
        surface: Arc<dyn ControlSurface>,
        leds: Arc<LedPaths>,
        mut session: Shutdown,
    ) -> Self {
        let (stop, mut stopped) = shutdown::channel();

        let task = tokio::spawn(async move {
            let mut ticker = interval(PLAYER_STAGE_PERIOD);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut step = 0usize;

            loop {
                tokio::select! {
                    _ = stopped.triggered() => break,
                    _ = session.triggered() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = leds.write_player(surface.as_ref(), charging_stage(step)) {
                            debug!("Player LED animation write failed: {}", e);
                        }
                        step = step.wrapping_add(1);
                    }
                }
            }

            trace!("Player LED animation stopped");
        });

        Self {
            stop,
            task: Some(task),
        }
    }

    /// Pulse the RGB indicator around the battery color
    ///
    /// The target color follows every level published on `battery`.
    pub fn spawn_rgb(
        surface: Arc<dyn ControlSurface>,
        leds: Arc<LedPaths>,
        mut battery: watch::Receiver<u8>,
        mut session: Shutdown,
    ) -> Self {
        let (stop, mut stopped) = shutdown::channel();

        let task = tokio::spawn(async move {
            let mut ticker = interval(RGB_FRAME_PERIOD);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut base = battery_gradient(*battery.borrow_and_update());
            let mut theta = 0.0;

            loop {
                tokio::select! {
                    _ = stopped.triggered() => break,
                    _ = session.triggered() => break,
                    changed = battery.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        base = battery_gradient(*battery.borrow_and_update());
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = leds.write_rgb(surface.as_ref(), pulse(base, theta)) {
                            debug!("RGB animation write failed: {}", e);
                        }
                        theta = next_phase(theta);
                    }
                }
            }

            trace!("RGB animation stopped");
        });

        Self {
            stop,
            task: Some(task),
        }
    }

    /// Whether the task has exited
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }

    /// Stop the animation and wait for its task to exit
    pub async fn stop(mut self) {
        self.stop.trigger();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for Animation {
    fn drop(&mut self) {
        self.stop.trigger();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// At most one animation of a kind per indicator
#[derive(Debug, Default)]
pub struct AnimationSlot {
    current: Option<Animation>,
}

impl AnimationSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an animation unless one is already running
    ///
    /// Returns whether a new animation was started.
    pub fn ensure_running(&mut self, spawn: impl FnOnce() -> Animation) -> bool {
        if self.is_running() {
            return false;
        }
        self.current = Some(spawn());
        true
    }

    /// Stop the running animation and wait for it to exit
    ///
    /// Returns whether an animation was present. Once this returns, the
    /// animation can no longer write to the indicator.
    pub async fn stop(&mut self) -> bool {
        match self.current.take() {
            Some(animation) => {
                animation.stop().await;
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.current.as_ref().is_some_and(|animation| !animation.is_finished())
    }
}
