//! # Power Monitor
//!
//! Polls the battery once per second and drives both indicators from it.
//!
//! ## Display Decisions
//!
//! | Preference | Charging | Player LEDs | RGB indicator |
//! |------------|----------|-------------|---------------|
//! | battery | yes | charging animation | pulse animation |
//! | battery | no | battery bar | battery gradient |
//! | number | any | display index | - |
//! | static | any | - | configured color |
//! | off | any | - | dark |
//!
//! Steady values are only written when they differ from the last successful
//! write, so an unchanged controller costs no hardware I/O.
//!
//! ## Missing Battery
//!
//! A failed capacity read means the controller is going away. The monitor
//! reports it as not found, makes no LED writes and polls again after
//! [`MISSING_RETRY_DELAY`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::{ControllerConfig, GlobalPolicy, PlayerLedMode, RgbLedMode};
use crate::controller::battery::{read_capacity, read_status, PowerState};
use crate::controller::device::DeviceNode;
use crate::error::ManagerError;
use crate::events::{EventSender, SupervisorEvent};
use crate::led::patterns::{
    battery_bar, battery_gradient, player_number, static_color, PlayerPattern, Rgb,
};
use crate::led::{Animation, AnimationSlot, LedPaths};
use crate::shutdown::Shutdown;
use crate::sysfs::ControlSurface;

/// Battery poll period
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Delay before polling again after the battery could not be read
pub const MISSING_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Title of the low battery notification
pub const LOW_BATTERY_TITLE: &str = "DualSense Battery Low";

/// Status used when the kernel reports a level but no readable status
const STATUS_UNKNOWN: &str = "Unknown";

/// Latest battery observation of a session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PowerReport {
    /// Battery percent, `None` while unknown
    pub level: Option<u8>,
    pub state: PowerState,
}

/// Result of one poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Battery read, indicators up to date
    Updated,
    /// Battery unreadable, retry after [`MISSING_RETRY_DELAY`]
    BatteryMissing,
}

/// Battery poller and LED state machine of one controller
pub struct PowerMonitor {
    surface: Arc<dyn ControlSurface>,
    node: DeviceNode,
    index: usize,
    config: watch::Receiver<ControllerConfig>,
    policy: watch::Receiver<GlobalPolicy>,
    events: EventSender,
    shutdown: Shutdown,

    report: watch::Sender<PowerReport>,
    /// Level fan-out for the RGB animation
    battery: watch::Sender<u8>,

    leds: Option<Arc<LedPaths>>,
    last_level: Option<u8>,
    last_player: Option<PlayerPattern>,
    last_rgb: Option<Rgb>,
    player_animation: AnimationSlot,
    rgb_animation: AnimationSlot,
    ticks: u64,
}

impl PowerMonitor {
    pub fn new(
        surface: Arc<dyn ControlSurface>,
        node: DeviceNode,
        index: usize,
        config: watch::Receiver<ControllerConfig>,
        policy: watch::Receiver<GlobalPolicy>,
        events: EventSender,
        shutdown: Shutdown,
    ) -> Self {
        let (report, _) = watch::channel(PowerReport::default());
        let (battery, _) = watch::channel(0);

        Self {
            surface,
            node,
            index,
            config,
            policy,
            events,
            shutdown,
            report,
            battery,
            leds: None,
            last_level: None,
            last_player: None,
            last_rgb: None,
            player_animation: AnimationSlot::new(),
            rgb_animation: AnimationSlot::new(),
            ticks: 0,
        }
    }

    /// Receiver for the battery observations
    pub fn subscribe(&self) -> watch::Receiver<PowerReport> {
        self.report.subscribe()
    }

    /// Poll until the session is cancelled
    pub async fn run(mut self) {
        debug!("Starting power monitor for {}", self.node);

        while !self.shutdown.is_triggered() {
            let delay = match self.tick().await {
                PollOutcome::Updated => POLL_INTERVAL,
                PollOutcome::BatteryMissing => MISSING_RETRY_DELAY,
            };

            tokio::select! {
                _ = self.shutdown.triggered() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.player_animation.stop().await;
        self.rgb_animation.stop().await;
        debug!("Stopping power monitor for {}", self.node);
    }

    /// Run one poll: read the battery, publish changes, update the LEDs
    pub async fn tick(&mut self) -> PollOutcome {
        let level = match read_capacity(self.surface.as_ref(), &self.node) {
            Ok(level) => level,
            Err(e) => {
                self.battery_missing(e).await;
                return PollOutcome::BatteryMissing;
            }
        };

        let status = read_status(self.surface.as_ref(), &self.node).unwrap_or_else(|e| {
            debug!("Unable to read charging status of {}: {}", self.node, e);
            STATUS_UNKNOWN.to_string()
        });
        let state = PowerState::Reported(status);

        if self.last_level != Some(level) {
            self.level_changed(level, &state);
        }
        self.publish(Some(level), state.clone());

        if self.leds.is_none() {
            match LedPaths::resolve(self.surface.as_ref(), &self.node) {
                Ok(leds) => self.leds = Some(Arc::new(leds)),
                Err(e) => debug!("{}", e),
            }
        }

        if let Some(leds) = self.leds.clone() {
            let config = self.config.borrow().clone();
            let blink_on = self.ticks % 2 == 0;

            if leds.has_player() {
                self.update_player(&leds, &config, &state, level, blink_on).await;
            }
            if leds.has_rgb() {
                self.update_rgb(&leds, &config, &state, level).await;
            }
        }

        self.ticks = self.ticks.wrapping_add(1);
        PollOutcome::Updated
    }

    async fn battery_missing(&mut self, error: ManagerError) {
        if self.report.borrow().state != PowerState::NotFound {
            info!("Battery of {} unavailable: {}", self.node, error);
        }

        // Whatever comes back must be written again
        self.player_animation.stop().await;
        self.rgb_animation.stop().await;
        self.last_player = None;
        self.last_rgb = None;
        self.last_level = None;

        self.publish(None, PowerState::NotFound);
    }

    fn level_changed(&mut self, level: u8, state: &PowerState) {
        self.last_level = Some(level);
        self.battery.send_replace(level);

        let alert = self.policy.borrow().battery_alert;
        if alert > 0 && level <= alert && !state.is_charging() {
            warn!("{} battery low: {}%", self.node, level);
            let _ = self.events.send(SupervisorEvent::LowBattery {
                path: self.path(),
                title: LOW_BATTERY_TITLE.to_string(),
                body: format!("Controller {} battery is at {}%", self.index, level),
            });
        }
    }

    /// Update the shared report, emitting events for what changed
    fn publish(&self, level: Option<u8>, state: PowerState) {
        let previous = self.report.borrow().clone();

        if previous.level != level || previous == PowerReport::default() {
            let _ = self.events.send(SupervisorEvent::Battery {
                path: self.path(),
                percent: level,
            });
        }
        if previous.state != state {
            let _ = self.events.send(SupervisorEvent::Status {
                path: self.path(),
                status: state.to_string(),
            });
        }

        self.report.send_if_modified(|report| {
            let next = PowerReport { level, state };
            if *report == next {
                false
            } else {
                *report = next;
                true
            }
        });
    }

    async fn update_player(
        &mut self,
        leds: &Arc<LedPaths>,
        config: &ControllerConfig,
        state: &PowerState,
        level: u8,
        blink_on: bool,
    ) {
        if config.led_player == PlayerLedMode::Battery && state.is_charging() {
            let started = self.player_animation.ensure_running(|| {
                Animation::spawn_player(self.surface.clone(), leds.clone(), self.shutdown.clone())
            });
            if started {
                debug!("Player LED charging animation started on {}", self.node);
                self.last_player = None;
            }
            return;
        }

        if self.player_animation.stop().await {
            debug!("Player LED charging animation stopped on {}", self.node);
            self.last_player = None;
        }

        let pattern = match config.led_player {
            PlayerLedMode::Battery => battery_bar(level, blink_on),
            PlayerLedMode::Number => player_number(self.index),
        };

        if self.last_player == Some(pattern) {
            return;
        }

        match leds.write_player(self.surface.as_ref(), pattern) {
            Ok(()) => self.last_player = Some(pattern),
            Err(e) => {
                warn!("Failed to set player LEDs of {}: {}", self.node, e);
                self.last_player = None;
            }
        }
    }

    async fn update_rgb(
        &mut self,
        leds: &Arc<LedPaths>,
        config: &ControllerConfig,
        state: &PowerState,
        level: u8,
    ) {
        if config.led_rgb == RgbLedMode::Battery && state.is_charging() {
            let started = self.rgb_animation.ensure_running(|| {
                Animation::spawn_rgb(
                    self.surface.clone(),
                    leds.clone(),
                    self.battery.subscribe(),
                    self.shutdown.clone(),
                )
            });
            if started {
                debug!("RGB charging animation started on {}", self.node);
                self.last_rgb = None;
            }
            return;
        }

        if self.rgb_animation.stop().await {
            debug!("RGB charging animation stopped on {}", self.node);
            self.last_rgb = None;
        }

        let color = match config.led_rgb {
            RgbLedMode::Battery => battery_gradient(level),
            RgbLedMode::Static => static_color(&config.led_rgb_static),
            RgbLedMode::Off => Rgb::OFF,
        };

        if self.last_rgb == Some(color) {
            return;
        }

        match leds.write_rgb(self.surface.as_ref(), color) {
            Ok(()) => self.last_rgb = Some(color),
            Err(e) => {
                warn!("Failed to set RGB indicator of {}: {}", self.node, e);
                self.last_rgb = None;
            }
        }
    }

    fn path(&self) -> PathBuf {
        self.node.path().to_path_buf()
    }

    #[cfg(test)]
    fn animations_running(&self) -> (bool, bool) {
        (self.player_animation.is_running(), self.rgb_animation.is_running())
    }
}
