//! # Idle Monitor
//!
//! Tracks the time since the last real input and drops the wireless link of
//! a controller left alone for longer than the configured timeout.
//!
//! ## Policy
//!
//! Checked once per second, first match wins:
//!
//! 1. Controller absent: the idle timer is reset, nothing fires.
//! 2. Timeout is 0: auto-off disabled, idle time is only reported.
//! 3. Charging or full: idle time is reported, nothing fires.
//! 4. Otherwise the idle time is compared to the timeout and a disconnect
//!    is requested every tick while it is exceeded. The request stops once
//!    the controller is gone and discovery removes the session.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::bluetooth::DisconnectBridge;
use crate::config::GlobalPolicy;
use crate::controller::battery::PowerState;
use crate::events::{EventSender, SupervisorEvent};
use crate::session::power::PowerReport;
use crate::shutdown::Shutdown;

/// Idle check period
pub const IDLE_TICK: Duration = Duration::from_secs(1);

/// Outcome of one idle check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleVerdict {
    /// Activity was just seen
    InUse,
    /// Controller absent, timer reset
    Disconnected,
    /// Auto-off turned off by policy
    Disabled { elapsed: Duration },
    /// Controller on a charger
    Suppressed { elapsed: Duration },
    /// Armed, limit not reached
    Counting { elapsed: Duration, limit_minutes: u32 },
    /// Armed and past the limit
    Expired { elapsed: Duration, limit_minutes: u32 },
}

impl IdleVerdict {
    pub fn is_expired(&self) -> bool {
        matches!(self, IdleVerdict::Expired { .. })
    }
}

impl fmt::Display for IdleVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdleVerdict::InUse => write!(f, "In use"),
            IdleVerdict::Disconnected => write!(f, "Disconnected"),
            IdleVerdict::Disabled { elapsed } => {
                write!(f, "Inactive : {} (Auto-off Disabled)", format_elapsed(*elapsed))
            }
            IdleVerdict::Suppressed { elapsed } => {
                write!(f, "Inactive : {} (disabled due to charging)", format_elapsed(*elapsed))
            }
            IdleVerdict::Counting { elapsed, limit_minutes }
            | IdleVerdict::Expired { elapsed, limit_minutes } => {
                write!(f, "Inactive : {} / {} min", format_elapsed(*elapsed), limit_minutes)
            }
        }
    }
}

/// Apply the idle policy to the time since the last activity
///
/// # Examples
///
/// ```
/// use dualsense_manager::controller::battery::PowerState;
/// use dualsense_manager::session::idle::{evaluate, IdleVerdict};
/// use std::time::Duration;
///
/// let on_battery = PowerState::Reported("Discharging".into());
/// let verdict = evaluate(Duration::from_secs(601), &on_battery, 10);
/// assert!(verdict.is_expired());
///
/// let verdict = evaluate(Duration::from_secs(601), &on_battery, 0);
/// assert_eq!(verdict, IdleVerdict::Disabled { elapsed: Duration::from_secs(601) });
/// ```
pub fn evaluate(elapsed: Duration, state: &PowerState, idle_minutes: u32) -> IdleVerdict {
    if state.is_absent() {
        return IdleVerdict::Disconnected;
    }
    if idle_minutes == 0 {
        return IdleVerdict::Disabled { elapsed };
    }
    if state.is_on_charger() {
        return IdleVerdict::Suppressed { elapsed };
    }

    let limit = Duration::from_secs(u64::from(idle_minutes) * 60);
    if elapsed > limit {
        IdleVerdict::Expired {
            elapsed,
            limit_minutes: idle_minutes,
        }
    } else {
        IdleVerdict::Counting {
            elapsed,
            limit_minutes: idle_minutes,
        }
    }
}

/// Render a duration rounded to whole seconds, e.g. `1h2m3s`, `4m0s`, `9s`
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = (elapsed.as_millis() + 500) / 1000;
    let (hours, minutes, seconds) = (total / 3600, (total / 60) % 60, total % 60);

    if hours > 0 {
        format!("{}h{}m{}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Idle tracker of one controller
pub struct IdleMonitor {
    path: PathBuf,
    address: String,
    power: watch::Receiver<PowerReport>,
    policy: watch::Receiver<GlobalPolicy>,
    activity: mpsc::Receiver<Instant>,
    bridge: Arc<dyn DisconnectBridge>,
    events: EventSender,
    shutdown: Shutdown,
    status: watch::Sender<String>,
}

impl IdleMonitor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        path: PathBuf,
        address: String,
        power: watch::Receiver<PowerReport>,
        policy: watch::Receiver<GlobalPolicy>,
        activity: mpsc::Receiver<Instant>,
        bridge: Arc<dyn DisconnectBridge>,
        events: EventSender,
        shutdown: Shutdown,
    ) -> Self {
        let (status, _) = watch::channel(String::new());
        Self {
            path,
            address,
            power,
            policy,
            activity,
            bridge,
            events,
            shutdown,
            status,
        }
    }

    /// Receiver for the idle status text
    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.status.subscribe()
    }

    /// Track activity until the session is cancelled
    pub async fn run(mut self) {
        debug!("Starting idle monitor for {}", self.path.display());

        let mut last_activity = Instant::now();
        let mut ticker = interval(IDLE_TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.triggered() => break,
                Some(at) = self.activity.recv() => {
                    last_activity = at;
                    self.report(IdleVerdict::InUse);
                }
                _ = ticker.tick() => {
                    let state: PowerState = self.power.borrow().state.clone();
                    let idle_minutes = self.policy.borrow().idle_minutes;

                    if state.is_absent() {
                        last_activity = Instant::now();
                    }

                    let verdict = evaluate(last_activity.elapsed(), &state, idle_minutes);
                    self.report(verdict);

                    if verdict.is_expired() {
                        self.request_disconnect(&verdict).await;
                    }
                }
            }
        }

        debug!("Stopping idle monitor for {}", self.path.display());
    }

    fn report(&self, verdict: IdleVerdict) {
        let text = verdict.to_string();
        let changed = self.status.send_if_modified(|status| {
            if *status == text {
                false
            } else {
                status.clone_from(&text);
                true
            }
        });

        if changed {
            let _ = self.events.send(SupervisorEvent::Idle {
                path: self.path.clone(),
                status: text,
            });
        }
    }

    /// Ask the bridge to drop the link, abandoning the call on cancellation
    async fn request_disconnect(&mut self, verdict: &IdleVerdict) {
        if self.address.is_empty() {
            debug!("{} idle but has no link address", self.path.display());
            return;
        }

        info!("Disconnecting idle controller {} ({})", self.address, verdict);
        tokio::select! {
            biased;

            _ = self.shutdown.triggered() => {
                debug!("Disconnect of {} abandoned, session cancelled", self.address);
            }
            result = self.bridge.disconnect(&self.address) => {
                if let Err(e) = result {
                    warn!("Failed to disconnect {}: {}", self.address, e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bluetooth::MockDisconnectBridge;
    use crate::error::ManagerError;
    use crate::events;
    use crate::shutdown::{self, ShutdownTrigger};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const ADDRESS: &str = "AA:BB:CC:DD:EE:FF";

    fn discharging() -> PowerState {
        PowerState::Reported("Discharging".into())
    }

    struct Harness {
        power: watch::Sender<PowerReport>,
        policy: watch::Sender<GlobalPolicy>,
        activity: mpsc::Sender<Instant>,
        status: watch::Receiver<String>,
        trigger: ShutdownTrigger,
        handle: tokio::task::JoinHandle<()>,
    }

    fn start(bridge: impl DisconnectBridge + 'static, address: &str, idle_minutes: u32, state: PowerState) -> Harness {
        let (power, power_rx) = watch::channel(PowerReport {
            level: Some(50),
            state,
        });
        let (policy, policy_rx) = watch::channel(GlobalPolicy {
            idle_minutes,
            ..GlobalPolicy::default()
        });
        let (activity, activity_rx) = mpsc::channel(1);
        let (events_tx, _events) = events::channel();
        let (trigger, scope) = shutdown::channel();

        let monitor = IdleMonitor::new(
            PathBuf::from("/dev/input/js0"),
            address.to_string(),
            power_rx,
            policy_rx,
            activity_rx,
            Arc::new(bridge),
            events_tx,
            scope,
        );
        let status = monitor.subscribe();
        let handle = tokio::spawn(monitor.run());

        Harness {
            power,
            policy,
            activity,
            status,
            trigger,
            handle,
        }
    }

    async fn stop(h: Harness) {
        h.trigger.trigger();
        h.handle.await.unwrap();
    }

    #[test]
    fn test_disabled_regardless_of_elapsed() {
        for secs in [0, 59, 3600, 86_400] {
            let verdict = evaluate(Duration::from_secs(secs), &discharging(), 0);
            assert!(matches!(verdict, IdleVerdict::Disabled { .. }));
        }
    }

    #[test]
    fn test_suppressed_while_on_charger() {
        for status in ["Charging", "Full"] {
            let state = PowerState::Reported(status.into());
            let verdict = evaluate(Duration::from_secs(10_000), &state, 5);
            assert!(matches!(verdict, IdleVerdict::Suppressed { .. }), "{}", status);
        }
    }

    #[test]
    fn test_absent_wins_over_everything() {
        assert_eq!(
            evaluate(Duration::from_secs(10_000), &PowerState::NotFound, 0),
            IdleVerdict::Disconnected
        );
        assert_eq!(
            evaluate(Duration::from_secs(10_000), &PowerState::Searching, 5),
            IdleVerdict::Disconnected
        );
    }

    #[test]
    fn test_expiry_is_strictly_after_limit() {
        let limit = Duration::from_secs(300);
        assert!(!evaluate(limit, &discharging(), 5).is_expired());
        assert!(evaluate(limit + Duration::from_millis(1), &discharging(), 5).is_expired());
    }

    #[test]
    fn test_status_texts() {
        let elapsed = Duration::from_secs(95);
        assert_eq!(IdleVerdict::InUse.to_string(), "In use");
        assert_eq!(IdleVerdict::Disconnected.to_string(), "Disconnected");
        assert_eq!(
            IdleVerdict::Disabled { elapsed }.to_string(),
            "Inactive : 1m35s (Auto-off Disabled)"
        );
        assert_eq!(
            IdleVerdict::Suppressed { elapsed }.to_string(),
            "Inactive : 1m35s (disabled due to charging)"
        );
        assert_eq!(
            IdleVerdict::Counting { elapsed, limit_minutes: 10 }.to_string(),
            "Inactive : 1m35s / 10 min"
        );
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::ZERO), "0s");
        assert_eq!(format_elapsed(Duration::from_millis(1499)), "1s");
        assert_eq!(format_elapsed(Duration::from_millis(1500)), "2s");
        assert_eq!(format_elapsed(Duration::from_secs(240)), "4m0s");
        assert_eq!(format_elapsed(Duration::from_secs(3723)), "1h2m3s");
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_requested_after_timeout() {
        let mut bridge = MockDisconnectBridge::new();
        bridge
            .expect_disconnect()
            .withf(|address| address.to_string() == ADDRESS)
            .times(2..)
            .returning(|_| Ok(()));

        let h = start(bridge, ADDRESS, 1, discharging());

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert!(h.status.borrow().ends_with("/ 1 min"));

        tokio::time::sleep(Duration::from_secs(5)).await;
        stop(h).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_bridge_failure_is_not_fatal() {
        let mut bridge = MockDisconnectBridge::new();
        bridge.expect_disconnect().times(3..).returning(|address| {
            Err(ManagerError::Disconnect {
                address: address.to_string(),
                reason: "org.bluez.Error.NotConnected".into(),
            })
        });

        let h = start(bridge, ADDRESS, 1, discharging());
        tokio::time::sleep(Duration::from_secs(65)).await;
        assert!(!h.handle.is_finished());
        stop(h).await;
    }

    /// Bridge whose calls hang like an unanswered D-Bus request
    #[derive(Default)]
    struct HangingBridge {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl DisconnectBridge for HangingBridge {
        async fn disconnect(&self, _address: &str) -> crate::error::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(25)).await;
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_abandons_pending_disconnect() {
        let bridge = HangingBridge::default();
        let calls = bridge.calls.clone();
        let h = start(bridge, ADDRESS, 1, discharging());

        // First expired tick is at 61s, its call is still pending at 62s
        tokio::time::sleep(Duration::from_secs(62)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let cancelled_at = Instant::now();
        h.trigger.trigger();
        tokio::time::timeout(IDLE_TICK, h.handle)
            .await
            .expect("idle monitor should exit within one tick of cancellation")
            .unwrap();

        assert!(cancelled_at.elapsed() < IDLE_TICK);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1, "No disconnect after cancellation");
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_resets_timer() {
        let mut bridge = MockDisconnectBridge::new();
        bridge.expect_disconnect().times(0);

        let h = start(bridge, ADDRESS, 1, discharging());

        // Stay off the tick boundaries
        tokio::time::sleep(Duration::from_millis(300)).await;
        for _ in 0..4 {
            tokio::time::sleep(Duration::from_secs(40)).await;
            h.activity.send(Instant::now()).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(*h.status.borrow(), "In use");

        stop(h).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_disconnect_while_charging_or_disabled() {
        let mut bridge = MockDisconnectBridge::new();
        bridge.expect_disconnect().times(0);

        let h = start(bridge, ADDRESS, 1, PowerState::Reported("Charging".into()));
        tokio::time::sleep(Duration::from_secs(90)).await;
        assert!(h.status.borrow().ends_with("(disabled due to charging)"));

        h.power.send_modify(|report| report.state = discharging());
        h.policy.send_modify(|policy| policy.idle_minutes = 0);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(h.status.borrow().ends_with("(Auto-off Disabled)"));

        stop(h).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_absent_controller_resets_timer() {
        let mut bridge = MockDisconnectBridge::new();
        bridge.expect_disconnect().times(0);

        let h = start(bridge, ADDRESS, 1, PowerState::NotFound);
        tokio::time::sleep(Duration::from_secs(90)).await;
        assert_eq!(*h.status.borrow(), "Disconnected");

        // Back on battery: the clock restarts from the last absent tick
        h.power.send_modify(|report| report.state = discharging());
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(h.status.borrow().ends_with("/ 1 min"));

        stop(h).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_address_never_calls_bridge() {
        let mut bridge = MockDisconnectBridge::new();
        bridge.expect_disconnect().times(0);

        let h = start(bridge, "", 1, discharging());
        tokio::time::sleep(Duration::from_secs(90)).await;
        assert!(h.status.borrow().starts_with("Inactive : 1m"));

        stop(h).await;
    }
}
