//! # Controller Manager
//!
//! Discovery loop and session registry.
//!
//! Every scan interval the manager lists the controller joystick nodes and
//! diffs them against the registry:
//! - a new node gets a session with the lowest free display index
//! - a session whose node no longer exists is cancelled and removed; its
//!   tasks get [`STOP_TIMEOUT`] to finish before they are aborted
//!
//! The registry is only touched from the manager's own task, so adds and
//! removes never race. Observers learn about changes through
//! [`SupervisorEvent`]s; `ControllersChanged` is sent only when the set of
//! sessions actually changed.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::bluetooth::DisconnectBridge;
use crate::config::{Config, GlobalPolicy};
use crate::controller::device::DeviceNode;
use crate::controller::discovery::{find_controllers, resolve_link_address};
use crate::controller::input::EventSource;
use crate::error::Result;
use crate::events::{EventSender, SessionSnapshot, SupervisorEvent};
use crate::session::{ControllerSession, SessionServices, STOP_TIMEOUT};
use crate::shutdown::Shutdown;
use crate::sysfs::ControlSurface;

/// Supervises every attached controller
pub struct ControllerManager {
    services: SessionServices,
    policy: watch::Sender<GlobalPolicy>,
    config: Config,
    sessions: BTreeMap<PathBuf, ControllerSession>,
}

impl ControllerManager {
    /// Create a manager with no sessions
    ///
    /// # Arguments
    ///
    /// * `config` - Initial configuration
    /// * `surface` - Attribute store for discovery, battery and LEDs
    /// * `bridge` - Disconnects idle controllers
    /// * `source` - Opens joystick event streams
    /// * `events` - Receives every [`SupervisorEvent`]
    pub fn new(
        config: Config,
        surface: Arc<dyn ControlSurface>,
        bridge: Arc<dyn DisconnectBridge>,
        source: Arc<dyn EventSource>,
        events: EventSender,
    ) -> Self {
        let (policy, policy_rx) = watch::channel(config.policy);

        Self {
            services: SessionServices {
                surface,
                bridge,
                source,
                policy: policy_rx,
                events,
            },
            policy,
            config,
            sessions: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Snapshots of every session, ordered by device path
    pub fn snapshots(&self) -> Vec<SessionSnapshot> {
        self.sessions.values().map(ControllerSession::snapshot).collect()
    }

    /// Run one discovery pass
    ///
    /// Returns whether the set of sessions changed.
    ///
    /// # Errors
    ///
    /// Returns error if the joystick nodes cannot be enumerated. Existing
    /// sessions are left untouched in that case.
    pub async fn scan_once(&mut self) -> Result<bool> {
        let candidates = find_controllers(self.services.surface.as_ref())?;
        let mut changed = false;

        let vanished: Vec<PathBuf> = self
            .sessions
            .keys()
            .filter(|path| !self.services.surface.exists(path))
            .cloned()
            .collect();

        for path in vanished {
            if let Some(session) = self.sessions.remove(&path) {
                let address = session.address().to_string();
                info!("Controller {} removed ({})", path.display(), address);
                session.shutdown().await;
                self.emit(SupervisorEvent::SessionRemoved { path, address });
                changed = true;
            }
        }

        for path in candidates {
            if self.sessions.contains_key(&path) {
                continue;
            }

            let node = DeviceNode::new(&path);
            let address = resolve_link_address(self.services.surface.as_ref(), &node);
            let index = self.next_index();
            let config = self.config.controller(&address);

            info!("Controller {} added at {} ({})", index, path.display(), address);
            let session = ControllerSession::spawn(&self.services, path.clone(), address.clone(), index, config);
            self.sessions.insert(path.clone(), session);
            self.emit(SupervisorEvent::SessionAdded { path, address, index });
            changed = true;
        }

        if changed {
            self.emit(SupervisorEvent::ControllersChanged {
                controllers: self.snapshots(),
            });
        }

        Ok(changed)
    }

    /// Apply a new configuration to the manager and every live session
    pub fn apply_config(&mut self, config: Config) {
        self.policy.send_if_modified(|policy| {
            if *policy == config.policy {
                false
            } else {
                *policy = config.policy;
                true
            }
        });

        for session in self.sessions.values() {
            if session.update_config(config.controller(session.address())) {
                debug!("Updated settings of {}", session.address());
            }
        }

        self.config = config;
    }

    /// Scan until `shutdown` fires, then stop every session
    ///
    /// Configuration published on `config_updates` is applied live.
    pub async fn run(mut self, mut shutdown: Shutdown, mut config_updates: watch::Receiver<Config>) {
        let mut ticker = self.scan_ticker();
        let mut updates_open = true;

        info!("Scanning for controllers every {:?}", self.scan_interval());

        loop {
            tokio::select! {
                _ = shutdown.triggered() => break,
                changed = config_updates.changed(), if updates_open => {
                    if changed.is_err() {
                        updates_open = false;
                        continue;
                    }

                    let config = config_updates.borrow_and_update().clone();
                    let previous = self.scan_interval();
                    self.apply_config(config);

                    if self.scan_interval() != previous {
                        info!("Scan interval changed to {:?}", self.scan_interval());
                        ticker = self.scan_ticker();
                    }
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.scan_once().await {
                        warn!("Controller scan failed: {}", e);
                    }
                }
            }
        }

        self.shutdown().await;
    }

    /// Stop and remove every session
    pub async fn shutdown(mut self) {
        let sessions = std::mem::take(&mut self.sessions);
        for (path, session) in sessions {
            let address = session.address().to_string();
            session.shutdown().await;
            self.emit(SupervisorEvent::SessionRemoved { path, address });
        }
        info!("All controller sessions stopped");
    }

    fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.config.discovery.scan_interval_ms)
    }

    fn scan_ticker(&self) -> tokio::time::Interval {
        let mut ticker = interval(self.scan_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    /// Lowest positive index not held by a live session
    fn next_index(&self) -> usize {
        let mut index = 1;
        while self.sessions.values().any(|session| session.index() == index) {
            index += 1;
        }
        index
    }

    fn emit(&self, event: SupervisorEvent) {
        let _ = self.services.events.send(event);
    }
}
