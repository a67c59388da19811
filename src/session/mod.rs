//! # Controller Sessions
//!
//! A session is the task group of one attached controller:
//!
//! ```text
//!   InputReader ──activity (cap 1, try_send)──> IdleMonitor ──> DisconnectBridge
//!                                                   ^
//!   PowerMonitor ──────────PowerReport (watch)──────┘
//!        │
//!        └──battery level (watch)──> RGB charging animation
//! ```
//!
//! All three tasks share one cancellation scope owned by the session. The
//! session itself is owned by the [`crate::manager::ControllerManager`];
//! callers only ever see [`SessionSnapshot`] copies.

pub mod idle;
pub mod power;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, warn};

use crate::bluetooth::{short_address, DisconnectBridge};
use crate::config::{ControllerConfig, GlobalPolicy};
use crate::controller::device::DeviceNode;
use crate::controller::input::{EventSource, InputReader};
use crate::events::{EventSender, SessionSnapshot};
use crate::shutdown::{self, ShutdownTrigger};
use crate::sysfs::ControlSurface;

use idle::IdleMonitor;
use power::{PowerMonitor, PowerReport};

/// Pending activity notifications; anything beyond is dropped
pub const ACTIVITY_QUEUE_DEPTH: usize = 1;

/// Longest wait for a cancelled session's tasks before they are aborted
pub const STOP_TIMEOUT: Duration = Duration::from_secs(1);

/// Collaborators shared by every session
#[derive(Clone)]
pub struct SessionServices {
    pub surface: Arc<dyn ControlSurface>,
    pub bridge: Arc<dyn DisconnectBridge>,
    pub source: Arc<dyn EventSource>,
    pub policy: watch::Receiver<GlobalPolicy>,
    pub events: EventSender,
}

/// Runtime record of one attached controller
///
/// Dropping a session cancels its tasks without waiting for them; use
/// [`ControllerSession::shutdown`] to also wait.
pub struct ControllerSession {
    node: DeviceNode,
    address: String,
    index: usize,
    trigger: ShutdownTrigger,
    config: watch::Sender<ControllerConfig>,
    power: watch::Receiver<PowerReport>,
    idle: watch::Receiver<String>,
    tasks: Vec<JoinHandle<()>>,
}

impl ControllerSession {
    /// Start the reader, power and idle tasks for a controller
    pub fn spawn(
        services: &SessionServices,
        path: PathBuf,
        address: String,
        index: usize,
        config: ControllerConfig,
    ) -> Self {
        let node = DeviceNode::new(path);
        let (trigger, scope) = shutdown::channel();
        let (config_tx, config_rx) = watch::channel(config);
        let (activity_tx, activity_rx) = mpsc::channel(ACTIVITY_QUEUE_DEPTH);

        let power = PowerMonitor::new(
            services.surface.clone(),
            node.clone(),
            index,
            config_rx.clone(),
            services.policy.clone(),
            services.events.clone(),
            scope.clone(),
        );
        let power_rx = power.subscribe();

        let idle = IdleMonitor::new(
            node.path().to_path_buf(),
            address.clone(),
            power_rx.clone(),
            services.policy.clone(),
            activity_rx,
            services.bridge.clone(),
            services.events.clone(),
            scope.clone(),
        );
        let idle_rx = idle.subscribe();

        let reader = InputReader::new(
            services.source.clone(),
            node.path().to_path_buf(),
            config_rx,
            activity_tx,
            scope,
        );

        let tasks = vec![
            tokio::spawn(power.run()),
            tokio::spawn(idle.run()),
            tokio::spawn(reader.run()),
        ];

        debug!("Session {} started for {} ({})", index, node, address);

        Self {
            node,
            address,
            index,
            trigger,
            config: config_tx,
            power: power_rx,
            idle: idle_rx,
            tasks,
        }
    }

    pub fn path(&self) -> &Path {
        self.node.path()
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Name shown for the controller, e.g. `DualSense EE:FF`
    pub fn label(&self) -> String {
        if self.address.is_empty() {
            format!("DualSense {}", self.index)
        } else {
            format!("DualSense {}", short_address(&self.address))
        }
    }

    /// 1-based display index
    pub fn index(&self) -> usize {
        self.index
    }

    /// Copy of the current observable state
    pub fn snapshot(&self) -> SessionSnapshot {
        let report = self.power.borrow().clone();
        SessionSnapshot {
            path: self.path().to_path_buf(),
            address: self.address.clone(),
            label: self.label(),
            index: self.index,
            battery: report.level,
            status: report.state.to_string(),
            idle: self.idle.borrow().clone(),
        }
    }

    /// Hand new per-controller settings to the running tasks
    ///
    /// Returns whether anything changed.
    pub fn update_config(&self, config: ControllerConfig) -> bool {
        self.config.send_if_modified(|current| {
            if *current == config {
                false
            } else {
                *current = config;
                true
            }
        })
    }

    /// Signal every task of the session to stop
    pub fn cancel(&self) {
        self.trigger.trigger();
    }

    /// Whether every task has exited
    pub fn is_finished(&self) -> bool {
        self.tasks.iter().all(|task| task.is_finished())
    }

    /// Cancel the session and wait up to [`STOP_TIMEOUT`] for its tasks
    ///
    /// Tasks still running after that are aborted. Returns whether every
    /// task stopped on its own.
    pub async fn shutdown(mut self) -> bool {
        self.cancel();

        let tasks = std::mem::take(&mut self.tasks);
        let aborts: Vec<AbortHandle> = tasks.iter().map(JoinHandle::abort_handle).collect();
        let node = &self.node;

        let joined = tokio::time::timeout(STOP_TIMEOUT, async {
            for task in tasks {
                if let Err(e) = task.await {
                    warn!("Session task for {} ended abnormally: {}", node, e);
                }
            }
        })
        .await;

        if joined.is_err() {
            warn!("Session {} for {} did not stop within {:?}, aborting", self.index, node, STOP_TIMEOUT);
            for abort in aborts {
                abort.abort();
            }
            return false;
        }

        debug!("Session {} for {} stopped", self.index, node);
        true
    }
}
