//! # Events Module
//!
//! Events produced for the front-end or log collaborator.
//!
//! Sessions publish through an unbounded channel so a slow consumer never
//! stalls a controller task. The binary either logs each event through
//! `tracing` or prints it as one JSON object per line (JSONL), stamped with
//! the UTC time it was rendered.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Sending half used by the manager and every session task
pub type EventSender = mpsc::UnboundedSender<SupervisorEvent>;

/// Receiving half consumed by the host program
pub type EventReceiver = mpsc::UnboundedReceiver<SupervisorEvent>;

/// Create the event channel
pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Read-only view of one session, for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub path: PathBuf,
    pub address: String,
    /// Display name, `DualSense` plus the end of the address
    pub label: String,
    pub index: usize,
    /// Last observed battery percent, `None` while unknown
    pub battery: Option<u8>,
    pub status: String,
    pub idle: String,
}

/// Something the UI or log should know about
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SupervisorEvent {
    SessionAdded {
        path: PathBuf,
        address: String,
        index: usize,
    },
    SessionRemoved {
        path: PathBuf,
        address: String,
    },
    /// The set of attached controllers changed
    ControllersChanged {
        controllers: Vec<SessionSnapshot>,
    },
    Battery {
        path: PathBuf,
        percent: Option<u8>,
    },
    Status {
        path: PathBuf,
        status: String,
    },
    Idle {
        path: PathBuf,
        status: String,
    },
    LowBattery {
        path: PathBuf,
        title: String,
        body: String,
    },
}

#[derive(Serialize)]
struct EventRecord<'a> {
    timestamp: DateTime<Utc>,
    #[serde(flatten)]
    event: &'a SupervisorEvent,
}

impl SupervisorEvent {
    /// Render as a single JSON line with a timestamp
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(&EventRecord {
            timestamp: Utc::now(),
            event: self,
        })
    }

    /// Log the event at a level matching its importance
    pub fn log(&self) {
        match self {
            SupervisorEvent::SessionAdded { path, address, index } => {
                info!("Controller {} connected at {} ({})", index, path.display(), address);
            }
            SupervisorEvent::SessionRemoved { path, address } => {
                info!("Controller at {} ({}) disconnected", path.display(), address);
            }
            SupervisorEvent::ControllersChanged { controllers } => {
                info!("{} controller(s) attached", controllers.len());
            }
            SupervisorEvent::Battery { path, percent } => match percent {
                Some(percent) => info!("{}: battery {}%", path.display(), percent),
                None => info!("{}: battery unknown", path.display()),
            },
            SupervisorEvent::Status { path, status } => {
                info!("{}: {}", path.display(), status);
            }
            SupervisorEvent::Idle { path, status } => {
                debug!("{}: {}", path.display(), status);
            }
            SupervisorEvent::LowBattery { title, body, .. } => {
                warn!("{}: {}", title, body);
            }
        }
    }
}
