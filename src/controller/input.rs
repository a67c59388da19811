//! # Input Event Reader
//!
//! Reads the legacy joystick interface (`/dev/input/jsN`) and reports real
//! activity to the idle monitor.
//!
//! ## Record Layout
//!
//! Every event is a fixed 8-byte little-endian record:
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 4 | timestamp in ms (ignored) |
//! | 4 | 2 | value (signed) |
//! | 6 | 1 | type |
//! | 7 | 1 | axis or button number |
//!
//! ## Activity
//!
//! - Button events always count.
//! - Axis events count when `|value| > deadzone`, which filters stick drift.
//! - Synthetic init events (type with bit 0x80 set, sent on open) never count.

use async_trait::async_trait;
use bytes::Buf;
use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use std::time::Duration;
use tokio::io::unix::AsyncFd;
use tokio::io::{AsyncRead, AsyncReadExt, Interest, ReadBuf};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::ControllerConfig;
use crate::shutdown::Shutdown;

/// Size of one joystick event record
pub const JS_EVENT_SIZE: usize = 8;

/// Button pressed or released
pub const JS_EVENT_BUTTON: u8 = 0x01;

/// Axis moved
pub const JS_EVENT_AXIS: u8 = 0x02;

/// Initial state flag, or-ed into the type on open
pub const JS_EVENT_INIT: u8 = 0x80;

/// Wait before reopening a device that failed to open
pub const REOPEN_DELAY: Duration = Duration::from_secs(5);

/// One decoded joystick record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsEvent {
    pub time_ms: u32,
    pub value: i16,
    pub kind: u8,
    pub number: u8,
}

impl JsEvent {
    /// Decode a raw record
    ///
    /// # Examples
    ///
    /// ```
    /// use dualsense_manager::controller::input::{JsEvent, JS_EVENT_AXIS};
    ///
    /// let event = JsEvent::decode(&[0, 0, 0, 0, 0xD0, 0x07, 0x02, 0x05]);
    /// assert_eq!(event.value, 2000);
    /// assert_eq!(event.kind, JS_EVENT_AXIS);
    /// assert_eq!(event.number, 5);
    /// ```
    pub fn decode(record: &[u8; JS_EVENT_SIZE]) -> Self {
        let mut buf = &record[..];
        Self {
            time_ms: buf.get_u32_le(),
            value: buf.get_i16_le(),
            kind: buf.get_u8(),
            number: buf.get_u8(),
        }
    }

    /// Whether the event is real input rather than noise
    pub fn is_activity(&self, deadzone: i32) -> bool {
        match self.kind {
            JS_EVENT_BUTTON => true,
            JS_EVENT_AXIS => i32::from(self.value).abs() > deadzone,
            _ => false,
        }
    }
}

/// Opens raw event streams
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn open(&self, path: &Path) -> io::Result<Box<dyn AsyncRead + Send + Unpin>>;
}

/// Opens device nodes from the filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct DeviceFiles;

#[async_trait]
impl EventSource for DeviceFiles {
    async fn open(&self, path: &Path) -> io::Result<Box<dyn AsyncRead + Send + Unpin>> {
        Ok(Box::new(JoystickStream::open(path)?))
    }
}

/// Joystick node read through the runtime's reactor
///
/// The node is opened with `O_NONBLOCK` and polled for readiness, so no
/// read ever parks a runtime thread. Dropping the stream closes the
/// descriptor at once, even while a read is pending.
#[derive(Debug)]
pub struct JoystickStream {
    fd: AsyncFd<File>,
}

impl JoystickStream {
    /// Open a joystick node or any other pollable character device
    ///
    /// # Errors
    ///
    /// Returns error if the node cannot be opened or cannot be registered
    /// with the reactor (regular files, for example).
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)?;

        Ok(Self {
            fd: AsyncFd::with_interest(file, Interest::READABLE)?,
        })
    }
}

impl AsyncRead for JoystickStream {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        loop {
            let mut guard = ready!(self.fd.poll_read_ready(cx))?;

            let unfilled = buf.initialize_unfilled();
            match guard.try_io(|fd| fd.get_ref().read(unfilled)) {
                Ok(Ok(read)) => {
                    buf.advance(read);
                    return Poll::Ready(Ok(()));
                }
                Ok(Err(e)) => return Poll::Ready(Err(e)),
                // Readiness was stale, wait for the next edge
                Err(_would_block) => continue,
            }
        }
    }
}

/// Why a stream stopped being read
enum StreamEnd {
    /// Read failed, most likely the controller was unplugged
    ReadError(io::Error),
    /// Nobody listens for activity any more
    ListenerGone,
}

/// Per-session input reader
pub struct InputReader {
    source: Arc<dyn EventSource>,
    path: PathBuf,
    config: watch::Receiver<ControllerConfig>,
    activity: mpsc::Sender<Instant>,
    shutdown: Shutdown,
}

impl InputReader {
    pub fn new(
        source: Arc<dyn EventSource>,
        path: PathBuf,
        config: watch::Receiver<ControllerConfig>,
        activity: mpsc::Sender<Instant>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            source,
            path,
            config,
            activity,
            shutdown,
        }
    }

    /// Read events until the session is cancelled
    ///
    /// Open failures are retried every [`REOPEN_DELAY`]; a read failure
    /// closes the stream and goes back to opening it.
    pub async fn run(mut self) {
        debug!("Starting input reader for {}", self.path.display());

        loop {
            let opened = tokio::select! {
                _ = self.shutdown.triggered() => break,
                opened = self.source.open(&self.path) => opened,
            };

            let mut stream = match opened {
                Ok(stream) => stream,
                Err(e) => {
                    debug!("Could not open {}: {}", self.path.display(), e);
                    tokio::select! {
                        _ = self.shutdown.triggered() => break,
                        _ = tokio::time::sleep(REOPEN_DELAY) => continue,
                    }
                }
            };

            let end = tokio::select! {
                _ = self.shutdown.triggered() => break,
                end = read_events(&mut stream, &self.config, &self.activity) => end,
            };

            // Close before reopening so no handle survives a reconnect
            drop(stream);

            match end {
                StreamEnd::ReadError(e) => {
                    info!("Joystick {} disconnected: {}", self.path.display(), e);
                }
                StreamEnd::ListenerGone => break,
            }
        }

        debug!("Stopping input reader for {}", self.path.display());
    }
}

/// Decode records until the stream fails or the listener disappears
async fn read_events(
    stream: &mut (dyn AsyncRead + Send + Unpin),
    config: &watch::Receiver<ControllerConfig>,
    activity: &mpsc::Sender<Instant>,
) -> StreamEnd {
    let mut record = [0u8; JS_EVENT_SIZE];

    loop {
        if let Err(e) = stream.read_exact(&mut record).await {
            return StreamEnd::ReadError(e);
        }

        let event = JsEvent::decode(&record);
        let deadzone = config.borrow().deadzone;

        if event.is_activity(deadzone) {
            // Never block on the listener, a stale notification is worthless
            if let Err(mpsc::error::TrySendError::Closed(_)) = activity.try_send(Instant::now()) {
                return StreamEnd::ListenerGone;
            }
        }
    }
}
