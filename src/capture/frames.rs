//! Cross-frame capture protocol
//!
//! Every live frame context registers with the [`FrameCoordinator`] and
//! gets a command queue. A walker that cannot reach a child frame's content
//! directly asks the coordinator, which forwards one [`FrameCommand`] to the
//! frame and waits for exactly one reply.
//!
//! Frames are identified by a nonce assigned at registration. A request may
//! name the instance it expects; the lookup then fails unless that instance
//! is still registered at the same URL, so a frame that navigated away is
//! reported as unavailable instead of being confused with another one.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use super::errors::CaptureError;
use super::settings::{CaptureSettings, SavedDocument};
use crate::config::CaptureOptions;
use crate::utils::constants::{FRAME_COMMAND_QUEUE_CAPACITY, FRAME_REPLY_TIMEOUT_SECS};

/// Browser tab a frame lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TabId(pub u64);

impl std::fmt::Display for TabId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tab {}", self.0)
    }
}

/// Nonce of one frame registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameInstanceId(Uuid);

impl FrameInstanceId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for FrameInstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameAddress {
    pub tab: TabId,
    pub instance: FrameInstanceId,
}

pub type FrameReply = oneshot::Sender<Result<SavedDocument, CaptureError>>;

/// Requests a frame context answers
#[derive(Debug)]
pub enum FrameCommand {
    /// Capture the whole tab; only sent to a tab's main frame
    BeginCapture {
        settings: CaptureSettings,
        options: Arc<CaptureOptions>,
        reply: FrameReply,
    },
    /// Capture this frame's document as part of a parent capture
    CaptureFrame {
        settings: CaptureSettings,
        options: Arc<CaptureOptions>,
        reply: FrameReply,
    },
}

#[derive(Debug)]
struct FrameEntry {
    url: String,
    is_main: bool,
    /// registration order, first wins among frames sharing a URL
    seq: u64,
    commands: mpsc::Sender<FrameCommand>,
}

#[derive(Debug, Default)]
struct FrameTable {
    next_seq: u64,
    entries: HashMap<FrameAddress, FrameEntry>,
}

/// Registry of live frame instances.
///
/// Cheap to clone; all clones share one table.
#[derive(Debug, Clone)]
pub struct FrameCoordinator {
    table: Arc<Mutex<FrameTable>>,
    reply_timeout: Duration,
}

impl Default for FrameCoordinator {
    fn default() -> Self {
        Self::new(Duration::from_secs(FRAME_REPLY_TIMEOUT_SECS))
    }
}

impl FrameCoordinator {
    #[must_use]
    pub fn new(reply_timeout: Duration) -> Self {
        Self {
            table: Arc::new(Mutex::new(FrameTable::default())),
            reply_timeout,
        }
    }

    /// Register a frame context at `url`.
    ///
    /// The frame stays addressable until the returned handle is dropped.
    pub fn register(
        &self,
        tab: TabId,
        url: &str,
        is_main: bool,
    ) -> (FrameHandle, mpsc::Receiver<FrameCommand>) {
        let (tx, rx) = mpsc::channel(FRAME_COMMAND_QUEUE_CAPACITY);
        let address = FrameAddress {
            tab,
            instance: FrameInstanceId::new(),
        };

        let mut table = self.table.lock();
        let seq = table.next_seq;
        table.next_seq += 1;
        table.entries.insert(
            address,
            FrameEntry {
                url: url.to_string(),
                is_main,
                seq,
                commands: tx,
            },
        );
        log::debug!("Registered frame {} in {tab} at {url}", address.instance);

        let handle = FrameHandle {
            table: Arc::clone(&self.table),
            address,
        };
        (handle, rx)
    }

    /// Number of registered frame instances
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn find_frame(
        &self,
        tab: TabId,
        url: &str,
        instance: Option<FrameInstanceId>,
    ) -> Result<mpsc::Sender<FrameCommand>, CaptureError> {
        let table = self.table.lock();
        let entry = match instance {
            Some(instance) => table
                .entries
                .get(&FrameAddress { tab, instance })
                .filter(|entry| entry.url == url),
            None => table
                .entries
                .iter()
                .filter(|(address, entry)| address.tab == tab && !entry.is_main && entry.url == url)
                .map(|(_, entry)| entry)
                .min_by_key(|entry| entry.seq),
        };
        entry
            .map(|entry| entry.commands.clone())
            .ok_or_else(|| CaptureError::FrameUnavailable(format!("no live frame at {url} in {tab}")))
    }

    fn find_main_frame(&self, tab: TabId) -> Result<(String, mpsc::Sender<FrameCommand>), CaptureError> {
        let table = self.table.lock();
        table
            .entries
            .iter()
            .filter(|(address, entry)| address.tab == tab && entry.is_main)
            .map(|(_, entry)| entry)
            .min_by_key(|entry| entry.seq)
            .map(|entry| (entry.url.clone(), entry.commands.clone()))
            .ok_or_else(|| CaptureError::FrameUnavailable(format!("{tab} has no main frame")))
    }

    /// Ask a child frame to capture itself.
    ///
    /// # Errors
    ///
    /// `CaptureError::FrameUnavailable` when no matching frame is registered,
    /// the frame goes away before answering, or the reply times out. Errors
    /// raised by the frame's own capture are passed through.
    pub async fn request_frame(
        &self,
        tab: TabId,
        url: &str,
        instance: Option<FrameInstanceId>,
        settings: CaptureSettings,
        options: Arc<CaptureOptions>,
    ) -> Result<SavedDocument, CaptureError> {
        log::debug!("request_frame: {url} in {tab}");
        let commands = self.find_frame(tab, url, instance)?;
        let (reply, response) = oneshot::channel();
        commands
            .send(FrameCommand::CaptureFrame {
                settings,
                options,
                reply,
            })
            .await
            .map_err(|_| CaptureError::FrameUnavailable(format!("frame at {url} stopped listening")))?;
        self.await_reply(url, response).await
    }

    /// Start a capture of `tab` through its main frame.
    ///
    /// # Errors
    ///
    /// As [`request_frame`](Self::request_frame).
    pub async fn begin_capture(
        &self,
        tab: TabId,
        settings: CaptureSettings,
        options: Arc<CaptureOptions>,
    ) -> Result<SavedDocument, CaptureError> {
        let (url, commands) = self.find_main_frame(tab)?;
        log::debug!("begin_capture: {url} in {tab}");
        let (reply, response) = oneshot::channel();
        commands
            .send(FrameCommand::BeginCapture {
                settings,
                options,
                reply,
            })
            .await
            .map_err(|_| CaptureError::FrameUnavailable(format!("main frame of {tab} stopped listening")))?;
        self.await_reply(&url, response).await
    }

    async fn await_reply(
        &self,
        url: &str,
        response: oneshot::Receiver<Result<SavedDocument, CaptureError>>,
    ) -> Result<SavedDocument, CaptureError> {
        match tokio::time::timeout(self.reply_timeout, response).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(CaptureError::FrameUnavailable(format!(
                "frame at {url} closed before replying"
            ))),
            Err(_) => Err(CaptureError::FrameUnavailable(format!(
                "frame at {url} did not reply within {:?}",
                self.reply_timeout
            ))),
        }
    }
}

/// Registration of one frame context. Unregisters on drop.
#[derive(Debug)]
pub struct FrameHandle {
    table: Arc<Mutex<FrameTable>>,
    address: FrameAddress,
}

impl FrameHandle {
    #[must_use]
    pub fn address(&self) -> FrameAddress {
        self.address
    }

    #[must_use]
    pub fn instance(&self) -> FrameInstanceId {
        self.address.instance
    }

    /// Record that the frame navigated to `url`.
    pub fn set_url(&self, url: &str) {
        if let Some(entry) = self.table.lock().entries.get_mut(&self.address) {
            log::debug!("Frame {} navigated to {url}", self.address.instance);
            entry.url = url.to_string();
        }
    }
}

impl Drop for FrameHandle {
    fn drop(&mut self) {
        self.table.lock().entries.remove(&self.address);
        log::debug!("Unregistered frame {}", self.address.instance);
    }
}
