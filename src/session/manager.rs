//! Session table for active captures

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{CaptureSession, SessionKey};
use crate::utils::constants::SESSION_CACHE_INITIAL_CAPACITY;

/// Tracks live capture sessions by key.
///
/// Cheap to clone; all clones share one table.
#[derive(Clone, Debug)]
pub struct SessionManager {
    sessions: Arc<Mutex<HashMap<SessionKey, Arc<CaptureSession>>>>,
}

impl SessionManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::with_capacity(
                SESSION_CACHE_INITIAL_CAPACITY,
            ))),
        }
    }

    /// Session for `key`, created on first access
    pub fn get_or_create(&self, key: &SessionKey) -> Arc<CaptureSession> {
        let mut sessions = self.sessions.lock();
        Arc::clone(
            sessions
                .entry(key.clone())
                .or_insert_with(|| Arc::new(CaptureSession::new(key.clone()))),
        )
    }

    /// Start a fresh session for `key`, discarding any previous one.
    pub fn begin(&self, key: &SessionKey) -> Arc<CaptureSession> {
        let session = Arc::new(CaptureSession::new(key.clone()));
        if self
            .sessions
            .lock()
            .insert(key.clone(), Arc::clone(&session))
            .is_some()
        {
            log::debug!("Capture re-triggered for session {key}, previous tables dropped");
        }
        session
    }

    #[must_use]
    pub fn get(&self, key: &SessionKey) -> Option<Arc<CaptureSession>> {
        self.sessions.lock().get(key).cloned()
    }

    pub fn dispose(&self, key: &SessionKey) -> Option<Arc<CaptureSession>> {
        let removed = self.sessions.lock().remove(key);
        if removed.is_some() {
            log::debug!("Disposed capture session {key}");
        }
        removed
    }

    #[must_use]
    pub fn list_active(&self) -> Vec<SessionKey> {
        self.sessions.lock().keys().cloned().collect()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}
