//! Recorder: opens per-session log streams and tracks which are live

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{HubError, Result};

use super::stream::SessionLogHandle;

/// Opens and tracks per-session append-only log streams
///
/// At most one stream may be open per session value at a time within this
/// process; a second concurrent open is rejected rather than silently
/// truncating the first stream's file.
pub struct SessionLogRecorder {
    /// Directory all session logs are written under
    log_dir: PathBuf,

    /// Sanitized file names with a currently open stream
    ///
    /// Keyed on the sanitized name, not the raw session string: two session
    /// names that collide after sanitizing would share one file, so they
    /// must conflict here too.
    active: Arc<Mutex<HashSet<String>>>,
}

impl SessionLogRecorder {
    /// Create a recorder writing under the given directory
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Create the log directory if missing
    ///
    /// Called once at startup; failure here is fatal to the process.
    pub fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.log_dir)?;
        Ok(())
    }

    /// Path a session's log is (or would be) written to
    pub fn log_path(&self, session: &str) -> PathBuf {
        self.log_dir.join(format!("{}.log", sanitize(session)))
    }

    /// Whether a session (or one sharing its file) has an open stream
    pub fn is_recording(&self, session: &str) -> bool {
        self.active.lock().unwrap().contains(&sanitize(session))
    }

    /// Open a log stream for a session, truncating any previous file
    ///
    /// Rejects sessions that already have an open stream. The returned handle
    /// owns a dedicated writer task; closing (or dropping) the handle frees
    /// the session name for reuse.
    pub async fn open(&self, session: &str) -> Result<SessionLogHandle> {
        let key = sanitize(session);
        {
            let mut active = self.active.lock().unwrap();
            if !active.insert(key.clone()) {
                return Err(HubError::SessionAlreadyRecording(session.to_string()));
            }
        }

        let path = self.log_dir.join(format!("{}.log", key));
        let file = match tokio::fs::File::create(&path).await {
            Ok(file) => file,
            Err(e) => {
                self.active.lock().unwrap().remove(&key);
                return Err(e.into());
            }
        };

        tracing::info!(session = %session, path = %path.display(), "Session log opened");

        Ok(SessionLogHandle::spawn(
            session.to_string(),
            key,
            path,
            file,
            Arc::clone(&self.active),
        ))
    }
}

/// Sanitize a session identifier for use as a file name
fn sanitize(session: &str) -> String {
    session
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
