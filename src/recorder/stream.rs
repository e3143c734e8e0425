//! Per-session log stream handle and its writer task

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;

use crate::error::{HubError, Result};

/// Handle to one session's append-only log stream
///
/// Owned by the observer connection that registered the session. `write` is
/// non-blocking: chunks go to a dedicated writer task over an unbounded
/// channel, so a slow disk never stalls the dispatcher. Storage failures flip
/// the handle into a failed state; subsequent writes report `LogWriteFailed`
/// for this session and nothing else is affected.
pub struct SessionLogHandle {
    session: String,
    path: PathBuf,
    tx: Option<mpsc::UnboundedSender<Bytes>>,
    task: Option<tokio::task::JoinHandle<()>>,
    failure: Arc<Mutex<Option<String>>>,
}

impl SessionLogHandle {
    /// Spawn the writer task for a freshly created log file
    ///
    /// `key` is the sanitized entry reserved in the recorder's active set;
    /// the writer task releases it when it finishes.
    pub(super) fn spawn(
        session: String,
        key: String,
        path: PathBuf,
        file: tokio::fs::File,
        active: Arc<Mutex<HashSet<String>>>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let failure = Arc::new(Mutex::new(None));

        let task = tokio::spawn(writer_task(
            session.clone(),
            key,
            file,
            rx,
            Arc::clone(&failure),
            active,
        ));

        Self {
            session,
            path,
            tx: Some(tx),
            task: Some(task),
            failure,
        }
    }

    /// Session this stream records
    pub fn session(&self) -> &str {
        &self.session
    }

    /// File the stream appends to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Queue a chunk for appending, preserving call order for this handle
    pub fn write(&self, chunk: Bytes) -> Result<()> {
        if let Some(reason) = self.failure.lock().unwrap().clone() {
            return Err(HubError::LogWriteFailed {
                session: self.session.clone(),
                reason,
            });
        }

        match &self.tx {
            Some(tx) => tx.send(chunk).map_err(|_| HubError::LogWriteFailed {
                session: self.session.clone(),
                reason: "log stream closed".into(),
            }),
            None => Err(HubError::LogWriteFailed {
                session: self.session.clone(),
                reason: "log stream closed".into(),
            }),
        }
    }

    /// Flush queued chunks, close the file and free the session name
    ///
    /// Idempotent; waits for the writer task to drain so the file is complete
    /// when this returns.
    pub async fn close(&mut self) {
        self.tx.take();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for SessionLogHandle {
    fn drop(&mut self) {
        // Dropping the sender lets the writer task drain, flush and release
        // the session name in the background.
        self.tx.take();
    }
}

async fn writer_task(
    session: String,
    key: String,
    file: tokio::fs::File,
    mut rx: mpsc::UnboundedReceiver<Bytes>,
    failure: Arc<Mutex<Option<String>>>,
    active: Arc<Mutex<HashSet<String>>>,
) {
    let mut writer = BufWriter::new(file);

    while let Some(chunk) = rx.recv().await {
        if failure.lock().unwrap().is_some() {
            // Drain and discard after the first failure.
            continue;
        }

        if let Err(e) = writer.write_all(&chunk).await {
            tracing::warn!(session = %session, error = %e, "Session log write failed");
            *failure.lock().unwrap() = Some(e.to_string());
        }
    }

    if let Err(e) = writer.flush().await {
        tracing::warn!(session = %session, error = %e, "Session log flush failed");
    }

    active.lock().unwrap().remove(&key);
    tracing::debug!(session = %session, "Session log closed");
}
