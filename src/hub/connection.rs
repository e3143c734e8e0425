//! Observer connection state

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::{HubError, Result};
use crate::protocol::OutboundEvent;
use crate::recorder::SessionLogHandle;

/// What a registered connection is bound to
pub struct BoundSession {
    /// Session identifier supplied at registration
    pub session: String,
    /// Machine id the capability matrix resolved to
    pub machine_id: String,
    /// This connection's exclusive log stream
    pub log: SessionLogHandle,
}

/// One connected observer
///
/// Outbound frames go through an unbounded channel drained by the
/// connection's writer task; `send` never blocks the dispatcher. The session
/// binding is created lazily on registration and taken back on disconnect.
pub struct ObserverConnection {
    /// Unique connection id
    pub id: u64,

    outbound: mpsc::UnboundedSender<Arc<String>>,

    /// Binding is only touched from this connection's own command sequence
    /// and from disconnect, so a plain mutex with short sections suffices.
    bound: Mutex<Option<BoundSession>>,
}

impl ObserverConnection {
    /// Create a connection and the frame receiver its writer task drains
    pub fn new(id: u64) -> (Arc<Self>, mpsc::UnboundedReceiver<Arc<String>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Arc::new(Self {
            id,
            outbound: tx,
            bound: Mutex::new(None),
        });
        (conn, rx)
    }

    /// Queue a pre-serialized frame; false if the observer is gone
    pub fn send(&self, frame: Arc<String>) -> bool {
        self.outbound.send(frame).is_ok()
    }

    /// Serialize and queue a frame for this observer only
    pub fn reply(&self, event: &OutboundEvent) -> bool {
        self.send(event.to_frame())
    }

    /// Whether this connection has a bound session
    pub fn is_bound(&self) -> bool {
        self.bound.lock().unwrap().is_some()
    }

    /// Machine id of the bound session, if any
    pub fn machine_id(&self) -> Option<String> {
        self.bound
            .lock()
            .unwrap()
            .as_ref()
            .map(|b| b.machine_id.clone())
    }

    /// Session identifier of the bound session, if any
    pub fn session(&self) -> Option<String> {
        self.bound.lock().unwrap().as_ref().map(|b| b.session.clone())
    }

    /// Install a binding, returning any previous one for the caller to close
    pub(crate) fn bind(&self, binding: BoundSession) -> Option<BoundSession> {
        self.bound.lock().unwrap().replace(binding)
    }

    /// Remove and return the binding (disconnect path)
    pub(crate) fn take_bound(&self) -> Option<BoundSession> {
        self.bound.lock().unwrap().take()
    }

    /// Append a chunk to the bound session's log
    ///
    /// `UnboundStreamWrite` if no session is bound; `LogWriteFailed` if the
    /// stream has failed or closed.
    pub(crate) fn record_chunk(&self, chunk: Bytes) -> Result<()> {
        match self.bound.lock().unwrap().as_ref() {
            Some(binding) => binding.log.write(chunk),
            None => Err(HubError::UnboundStreamWrite),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_after_receiver_dropped() {
        let (conn, rx) = ObserverConnection::new(7);
        drop(rx);

        assert!(!conn.send(Arc::new("{}".to_string())));
    }

    #[test]
    fn test_unbound_connection_rejects_chunks() {
        let (conn, _rx) = ObserverConnection::new(1);

        assert!(!conn.is_bound());
        assert!(conn.machine_id().is_none());
        assert!(matches!(
            conn.record_chunk(Bytes::from_static(b"hello")),
            Err(HubError::UnboundStreamWrite)
        ));
    }
}
