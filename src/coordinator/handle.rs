//! Coordinator event channel and shared slave state

use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

use crate::registry::SlaveMap;

/// Live slave state, written by the coordinator side and read by the hub
pub type SharedSlaves = Arc<RwLock<SlaveMap>>;

/// An event pushed by the coordinator
#[derive(Debug, Clone)]
pub enum CoordinatorEvent {
    /// The coordinator's own listener came up
    Listening,
    /// The coordinator reported an internal error; the hub logs and continues
    Error(String),
    /// One firehose payload of live test-execution output
    Data(serde_json::Value),
    /// The slave structure changed (workers attached or detached)
    UpdateSlavesList(SlaveMap),
}

/// Handle the coordinator side uses to feed the hub
///
/// Updating the slave list replaces the shared state and emits the matching
/// event in one call, so push consumers and pull readers agree.
#[derive(Clone)]
pub struct CoordinatorHandle {
    slaves: SharedSlaves,
    tx: mpsc::UnboundedSender<CoordinatorEvent>,
}

impl CoordinatorHandle {
    /// Create a handle and the event receiver the hub consumes
    pub fn new() -> (Self, mpsc::UnboundedReceiver<CoordinatorEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = Self {
            slaves: Arc::new(RwLock::new(SlaveMap::new())),
            tx,
        };
        (handle, rx)
    }

    /// Shared read view of the live slave structure
    pub fn slaves(&self) -> SharedSlaves {
        Arc::clone(&self.slaves)
    }

    /// Signal that the coordinator is listening
    pub fn listening(&self) {
        let _ = self.tx.send(CoordinatorEvent::Listening);
    }

    /// Report a coordinator-internal error
    pub fn error(&self, message: impl Into<String>) {
        let _ = self.tx.send(CoordinatorEvent::Error(message.into()));
    }

    /// Emit one firehose payload
    pub fn data(&self, payload: serde_json::Value) {
        let _ = self.tx.send(CoordinatorEvent::Data(payload));
    }

    /// Replace the slave structure and notify the hub
    pub async fn update_slaves(&self, slaves: SlaveMap) {
        *self.slaves.write().await = slaves.clone();
        let _ = self.tx.send(CoordinatorEvent::UpdateSlavesList(slaves));
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::registry::Machine;

    use super::*;

    #[tokio::test]
    async fn test_update_slaves_sets_state_and_emits() {
        let (handle, mut rx) = CoordinatorHandle::new();

        let mut map = SlaveMap::new();
        let mut group = BTreeMap::new();
        group.insert("m1".to_string(), Machine::new("1", "mac"));
        map.insert("groupA".to_string(), group);

        handle.update_slaves(map.clone()).await;

        assert_eq!(*handle.slaves().read().await, map);
        match rx.recv().await.unwrap() {
            CoordinatorEvent::UpdateSlavesList(emitted) => assert_eq!(emitted, map),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_events_arrive_in_emit_order() {
        let (handle, mut rx) = CoordinatorHandle::new();

        handle.listening();
        handle.data(serde_json::json!(1));
        handle.data(serde_json::json!(2));

        assert!(matches!(rx.recv().await.unwrap(), CoordinatorEvent::Listening));
        assert!(
            matches!(rx.recv().await.unwrap(), CoordinatorEvent::Data(v) if v == serde_json::json!(1))
        );
        assert!(
            matches!(rx.recv().await.unwrap(), CoordinatorEvent::Data(v) if v == serde_json::json!(2))
        );
    }
}
