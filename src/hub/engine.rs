//! Hub engine: event dispatch and broadcast fan-out

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, RwLock};

use crate::capability::CapabilityMatrix;
use crate::coordinator::{CoordinatorEvent, SharedSlaves};
use crate::error::HubError;
use crate::protocol::{BrowserstackPayload, ObserverCommand, OutboundEvent};
use crate::recorder::SessionLogRecorder;
use crate::registry::flatten;
use crate::stats::HubStats;

use super::connection::{BoundSession, ObserverConnection};

/// The broadcast fan-out engine
///
/// One logical dispatcher consumes coordinator events in arrival order;
/// observer commands are handled on their own connections' reader tasks. All
/// shared state is passed in explicitly so the engine is testable with
/// injected fixtures.
pub struct HubEngine {
    /// Live observer connections, keyed by connection id
    connections: RwLock<HashMap<u64, Arc<ObserverConnection>>>,

    /// Read view of the coordinator's live slave structure
    slaves: SharedSlaves,

    /// Immutable capability matrix for cloud-browser registration
    capabilities: CapabilityMatrix,

    /// Per-session log streams
    recorder: SessionLogRecorder,

    /// Running totals
    stats: HubStats,
}

impl HubEngine {
    /// Create an engine over the given collaborators
    pub fn new(
        slaves: SharedSlaves,
        capabilities: CapabilityMatrix,
        recorder: SessionLogRecorder,
    ) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            slaves,
            capabilities,
            recorder,
            stats: HubStats::new(),
        }
    }

    /// The engine's recorder
    pub fn recorder(&self) -> &SessionLogRecorder {
        &self.recorder
    }

    /// Running totals
    pub fn stats(&self) -> &HubStats {
        &self.stats
    }

    /// Number of connected observers
    pub async fn observer_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Add a freshly accepted observer to the live set
    pub async fn add_observer(&self, conn: Arc<ObserverConnection>) {
        let mut connections = self.connections.write().await;
        let count = connections.len() + 1;
        connections.insert(conn.id, conn);
        tracing::info!(observers = count, "Observer connected");
    }

    /// Remove an observer and release its resources
    ///
    /// Closing the log handle awaits the writer task, so the session's file
    /// is complete and its name reusable when this returns.
    pub async fn remove_observer(&self, id: u64) {
        let conn = self.connections.write().await.remove(&id);

        if let Some(conn) = conn {
            if let Some(mut binding) = conn.take_bound() {
                binding.log.close().await;
                tracing::info!(
                    connection = id,
                    session = %binding.session,
                    "Observer disconnected, session log closed"
                );
            } else {
                tracing::debug!(connection = id, "Observer disconnected");
            }
        }
    }

    /// Consume coordinator events until the channel closes
    pub async fn run(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<CoordinatorEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_coordinator_event(event).await;
        }
        tracing::info!("Coordinator event channel closed");
    }

    /// Handle one coordinator event
    pub async fn handle_coordinator_event(&self, event: CoordinatorEvent) {
        match event {
            CoordinatorEvent::Listening => {
                tracing::info!("Coordinator listening");
            }
            CoordinatorEvent::Error(message) => {
                let err = HubError::CoordinatorError(message);
                tracing::error!(error = %err, "Coordinator reported an error");
            }
            CoordinatorEvent::Data(payload) => {
                self.stats.record_data_event();
                self.broadcast(&OutboundEvent::DataStream { payload }).await;
            }
            CoordinatorEvent::UpdateSlavesList(slaves) => {
                self.stats.record_slave_update();
                // Flattened once here, reused for every observer.
                let machines = flatten(&slaves);
                tracing::info!(machines = machines.len(), "Slave list changed");
                self.broadcast(&OutboundEvent::UpdateSlavesList { machines })
                    .await;
            }
        }
    }

    /// Handle one command from an observer connection
    pub async fn handle_command(&self, conn: &Arc<ObserverConnection>, command: ObserverCommand) {
        match command {
            ObserverCommand::UpdateSlavesList => {
                let machines = flatten(&*self.slaves.read().await);
                conn.reply(&OutboundEvent::UpdateSlavesList { machines });
            }
            ObserverCommand::RegisterBrowserstack {
                browserstack,
                session,
            } => {
                self.handle_register(conn, &browserstack, session).await;
            }
            ObserverCommand::BrowserstackStream { data } => {
                self.handle_stream(conn, data).await;
            }
        }
    }

    /// Report a local-scope failure to the triggering observer only
    pub fn report_error(&self, conn: &ObserverConnection, err: &HubError) {
        self.stats.record_error();
        tracing::warn!(connection = conn.id, error = %err, "Reporting error to observer");
        conn.reply(&OutboundEvent::from_error(err));
    }

    async fn handle_register(
        &self,
        conn: &Arc<ObserverConnection>,
        browserstack: &str,
        session: String,
    ) {
        let payload = match BrowserstackPayload::parse(browserstack) {
            Ok(payload) => payload,
            Err(e) => {
                self.report_error(conn, &e);
                return;
            }
        };

        let entry = match self.capabilities.resolve(&payload.automation_session) {
            Ok(entry) => entry,
            Err(e) => {
                self.report_error(conn, &e);
                return;
            }
        };

        let log = match self.recorder.open(&session).await {
            Ok(log) => log,
            Err(e) => {
                self.report_error(conn, &e);
                return;
            }
        };

        tracing::info!(
            connection = conn.id,
            session = %session,
            machine_id = %entry.id,
            "Cloud-browser session registered"
        );

        let previous = conn.bind(BoundSession {
            session,
            machine_id: entry.id.clone(),
            log,
        });

        // Re-registration replaces the binding; the old stream is closed
        // deterministically rather than leaked.
        if let Some(mut old) = previous {
            old.log.close().await;
            tracing::debug!(
                connection = conn.id,
                session = %old.session,
                "Previous session binding closed"
            );
        }
    }

    async fn handle_stream(&self, conn: &Arc<ObserverConnection>, data: Vec<String>) {
        // The wire contract carries chunks as an array but uses the first
        // element only.
        let Some(chunk) = data.into_iter().next() else {
            self.report_error(conn, &HubError::InvalidCommand("empty data array".into()));
            return;
        };

        let Some(machine_id) = conn.machine_id() else {
            // Unbound chunks are dropped entirely, not broadcast.
            self.report_error(conn, &HubError::UnboundStreamWrite);
            return;
        };

        self.stats.record_chunk();

        // Step one: append to the originating connection's own log, exactly
        // once. Step two: fan out. A storage failure is reported to the owner
        // but never suppresses the broadcast.
        if let Err(e) = conn.record_chunk(Bytes::from(chunk.clone().into_bytes())) {
            self.report_error(conn, &e);
        }

        self.broadcast(&OutboundEvent::BrowserstackDataStream {
            machine_id,
            data: chunk,
        })
        .await;
    }

    /// Push a frame to every connected observer
    ///
    /// Serializes once, snapshots the connection set, then queues the shared
    /// frame per connection. Delivery is best-effort and independent per
    /// observer.
    pub async fn broadcast(&self, event: &OutboundEvent) {
        let frame = event.to_frame();

        let targets: Vec<Arc<ObserverConnection>> = {
            let connections = self.connections.read().await;
            connections.values().map(Arc::clone).collect()
        };

        let mut delivered = 0u64;
        for conn in &targets {
            if conn.send(Arc::clone(&frame)) {
                delivered += 1;
            } else {
                tracing::debug!(connection = conn.id, "Observer gone, frame not delivered");
            }
        }

        self.stats.record_broadcast(delivered);
        tracing::trace!(recipients = delivered, frame = %frame, "Broadcast frame");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use tokio::sync::mpsc::UnboundedReceiver;

    use crate::capability::CapabilityEntry;
    use crate::registry::{Machine, SlaveMap};

    use super::*;

    fn capability_fixture() -> CapabilityMatrix {
        CapabilityMatrix::new(vec![CapabilityEntry {
            id: "5".into(),
            browser_name: "chrome".into(),
            os: "OS X".into(),
            os_version: "10.12".into(),
        }])
    }

    fn slaves_fixture() -> SlaveMap {
        let mut group = BTreeMap::new();
        group.insert("m1".to_string(), Machine::new("1", "mac"));
        let mut map = SlaveMap::new();
        map.insert("groupA".to_string(), group);
        map
    }

    fn engine_fixture(dir: &std::path::Path) -> (HubEngine, SharedSlaves) {
        let slaves: SharedSlaves = Arc::new(RwLock::new(slaves_fixture()));
        let engine = HubEngine::new(
            Arc::clone(&slaves),
            capability_fixture(),
            SessionLogRecorder::new(dir),
        );
        (engine, slaves)
    }

    async fn observer(engine: &HubEngine, id: u64) -> (Arc<ObserverConnection>, UnboundedReceiver<Arc<String>>) {
        let (conn, rx) = ObserverConnection::new(id);
        engine.add_observer(Arc::clone(&conn)).await;
        (conn, rx)
    }

    fn next_json(rx: &mut UnboundedReceiver<Arc<String>>) -> serde_json::Value {
        let frame = rx.try_recv().expect("expected a frame");
        serde_json::from_str(&frame).unwrap()
    }

    fn register_command() -> ObserverCommand {
        ObserverCommand::RegisterBrowserstack {
            browserstack:
                r#"{"automation_session":{"browser":"chrome","os":"OS X","os_version":"10.12"}}"#
                    .into(),
            session: "run-42".into(),
        }
    }

    #[tokio::test]
    async fn test_data_event_reaches_every_observer() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, _) = engine_fixture(dir.path());

        let (_c1, mut rx1) = observer(&engine, 1).await;
        let (_c2, mut rx2) = observer(&engine, 2).await;
        let (_c3, mut rx3) = observer(&engine, 3).await;

        let payload = serde_json::json!({"suite": "login"});
        engine
            .handle_coordinator_event(CoordinatorEvent::Data(payload.clone()))
            .await;

        for rx in [&mut rx1, &mut rx2, &mut rx3] {
            let frame = next_json(rx);
            assert_eq!(frame["event"], "data-stream");
            assert_eq!(frame["payload"], payload);
            // Exactly one frame each.
            assert!(rx.try_recv().is_err());
        }
    }

    #[tokio::test]
    async fn test_data_event_with_no_observers() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, _) = engine_fixture(dir.path());

        engine
            .handle_coordinator_event(CoordinatorEvent::Data(serde_json::json!(null)))
            .await;

        assert_eq!(engine.stats().snapshot().data_events, 1);
    }

    #[tokio::test]
    async fn test_slave_update_pushes_flattened_list() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, _) = engine_fixture(dir.path());
        let (_c1, mut rx1) = observer(&engine, 1).await;

        engine
            .handle_coordinator_event(CoordinatorEvent::UpdateSlavesList(slaves_fixture()))
            .await;

        let frame = next_json(&mut rx1);
        assert_eq!(frame["event"], "update-slaves-list");
        assert_eq!(
            frame["machines"],
            serde_json::json!([{"id": "1", "platform": "mac"}])
        );
    }

    #[tokio::test]
    async fn test_pull_replies_to_requester_only() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, _) = engine_fixture(dir.path());
        let (c1, mut rx1) = observer(&engine, 1).await;
        let (_c2, mut rx2) = observer(&engine, 2).await;

        engine
            .handle_command(&c1, ObserverCommand::UpdateSlavesList)
            .await;

        let frame = next_json(&mut rx1);
        assert_eq!(frame["event"], "update-slaves-list");
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_register_binds_machine_and_opens_log() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, _) = engine_fixture(dir.path());
        let (c1, mut rx1) = observer(&engine, 1).await;

        engine.handle_command(&c1, register_command()).await;

        assert_eq!(c1.machine_id().as_deref(), Some("5"));
        assert_eq!(c1.session().as_deref(), Some("run-42"));
        assert!(engine.recorder().is_recording("run-42"));
        assert!(engine.recorder().log_path("run-42").exists());
        assert!(rx1.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_register_without_match_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, _) = engine_fixture(dir.path());
        let (c1, mut rx1) = observer(&engine, 1).await;

        engine
            .handle_command(
                &c1,
                ObserverCommand::RegisterBrowserstack {
                    browserstack:
                        r#"{"automation_session":{"browser":"edge","os":"Windows","os_version":"11"}}"#
                            .into(),
                    session: "run-42".into(),
                },
            )
            .await;

        let frame = next_json(&mut rx1);
        assert_eq!(frame["event"], "error");
        assert_eq!(frame["code"], "no-matching-capability");
        assert!(!c1.is_bound());
        assert!(!engine.recorder().is_recording("run-42"));
    }

    #[tokio::test]
    async fn test_register_with_malformed_payload_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, _) = engine_fixture(dir.path());
        let (c1, mut rx1) = observer(&engine, 1).await;

        engine
            .handle_command(
                &c1,
                ObserverCommand::RegisterBrowserstack {
                    browserstack: "not json".into(),
                    session: "run-42".into(),
                },
            )
            .await;

        let frame = next_json(&mut rx1);
        assert_eq!(frame["code"], "invalid-command");
        assert!(!c1.is_bound());
    }

    #[tokio::test]
    async fn test_duplicate_session_registration_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, _) = engine_fixture(dir.path());
        let (c1, _rx1) = observer(&engine, 1).await;
        let (c2, mut rx2) = observer(&engine, 2).await;

        engine.handle_command(&c1, register_command()).await;
        engine.handle_command(&c2, register_command()).await;

        let frame = next_json(&mut rx2);
        assert_eq!(frame["code"], "session-already-recording");
        assert!(!c2.is_bound());
        assert!(c1.is_bound());
    }

    #[tokio::test]
    async fn test_unbound_stream_chunk_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, _) = engine_fixture(dir.path());
        let (c1, mut rx1) = observer(&engine, 1).await;
        let (_c2, mut rx2) = observer(&engine, 2).await;

        engine
            .handle_command(
                &c1,
                ObserverCommand::BrowserstackStream {
                    data: vec!["hello".into()],
                },
            )
            .await;

        let frame = next_json(&mut rx1);
        assert_eq!(frame["event"], "error");
        assert_eq!(frame["code"], "unbound-stream-write");
        // Dropped entirely: nobody else sees the chunk.
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stream_chunk_logged_and_broadcast_to_all() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, _) = engine_fixture(dir.path());
        let (c1, mut rx1) = observer(&engine, 1).await;
        let (_c2, mut rx2) = observer(&engine, 2).await;

        engine.handle_command(&c1, register_command()).await;
        engine
            .handle_command(
                &c1,
                ObserverCommand::BrowserstackStream {
                    data: vec!["hello".into(), "ignored".into()],
                },
            )
            .await;

        // Including the originator.
        for rx in [&mut rx1, &mut rx2] {
            let frame = next_json(rx);
            assert_eq!(frame["event"], "browserstack-data-stream");
            assert_eq!(frame["machineId"], "5");
            assert_eq!(frame["data"], "hello");
        }

        engine.remove_observer(1).await;
        let contents = std::fs::read_to_string(engine.recorder().log_path("run-42")).unwrap();
        assert_eq!(contents, "hello");
    }

    #[tokio::test]
    async fn test_stream_chunks_written_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, _) = engine_fixture(dir.path());
        let (c1, _rx1) = observer(&engine, 1).await;

        engine.handle_command(&c1, register_command()).await;
        for chunk in ["C1", "C2", "C3"] {
            engine
                .handle_command(
                    &c1,
                    ObserverCommand::BrowserstackStream {
                        data: vec![chunk.into()],
                    },
                )
                .await;
        }

        engine.remove_observer(1).await;
        let contents = std::fs::read_to_string(engine.recorder().log_path("run-42")).unwrap();
        assert_eq!(contents, "C1C2C3");
    }

    #[tokio::test]
    async fn test_disconnect_releases_session() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, _) = engine_fixture(dir.path());
        let (c1, _rx1) = observer(&engine, 1).await;

        engine.handle_command(&c1, register_command()).await;
        assert_eq!(engine.observer_count().await, 1);

        engine.remove_observer(1).await;

        assert_eq!(engine.observer_count().await, 0);
        assert!(!engine.recorder().is_recording("run-42"));
        assert!(engine.recorder().log_path("run-42").exists());
    }

    #[tokio::test]
    async fn test_rebind_closes_previous_stream() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, _) = engine_fixture(dir.path());
        let (c1, _rx1) = observer(&engine, 1).await;

        engine.handle_command(&c1, register_command()).await;
        engine
            .handle_command(
                &c1,
                ObserverCommand::RegisterBrowserstack {
                    browserstack: register_browserstack_payload(),
                    session: "run-43".into(),
                },
            )
            .await;

        assert_eq!(c1.session().as_deref(), Some("run-43"));
        assert!(!engine.recorder().is_recording("run-42"));
        assert!(engine.recorder().is_recording("run-43"));
    }

    fn register_browserstack_payload() -> String {
        r#"{"automation_session":{"browser":"chrome","os":"OS X","os_version":"10.12"}}"#.into()
    }

    #[tokio::test]
    async fn test_coordinator_error_does_not_halt_hub() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, _) = engine_fixture(dir.path());
        let (_c1, mut rx1) = observer(&engine, 1).await;

        engine
            .handle_coordinator_event(CoordinatorEvent::Error("boom".into()))
            .await;
        engine
            .handle_coordinator_event(CoordinatorEvent::Data(serde_json::json!("still alive")))
            .await;

        let frame = next_json(&mut rx1);
        assert_eq!(frame["event"], "data-stream");
    }
}
