//! Observer channel listener
//!
//! Handles the TCP accept loop and spawns per-connection reader/writer
//! tasks. The reader decodes newline-delimited JSON commands and hands them
//! to the engine; the writer drains the connection's outbound frame channel.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Semaphore};

use crate::capability::CapabilityMatrix;
use crate::coordinator::{CoordinatorEvent, CoordinatorHandle};
use crate::error::Result;
use crate::hub::{HubEngine, ObserverConnection};
use crate::protocol::{ObserverCommand, OutboundEvent};
use crate::recorder::SessionLogRecorder;
use crate::server::config::HubConfig;

/// The observer-facing hub server
pub struct HubServer {
    config: HubConfig,
    engine: Arc<HubEngine>,
    next_connection_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl HubServer {
    /// Create a server wired to the given coordinator handle
    pub fn new(
        config: HubConfig,
        capabilities: CapabilityMatrix,
        coordinator: &CoordinatorHandle,
    ) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        let recorder = SessionLogRecorder::new(&config.log_dir);
        let engine = Arc::new(HubEngine::new(coordinator.slaves(), capabilities, recorder));

        Self {
            config,
            engine,
            next_connection_id: AtomicU64::new(1),
            connection_semaphore,
        }
    }

    /// Get a reference to the fan-out engine
    pub fn engine(&self) -> &Arc<HubEngine> {
        &self.engine
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Run the server
    ///
    /// Consumes coordinator events on a dedicated dispatcher task and accepts
    /// observers until shut down. Failure to create the log directory or bind
    /// the listener is fatal; everything after that is local in scope.
    pub async fn run(&self, events: mpsc::UnboundedReceiver<CoordinatorEvent>) -> Result<()> {
        let listener = self.start(events).await?;
        self.accept_loop(&listener).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(
        &self,
        events: mpsc::UnboundedReceiver<CoordinatorEvent>,
        shutdown: F,
    ) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let listener = self.start(events).await?;

        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener) => result,
        }
    }

    async fn start(
        &self,
        events: mpsc::UnboundedReceiver<CoordinatorEvent>,
    ) -> Result<TcpListener> {
        self.engine.recorder().ensure_dir()?;
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(
            addr = %self.config.bind_addr,
            log_dir = %self.config.log_dir.display(),
            "Hub listening"
        );

        // Single dispatcher: coordinator events are consumed in order.
        tokio::spawn(Arc::clone(&self.engine).run(events));

        Ok(listener)
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    async fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let connection_id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            connection = connection_id,
            peer = %peer_addr,
            "New observer connection"
        );

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::error!(error = %e, "Failed to configure socket");
                return;
            }
        }

        let (conn, frame_rx) = ObserverConnection::new(connection_id);
        let engine = Arc::clone(&self.engine);
        engine.add_observer(Arc::clone(&conn)).await;

        tokio::spawn(async move {
            let _permit = permit;

            let writer = connection_task(&engine, Arc::clone(&conn), frame_rx, socket).await;

            // Removing the connection drops the last frame senders, letting
            // the writer drain what is queued and exit.
            drop(conn);
            engine.remove_observer(connection_id).await;
            let _ = writer.await;
            tracing::debug!(connection = connection_id, "Observer connection closed");
        });
    }
}

/// Drive one observer connection's reader until it disconnects
///
/// Returns the writer task so the caller can await it after the connection
/// has been removed from the live set.
async fn connection_task(
    engine: &Arc<HubEngine>,
    conn: Arc<ObserverConnection>,
    mut frame_rx: mpsc::UnboundedReceiver<Arc<String>>,
    socket: TcpStream,
) -> tokio::task::JoinHandle<()> {
    let (read_half, mut write_half) = socket.into_split();
    let connection_id = conn.id;

    // Writer: drains the outbound channel so broadcasts never block on this
    // socket. Ends when every sender (the connection entry) is gone.
    let writer = tokio::spawn(async move {
        while let Some(frame) = frame_rx.recv().await {
            if write_half.write_all(frame.as_bytes()).await.is_err() {
                break;
            }
            if write_half.write_all(b"\n").await.is_err() {
                break;
            }
        }
        let _ = write_half.shutdown().await;
    });

    // Reader: one command per line until EOF or error.
    let mut lines = BufReader::new(read_half).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match ObserverCommand::parse(line) {
                    Ok(command) => engine.handle_command(&conn, command).await,
                    Err(e) => {
                        tracing::debug!(connection = connection_id, error = %e, "Bad command line");
                        engine.stats().record_error();
                        conn.reply(&OutboundEvent::from_error(&e));
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(connection = connection_id, error = %e, "Observer read error");
                break;
            }
        }
    }

    drop(conn);
    writer
}
