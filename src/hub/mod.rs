//! Broadcast fan-out engine
//!
//! The coordination core: holds the live set of observer connections,
//! consumes coordinator events, and routes cloud-browser stream chunks to
//! both the session log and every observer.
//!
//! # Architecture
//!
//! ```text
//!                           Arc<HubEngine>
//!                    ┌──────────────────────────┐
//!                    │ connections: HashMap<id, │
//!                    │   ObserverConnection {   │
//!                    │     outbound: mpsc::Tx,  │
//!                    │     bound session/log,   │
//!                    │   }                      │
//!                    │ >                        │
//!                    └────────────┬─────────────┘
//!                                 │
//!         ┌───────────────────────┼───────────────────────┐
//!         │                       │                       │
//!         ▼                       ▼                       ▼
//!    [Coordinator]           [Observer]              [Observer]
//!    events.recv()           frame_rx.recv()         frame_rx.recv()
//!         │                       │                       │
//!         └──► engine.broadcast() ──► conn.send() ──► TCP
//! ```
//!
//! # Fan-out without head-of-line blocking
//!
//! Broadcasts serialize the frame once, snapshot the connection set under a
//! read lock, then push the shared `Arc<String>` onto each connection's
//! unbounded channel. A slow observer only grows its own queue; it cannot
//! delay delivery to anyone else, and connect/disconnect during the same
//! logical tick never invalidates the iteration.

pub mod connection;
pub mod engine;

pub use connection::{BoundSession, ObserverConnection};
pub use engine::HubEngine;
