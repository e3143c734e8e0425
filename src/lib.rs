//! Broadcast and session-recording hub for distributed browser-test grids
//!
//! A test-execution coordinator ("master") drives worker machines, local and
//! cloud-hosted, and emits a continuous stream of live test output. This
//! crate implements the hub that sits between that coordinator and any number
//! of observer clients:
//!
//! - keeps a live, display-ready view of attached worker machines,
//! - fans the coordinator's firehose out to every connected observer without
//!   one slow observer delaying another,
//! - records each test session's streamed output to its own append-only log,
//! - resolves a cloud-browser session descriptor to a configured machine id
//!   via capability matching.
//!
//! # Architecture
//!
//! ```text
//!   Coordinator ──events──► HubEngine ──frames──► [Observer] [Observer] ...
//!                              │                       ▲
//!                              │ register / stream     │ NDJSON over TCP
//!                              ▼                       │
//!                        SessionLogRecorder ──► testlogs/<session>.log
//! ```
//!
//! Observers connect over TCP and speak newline-delimited JSON, one object
//! per line, tagged by an `"event"` field. Frames are serialized once per
//! broadcast and shared across connections via `Arc<String>`; stream chunks
//! are `bytes::Bytes` so the log append and the fan-out share one allocation.

pub mod capability;
pub mod coordinator;
pub mod error;
pub mod hub;
pub mod protocol;
pub mod recorder;
pub mod registry;
pub mod server;
pub mod stats;

pub use capability::{CapabilityDescriptor, CapabilityEntry, CapabilityMatrix};
pub use coordinator::{CoordinatorEvent, CoordinatorHandle};
pub use error::{HubError, Result};
pub use hub::HubEngine;
pub use recorder::SessionLogRecorder;
pub use registry::{flatten, Machine, SlaveMap};
pub use server::{HubConfig, HubServer};
