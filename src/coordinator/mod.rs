//! Coordinator-facing interface
//!
//! The coordinator owns test scheduling and worker lifecycle; the hub treats
//! it as an external collaborator. It pushes lifecycle and data events over a
//! channel, and its live slave structure is readable at any time through the
//! shared state the handle owns. Nothing here is consulted as ambient global
//! state: the engine receives explicit references, so tests inject fixtures.

pub mod handle;

pub use handle::{CoordinatorEvent, CoordinatorHandle, SharedSlaves};
