//! Observer-facing TCP server
//!
//! Accept loop and per-connection tasks for the newline-delimited JSON
//! observer channel, plus the hub configuration.

pub mod config;
pub mod listener;

pub use config::HubConfig;
pub use listener::HubServer;
