//! Observer wire protocol
//!
//! Observers speak newline-delimited JSON over a persistent TCP connection:
//! one object per line, tagged by an `"event"` field in both directions.
//! Inbound lines decode to [`ObserverCommand`]; outbound frames are built
//! from [`OutboundEvent`] and serialized once per broadcast.
//!
//! The cloud-browser registration payload arrives double-encoded: the
//! `browserstack` field is itself a JSON string, decoded separately by
//! [`BrowserstackPayload::parse`].

pub mod command;
pub mod event;

pub use command::{BrowserstackPayload, ObserverCommand};
pub use event::OutboundEvent;
