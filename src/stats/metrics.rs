//! Counters for hub activity

use std::sync::atomic::{AtomicU64, Ordering};

/// Running totals for the hub, updated lock-free by the engine
#[derive(Debug, Default)]
pub struct HubStats {
    data_events: AtomicU64,
    slave_updates: AtomicU64,
    chunks_streamed: AtomicU64,
    frames_broadcast: AtomicU64,
    errors_reported: AtomicU64,
}

impl HubStats {
    /// Create a zeroed stats tracker
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_data_event(&self) {
        self.data_events.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_slave_update(&self) {
        self.slave_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_chunk(&self) {
        self.chunks_streamed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_broadcast(&self, recipients: u64) {
        self.frames_broadcast.fetch_add(recipients, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors_reported.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current totals
    pub fn snapshot(&self) -> HubStatsSnapshot {
        HubStatsSnapshot {
            data_events: self.data_events.load(Ordering::Relaxed),
            slave_updates: self.slave_updates.load(Ordering::Relaxed),
            chunks_streamed: self.chunks_streamed.load(Ordering::Relaxed),
            frames_broadcast: self.frames_broadcast.load(Ordering::Relaxed),
            errors_reported: self.errors_reported.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of hub totals
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubStatsSnapshot {
    /// Coordinator firehose events fanned out
    pub data_events: u64,
    /// Slave-list changes fanned out
    pub slave_updates: u64,
    /// Cloud-browser chunks accepted for logging
    pub chunks_streamed: u64,
    /// Individual frames delivered to observers
    pub frames_broadcast: u64,
    /// Local-scope errors reported to observers
    pub errors_reported: u64,
}
