//! Session log recording
//!
//! Each test session's streamed output is recorded to its own append-only
//! log file under a configured directory. A session's log stream is owned by
//! exactly one observer connection at a time: writes for one handle originate
//! from one task sequence, so ordering is enforced by ownership, not locking.
//!
//! Every open stream has a dedicated writer task fed by an unbounded channel;
//! appends are fire-and-forget from the dispatcher's perspective and storage
//! failures surface later, scoped to that session only.

pub mod store;
pub mod stream;

pub use store::SessionLogRecorder;
pub use stream::SessionLogHandle;
