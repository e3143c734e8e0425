//! Machine registry
//!
//! The coordinator tracks its workers as a nested structure: group key →
//! machine key → machine record. Observers want a flat, display-ready list.
//! This module is the pure projection between the two; it owns nothing and
//! has no side effects.

pub mod machine;

pub use machine::{flatten, Machine, SlaveMap};
