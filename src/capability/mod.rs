//! Capability matching
//!
//! Cloud-browser sessions announce themselves with a {browser, OS, OS
//! version} triple. The hub maps that triple to a stable machine id by
//! scanning a statically configured capability matrix. The matrix is loaded
//! once at startup and immutable for the process lifetime.

pub mod matrix;

pub use matrix::{CapabilityDescriptor, CapabilityEntry, CapabilityMatrix};
