//! Worker machine view and slave-structure flattening

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A worker machine as shown to observers
///
/// Derived, not owned: this is a view into the coordinator's slave registry
/// at query time and has no lifecycle of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    /// Machine identifier
    pub id: String,
    /// Platform label (e.g. "mac", "win")
    pub platform: String,
}

impl Machine {
    /// Create a new machine view
    pub fn new(id: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            platform: platform.into(),
        }
    }
}

/// The coordinator's slave structure: group key → machine key → machine
///
/// Read-only from the hub's perspective. `BTreeMap` keeps iteration
/// deterministic; the upstream contract makes no stability promise when the
/// structure itself reorders.
pub type SlaveMap = BTreeMap<String, BTreeMap<String, Machine>>;

/// Flatten the nested slave structure into one ordered machine list
///
/// All groups are flattened, groups first then machines within a group.
/// Empty groups and an empty top-level structure yield an empty list.
pub fn flatten(slaves: &SlaveMap) -> Vec<Machine> {
    let mut machines = Vec::new();

    for group in slaves.values() {
        for machine in group.values() {
            machines.push(machine.clone());
        }
    }

    machines
}
