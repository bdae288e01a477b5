//! Backend selection policies.

use crate::registry::BackendRegistry;
use crate::types::BackendId;

/// Strategy choosing a backend for a new flow.
///
/// Called exactly once per unseen connection key; re-invoking it for a
/// key that already has a record would break flow affinity, so the
/// caller checks the connection table first.
pub trait SelectionPolicy: Send + Sync {
    /// Pick a backend, or None when the registry is empty.
    fn select(&mut self, registry: &BackendRegistry) -> Option<BackendId>;

    /// Policy name as it appears in configuration.
    fn name(&self) -> &'static str;
}

/// Rotating cursor over the ordered backend list.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: usize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SelectionPolicy for RoundRobin {
    fn select(&mut self, registry: &BackendRegistry) -> Option<BackendId> {
        if registry.is_empty() {
            return None;
        }
        let id = self.cursor % registry.len();
        self.cursor = (id + 1) % registry.len();
        Some(id)
    }

    fn name(&self) -> &'static str {
        "round_robin"
    }
}

/// Fewest active connections wins; ties go to the lowest index so
/// selection is reproducible.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self
    }
}

impl SelectionPolicy for LeastConnections {
    fn select(&mut self, registry: &BackendRegistry) -> Option<BackendId> {
        registry
            .iter()
            .enumerate()
            .min_by_key(|(index, backend)| (backend.active_connections, *index))
            .map(|(index, _)| index)
    }

    fn name(&self) -> &'static str {
        "least_connections"
    }
}

/// Construct a policy from its configuration name.
pub fn from_name(name: &str) -> Option<Box<dyn SelectionPolicy>> {
    match name {
        "round_robin" => Some(Box::new(RoundRobin::new())),
        "least_connections" => Some(Box::new(LeastConnections::new())),
        _ => None,
    }
}
