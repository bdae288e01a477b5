//! Backend registry and load counters.

use crate::types::{Backend, BackendId};
use tracing::warn;

/// The ordered, fixed backend pool.
///
/// The list is immutable for the registry's lifetime; only the load
/// counters change, and only through the connection table's
/// admission/eviction calls.
#[derive(Debug)]
pub struct BackendRegistry {
    backends: Vec<Backend>,
}

impl BackendRegistry {
    pub fn new(backends: Vec<Backend>) -> Self {
        Self { backends }
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn get(&self, id: BackendId) -> Option<&Backend> {
        self.backends.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Backend> {
        self.backends.iter()
    }

    /// Count a new flow against a backend.
    pub(crate) fn record_assignment(&mut self, id: BackendId) {
        if let Some(backend) = self.backends.get_mut(id) {
            backend.active_connections += 1;
            backend.total_requests += 1;
        }
    }

    /// Release one flow from a backend. The counter never underflows.
    pub(crate) fn record_release(&mut self, id: BackendId) {
        if let Some(backend) = self.backends.get_mut(id) {
            if backend.active_connections == 0 {
                warn!(backend = %backend.ip, "release for backend with no active connections");
                return;
            }
            backend.active_connections -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use packet::MacAddr;

    fn registry() -> BackendRegistry {
        BackendRegistry::new(vec![
            Backend::new("10.0.0.1".parse().unwrap(), MacAddr::new([0, 0, 0, 0, 0, 1]), 1),
            Backend::new("10.0.0.2".parse().unwrap(), MacAddr::new([0, 0, 0, 0, 0, 2]), 2),
        ])
    }

    #[test]
    fn test_assignment_counts_both_ways() {
        let mut registry = registry();
        registry.record_assignment(0);
        registry.record_assignment(0);

        let backend = registry.get(0).unwrap();
        assert_eq!(backend.active_connections, 2);
        assert_eq!(backend.total_requests, 2);
        assert_eq!(registry.get(1).unwrap().active_connections, 0);
    }

    #[test]
    fn test_release_decrements_active_only() {
        let mut registry = registry();
        registry.record_assignment(1);
        registry.record_release(1);

        let backend = registry.get(1).unwrap();
        assert_eq!(backend.active_connections, 0);
        assert_eq!(backend.total_requests, 1);
    }

    #[test]
    fn test_release_never_underflows() {
        let mut registry = registry();
        registry.record_release(0);
        registry.record_release(0);
        assert_eq!(registry.get(0).unwrap().active_connections, 0);
    }

    #[test]
    fn test_out_of_range_ids_ignored() {
        let mut registry = registry();
        registry.record_assignment(9);
        registry.record_release(9);
        assert!(registry.get(9).is_none());
    }
}
