//! The connection table: per-flow backend affinity.
//!
//! One record per admitted flow, keyed by the client side of the
//! connection. The table is the only mutator of the registry's load
//! counters, which keeps admission, eviction, and the counters in step.

use crate::registry::BackendRegistry;
use crate::types::{BackendId, ConnectionKey, ConnectionRecord, DatapathId};
use packet::MacAddr;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct ConnectionTable {
    records: HashMap<ConnectionKey, ConnectionRecord>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, key: &ConnectionKey) -> Option<&ConnectionRecord> {
        self.records.get(key)
    }

    /// Refresh a record's last-seen time. Returns false for unknown keys.
    pub fn touch(&mut self, key: &ConnectionKey, now: Instant) -> bool {
        match self.records.get_mut(key) {
            Some(record) => {
                record.last_seen_at = now;
                true
            }
            None => false,
        }
    }

    /// Admit a flow, counting it against `backend`.
    ///
    /// If the key is already present the existing assignment wins — the
    /// caller may have raced a duplicate packet-in — and nothing is
    /// re-counted; the record is only refreshed.
    pub fn admit(
        &mut self,
        key: ConnectionKey,
        backend: BackendId,
        switch: DatapathId,
        client_mac: MacAddr,
        client_port_no: u16,
        now: Instant,
        registry: &mut BackendRegistry,
    ) -> &ConnectionRecord {
        match self.records.entry(key) {
            Entry::Occupied(entry) => {
                let record = entry.into_mut();
                record.last_seen_at = now;
                record
            }
            Entry::Vacant(entry) => {
                registry.record_assignment(backend);
                entry.insert(ConnectionRecord {
                    key,
                    backend,
                    switch,
                    client_mac,
                    client_port_no,
                    created_at: now,
                    last_seen_at: now,
                })
            }
        }
    }

    /// Evict a flow and release its backend slot.
    ///
    /// Unknown keys are a no-op, so duplicate flow-removed
    /// notifications cannot skew the counters.
    pub fn remove(&mut self, key: &ConnectionKey, registry: &mut BackendRegistry) -> Option<ConnectionRecord> {
        let record = self.records.remove(key)?;
        registry.record_release(record.backend);
        Some(record)
    }

    /// Evict every flow owned by a disconnected switch.
    pub fn purge_switch(&mut self, switch: DatapathId, registry: &mut BackendRegistry) -> Vec<ConnectionRecord> {
        let keys: Vec<ConnectionKey> = self
            .records
            .values()
            .filter(|record| record.switch == switch)
            .map(|record| record.key)
            .collect();

        keys.iter().filter_map(|key| self.remove(key, registry)).collect()
    }

    /// Evict flows idle longer than `max_idle`.
    ///
    /// The switch normally ages flows out itself and tells us; this is
    /// the safety net for lost flow-removed notifications.
    pub fn sweep_idle(
        &mut self,
        max_idle: Duration,
        now: Instant,
        registry: &mut BackendRegistry,
    ) -> Vec<ConnectionRecord> {
        let keys: Vec<ConnectionKey> = self
            .records
            .values()
            .filter(|record| now.duration_since(record.last_seen_at) >= max_idle)
            .map(|record| record.key)
            .collect();

        keys.iter().filter_map(|key| self.remove(key, registry)).collect()
    }
}
