//! Load-balancing domain logic: backend pool, selection policies, and
//! the per-flow connection table.
//!
//! Everything in this crate is synchronous and single-owner by design:
//! the controller's reactor task is the only context that touches a
//! `BackendRegistry` or `ConnectionTable`, so none of it needs locks.

pub mod conntrack;
pub mod policy;
pub mod registry;
pub mod types;

pub use conntrack::ConnectionTable;
pub use policy::{LeastConnections, RoundRobin, SelectionPolicy};
pub use registry::BackendRegistry;
pub use types::{Backend, BackendId, ConnectionKey, ConnectionRecord, DatapathId, Protocol, VirtualService};
