//! FlowLB controller - OpenFlow 1.0 load balancer
//!
//! Clients target a single virtual IP. The controller answers ARP for
//! it, picks a backend for each new client flow, and installs a pair of
//! rewrite rules so every later packet of the flow is forwarded by the
//! switch alone; only the first packet of a flow pays controller
//! latency.
//!
//! # Architecture
//!
//! - One task per switch TCP session handles framing and keepalive
//! - A single reactor task owns all balancing state and consumes one
//!   event queue, so no state needs locks
//! - A stats worker posts decision/removal events to the dashboard API
//!   off the critical path, dropping rather than blocking when behind
//!
//! # Components
//!
//! - **Controller**: the reactor event loop (packet-in classification,
//!   learning switch, flow-removed accounting)
//! - **FlowInstaller**: decision → forward/reverse flow-mod pair
//! - **ArpResponder**: answers ARP for the virtual IP
//! - **StatsReporter**: bounded fire-and-forget event queue

pub mod arp;
pub mod config;
pub mod controller;
pub mod installer;
pub mod server;
pub mod stats;
pub mod switch;

pub use arp::ArpResponder;
pub use config::{Config, ConfigError};
pub use controller::{Controller, Event};
pub use installer::FlowInstaller;
pub use server::ControllerServer;
pub use stats::{StatsEvent, StatsReporter};
