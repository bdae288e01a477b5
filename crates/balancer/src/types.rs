//! Load-balancing data types.

use packet::{IPPROTO_TCP, IPPROTO_UDP, MacAddr};
use std::fmt;
use std::net::Ipv4Addr;
use std::time::Instant;

/// Datapath id identifying one connected switch.
pub type DatapathId = u64;

/// Index of a backend in the ordered registry list.
pub type BackendId = usize;

/// Transport protocol of a balanced flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    /// Map an IPv4 protocol number to a balanced protocol.
    pub fn from_nw_proto(proto: u8) -> Option<Self> {
        match proto {
            IPPROTO_TCP => Some(Protocol::Tcp),
            IPPROTO_UDP => Some(Protocol::Udp),
            _ => None,
        }
    }

    /// The IPv4 protocol number.
    pub fn nw_proto(self) -> u8 {
        match self {
            Protocol::Tcp => IPPROTO_TCP,
            Protocol::Udp => IPPROTO_UDP,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
        }
    }
}

/// The advertised service address; not bound to any real host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualService {
    pub ip: Ipv4Addr,
    pub mac: MacAddr,
}

/// A backend server reachable through one switch port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backend {
    pub ip: Ipv4Addr,
    pub mac: MacAddr,
    /// Switch port the backend is attached to.
    pub port: u16,
    /// Flows currently assigned and not yet removed. Never negative.
    pub active_connections: u64,
    /// Lifetime assignment count.
    pub total_requests: u64,
}

impl Backend {
    pub fn new(ip: Ipv4Addr, mac: MacAddr, port: u16) -> Self {
        Self {
            ip,
            mac,
            port,
            active_connections: 0,
            total_requests: 0,
        }
    }
}

/// Identity of one client-initiated flow.
///
/// The destination is always the virtual IP, so it is omitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionKey {
    pub client_ip: Ipv4Addr,
    pub client_port: u16,
    pub protocol: Protocol,
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.client_ip, self.client_port, self.protocol)
    }
}

/// One admitted flow and the backend it is pinned to.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionRecord {
    pub key: ConnectionKey,
    pub backend: BackendId,
    /// Switch that owns the installed rules for this flow.
    pub switch: DatapathId,
    pub client_mac: MacAddr,
    /// Switch port the client is attached to.
    pub client_port_no: u16,
    pub created_at: Instant,
    pub last_seen_at: Instant,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_mapping() {
        assert_eq!(Protocol::from_nw_proto(6), Some(Protocol::Tcp));
        assert_eq!(Protocol::from_nw_proto(17), Some(Protocol::Udp));
        assert_eq!(Protocol::from_nw_proto(1), None); // ICMP
        assert_eq!(Protocol::Tcp.nw_proto(), 6);
        assert_eq!(Protocol::Udp.nw_proto(), 17);
    }

    #[test]
    fn test_key_display() {
        let key = ConnectionKey {
            client_ip: "10.0.0.10".parse().unwrap(),
            client_port: 5000,
            protocol: Protocol::Tcp,
        };
        assert_eq!(key.to_string(), "10.0.0.10:5000/tcp");
    }
}
