//! Layer 2/3 frame parsing and synthesis for the FlowLB controller.
//!
//! The controller only ever sees full Ethernet frames carried inside
//! OpenFlow packet-in messages, and only ever emits full frames inside
//! packet-out messages. This crate covers exactly that surface:
//! Ethernet framing, ARP request/reply, and enough IPv4/TCP/UDP parsing
//! to extract flow keys.

pub mod arp;
pub mod ethernet;
pub mod ipv4;
pub mod mac;

pub use arp::{ARP_OP_REPLY, ARP_OP_REQUEST, ArpPacket};
pub use ethernet::{ETHERTYPE_ARP, ETHERTYPE_IPV4, EthernetFrame};
pub use ipv4::{IPPROTO_TCP, IPPROTO_UDP, Ipv4Packet, TransportPorts};
pub use mac::MacAddr;

/// Parse failure for a wire frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("truncated {0}")]
    Truncated(&'static str),

    #[error("unsupported {0}")]
    Unsupported(&'static str),

    #[error("invalid {0}")]
    Invalid(&'static str),
}
