//! ARP packet format and parsing.
//!
//! Only Ethernet/IPv4 ARP (htype 1, ptype 0x0800) is supported; that is
//! the only flavour a single-subnet OpenFlow topology produces.
//!
//! ```text
//!  0       2       4   5   6       8              14      18             24      28
//! +-------+-------+---+---+-------+--------------+-------+--------------+-------+
//! | htype | ptype |hln|pln|opcode |  sender MAC  |sndr IP|  target MAC  |tgt IP |
//! +-------+-------+---+---+-------+--------------+-------+--------------+-------+
//! ```

use crate::ParseError;
use crate::mac::MacAddr;
use bytes::{BufMut, Bytes, BytesMut};
use std::net::Ipv4Addr;

/// ARP opcode for a request.
pub const ARP_OP_REQUEST: u16 = 1;

/// ARP opcode for a reply.
pub const ARP_OP_REPLY: u16 = 2;

const HTYPE_ETHERNET: u16 = 1;
const PTYPE_IPV4: u16 = 0x0800;
const PACKET_LEN: usize = 28;

/// An ARP packet over Ethernet/IPv4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpPacket {
    pub opcode: u16,
    pub sender_mac: MacAddr,
    pub sender_ip: Ipv4Addr,
    pub target_mac: MacAddr,
    pub target_ip: Ipv4Addr,
}

impl ArpPacket {
    /// Build an ARP reply answering `request` on behalf of `ip`/`mac`.
    pub fn reply(request: &ArpPacket, ip: Ipv4Addr, mac: MacAddr) -> Self {
        Self {
            opcode: ARP_OP_REPLY,
            sender_mac: mac,
            sender_ip: ip,
            target_mac: request.sender_mac,
            target_ip: request.sender_ip,
        }
    }

    /// Parse an ARP packet from raw bytes.
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        if data.len() < PACKET_LEN {
            return Err(ParseError::Truncated("arp packet"));
        }

        let htype = u16::from_be_bytes([data[0], data[1]]);
        let ptype = u16::from_be_bytes([data[2], data[3]]);
        if htype != HTYPE_ETHERNET || ptype != PTYPE_IPV4 {
            return Err(ParseError::Unsupported("arp hardware/protocol type"));
        }
        if data[4] != 6 || data[5] != 4 {
            return Err(ParseError::Invalid("arp address lengths"));
        }

        let opcode = u16::from_be_bytes([data[6], data[7]]);

        let mut sender_mac = [0u8; 6];
        sender_mac.copy_from_slice(&data[8..14]);
        let sender_ip = Ipv4Addr::new(data[14], data[15], data[16], data[17]);

        let mut target_mac = [0u8; 6];
        target_mac.copy_from_slice(&data[18..24]);
        let target_ip = Ipv4Addr::new(data[24], data[25], data[26], data[27]);

        Ok(Self {
            opcode,
            sender_mac: MacAddr::new(sender_mac),
            sender_ip,
            target_mac: MacAddr::new(target_mac),
            target_ip,
        })
    }

    /// Serialize the packet to bytes.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(PACKET_LEN);
        buf.put_u16(HTYPE_ETHERNET);
        buf.put_u16(PTYPE_IPV4);
        buf.put_u8(6);
        buf.put_u8(4);
        buf.put_u16(self.opcode);
        buf.put_slice(&self.sender_mac.octets());
        buf.put_slice(&self.sender_ip.octets());
        buf.put_slice(&self.target_mac.octets());
        buf.put_slice(&self.target_ip.octets());
        buf.freeze()
    }

    pub fn is_request(&self) -> bool {
        self.opcode == ARP_OP_REQUEST
    }
}
