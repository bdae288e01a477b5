//! Ethernet II framing.
//!
//! ```text
//!  0                   6                  12        14
//! +-------------------+-------------------+---------+----------------
//! |  Destination MAC  |    Source MAC     | Ethertype|   Payload ...
//! +-------------------+-------------------+---------+----------------
//! ```

use crate::ParseError;
use crate::mac::MacAddr;
use bytes::{BufMut, Bytes, BytesMut};

/// Ethertype for IPv4.
pub const ETHERTYPE_IPV4: u16 = 0x0800;

/// Ethertype for ARP.
pub const ETHERTYPE_ARP: u16 = 0x0806;

const HEADER_LEN: usize = 14;

/// An Ethernet II frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EthernetFrame {
    pub dst: MacAddr,
    pub src: MacAddr,
    pub ethertype: u16,
    pub payload: Bytes,
}

impl EthernetFrame {
    /// Parse a frame from raw bytes.
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        if data.len() < HEADER_LEN {
            return Err(ParseError::Truncated("ethernet header"));
        }

        let mut dst = [0u8; 6];
        let mut src = [0u8; 6];
        dst.copy_from_slice(&data[0..6]);
        src.copy_from_slice(&data[6..12]);
        let ethertype = u16::from_be_bytes([data[12], data[13]]);

        Ok(Self {
            dst: MacAddr::new(dst),
            src: MacAddr::new(src),
            ethertype,
            payload: Bytes::copy_from_slice(&data[HEADER_LEN..]),
        })
    }

    /// Serialize the frame to bytes.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.payload.len());
        buf.put_slice(&self.dst.octets());
        buf.put_slice(&self.src.octets());
        buf.put_u16(self.ethertype);
        buf.put_slice(&self.payload);
        buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_round_trip() {
        let frame = EthernetFrame {
            dst: MacAddr::new([0x00, 0x00, 0x00, 0x00, 0x00, 0x01]),
            src: MacAddr::new([0x00, 0x00, 0x00, 0x00, 0x00, 0x10]),
            ethertype: ETHERTYPE_IPV4,
            payload: Bytes::from_static(&[0xde, 0xad, 0xbe, 0xef]),
        };

        let bytes = frame.to_bytes();
        assert_eq!(bytes.len(), 18);

        let parsed = EthernetFrame::parse(&bytes).unwrap();
        assert_eq!(parsed, frame);
    }

    #[test]
    fn test_parse_too_short() {
        assert_eq!(
            EthernetFrame::parse(&[0u8; 13]),
            Err(ParseError::Truncated("ethernet header"))
        );
    }

    #[test]
    fn test_empty_payload() {
        let frame = EthernetFrame::parse(&[0u8; 14]).unwrap();
        assert!(frame.payload.is_empty());
    }
}
