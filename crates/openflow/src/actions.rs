//! OpenFlow 1.0 action list encoding.
//!
//! Only the actions a NAT-style load balancer needs: output to a port
//! and L2/L3 address rewrites. Every action is a (type, len) TLV padded
//! to 8 bytes.

use crate::Error;
use bytes::{BufMut, BytesMut};
use packet::MacAddr;
use std::net::Ipv4Addr;

pub const OFPAT_OUTPUT: u16 = 0;
pub const OFPAT_SET_DL_SRC: u16 = 4;
pub const OFPAT_SET_DL_DST: u16 = 5;
pub const OFPAT_SET_NW_SRC: u16 = 6;
pub const OFPAT_SET_NW_DST: u16 = 7;

/// A single flow action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Forward out a port. `max_len` caps bytes sent when the port is
    /// OFPP_CONTROLLER; ignored otherwise.
    Output { port: u16, max_len: u16 },
    SetDlSrc(MacAddr),
    SetDlDst(MacAddr),
    SetNwSrc(Ipv4Addr),
    SetNwDst(Ipv4Addr),
}

impl Action {
    /// Encoded size in bytes.
    pub fn wire_len(&self) -> usize {
        match self {
            Action::Output { .. } => 8,
            Action::SetDlSrc(_) | Action::SetDlDst(_) => 16,
            Action::SetNwSrc(_) | Action::SetNwDst(_) => 8,
        }
    }

    /// Append the wire form of this action.
    pub fn encode(&self, buf: &mut BytesMut) {
        match self {
            Action::Output { port, max_len } => {
                buf.put_u16(OFPAT_OUTPUT);
                buf.put_u16(8);
                buf.put_u16(*port);
                buf.put_u16(*max_len);
            }
            Action::SetDlSrc(mac) => {
                buf.put_u16(OFPAT_SET_DL_SRC);
                buf.put_u16(16);
                buf.put_slice(&mac.octets());
                buf.put_slice(&[0u8; 6]);
            }
            Action::SetDlDst(mac) => {
                buf.put_u16(OFPAT_SET_DL_DST);
                buf.put_u16(16);
                buf.put_slice(&mac.octets());
                buf.put_slice(&[0u8; 6]);
            }
            Action::SetNwSrc(ip) => {
                buf.put_u16(OFPAT_SET_NW_SRC);
                buf.put_u16(8);
                buf.put_u32(u32::from(*ip));
            }
            Action::SetNwDst(ip) => {
                buf.put_u16(OFPAT_SET_NW_DST);
                buf.put_u16(8);
                buf.put_u32(u32::from(*ip));
            }
        }
    }

    /// Parse a contiguous action list.
    pub fn decode_list(data: &[u8]) -> Result<Vec<Action>, Error> {
        let mut actions = Vec::new();
        let mut offset = 0;

        while offset < data.len() {
            if data.len() - offset < 4 {
                return Err(Error::Truncated("action header"));
            }

            let typ = u16::from_be_bytes([data[offset], data[offset + 1]]);
            let len = u16::from_be_bytes([data[offset + 2], data[offset + 3]]) as usize;
            if len < 8 || len % 8 != 0 || offset + len > data.len() {
                return Err(Error::Invalid("action length"));
            }

            let body = &data[offset + 4..offset + len];
            let action = match typ {
                OFPAT_OUTPUT => Action::Output {
                    port: u16::from_be_bytes([body[0], body[1]]),
                    max_len: u16::from_be_bytes([body[2], body[3]]),
                },
                OFPAT_SET_DL_SRC | OFPAT_SET_DL_DST => {
                    if body.len() < 6 {
                        return Err(Error::Truncated("dl address action"));
                    }
                    let mut octets = [0u8; 6];
                    octets.copy_from_slice(&body[0..6]);
                    if typ == OFPAT_SET_DL_SRC {
                        Action::SetDlSrc(MacAddr::new(octets))
                    } else {
                        Action::SetDlDst(MacAddr::new(octets))
                    }
                }
                OFPAT_SET_NW_SRC | OFPAT_SET_NW_DST => {
                    let ip = Ipv4Addr::from(u32::from_be_bytes([body[0], body[1], body[2], body[3]]));
                    if typ == OFPAT_SET_NW_SRC {
                        Action::SetNwSrc(ip)
                    } else {
                        Action::SetNwDst(ip)
                    }
                }
                _ => return Err(Error::Invalid("action type")),
            };

            actions.push(action);
            offset += len;
        }

        Ok(actions)
    }
}

/// Total encoded size of an action list.
pub fn encoded_len(actions: &[Action]) -> usize {
    actions.iter().map(Action::wire_len).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_list_round_trip() {
        let actions = vec![
            Action::SetDlDst(MacAddr::new([0, 0, 0, 0, 0, 0x01])),
            Action::SetNwDst("10.0.0.1".parse().unwrap()),
            Action::Output { port: 1, max_len: 0 },
        ];

        let mut buf = BytesMut::new();
        for action in &actions {
            action.encode(&mut buf);
        }
        assert_eq!(buf.len(), encoded_len(&actions));
        assert_eq!(buf.len(), 16 + 8 + 8);

        assert_eq!(Action::decode_list(&buf).unwrap(), actions);
    }

    #[test]
    fn test_decode_rejects_bad_length() {
        // OUTPUT action claiming a 6-byte length.
        let bytes = [0x00, 0x00, 0x00, 0x06, 0x00, 0x01];
        assert!(matches!(Action::decode_list(&bytes), Err(Error::Invalid(_))));
    }

    #[test]
    fn test_decode_rejects_unknown_type() {
        // STRIP_VLAN (type 3) is not part of the supported set.
        let bytes = [0x00, 0x03, 0x00, 0x08, 0x00, 0x00, 0x00, 0x00];
        assert!(matches!(Action::decode_list(&bytes), Err(Error::Invalid(_))));
    }

    #[test]
    fn test_empty_list() {
        assert!(Action::decode_list(&[]).unwrap().is_empty());
    }
}
