//! The OpenFlow 1.0 flow match structure.
//!
//! ofp_match is a fixed 40-byte struct where a wildcard bitmap says
//! which fields are significant. Absent `Option` fields encode as
//! wildcarded; VLAN and ToS fields are always wildcarded since the
//! controller never matches on them.
//!
//! ```text
//!  0       4       6      12      18      20  21  22  23  24 25 26    28      32      36  38  40
//! +-------+-------+-------+-------+-------+---+---+----+---+-----+----+-------+-------+---+---+
//! | wcard |in_port| dl_src| dl_dst|dl_vlan|pcp|pad|dl_ty|tos|proto|pad | nw_src| nw_dst|tp_s|tp_d|
//! +-------+-------+-------+-------+-------+---+---+----+---+-----+----+-------+-------+---+---+
//! ```

use crate::Error;
use bytes::{BufMut, BytesMut};
use packet::MacAddr;
use std::net::Ipv4Addr;

pub const OFPFW_IN_PORT: u32 = 1 << 0;
pub const OFPFW_DL_VLAN: u32 = 1 << 1;
pub const OFPFW_DL_SRC: u32 = 1 << 2;
pub const OFPFW_DL_DST: u32 = 1 << 3;
pub const OFPFW_DL_TYPE: u32 = 1 << 4;
pub const OFPFW_NW_PROTO: u32 = 1 << 5;
pub const OFPFW_TP_SRC: u32 = 1 << 6;
pub const OFPFW_TP_DST: u32 = 1 << 7;
pub const OFPFW_NW_SRC_SHIFT: u32 = 8;
pub const OFPFW_NW_SRC_MASK: u32 = 0x3f << OFPFW_NW_SRC_SHIFT;
pub const OFPFW_NW_DST_SHIFT: u32 = 14;
pub const OFPFW_NW_DST_MASK: u32 = 0x3f << OFPFW_NW_DST_SHIFT;
pub const OFPFW_DL_VLAN_PCP: u32 = 1 << 20;
pub const OFPFW_NW_TOS: u32 = 1 << 21;
pub const OFPFW_ALL: u32 = (1 << 22) - 1;

/// Length of the wire structure.
pub const MATCH_LEN: usize = 40;

/// A flow match; `None` fields are wildcarded on the wire.
///
/// IP addresses are modelled exact-or-absent. A CIDR-prefix wildcard
/// count between 0 and 32 decodes as an exact address, which is
/// sufficient for the rules this controller installs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowMatch {
    pub in_port: Option<u16>,
    pub dl_src: Option<MacAddr>,
    pub dl_dst: Option<MacAddr>,
    pub dl_type: Option<u16>,
    pub nw_proto: Option<u8>,
    pub nw_src: Option<Ipv4Addr>,
    pub nw_dst: Option<Ipv4Addr>,
    pub tp_src: Option<u16>,
    pub tp_dst: Option<u16>,
}

impl FlowMatch {
    /// The fully wildcarded match.
    pub fn any() -> Self {
        Self::default()
    }

    /// Wire wildcard bitmap for this match.
    pub fn wildcards(&self) -> u32 {
        let mut wildcards = OFPFW_ALL;
        if self.in_port.is_some() {
            wildcards &= !OFPFW_IN_PORT;
        }
        if self.dl_src.is_some() {
            wildcards &= !OFPFW_DL_SRC;
        }
        if self.dl_dst.is_some() {
            wildcards &= !OFPFW_DL_DST;
        }
        if self.dl_type.is_some() {
            wildcards &= !OFPFW_DL_TYPE;
        }
        if self.nw_proto.is_some() {
            wildcards &= !OFPFW_NW_PROTO;
        }
        if self.nw_src.is_some() {
            // Prefix length field cleared to zero = exact match.
            wildcards &= !OFPFW_NW_SRC_MASK;
        }
        if self.nw_dst.is_some() {
            wildcards &= !OFPFW_NW_DST_MASK;
        }
        if self.tp_src.is_some() {
            wildcards &= !OFPFW_TP_SRC;
        }
        if self.tp_dst.is_some() {
            wildcards &= !OFPFW_TP_DST;
        }
        wildcards
    }

    /// Serialize as the 40-byte ofp_match structure.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.wildcards());
        buf.put_u16(self.in_port.unwrap_or(0));
        buf.put_slice(&self.dl_src.unwrap_or_default().octets());
        buf.put_slice(&self.dl_dst.unwrap_or_default().octets());
        buf.put_u16(0); // dl_vlan
        buf.put_u8(0); // dl_vlan_pcp
        buf.put_u8(0); // pad
        buf.put_u16(self.dl_type.unwrap_or(0));
        buf.put_u8(0); // nw_tos
        buf.put_u8(self.nw_proto.unwrap_or(0));
        buf.put_slice(&[0u8; 2]); // pad
        buf.put_u32(self.nw_src.map(u32::from).unwrap_or(0));
        buf.put_u32(self.nw_dst.map(u32::from).unwrap_or(0));
        buf.put_u16(self.tp_src.unwrap_or(0));
        buf.put_u16(self.tp_dst.unwrap_or(0));
    }

    /// Parse the 40-byte ofp_match structure.
    pub fn decode(data: &[u8]) -> Result<Self, Error> {
        if data.len() < MATCH_LEN {
            return Err(Error::Truncated("flow match"));
        }

        let wildcards = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);

        let field_u16 = |offset: usize| u16::from_be_bytes([data[offset], data[offset + 1]]);
        let field_mac = |offset: usize| {
            let mut octets = [0u8; 6];
            octets.copy_from_slice(&data[offset..offset + 6]);
            MacAddr::new(octets)
        };
        let field_ip = |offset: usize| {
            Ipv4Addr::from(u32::from_be_bytes([
                data[offset],
                data[offset + 1],
                data[offset + 2],
                data[offset + 3],
            ]))
        };

        let nw_src_wild = (wildcards & OFPFW_NW_SRC_MASK) >> OFPFW_NW_SRC_SHIFT;
        let nw_dst_wild = (wildcards & OFPFW_NW_DST_MASK) >> OFPFW_NW_DST_SHIFT;

        Ok(Self {
            in_port: (wildcards & OFPFW_IN_PORT == 0).then(|| field_u16(4)),
            dl_src: (wildcards & OFPFW_DL_SRC == 0).then(|| field_mac(6)),
            dl_dst: (wildcards & OFPFW_DL_DST == 0).then(|| field_mac(12)),
            dl_type: (wildcards & OFPFW_DL_TYPE == 0).then(|| field_u16(22)),
            nw_proto: (wildcards & OFPFW_NW_PROTO == 0).then(|| data[25]),
            nw_src: (nw_src_wild < 32).then(|| field_ip(28)),
            nw_dst: (nw_dst_wild < 32).then(|| field_ip(32)),
            tp_src: (wildcards & OFPFW_TP_SRC == 0).then(|| field_u16(36)),
            tp_dst: (wildcards & OFPFW_TP_DST == 0).then(|| field_u16(38)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(m: &FlowMatch) -> BytesMut {
        let mut buf = BytesMut::new();
        m.encode(&mut buf);
        buf
    }

    #[test]
    fn test_any_is_fully_wildcarded() {
        let m = FlowMatch::any();
        assert_eq!(m.wildcards(), OFPFW_ALL);

        let buf = encode(&m);
        assert_eq!(buf.len(), MATCH_LEN);
        assert_eq!(FlowMatch::decode(&buf).unwrap(), m);
    }

    #[test]
    fn test_exact_fields_round_trip() {
        let m = FlowMatch {
            dl_type: Some(0x0800),
            nw_proto: Some(6),
            nw_src: Some("10.0.0.10".parse().unwrap()),
            nw_dst: Some("10.0.0.100".parse().unwrap()),
            tp_src: Some(5000),
            ..Default::default()
        };

        let wildcards = m.wildcards();
        assert_eq!(wildcards & OFPFW_DL_TYPE, 0);
        assert_eq!(wildcards & OFPFW_NW_PROTO, 0);
        assert_eq!(wildcards & OFPFW_NW_SRC_MASK, 0);
        assert_eq!(wildcards & OFPFW_NW_DST_MASK, 0);
        assert_eq!(wildcards & OFPFW_TP_SRC, 0);
        assert_ne!(wildcards & OFPFW_TP_DST, 0);
        assert_ne!(wildcards & OFPFW_IN_PORT, 0);

        assert_eq!(FlowMatch::decode(&encode(&m)).unwrap(), m);
    }

    #[test]
    fn test_l2_fields_round_trip() {
        let m = FlowMatch {
            in_port: Some(4),
            dl_src: Some(MacAddr::new([0, 0, 0, 0, 0, 0x10])),
            dl_dst: Some(MacAddr::new([0, 0, 0, 0, 0, 0x01])),
            ..Default::default()
        };
        assert_eq!(FlowMatch::decode(&encode(&m)).unwrap(), m);
    }

    #[test]
    fn test_decode_truncated() {
        assert!(matches!(FlowMatch::decode(&[0u8; 39]), Err(Error::Truncated(_))));
    }
}
