//! OpenFlow 1.0 message encoding and parsing.
//!
//! Every message shares an 8-byte header:
//!
//! ```text
//!  0         1         2        4                 8
//! +---------+---------+--------+-----------------+
//! | version |  type   | length |       xid       |
//! +---------+---------+--------+-----------------+
//! ```
//!
//! The transaction id is carried alongside the decoded message rather
//! than inside it, so replies can echo the peer's xid.

use crate::Error;
use crate::actions::{self, Action};
use crate::flowmatch::{FlowMatch, MATCH_LEN};
use crate::types::{
    FlowModCommand, FlowRemovedReason, OFP_HEADER_LEN, OFP_VERSION, OFPT_ECHO_REPLY,
    OFPT_ECHO_REQUEST, OFPT_ERROR, OFPT_FEATURES_REPLY, OFPT_FEATURES_REQUEST, OFPT_FLOW_MOD,
    OFPT_FLOW_REMOVED, OFPT_HELLO, OFPT_PACKET_IN, OFPT_PACKET_OUT,
};
use bytes::{BufMut, Bytes, BytesMut};

/// Switch features advertised in the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeaturesReply {
    pub datapath_id: u64,
    pub n_buffers: u32,
    pub n_tables: u8,
    pub capabilities: u32,
    pub actions: u32,
}

/// A packet the switch had no rule for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketIn {
    pub buffer_id: u32,
    pub total_len: u16,
    pub in_port: u16,
    pub reason: u8,
    pub data: Bytes,
}

/// Notification that an installed rule expired or was deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowRemoved {
    pub match_fields: FlowMatch,
    pub cookie: u64,
    pub priority: u16,
    pub reason: FlowRemovedReason,
    pub duration_sec: u32,
    pub duration_nsec: u32,
    pub idle_timeout: u16,
    pub packet_count: u64,
    pub byte_count: u64,
}

/// Controller-originated packet transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketOut {
    pub buffer_id: u32,
    pub in_port: u16,
    pub actions: Vec<Action>,
    /// Payload frame; ignored by the switch when `buffer_id` is set.
    pub data: Bytes,
}

/// Flow table modification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowMod {
    pub match_fields: FlowMatch,
    pub cookie: u64,
    pub command: FlowModCommand,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    pub priority: u16,
    pub buffer_id: u32,
    pub out_port: u16,
    pub flags: u16,
    pub actions: Vec<Action>,
}

/// Error reported by the switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMsg {
    pub error_type: u16,
    pub code: u16,
    pub data: Bytes,
}

/// An OpenFlow message, transaction id excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Hello,
    Error(ErrorMsg),
    EchoRequest(Bytes),
    EchoReply(Bytes),
    FeaturesRequest,
    FeaturesReply(FeaturesReply),
    PacketIn(PacketIn),
    FlowRemoved(FlowRemoved),
    PacketOut(PacketOut),
    FlowMod(FlowMod),
    /// Message type the controller does not interpret (port status,
    /// stats replies). Carried so sessions can skip it without erroring.
    Other { msg_type: u8 },
}

impl Message {
    /// Wire message type code.
    pub fn type_code(&self) -> u8 {
        match self {
            Message::Hello => OFPT_HELLO,
            Message::Error(_) => OFPT_ERROR,
            Message::EchoRequest(_) => OFPT_ECHO_REQUEST,
            Message::EchoReply(_) => OFPT_ECHO_REPLY,
            Message::FeaturesRequest => OFPT_FEATURES_REQUEST,
            Message::FeaturesReply(_) => OFPT_FEATURES_REPLY,
            Message::PacketIn(_) => OFPT_PACKET_IN,
            Message::FlowRemoved(_) => OFPT_FLOW_REMOVED,
            Message::PacketOut(_) => OFPT_PACKET_OUT,
            Message::FlowMod(_) => OFPT_FLOW_MOD,
            Message::Other { msg_type } => *msg_type,
        }
    }

    /// Serialize with the given transaction id.
    pub fn to_bytes(&self, xid: u32) -> Bytes {
        let mut body = BytesMut::new();
        self.encode_body(&mut body);

        let mut buf = BytesMut::with_capacity(OFP_HEADER_LEN + body.len());
        buf.put_u8(OFP_VERSION);
        buf.put_u8(self.type_code());
        buf.put_u16((OFP_HEADER_LEN + body.len()) as u16);
        buf.put_u32(xid);
        buf.put_slice(&body);
        buf.freeze()
    }

    fn encode_body(&self, buf: &mut BytesMut) {
        match self {
            Message::Hello | Message::FeaturesRequest | Message::Other { .. } => {}
            Message::Error(err) => {
                buf.put_u16(err.error_type);
                buf.put_u16(err.code);
                buf.put_slice(&err.data);
            }
            Message::EchoRequest(data) | Message::EchoReply(data) => {
                buf.put_slice(data);
            }
            Message::FeaturesReply(features) => {
                buf.put_u64(features.datapath_id);
                buf.put_u32(features.n_buffers);
                buf.put_u8(features.n_tables);
                buf.put_slice(&[0u8; 3]);
                buf.put_u32(features.capabilities);
                buf.put_u32(features.actions);
            }
            Message::PacketIn(packet_in) => {
                buf.put_u32(packet_in.buffer_id);
                buf.put_u16(packet_in.total_len);
                buf.put_u16(packet_in.in_port);
                buf.put_u8(packet_in.reason);
                buf.put_u8(0);
                buf.put_slice(&packet_in.data);
            }
            Message::FlowRemoved(removed) => {
                removed.match_fields.encode(buf);
                buf.put_u64(removed.cookie);
                buf.put_u16(removed.priority);
                buf.put_u8(removed.reason.code());
                buf.put_u8(0);
                buf.put_u32(removed.duration_sec);
                buf.put_u32(removed.duration_nsec);
                buf.put_u16(removed.idle_timeout);
                buf.put_slice(&[0u8; 2]);
                buf.put_u64(removed.packet_count);
                buf.put_u64(removed.byte_count);
            }
            Message::PacketOut(packet_out) => {
                buf.put_u32(packet_out.buffer_id);
                buf.put_u16(packet_out.in_port);
                buf.put_u16(actions::encoded_len(&packet_out.actions) as u16);
                for action in &packet_out.actions {
                    action.encode(buf);
                }
                buf.put_slice(&packet_out.data);
            }
            Message::FlowMod(flow_mod) => {
                flow_mod.match_fields.encode(buf);
                buf.put_u64(flow_mod.cookie);
                buf.put_u16(flow_mod.command.code());
                buf.put_u16(flow_mod.idle_timeout);
                buf.put_u16(flow_mod.hard_timeout);
                buf.put_u16(flow_mod.priority);
                buf.put_u32(flow_mod.buffer_id);
                buf.put_u16(flow_mod.out_port);
                buf.put_u16(flow_mod.flags);
                for action in &flow_mod.actions {
                    action.encode(buf);
                }
            }
        }
    }

    /// Parse one complete frame, returning its transaction id.
    pub fn parse(frame: &[u8]) -> Result<(u32, Message), Error> {
        if frame.len() < OFP_HEADER_LEN {
            return Err(Error::Truncated("message header"));
        }

        let version = frame[0];
        let msg_type = frame[1];
        let length = u16::from_be_bytes([frame[2], frame[3]]) as usize;
        let xid = u32::from_be_bytes([frame[4], frame[5], frame[6], frame[7]]);

        if version != OFP_VERSION {
            return Err(Error::Version(version));
        }
        if length < OFP_HEADER_LEN || length != frame.len() {
            return Err(Error::Invalid("message length"));
        }

        let body = &frame[OFP_HEADER_LEN..];
        let message = match msg_type {
            OFPT_HELLO => Message::Hello,
            OFPT_ERROR => {
                if body.len() < 4 {
                    return Err(Error::Truncated("error message"));
                }
                Message::Error(ErrorMsg {
                    error_type: u16::from_be_bytes([body[0], body[1]]),
                    code: u16::from_be_bytes([body[2], body[3]]),
                    data: Bytes::copy_from_slice(&body[4..]),
                })
            }
            OFPT_ECHO_REQUEST => Message::EchoRequest(Bytes::copy_from_slice(body)),
            OFPT_ECHO_REPLY => Message::EchoReply(Bytes::copy_from_slice(body)),
            OFPT_FEATURES_REQUEST => Message::FeaturesRequest,
            OFPT_FEATURES_REPLY => Message::FeaturesReply(decode_features_reply(body)?),
            OFPT_PACKET_IN => Message::PacketIn(decode_packet_in(body)?),
            OFPT_FLOW_REMOVED => Message::FlowRemoved(decode_flow_removed(body)?),
            OFPT_PACKET_OUT => Message::PacketOut(decode_packet_out(body)?),
            OFPT_FLOW_MOD => Message::FlowMod(decode_flow_mod(body)?),
            other => Message::Other { msg_type: other },
        };

        Ok((xid, message))
    }
}

fn read_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([data[offset], data[offset + 1]])
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}

fn read_u64(data: &[u8], offset: usize) -> u64 {
    (u64::from(read_u32(data, offset)) << 32) | u64::from(read_u32(data, offset + 4))
}

fn decode_features_reply(body: &[u8]) -> Result<FeaturesReply, Error> {
    // Trailing 48-byte physical port descriptions are not interpreted.
    if body.len() < 24 {
        return Err(Error::Truncated("features reply"));
    }
    Ok(FeaturesReply {
        datapath_id: read_u64(body, 0),
        n_buffers: read_u32(body, 8),
        n_tables: body[12],
        capabilities: read_u32(body, 16),
        actions: read_u32(body, 20),
    })
}

fn decode_packet_in(body: &[u8]) -> Result<PacketIn, Error> {
    if body.len() < 10 {
        return Err(Error::Truncated("packet-in"));
    }
    Ok(PacketIn {
        buffer_id: read_u32(body, 0),
        total_len: read_u16(body, 4),
        in_port: read_u16(body, 6),
        reason: body[8],
        data: Bytes::copy_from_slice(&body[10..]),
    })
}

fn decode_flow_removed(body: &[u8]) -> Result<FlowRemoved, Error> {
    if body.len() < MATCH_LEN + 40 {
        return Err(Error::Truncated("flow-removed"));
    }
    let match_fields = FlowMatch::decode(&body[..MATCH_LEN])?;
    let reason = FlowRemovedReason::from_code(body[50]).ok_or(Error::Invalid("flow-removed reason"))?;
    Ok(FlowRemoved {
        match_fields,
        cookie: read_u64(body, 40),
        priority: read_u16(body, 48),
        reason,
        duration_sec: read_u32(body, 52),
        duration_nsec: read_u32(body, 56),
        idle_timeout: read_u16(body, 60),
        packet_count: read_u64(body, 64),
        byte_count: read_u64(body, 72),
    })
}

fn decode_packet_out(body: &[u8]) -> Result<PacketOut, Error> {
    if body.len() < 8 {
        return Err(Error::Truncated("packet-out"));
    }
    let actions_len = read_u16(body, 6) as usize;
    if body.len() < 8 + actions_len {
        return Err(Error::Truncated("packet-out actions"));
    }
    Ok(PacketOut {
        buffer_id: read_u32(body, 0),
        in_port: read_u16(body, 4),
        actions: Action::decode_list(&body[8..8 + actions_len])?,
        data: Bytes::copy_from_slice(&body[8 + actions_len..]),
    })
}

fn decode_flow_mod(body: &[u8]) -> Result<FlowMod, Error> {
    if body.len() < MATCH_LEN + 24 {
        return Err(Error::Truncated("flow-mod"));
    }
    let match_fields = FlowMatch::decode(&body[..MATCH_LEN])?;
    let command = FlowModCommand::from_code(read_u16(body, 48)).ok_or(Error::Invalid("flow-mod command"))?;
    Ok(FlowMod {
        match_fields,
        cookie: read_u64(body, 40),
        command,
        idle_timeout: read_u16(body, 50),
        hard_timeout: read_u16(body, 52),
        priority: read_u16(body, 54),
        buffer_id: read_u32(body, 56),
        out_port: read_u16(body, 60),
        flags: read_u16(body, 62),
        actions: Action::decode_list(&body[64..])?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OFP_NO_BUFFER, OFPFF_SEND_FLOW_REM, OFPP_NONE};
    use packet::MacAddr;

    fn round_trip(message: Message, xid: u32) -> Message {
        let bytes = message.to_bytes(xid);
        let (parsed_xid, parsed) = Message::parse(&bytes).unwrap();
        assert_eq!(parsed_xid, xid);
        parsed
    }

    #[test]
    fn test_hello_round_trip() {
        assert_eq!(round_trip(Message::Hello, 1), Message::Hello);
    }

    #[test]
    fn test_echo_round_trip() {
        let message = Message::EchoRequest(Bytes::from_static(b"ping"));
        assert_eq!(round_trip(message.clone(), 7), message);

        let reply = Message::EchoReply(Bytes::from_static(b"ping"));
        assert_eq!(round_trip(reply.clone(), 7), reply);
    }

    #[test]
    fn test_features_reply_round_trip() {
        let message = Message::FeaturesReply(FeaturesReply {
            datapath_id: 0x0000_0000_0000_0001,
            n_buffers: 256,
            n_tables: 1,
            capabilities: 0xc7,
            actions: 0xfff,
        });
        assert_eq!(round_trip(message.clone(), 2), message);
    }

    #[test]
    fn test_packet_in_round_trip() {
        let message = Message::PacketIn(PacketIn {
            buffer_id: 42,
            total_len: 60,
            in_port: 4,
            reason: 0,
            data: Bytes::from_static(&[0xaa; 60]),
        });
        assert_eq!(round_trip(message.clone(), 3), message);
    }

    #[test]
    fn test_flow_mod_round_trip() {
        let message = Message::FlowMod(FlowMod {
            match_fields: FlowMatch {
                dl_type: Some(0x0800),
                nw_proto: Some(6),
                nw_src: Some("10.0.0.10".parse().unwrap()),
                nw_dst: Some("10.0.0.100".parse().unwrap()),
                tp_src: Some(5000),
                ..Default::default()
            },
            cookie: 0,
            command: FlowModCommand::Add,
            idle_timeout: 10,
            hard_timeout: 30,
            priority: 100,
            buffer_id: OFP_NO_BUFFER,
            out_port: OFPP_NONE,
            flags: OFPFF_SEND_FLOW_REM,
            actions: vec![
                Action::SetDlDst(MacAddr::new([0, 0, 0, 0, 0, 0x01])),
                Action::SetNwDst("10.0.0.1".parse().unwrap()),
                Action::Output { port: 1, max_len: 0 },
            ],
        });
        assert_eq!(round_trip(message.clone(), 4), message);
    }

    #[test]
    fn test_flow_removed_round_trip() {
        let message = Message::FlowRemoved(FlowRemoved {
            match_fields: FlowMatch {
                dl_type: Some(0x0800),
                nw_proto: Some(17),
                nw_src: Some("10.0.0.11".parse().unwrap()),
                tp_src: Some(5001),
                ..Default::default()
            },
            cookie: 0,
            priority: 100,
            reason: FlowRemovedReason::IdleTimeout,
            duration_sec: 12,
            duration_nsec: 0,
            idle_timeout: 10,
            packet_count: 9,
            byte_count: 1234,
        });
        assert_eq!(round_trip(message.clone(), 5), message);
    }

    #[test]
    fn test_packet_out_round_trip() {
        let message = Message::PacketOut(PacketOut {
            buffer_id: OFP_NO_BUFFER,
            in_port: OFPP_NONE,
            actions: vec![Action::Output { port: 4, max_len: 0 }],
            data: Bytes::from_static(&[0xbb; 42]),
        });
        assert_eq!(round_trip(message.clone(), 6), message);
    }

    #[test]
    fn test_unknown_type_preserved() {
        // PORT_STATUS (12) is not interpreted.
        let bytes = Message::Other { msg_type: 12 }.to_bytes(9);
        let (_, parsed) = Message::parse(&bytes).unwrap();
        assert_eq!(parsed, Message::Other { msg_type: 12 });
    }

    #[test]
    fn test_rejects_wrong_version() {
        let mut bytes = BytesMut::from(&Message::Hello.to_bytes(1)[..]);
        bytes[0] = 0x04; // OpenFlow 1.3
        assert!(matches!(Message::parse(&bytes), Err(Error::Version(0x04))));
    }

    #[test]
    fn test_rejects_length_mismatch() {
        let mut bytes = BytesMut::from(&Message::Hello.to_bytes(1)[..]);
        bytes[3] = 16; // claims 16 bytes, frame has 8
        assert!(matches!(Message::parse(&bytes), Err(Error::Invalid(_))));
    }
}
