//! Length-delimited framing for the OpenFlow TCP control channel.
//!
//! OpenFlow messages are self-describing: byte 2..4 of the common
//! header carries the total frame length, so the decoder waits for a
//! full frame before handing it to the message parser.

use crate::Error;
use crate::messages::Message;
use crate::types::OFP_HEADER_LEN;
use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

/// Codec turning a byte stream into `(xid, Message)` frames.
#[derive(Debug, Default)]
pub struct OpenflowCodec;

impl Decoder for OpenflowCodec {
    type Item = (u32, Message);
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Error> {
        if src.len() < OFP_HEADER_LEN {
            return Ok(None);
        }

        let length = u16::from_be_bytes([src[2], src[3]]) as usize;
        if length < OFP_HEADER_LEN {
            return Err(Error::Invalid("message length"));
        }
        if src.len() < length {
            src.reserve(length - src.len());
            return Ok(None);
        }

        let frame = src.split_to(length);
        Message::parse(&frame).map(Some)
    }
}

impl Encoder<(u32, Message)> for OpenflowCodec {
    type Error = Error;

    fn encode(&mut self, item: (u32, Message), dst: &mut BytesMut) -> Result<(), Error> {
        let (xid, message) = item;
        dst.extend_from_slice(&message.to_bytes(xid));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::PacketIn;
    use bytes::Bytes;

    #[test]
    fn test_decode_waits_for_full_frame() {
        let message = Message::PacketIn(PacketIn {
            buffer_id: 1,
            total_len: 4,
            in_port: 2,
            reason: 0,
            data: Bytes::from_static(&[1, 2, 3, 4]),
        });
        let wire = message.to_bytes(11);

        let mut codec = OpenflowCodec;
        let mut buf = BytesMut::new();

        // Header alone is not enough.
        buf.extend_from_slice(&wire[..OFP_HEADER_LEN]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        // Remainder completes the frame.
        buf.extend_from_slice(&wire[OFP_HEADER_LEN..]);
        let (xid, decoded) = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(xid, 11);
        assert_eq!(decoded, message);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_back_to_back_frames() {
        let mut codec = OpenflowCodec;
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&Message::Hello.to_bytes(1));
        buf.extend_from_slice(&Message::EchoRequest(Bytes::from_static(b"hi")).to_bytes(2));

        assert_eq!(codec.decode(&mut buf).unwrap(), Some((1, Message::Hello)));
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some((2, Message::EchoRequest(Bytes::from_static(b"hi"))))
        );
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_encode_then_decode() {
        let mut codec = OpenflowCodec;
        let mut buf = BytesMut::new();
        codec.encode((3, Message::FeaturesRequest), &mut buf).unwrap();

        let (xid, decoded) = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(xid, 3);
        assert_eq!(decoded, Message::FeaturesRequest);
    }

    #[test]
    fn test_decode_rejects_undersized_length() {
        let mut codec = OpenflowCodec;
        let mut buf = BytesMut::from(&[0x01u8, 0x00, 0x00, 0x04, 0, 0, 0, 1][..]);
        assert!(codec.decode(&mut buf).is_err());
    }
}
