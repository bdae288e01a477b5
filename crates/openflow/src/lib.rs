//! OpenFlow 1.0 wire protocol.
//!
//! Covers the message subset a load-balancing controller exchanges with
//! a switch: HELLO/ECHO keepalives, FEATURES handshake, PACKET_IN,
//! PACKET_OUT, FLOW_MOD, and FLOW_REMOVED, plus the 40-byte match
//! structure and the action list encoding those messages carry. A
//! `tokio_util::codec` implementation frames the TCP control channel.

pub mod actions;
pub mod codec;
pub mod flowmatch;
pub mod messages;
pub mod types;

pub use actions::Action;
pub use codec::OpenflowCodec;
pub use flowmatch::FlowMatch;
pub use messages::{FeaturesReply, FlowMod, FlowRemoved, Message, PacketIn, PacketOut};
pub use types::{
    FlowModCommand, FlowRemovedReason, OFP_NO_BUFFER, OFP_VERSION, OFPFF_SEND_FLOW_REM,
    OFPP_CONTROLLER, OFPP_FLOOD, OFPP_NONE,
};

/// OpenFlow protocol error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported OpenFlow version {0:#04x}")]
    Version(u8),

    #[error("truncated {0}")]
    Truncated(&'static str),

    #[error("invalid {0}")]
    Invalid(&'static str),
}
