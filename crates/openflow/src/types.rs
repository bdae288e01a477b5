//! OpenFlow 1.0 constants and enumerations.

/// Protocol version negotiated with the switch (0x01 = OpenFlow 1.0).
pub const OFP_VERSION: u8 = 0x01;

/// Length of the common message header.
pub const OFP_HEADER_LEN: usize = 8;

/// Sentinel meaning "packet not buffered on the switch".
pub const OFP_NO_BUFFER: u32 = 0xffff_ffff;

/// Flow-mod flag requesting a flow-removed message on expiry.
pub const OFPFF_SEND_FLOW_REM: u16 = 1 << 0;

// Message type codes (ofp_type).
pub const OFPT_HELLO: u8 = 0;
pub const OFPT_ERROR: u8 = 1;
pub const OFPT_ECHO_REQUEST: u8 = 2;
pub const OFPT_ECHO_REPLY: u8 = 3;
pub const OFPT_FEATURES_REQUEST: u8 = 5;
pub const OFPT_FEATURES_REPLY: u8 = 6;
pub const OFPT_PACKET_IN: u8 = 10;
pub const OFPT_FLOW_REMOVED: u8 = 11;
pub const OFPT_PACKET_OUT: u8 = 13;
pub const OFPT_FLOW_MOD: u8 = 14;

// Reserved port numbers (ofp_port).
pub const OFPP_IN_PORT: u16 = 0xfff8;
pub const OFPP_FLOOD: u16 = 0xfffb;
pub const OFPP_ALL: u16 = 0xfffc;
pub const OFPP_CONTROLLER: u16 = 0xfffd;
pub const OFPP_NONE: u16 = 0xffff;

/// Flow-mod command (ofp_flow_mod_command).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowModCommand {
    Add,
    Modify,
    ModifyStrict,
    Delete,
    DeleteStrict,
}

impl FlowModCommand {
    pub fn code(self) -> u16 {
        match self {
            FlowModCommand::Add => 0,
            FlowModCommand::Modify => 1,
            FlowModCommand::ModifyStrict => 2,
            FlowModCommand::Delete => 3,
            FlowModCommand::DeleteStrict => 4,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(FlowModCommand::Add),
            1 => Some(FlowModCommand::Modify),
            2 => Some(FlowModCommand::ModifyStrict),
            3 => Some(FlowModCommand::Delete),
            4 => Some(FlowModCommand::DeleteStrict),
            _ => None,
        }
    }
}

/// Why the switch removed a flow (ofp_flow_removed_reason).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowRemovedReason {
    IdleTimeout,
    HardTimeout,
    Delete,
}

impl FlowRemovedReason {
    pub fn code(self) -> u8 {
        match self {
            FlowRemovedReason::IdleTimeout => 0,
            FlowRemovedReason::HardTimeout => 1,
            FlowRemovedReason::Delete => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(FlowRemovedReason::IdleTimeout),
            1 => Some(FlowRemovedReason::HardTimeout),
            2 => Some(FlowRemovedReason::Delete),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FlowRemovedReason::IdleTimeout => "idle_timeout",
            FlowRemovedReason::HardTimeout => "hard_timeout",
            FlowRemovedReason::Delete => "delete",
        }
    }
}
