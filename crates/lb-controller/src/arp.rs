//! ARP responder for the virtual IP.
//!
//! The virtual IP has no real host behind it, so the controller itself
//! answers ARP requests for it, claiming the virtual MAC. Replies go
//! straight out the ingress port as packet-outs; no flow rule is ever
//! installed for ARP, since every new flow is preceded by ARP and the
//! controller must keep seeing it.

use balancer::VirtualService;
use openflow::types::{OFP_NO_BUFFER, OFPP_NONE};
use openflow::{Action, PacketOut};
use packet::{ArpPacket, ETHERTYPE_ARP, EthernetFrame};
use tracing::debug;

pub struct ArpResponder {
    service: VirtualService,
}

impl ArpResponder {
    pub fn new(service: VirtualService) -> Self {
        Self { service }
    }

    /// Answer an ARP request targeting the virtual IP.
    ///
    /// Returns None for anything else — other ARP traffic belongs to
    /// the learning-switch path.
    pub fn respond(&self, frame: &EthernetFrame, in_port: u16) -> Option<PacketOut> {
        if frame.ethertype != ETHERTYPE_ARP {
            return None;
        }

        let request = ArpPacket::parse(&frame.payload).ok()?;
        if !request.is_request() || request.target_ip != self.service.ip {
            return None;
        }

        debug!(client = %request.sender_ip, in_port, "answering ARP for virtual IP");

        let reply = ArpPacket::reply(&request, self.service.ip, self.service.mac);
        let reply_frame = EthernetFrame {
            dst: request.sender_mac,
            src: self.service.mac,
            ethertype: ETHERTYPE_ARP,
            payload: reply.to_bytes(),
        };

        Some(PacketOut {
            buffer_id: OFP_NO_BUFFER,
            in_port: OFPP_NONE,
            actions: vec![Action::Output {
                port: in_port,
                max_len: 0,
            }],
            data: reply_frame.to_bytes(),
        })
    }
}
