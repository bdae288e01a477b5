//! Translation of balancing decisions into switch flow rules.
//!
//! Each decision becomes an asymmetric rule pair: client→VIP traffic is
//! rewritten toward the backend, backend→client traffic is rewritten
//! back to the virtual address. Both carry idle timeouts so the switch
//! ages out finished connections on its own; only the forward rule
//! requests a flow-removed notification, so each connection decrements
//! the load counter exactly once.

use balancer::{Backend, ConnectionKey, VirtualService};
use bytes::Bytes;
use openflow::types::{
    FlowModCommand, OFP_NO_BUFFER, OFPFF_SEND_FLOW_REM, OFPP_CONTROLLER, OFPP_NONE,
};
use openflow::{Action, FlowMatch, FlowMod, Message, PacketOut};
use packet::{ETHERTYPE_IPV4, MacAddr};
use std::time::Duration;

/// Idle timeout for learning-switch rules.
const LEARNED_FLOW_IDLE_SECS: u16 = 10;

/// Priority of learning-switch rules: above the table-miss rule,
/// below load-balancing rules.
const LEARNED_FLOW_PRIORITY: u16 = 10;

/// Full-packet send length for the table-miss rule.
const MISS_SEND_LEN: u16 = 0xffff;

pub struct FlowInstaller {
    service: VirtualService,
    idle_timeout: u16,
    hard_timeout: u16,
    priority: u16,
}

impl FlowInstaller {
    pub fn new(service: VirtualService, idle_timeout: Duration, hard_timeout: Duration, priority: u16) -> Self {
        Self {
            service,
            idle_timeout: clamp_secs(idle_timeout),
            hard_timeout: clamp_secs(hard_timeout),
            priority,
        }
    }

    /// Messages installing a flow's rule pair and delivering its first
    /// packet.
    ///
    /// The reverse rule goes first so return traffic has a rule by the
    /// time the backend answers. If the switch buffered the packet the
    /// forward flow-mod releases the buffer; otherwise the raw frame is
    /// re-emitted through a packet-out with the same rewrite actions.
    pub fn install(
        &self,
        key: &ConnectionKey,
        backend: &Backend,
        client_port_no: u16,
        buffer_id: u32,
        frame: Bytes,
    ) -> Vec<Message> {
        let mut messages = Vec::with_capacity(3);
        messages.push(Message::FlowMod(self.reverse_rule(key, backend, client_port_no)));
        messages.push(Message::FlowMod(self.forward_rule(key, backend, buffer_id)));

        if buffer_id == OFP_NO_BUFFER {
            messages.push(Message::PacketOut(PacketOut {
                buffer_id: OFP_NO_BUFFER,
                in_port: client_port_no,
                actions: self.forward_actions(backend),
                data: frame,
            }));
        }

        messages
    }

    fn forward_actions(&self, backend: &Backend) -> Vec<Action> {
        vec![
            Action::SetDlDst(backend.mac),
            Action::SetNwDst(backend.ip),
            Action::Output {
                port: backend.port,
                max_len: 0,
            },
        ]
    }

    fn forward_rule(&self, key: &ConnectionKey, backend: &Backend, buffer_id: u32) -> FlowMod {
        FlowMod {
            match_fields: FlowMatch {
                dl_type: Some(ETHERTYPE_IPV4),
                nw_proto: Some(key.protocol.nw_proto()),
                nw_src: Some(key.client_ip),
                nw_dst: Some(self.service.ip),
                tp_src: Some(key.client_port),
                ..Default::default()
            },
            cookie: 0,
            command: FlowModCommand::Add,
            idle_timeout: self.idle_timeout,
            hard_timeout: self.hard_timeout,
            priority: self.priority,
            buffer_id,
            out_port: OFPP_NONE,
            flags: OFPFF_SEND_FLOW_REM,
            actions: self.forward_actions(backend),
        }
    }

    fn reverse_rule(&self, key: &ConnectionKey, backend: &Backend, client_port_no: u16) -> FlowMod {
        FlowMod {
            match_fields: FlowMatch {
                dl_type: Some(ETHERTYPE_IPV4),
                nw_proto: Some(key.protocol.nw_proto()),
                nw_src: Some(backend.ip),
                nw_dst: Some(key.client_ip),
                tp_dst: Some(key.client_port),
                ..Default::default()
            },
            cookie: 0,
            command: FlowModCommand::Add,
            idle_timeout: self.idle_timeout,
            hard_timeout: self.hard_timeout,
            priority: self.priority,
            buffer_id: OFP_NO_BUFFER,
            out_port: OFPP_NONE,
            flags: 0,
            actions: vec![
                Action::SetDlSrc(self.service.mac),
                Action::SetNwSrc(self.service.ip),
                Action::Output {
                    port: client_port_no,
                    max_len: 0,
                },
            ],
        }
    }

    /// Messages forwarding a learned unicast destination, with a
    /// short-lived rule to avoid repeated controller trips.
    pub fn learned(
        &self,
        dl_src: MacAddr,
        dl_dst: MacAddr,
        out_port: u16,
        buffer_id: u32,
        frame: Bytes,
    ) -> Vec<Message> {
        let mut messages = vec![Message::FlowMod(FlowMod {
            match_fields: FlowMatch {
                dl_src: Some(dl_src),
                dl_dst: Some(dl_dst),
                ..Default::default()
            },
            cookie: 0,
            command: FlowModCommand::Add,
            idle_timeout: LEARNED_FLOW_IDLE_SECS,
            hard_timeout: 0,
            priority: LEARNED_FLOW_PRIORITY,
            buffer_id,
            out_port: OFPP_NONE,
            flags: 0,
            actions: vec![Action::Output {
                port: out_port,
                max_len: 0,
            }],
        })];

        if buffer_id == OFP_NO_BUFFER {
            messages.push(Message::PacketOut(PacketOut {
                buffer_id: OFP_NO_BUFFER,
                in_port: OFPP_NONE,
                actions: vec![Action::Output {
                    port: out_port,
                    max_len: 0,
                }],
                data: frame,
            }));
        }

        messages
    }

    /// Delete every rule in the switch's table.
    pub fn clear_rules() -> Message {
        Message::FlowMod(FlowMod {
            match_fields: FlowMatch::any(),
            cookie: 0,
            command: FlowModCommand::Delete,
            idle_timeout: 0,
            hard_timeout: 0,
            priority: 0,
            buffer_id: OFP_NO_BUFFER,
            out_port: OFPP_NONE,
            flags: 0,
            actions: Vec::new(),
        })
    }

    /// Priority-0 catch-all sending unmatched packets to the controller.
    pub fn miss_rule() -> Message {
        Message::FlowMod(FlowMod {
            match_fields: FlowMatch::any(),
            cookie: 0,
            command: FlowModCommand::Add,
            idle_timeout: 0,
            hard_timeout: 0,
            priority: 0,
            buffer_id: OFP_NO_BUFFER,
            out_port: OFPP_NONE,
            flags: 0,
            actions: vec![Action::Output {
                port: OFPP_CONTROLLER,
                max_len: MISS_SEND_LEN,
            }],
        })
    }
}

fn clamp_secs(duration: Duration) -> u16 {
    duration.as_secs().min(u16::MAX as u64) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use balancer::Protocol;
    use std::net::Ipv4Addr;

    fn installer() -> FlowInstaller {
        FlowInstaller::new(
            VirtualService {
                ip: Ipv4Addr::new(10, 0, 0, 100),
                mac: MacAddr::new([0, 0, 0, 0, 0, 0xff]),
            },
            Duration::from_secs(10),
            Duration::from_secs(30),
            100,
        )
    }

    fn key() -> ConnectionKey {
        ConnectionKey {
            client_ip: "10.0.0.10".parse().unwrap(),
            client_port: 5000,
            protocol: Protocol::Tcp,
        }
    }

    fn backend() -> Backend {
        Backend::new("10.0.0.1".parse().unwrap(), MacAddr::new([0, 0, 0, 0, 0, 1]), 1)
    }

    fn as_flow_mod(message: &Message) -> &FlowMod {
        match message {
            Message::FlowMod(flow_mod) => flow_mod,
            other => panic!("expected flow-mod, got {other:?}"),
        }
    }

    #[test]
    fn test_unbuffered_install_emits_pair_and_packet_out() {
        let frame = Bytes::from_static(&[0xaa; 64]);
        let messages = installer().install(&key(), &backend(), 4, OFP_NO_BUFFER, frame.clone());
        assert_eq!(messages.len(), 3);

        let reverse = as_flow_mod(&messages[0]);
        let forward = as_flow_mod(&messages[1]);

        // Forward: client→VIP rewritten toward the backend.
        assert_eq!(forward.match_fields.nw_src, Some("10.0.0.10".parse().unwrap()));
        assert_eq!(forward.match_fields.nw_dst, Some("10.0.0.100".parse().unwrap()));
        assert_eq!(forward.match_fields.tp_src, Some(5000));
        assert_eq!(forward.match_fields.nw_proto, Some(6));
        assert_eq!(forward.flags, OFPFF_SEND_FLOW_REM);
        assert_eq!(forward.idle_timeout, 10);
        assert_eq!(forward.hard_timeout, 30);
        assert_eq!(
            forward.actions,
            vec![
                Action::SetDlDst(backend().mac),
                Action::SetNwDst(backend().ip),
                Action::Output { port: 1, max_len: 0 },
            ]
        );

        // Reverse: backend→client rewritten back to the virtual address.
        assert_eq!(reverse.match_fields.nw_src, Some("10.0.0.1".parse().unwrap()));
        assert_eq!(reverse.match_fields.nw_dst, Some("10.0.0.10".parse().unwrap()));
        assert_eq!(reverse.match_fields.tp_dst, Some(5000));
        assert_eq!(reverse.flags, 0);
        assert_eq!(
            reverse.actions,
            vec![
                Action::SetDlSrc(MacAddr::new([0, 0, 0, 0, 0, 0xff])),
                Action::SetNwSrc("10.0.0.100".parse::<Ipv4Addr>().unwrap()),
                Action::Output { port: 4, max_len: 0 },
            ]
        );

        // First packet re-emitted with the forward rewrite.
        match &messages[2] {
            Message::PacketOut(packet_out) => {
                assert_eq!(packet_out.data, frame);
                assert_eq!(packet_out.in_port, 4);
                assert_eq!(packet_out.actions, forward.actions);
            }
            other => panic!("expected packet-out, got {other:?}"),
        }
    }

    #[test]
    fn test_buffered_install_releases_buffer() {
        let messages = installer().install(&key(), &backend(), 4, 77, Bytes::new());
        assert_eq!(messages.len(), 2);
        assert_eq!(as_flow_mod(&messages[1]).buffer_id, 77);
    }

    #[test]
    fn test_clear_and_miss_rules() {
        match FlowInstaller::clear_rules() {
            Message::FlowMod(flow_mod) => {
                assert_eq!(flow_mod.command, FlowModCommand::Delete);
                assert_eq!(flow_mod.match_fields, FlowMatch::any());
            }
            other => panic!("expected flow-mod, got {other:?}"),
        }

        match FlowInstaller::miss_rule() {
            Message::FlowMod(flow_mod) => {
                assert_eq!(flow_mod.command, FlowModCommand::Add);
                assert_eq!(flow_mod.priority, 0);
                assert_eq!(
                    flow_mod.actions,
                    vec![Action::Output { port: OFPP_CONTROLLER, max_len: MISS_SEND_LEN }]
                );
            }
            other => panic!("expected flow-mod, got {other:?}"),
        }
    }

    #[test]
    fn test_learned_rule_is_short_lived_and_low_priority() {
        let src = MacAddr::new([0, 0, 0, 0, 0, 0x10]);
        let dst = MacAddr::new([0, 0, 0, 0, 0, 0x11]);
        let messages = installer().learned(src, dst, 5, OFP_NO_BUFFER, Bytes::from_static(&[1, 2]));
        assert_eq!(messages.len(), 2);

        let rule = as_flow_mod(&messages[0]);
        assert_eq!(rule.match_fields.dl_src, Some(src));
        assert_eq!(rule.match_fields.dl_dst, Some(dst));
        assert_eq!(rule.idle_timeout, LEARNED_FLOW_IDLE_SECS);
        assert_eq!(rule.priority, LEARNED_FLOW_PRIORITY);
        assert_eq!(rule.flags, 0);
    }
}
