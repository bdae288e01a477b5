//! The controller event loop.
//!
//! A single reactor task owns every piece of mutable balancing state:
//! the backend registry, the connection table, the per-switch host
//! tables, and the policy cursor. Switch sessions feed it one bounded
//! event queue, so events from a single switch are handled strictly in
//! arrival order and nothing here needs a lock.

use crate::arp::ArpResponder;
use crate::config::Config;
use crate::installer::FlowInstaller;
use crate::stats::{self, StatsEvent, StatsReporter};
use balancer::{
    BackendRegistry, ConnectionKey, ConnectionTable, DatapathId, Protocol, SelectionPolicy,
    VirtualService, policy,
};
use common::{Error, Result};
use openflow::types::{OFP_NO_BUFFER, OFPP_FLOOD};
use openflow::{Action, FlowRemoved, Message, PacketIn, PacketOut};
use packet::{ETHERTYPE_ARP, ETHERTYPE_IPV4, EthernetFrame, Ipv4Packet, MacAddr};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Inbound control-plane event, one queue entry per switch message.
#[derive(Debug)]
pub enum Event {
    SwitchConnected {
        dpid: DatapathId,
        outbound: mpsc::Sender<Message>,
    },
    PacketIn {
        dpid: DatapathId,
        packet: PacketIn,
    },
    FlowRemoved {
        dpid: DatapathId,
        removed: FlowRemoved,
    },
    SwitchDisconnected {
        dpid: DatapathId,
    },
}

/// Per-switch state: the outbound channel and passively learned host
/// locations for plain forwarding.
struct SwitchHandle {
    outbound: mpsc::Sender<Message>,
    hosts: HashMap<MacAddr, u16>,
}

pub struct Controller {
    service: VirtualService,
    registry: BackendRegistry,
    policy: Box<dyn SelectionPolicy>,
    connections: ConnectionTable,
    installer: FlowInstaller,
    responder: ArpResponder,
    stats: StatsReporter,
    switches: HashMap<DatapathId, SwitchHandle>,
    /// Records idle past this are swept even without a flow-removed;
    /// twice the rule idle timeout leaves the switch room to notify
    /// first.
    sweep_after: Duration,
    sweep_interval: Duration,
    report_interval: Duration,
    total_requests: u64,
    started_at: Instant,
}

impl Controller {
    pub fn new(config: &Config, stats: StatsReporter) -> Result<Self> {
        let service = config.virtual_service();
        let policy = policy::from_name(&config.balancing.policy)
            .ok_or_else(|| Error::config(format!("unknown policy '{}'", config.balancing.policy)))?;

        info!(
            policy = %config.balancing.policy,
            virtual_ip = %service.ip,
            virtual_mac = %service.mac,
            backends = config.backends.len(),
            "controller initialized"
        );
        for (index, backend) in config.backends.iter().enumerate() {
            info!(index = index + 1, ip = %backend.ip, mac = %backend.mac, port = backend.port, "backend");
        }

        Ok(Self {
            service,
            registry: BackendRegistry::new(config.backend_pool()),
            policy,
            connections: ConnectionTable::new(),
            installer: FlowInstaller::new(
                service,
                config.balancing.idle_timeout,
                config.balancing.hard_timeout,
                config.balancing.flow_priority,
            ),
            responder: ArpResponder::new(service),
            stats,
            switches: HashMap::new(),
            sweep_after: config.balancing.idle_timeout * 2,
            sweep_interval: config.balancing.sweep_interval,
            report_interval: config.stats.report_interval,
            total_requests: 0,
            started_at: Instant::now(),
        })
    }

    /// Consume the event queue until every sender is gone.
    pub async fn run(mut self, mut events: mpsc::Receiver<Event>) {
        info!("controller event loop started");

        let mut sweep = tokio::time::interval(self.sweep_interval);
        sweep.tick().await; // Skip first immediate tick
        let mut report = tokio::time::interval(self.report_interval);
        report.tick().await;

        loop {
            tokio::select! {
                maybe_event = events.recv() => match maybe_event {
                    Some(event) => self.handle_event(event).await,
                    None => break,
                },
                _ = sweep.tick() => self.sweep_idle(),
                _ = report.tick() => self.report_summary(),
            }
        }

        info!("controller event loop stopped");
    }

    /// Dispatch one event. Never fails: transient protocol errors are
    /// logged and dropped.
    pub async fn handle_event(&mut self, event: Event) {
        match event {
            Event::SwitchConnected { dpid, outbound } => self.handle_connect(dpid, outbound).await,
            Event::PacketIn { dpid, packet } => self.handle_packet_in(dpid, packet).await,
            Event::FlowRemoved { dpid, removed } => self.handle_flow_removed(dpid, &removed),
            Event::SwitchDisconnected { dpid } => self.handle_disconnect(dpid),
        }
    }

    async fn handle_connect(&mut self, dpid: DatapathId, outbound: mpsc::Sender<Message>) {
        // A reconnect under the same dpid starts from a clean slate.
        let stale = self.connections.purge_switch(dpid, &mut self.registry);
        if !stale.is_empty() {
            debug!(dpid, count = stale.len(), "dropped stale connection records");
        }

        self.switches.insert(
            dpid,
            SwitchHandle {
                outbound,
                hosts: HashMap::new(),
            },
        );
        info!(dpid, "switch connected");

        self.send(dpid, FlowInstaller::clear_rules()).await;
        self.send(dpid, FlowInstaller::miss_rule()).await;
    }

    async fn handle_packet_in(&mut self, dpid: DatapathId, packet: PacketIn) {
        let frame = match EthernetFrame::parse(&packet.data) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(dpid, error = %e, "dropping malformed packet-in");
                return;
            }
        };

        if frame.ethertype == ETHERTYPE_ARP {
            if let Some(packet_out) = self.responder.respond(&frame, packet.in_port) {
                self.send(dpid, Message::PacketOut(packet_out)).await;
                return;
            }
            // Other ARP traffic floods like any broadcast.
        }

        if frame.ethertype == ETHERTYPE_IPV4 {
            match Ipv4Packet::parse(&frame.payload) {
                Ok(ip) if ip.dst == self.service.ip => {
                    self.handle_balance(dpid, &packet, &frame, &ip).await;
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    debug!(dpid, error = %e, "dropping malformed IPv4 packet-in");
                    return;
                }
            }
        }

        self.handle_learning(dpid, &packet, &frame).await;
    }

    /// Load-balancing path: packets addressed to the virtual IP.
    async fn handle_balance(
        &mut self,
        dpid: DatapathId,
        packet: &PacketIn,
        frame: &EthernetFrame,
        ip: &Ipv4Packet,
    ) {
        let Some(protocol) = Protocol::from_nw_proto(ip.protocol) else {
            debug!(dpid, src = %ip.src, proto = ip.protocol, "non-TCP/UDP packet for virtual IP dropped");
            return;
        };
        let Some(ports) = ip.transport_ports() else {
            debug!(dpid, src = %ip.src, "truncated transport header, packet dropped");
            return;
        };

        let key = ConnectionKey {
            client_ip: ip.src,
            client_port: ports.src,
            protocol,
        };
        let now = Instant::now();

        let existing = self.connections.get(&key).map(|record| record.backend);
        let backend_id = match existing {
            Some(id) => {
                // Duplicate packet-in racing rule installation: the
                // recorded assignment wins, nothing is re-counted.
                self.connections.touch(&key, now);
                debug!(%key, "packet-in for known flow, reinstalling rules");
                id
            }
            None => {
                let Some(id) = self.policy.select(&self.registry) else {
                    warn!(%key, "no backend available, rejecting new flow");
                    return;
                };
                self.connections
                    .admit(key, id, dpid, frame.src, packet.in_port, now, &mut self.registry);
                self.total_requests += 1;

                let backend_ip = self.registry.get(id).map(|backend| backend.ip);
                if let Some(server_ip) = backend_ip {
                    info!(
                        request = self.total_requests,
                        %key,
                        backend = %server_ip,
                        "assigned new flow"
                    );
                    self.stats.report(StatsEvent::Decision {
                        timestamp: stats::unix_timestamp(),
                        client_ip: key.client_ip,
                        client_port: key.client_port,
                        server_ip,
                    });
                }
                id
            }
        };

        let Some(backend) = self.registry.get(backend_id) else {
            warn!(%key, backend_id, "assigned backend missing from registry");
            return;
        };

        let messages = self
            .installer
            .install(&key, backend, packet.in_port, packet.buffer_id, packet.data.clone());
        for message in messages {
            self.send(dpid, message).await;
        }
    }

    /// Plain learning-switch forwarding for everything else.
    async fn handle_learning(&mut self, dpid: DatapathId, packet: &PacketIn, frame: &EthernetFrame) {
        let out_port = match self.switches.get_mut(&dpid) {
            Some(handle) => {
                handle.hosts.insert(frame.src, packet.in_port);
                if frame.dst.is_multicast() {
                    None
                } else {
                    handle.hosts.get(&frame.dst).copied()
                }
            }
            None => {
                debug!(dpid, "packet-in from unknown switch");
                return;
            }
        };

        match out_port {
            Some(out_port) => {
                let messages = self.installer.learned(
                    frame.src,
                    frame.dst,
                    out_port,
                    packet.buffer_id,
                    packet.data.clone(),
                );
                for message in messages {
                    self.send(dpid, message).await;
                }
            }
            None => {
                // Destination unknown (or broadcast): flood.
                let data = if packet.buffer_id == OFP_NO_BUFFER {
                    packet.data.clone()
                } else {
                    bytes::Bytes::new()
                };
                self.send(
                    dpid,
                    Message::PacketOut(PacketOut {
                        buffer_id: packet.buffer_id,
                        in_port: packet.in_port,
                        actions: vec![Action::Output {
                            port: OFPP_FLOOD,
                            max_len: 0,
                        }],
                        data,
                    }),
                )
                .await;
            }
        }
    }

    fn handle_flow_removed(&mut self, dpid: DatapathId, removed: &FlowRemoved) {
        let fields = &removed.match_fields;
        let (Some(client_ip), Some(client_port), Some(nw_proto)) =
            (fields.nw_src, fields.tp_src, fields.nw_proto)
        else {
            debug!(dpid, "flow-removed without a connection key, ignoring");
            return;
        };
        let Some(protocol) = Protocol::from_nw_proto(nw_proto) else {
            debug!(dpid, proto = nw_proto, "flow-removed for unbalanced protocol, ignoring");
            return;
        };

        let key = ConnectionKey {
            client_ip,
            client_port,
            protocol,
        };
        match self.connections.remove(&key, &mut self.registry) {
            Some(record) => {
                info!(
                    %key,
                    reason = removed.reason.as_str(),
                    age_secs = record.created_at.elapsed().as_secs(),
                    "flow removed"
                );
                self.report_removal(&record.key, record.backend, removed.reason.as_str());
            }
            None => {
                // Duplicate or never-admitted: idempotent no-op.
                debug!(dpid, %key, "flow-removed for unknown connection, ignoring");
            }
        }
    }

    fn handle_disconnect(&mut self, dpid: DatapathId) {
        self.switches.remove(&dpid);
        let purged = self.connections.purge_switch(dpid, &mut self.registry);
        for record in &purged {
            self.report_removal(&record.key, record.backend, "switch_disconnect");
        }
        info!(dpid, connections = purged.len(), "switch disconnected, state purged");
    }

    /// Safety net for lost flow-removed notifications.
    fn sweep_idle(&mut self) {
        let evicted = self
            .connections
            .sweep_idle(self.sweep_after, Instant::now(), &mut self.registry);
        for record in &evicted {
            debug!(key = %record.key, "evicted idle connection record");
            self.report_removal(&record.key, record.backend, "idle_sweep");
        }
    }

    fn report_removal(&self, key: &ConnectionKey, backend: balancer::BackendId, reason: &'static str) {
        let Some(server_ip) = self.registry.get(backend).map(|b| b.ip) else {
            return;
        };
        self.stats.report(StatsEvent::Removal {
            timestamp: stats::unix_timestamp(),
            client_ip: key.client_ip,
            client_port: key.client_port,
            server_ip,
            reason,
        });
    }

    /// Periodic aggregate summary, mirrored to the log.
    fn report_summary(&self) {
        if self.total_requests == 0 {
            return;
        }

        let uptime = self.started_at.elapsed().as_secs_f64();
        let rps = if uptime > 0.0 {
            self.total_requests as f64 / uptime
        } else {
            0.0
        };

        info!(
            total_requests = self.total_requests,
            rps = format!("{rps:.2}"),
            active = self.connections.len(),
            stats_dropped = self.stats.dropped(),
            "load balancer summary"
        );
        for backend in self.registry.iter() {
            let share = backend.total_requests as f64 / self.total_requests as f64 * 100.0;
            info!(
                backend = %backend.ip,
                requests = backend.total_requests,
                active = backend.active_connections,
                share = format!("{share:.1}%"),
                "backend summary"
            );
        }
    }

    async fn send(&self, dpid: DatapathId, message: Message) {
        let Some(handle) = self.switches.get(&dpid) else {
            debug!(dpid, "dropping message for unknown switch");
            return;
        };
        if handle.outbound.send(message).await.is_err() {
            warn!(dpid, "switch outbound channel closed");
        }
    }

    // Observability accessors, used by the summary log and tests.

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    pub fn switch_count(&self) -> usize {
        self.switches.len()
    }

    /// Active connections of one backend, by registry index.
    pub fn backend_load(&self, backend: balancer::BackendId) -> Option<u64> {
        self.registry.get(backend).map(|b| b.active_connections)
    }
}
