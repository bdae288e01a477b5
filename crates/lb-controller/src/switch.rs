//! Per-switch OpenFlow session: handshake, keepalive, and framing.
//!
//! One task per TCP connection. After the HELLO/FEATURES handshake the
//! session announces itself to the reactor and then shuttles frames:
//! inbound control events go onto the reactor queue in arrival order,
//! outbound messages arrive on a per-switch channel. Echo requests are
//! answered in-line so a busy reactor can never starve the keepalive.

use crate::controller::Event;
use common::{Error, Result};
use futures::{SinkExt, StreamExt};
use openflow::{Message, OpenflowCodec};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const OUTBOUND_QUEUE_SIZE: usize = 64;

/// Run a switch session to completion.
///
/// Any exit, clean or not, is preceded by a `SwitchDisconnected` event
/// so the reactor purges the switch's state.
pub async fn run(stream: TcpStream, peer: SocketAddr, events: mpsc::Sender<Event>) -> Result<()> {
    let mut framed = Framed::new(stream, OpenflowCodec);
    let mut next_xid: u32 = 1;

    framed.send((next_xid, Message::Hello)).await.map_err(Error::openflow)?;
    next_xid += 1;

    expect_hello(&mut framed, peer).await?;

    framed
        .send((next_xid, Message::FeaturesRequest))
        .await
        .map_err(Error::openflow)?;
    next_xid += 1;

    let dpid = await_features_reply(&mut framed, peer).await?;
    info!(peer = %peer, dpid, "switch session established");

    let (outbound_tx, outbound_rx) = mpsc::channel::<Message>(OUTBOUND_QUEUE_SIZE);
    if events
        .send(Event::SwitchConnected {
            dpid,
            outbound: outbound_tx,
        })
        .await
        .is_err()
    {
        return Err(Error::switch("controller event loop is gone"));
    }

    let result = session_loop(&mut framed, dpid, &events, outbound_rx, &mut next_xid).await;

    let _ = events.send(Event::SwitchDisconnected { dpid }).await;
    info!(peer = %peer, dpid, "switch session closed");
    result
}

async fn expect_hello(framed: &mut Framed<TcpStream, OpenflowCodec>, peer: SocketAddr) -> Result<()> {
    match timeout(HANDSHAKE_TIMEOUT, framed.next()).await {
        Ok(Some(Ok((_, Message::Hello)))) => Ok(()),
        Ok(Some(Ok((_, other)))) => Err(Error::switch(format!(
            "expected HELLO from {peer}, got message type {}",
            other.type_code()
        ))),
        Ok(Some(Err(e))) => Err(Error::openflow(e)),
        Ok(None) => Err(Error::switch(format!("{peer} closed during handshake"))),
        Err(_) => Err(Error::switch(format!("{peer} handshake timed out"))),
    }
}

async fn await_features_reply(
    framed: &mut Framed<TcpStream, OpenflowCodec>,
    peer: SocketAddr,
) -> Result<u64> {
    loop {
        match timeout(HANDSHAKE_TIMEOUT, framed.next()).await {
            Ok(Some(Ok((xid, message)))) => match message {
                Message::FeaturesReply(features) => return Ok(features.datapath_id),
                Message::EchoRequest(data) => {
                    framed.send((xid, Message::EchoReply(data))).await.map_err(Error::openflow)?;
                }
                other => {
                    debug!(peer = %peer, msg_type = other.type_code(), "ignoring message during handshake");
                }
            },
            Ok(Some(Err(e))) => return Err(Error::openflow(e)),
            Ok(None) => return Err(Error::switch(format!("{peer} closed during handshake"))),
            Err(_) => return Err(Error::switch(format!("{peer} handshake timed out"))),
        }
    }
}

async fn session_loop(
    framed: &mut Framed<TcpStream, OpenflowCodec>,
    dpid: u64,
    events: &mpsc::Sender<Event>,
    mut outbound_rx: mpsc::Receiver<Message>,
    next_xid: &mut u32,
) -> Result<()> {
    loop {
        tokio::select! {
            inbound = framed.next() => match inbound {
                Some(Ok((xid, message))) => match message {
                    Message::EchoRequest(data) => {
                        framed.send((xid, Message::EchoReply(data))).await.map_err(Error::openflow)?;
                    }
                    Message::PacketIn(packet) => {
                        if events.send(Event::PacketIn { dpid, packet }).await.is_err() {
                            return Ok(());
                        }
                    }
                    Message::FlowRemoved(removed) => {
                        if events.send(Event::FlowRemoved { dpid, removed }).await.is_err() {
                            return Ok(());
                        }
                    }
                    Message::Error(error) => {
                        warn!(dpid, error_type = error.error_type, code = error.code, "switch reported an error");
                    }
                    Message::Hello | Message::EchoReply(_) | Message::FeaturesReply(_) => {}
                    other => {
                        debug!(dpid, msg_type = other.type_code(), "ignoring unhandled message");
                    }
                },
                Some(Err(e)) => {
                    warn!(dpid, error = %e, "control channel read failed");
                    return Err(Error::openflow(e));
                }
                None => {
                    debug!(dpid, "switch closed the control channel");
                    return Ok(());
                }
            },
            maybe_message = outbound_rx.recv() => match maybe_message {
                Some(message) => {
                    *next_xid = next_xid.wrapping_add(1);
                    framed.send((*next_xid, message)).await.map_err(Error::openflow)?;
                }
                // Reactor dropped the handle; nothing left to send.
                None => return Ok(()),
            },
        }
    }
}
