//! Task wiring and lifecycle for the controller.

use crate::config::Config;
use crate::controller::{Controller, Event};
use crate::stats;
use crate::switch;
use common::Result;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Reactor event queue depth, shared by every switch session.
const EVENT_QUEUE_SIZE: usize = 1024;

/// The controller process: listener, reactor, and stats worker.
pub struct ControllerServer {
    config: Config,
}

impl ControllerServer {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run until ctrl-c, then shut down in order: stop accepting, end
    /// switch sessions, drain the reactor, drain the stats worker
    /// within the grace period.
    pub async fn run(self) -> Result<()> {
        let (stats_reporter, stats_worker) = stats::channel(&self.config.stats)?;
        let stats_handle = stats_worker.map(|worker| tokio::spawn(worker.run()));

        let controller = Controller::new(&self.config, stats_reporter)?;
        let (event_tx, event_rx) = mpsc::channel::<Event>(EVENT_QUEUE_SIZE);
        let reactor = tokio::spawn(controller.run(event_rx));

        let listener = TcpListener::bind(self.config.switch.listen).await?;
        info!(listen = %self.config.switch.listen, "OpenFlow listener started");

        let mut sessions: Vec<JoinHandle<()>> = Vec::new();
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown requested");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        info!(peer = %peer, "switch connecting");
                        if let Err(e) = stream.set_nodelay(true) {
                            debug!(peer = %peer, error = %e, "failed to set TCP_NODELAY");
                        }
                        let events = event_tx.clone();
                        sessions.retain(|session| !session.is_finished());
                        sessions.push(tokio::spawn(async move {
                            if let Err(e) = switch::run(stream, peer, events).await {
                                warn!(peer = %peer, error = %e, "switch session ended with error");
                            }
                        }));
                    }
                    Err(e) => warn!(error = %e, "accept failed"),
                },
            }
        }

        // No new events: close the listener and the sessions, then let
        // the reactor drain what is already queued (in-flight flow
        // installations complete before it exits).
        drop(listener);
        for session in &sessions {
            session.abort();
        }
        drop(event_tx);
        if let Err(e) = reactor.await {
            warn!(error = %e, "reactor task failed");
        }

        // The reactor owned the stats reporter, so the queue is now
        // closed; the worker drains it unless the grace period runs out.
        if let Some(handle) = stats_handle {
            if timeout(self.config.stats.shutdown_grace, handle).await.is_err() {
                warn!("stats worker did not drain in time, discarding remaining events");
            }
        }

        info!("controller stopped");
        Ok(())
    }
}
