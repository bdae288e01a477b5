//! Fire-and-forget stats reporting to the dashboard API.
//!
//! The reactor enqueues events with a non-blocking send; a single
//! worker task posts them over HTTP. A slow or dead endpoint can never
//! stall packet-in handling: when the queue is full the newest event is
//! dropped (keeping the already-queued history in order) and a counter
//! records the loss.

use crate::config::StatsSettings;
use common::{Error, Result};
use serde::Serialize;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info};

/// One event for the external stats collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StatsEvent {
    /// A new flow was assigned to a backend.
    Decision {
        timestamp: f64,
        client_ip: Ipv4Addr,
        client_port: u16,
        server_ip: Ipv4Addr,
    },
    /// A flow's record was evicted.
    Removal {
        timestamp: f64,
        client_ip: Ipv4Addr,
        client_port: u16,
        server_ip: Ipv4Addr,
        reason: &'static str,
    },
}

/// Seconds since the Unix epoch, as the dashboard expects.
pub fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or(0.0)
}

/// Reactor-side handle: enqueue without ever blocking.
#[derive(Debug, Clone)]
pub struct StatsReporter {
    tx: Option<mpsc::Sender<StatsEvent>>,
    dropped: Arc<AtomicU64>,
}

impl StatsReporter {
    /// A reporter that discards everything (stats disabled).
    pub fn disabled() -> Self {
        Self {
            tx: None,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Enqueue an event. Drops the event when the queue is full or the
    /// worker is gone.
    pub fn report(&self, event: StatsEvent) {
        let Some(tx) = &self.tx else { return };
        match tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(?event, "stats queue full, dropping newest event");
            }
            Err(TrySendError::Closed(_)) => {
                debug!("stats worker gone, dropping event");
            }
        }
    }

    /// Events lost to queue exhaustion so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Worker task draining the queue into the HTTP endpoint.
pub struct StatsWorker {
    rx: mpsc::Receiver<StatsEvent>,
    client: reqwest::Client,
    update_url: String,
}

impl StatsWorker {
    /// Run until every sender is dropped and the queue is drained.
    pub async fn run(mut self) {
        info!(endpoint = %self.update_url, "stats worker started");
        while let Some(event) = self.rx.recv().await {
            self.post(&event).await;
        }
        info!("stats worker stopped");
    }

    async fn post(&self, event: &StatsEvent) {
        match self.client.post(&self.update_url).json(event).send().await {
            Ok(response) if !response.status().is_success() => {
                debug!(status = %response.status(), "stats endpoint rejected event");
            }
            Ok(_) => {}
            Err(e) => {
                debug!(error = %e, "stats endpoint unreachable, event lost");
            }
        }
    }
}

/// Build the reporter/worker pair. Disabled stats yield a no-op
/// reporter and no worker.
pub fn channel(settings: &StatsSettings) -> Result<(StatsReporter, Option<StatsWorker>)> {
    if !settings.enabled {
        return Ok((StatsReporter::disabled(), None));
    }

    let (tx, rx) = mpsc::channel(settings.queue_size);
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(1))
        .build()
        .map_err(Error::other)?;

    let reporter = StatsReporter {
        tx: Some(tx),
        dropped: Arc::new(AtomicU64::new(0)),
    };
    let worker = StatsWorker {
        rx,
        client,
        update_url: format!("{}/update", settings.endpoint.trim_end_matches('/')),
    };

    Ok((reporter, Some(worker)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(queue_size: usize) -> StatsSettings {
        StatsSettings {
            queue_size,
            ..StatsSettings::default()
        }
    }

    fn decision(client_port: u16) -> StatsEvent {
        StatsEvent::Decision {
            timestamp: 1000.0,
            client_ip: "10.0.0.10".parse().unwrap(),
            client_port,
            server_ip: "10.0.0.1".parse().unwrap(),
        }
    }

    #[tokio::test]
    async fn test_full_queue_drops_newest() {
        let (reporter, worker) = channel(&settings(2)).unwrap();
        let mut worker = worker.unwrap();

        // Worker not running: the queue fills at two events.
        reporter.report(decision(5000));
        reporter.report(decision(5001));
        reporter.report(decision(5002));
        assert_eq!(reporter.dropped(), 1);

        // The oldest events survived, in order.
        assert_eq!(worker.rx.recv().await.unwrap(), decision(5000));
        assert_eq!(worker.rx.recv().await.unwrap(), decision(5001));
        assert!(worker.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_disabled_reporter_is_noop() {
        let mut disabled = settings(8);
        disabled.enabled = false;

        let (reporter, worker) = channel(&disabled).unwrap();
        assert!(worker.is_none());

        reporter.report(decision(5000));
        assert_eq!(reporter.dropped(), 0);
    }

    #[tokio::test]
    async fn test_reporting_after_worker_drop_does_not_panic() {
        let (reporter, worker) = channel(&settings(2)).unwrap();
        drop(worker);

        reporter.report(decision(5000));
        // Closed channel is not queue exhaustion.
        assert_eq!(reporter.dropped(), 0);
    }

    #[test]
    fn test_event_serialization() {
        let event = StatsEvent::Removal {
            timestamp: 1234.5,
            client_ip: "10.0.0.10".parse().unwrap(),
            client_port: 5000,
            server_ip: "10.0.0.2".parse().unwrap(),
            reason: "idle_timeout",
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "removal");
        assert_eq!(value["client_ip"], "10.0.0.10");
        assert_eq!(value["client_port"], 5000);
        assert_eq!(value["server_ip"], "10.0.0.2");
        assert_eq!(value["reason"], "idle_timeout");
    }

    #[test]
    fn test_update_url_normalized() {
        let mut with_slash = settings(8);
        with_slash.endpoint = "http://localhost:8080/".to_string();

        let (_, worker) = channel(&with_slash).unwrap();
        assert_eq!(worker.unwrap().update_url, "http://localhost:8080/update");
    }
}
