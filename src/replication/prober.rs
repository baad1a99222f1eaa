use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::network::{NetworkError, ReplicationClient};
use super::election::{ElectionCoordinator, ElectionOutcome};
use super::metrics::MetricsCollector;
use super::state::NodeState;
use super::ReplicationEvent;

/// The two questions a node asks about other nodes during failover
#[async_trait]
pub trait LivenessProbe: Send + Sync + Debug {
    /// Succeeds if `addr` answers `/ping`
    async fn ping(&self, addr: &str) -> Result<(), NetworkError>;

    /// Whether `addr` claims to be primary
    async fn is_master(&self, addr: &str) -> Result<bool, NetworkError>;
}

/// [`LivenessProbe`] over HTTP with a fixed per-call timeout
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: ReplicationClient,
    timeout: Duration,
}

impl HttpProbe {
    /// Create a probe whose calls give up after `timeout`
    pub fn new(client: ReplicationClient, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl LivenessProbe for HttpProbe {
    async fn ping(&self, addr: &str) -> Result<(), NetworkError> {
        self.client.ping(addr, self.timeout).await
    }

    async fn is_master(&self, addr: &str) -> Result<bool, NetworkError> {
        self.client.is_master(addr, self.timeout).await
    }
}

/// Periodically pings the primary and starts an election when it is silent.
#[derive(Debug)]
pub struct LivenessProber {
    state: NodeState,
    probe: Arc<dyn LivenessProbe>,
    coordinator: Arc<ElectionCoordinator>,
    interval: Duration,
    metrics: Arc<MetricsCollector>,
    event_tx: broadcast::Sender<ReplicationEvent>,
}

impl LivenessProber {
    /// Create a prober ticking every `interval`
    pub fn new(
        state: NodeState,
        probe: Arc<dyn LivenessProbe>,
        coordinator: Arc<ElectionCoordinator>,
        interval: Duration,
        metrics: Arc<MetricsCollector>,
        event_tx: broadcast::Sender<ReplicationEvent>,
    ) -> Self {
        Self {
            state,
            probe,
            coordinator,
            interval,
            metrics,
            event_tx,
        }
    }

    /// Runs until `shutdown` is cancelled or this node becomes primary.
    ///
    /// The first probe fires one interval after start. A tick that overruns
    /// (an election in progress) delays the following ticks instead of
    /// bunching them up.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(primary = %self.state.primary_address(), interval = ?self.interval, "liveness prober started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if self.state.is_primary() {
                break;
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = self.probe_once() => {}
            }
        }

        tracing::info!(role = %self.state.role(), "liveness prober stopped");
    }

    /// One tick: ping the primary, run the coordinator if the ping fails.
    ///
    /// Returns the election outcome, or `None` when no election was needed.
    pub async fn probe_once(&self) -> Option<ElectionOutcome> {
        if self.state.is_primary() {
            return None;
        }

        let primary = self.state.primary_address();
        match self.probe.ping(&primary).await {
            Ok(()) => {
                self.metrics.record_probe(true);
                tracing::debug!(%primary, "primary answered ping");
                None
            }
            Err(e) => {
                self.metrics.record_probe(false);
                tracing::warn!(%primary, error = %e, "primary did not answer ping");
                let _ = self.event_tx.send(ReplicationEvent::ProbeFailed {
                    primary,
                    error: e.to_string(),
                });
                Some(self.coordinator.run().await)
            }
        }
    }
}
