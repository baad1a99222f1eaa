use std::sync::Arc;
use std::time::Duration;
use futures::future::join_all;
use tokio::sync::broadcast;

use crate::config::EligibilityPolicy;
use super::metrics::MetricsCollector;
use super::prober::LivenessProbe;
use super::state::NodeState;
use super::ReplicationEvent;

/// Election parameters
#[derive(Debug, Clone)]
pub struct ElectionSettings {
    /// Wait before re-checking the primary
    pub settle_delay: Duration,
    /// Who may promote
    pub eligibility: EligibilityPolicy,
    /// Ask peers for an existing primary before promoting
    pub discover_primary: bool,
    /// Peers asked during discovery
    pub peers: Vec<String>,
}

/// How an election ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElectionOutcome {
    /// Another election was running; nothing was done
    AlreadyRunning,
    /// The primary answered the re-check
    Abandoned,
    /// A peer reported itself primary and is now followed
    PrimaryDiscovered(String),
    /// The primary is gone but this node may not promote
    Ineligible,
    /// This node is now primary
    Promoted,
}

/// Decides whether a replica takes over after a failed probe.
///
/// Elections are node-local: no votes are exchanged, and with several
/// eligible replicas more than one may promote.
#[derive(Debug)]
pub struct ElectionCoordinator {
    state: NodeState,
    probe: Arc<dyn LivenessProbe>,
    settings: ElectionSettings,
    metrics: Arc<MetricsCollector>,
    event_tx: broadcast::Sender<ReplicationEvent>,
}

impl ElectionCoordinator {
    /// Create a coordinator
    pub fn new(
        state: NodeState,
        probe: Arc<dyn LivenessProbe>,
        settings: ElectionSettings,
        metrics: Arc<MetricsCollector>,
        event_tx: broadcast::Sender<ReplicationEvent>,
    ) -> Self {
        Self {
            state,
            probe,
            settings,
            metrics,
            event_tx,
        }
    }

    /// Runs one election. At most one runs at a time per node.
    ///
    /// Dropping the returned future mid-election releases the election
    /// guard, so a cancelled run never blocks the next one.
    pub async fn run(&self) -> ElectionOutcome {
        if !self.state.try_begin_election() {
            tracing::debug!("election already in progress");
            return ElectionOutcome::AlreadyRunning;
        }
        let _running = RunningElection(&self.state);

        let primary = self.state.primary_address();
        tracing::info!(%primary, settle_delay = ?self.settings.settle_delay, "starting election");
        self.metrics.record_election_started();
        let _ = self.event_tx.send(ReplicationEvent::ElectionStarted { primary: primary.clone() });

        tokio::time::sleep(self.settings.settle_delay).await;

        if self.probe.ping(&primary).await.is_ok() {
            tracing::info!(%primary, "primary is back, abandoning election");
            self.abandon(primary, "primary answered re-check");
            return ElectionOutcome::Abandoned;
        }

        if self.settings.discover_primary {
            if let Some(found) = self.discover(&primary).await {
                tracing::info!(primary = %found, "peer reports itself primary, following it");
                self.state.adopt_primary(found.clone());
                let _ = self.event_tx.send(ReplicationEvent::PrimaryDiscovered { primary: found.clone() });
                self.abandon(found.clone(), "another primary discovered");
                return ElectionOutcome::PrimaryDiscovered(found);
            }
        }

        let address = self.state.self_address().to_string();
        if !self.settings.eligibility.allows(&address) {
            tracing::info!(policy = %self.settings.eligibility, "primary lost but not eligible for promotion");
            self.abandon(primary, "not eligible");
            return ElectionOutcome::Ineligible;
        }

        if self.state.promote() {
            tracing::info!(%address, "promoted to primary");
            self.metrics.record_promotion();
            let _ = self.event_tx.send(ReplicationEvent::Promoted { address });
        }
        ElectionOutcome::Promoted
    }

    /// First peer, in configured order, that claims to be primary
    async fn discover(&self, lost: &str) -> Option<String> {
        let candidates: Vec<&String> = self
            .settings
            .peers
            .iter()
            .filter(|peer| peer.as_str() != lost)
            .collect();

        let answers = join_all(candidates.iter().map(|peer| self.probe.is_master(peer))).await;

        candidates
            .into_iter()
            .zip(answers)
            .find_map(|(peer, answer)| match answer {
                Ok(true) => Some(peer.clone()),
                Ok(false) => None,
                Err(e) => {
                    tracing::debug!(%peer, error = %e, "peer did not answer is-master");
                    None
                }
            })
    }

    fn abandon(&self, primary: String, reason: &str) {
        self.metrics.record_election_abandoned();
        let _ = self.event_tx.send(ReplicationEvent::ElectionAbandoned {
            primary,
            reason: reason.to_string(),
        });
    }
}

/// Clears the election flag when an election ends, however it ends.
struct RunningElection<'a>(&'a NodeState);

impl Drop for RunningElection<'_> {
    fn drop(&mut self) {
        self.0.finish_election();
    }
}
