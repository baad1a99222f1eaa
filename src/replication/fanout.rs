use std::sync::Arc;
use std::time::Duration;
use chrono::Utc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::network::{NetworkError, ReplicationClient};
use crate::protocol::Mutation;
use super::metrics::MetricsCollector;
use super::{ReplicaOutcome, ReplicaRecord, ReplicationEvent};

impl From<Result<Option<u64>, NetworkError>> for ReplicaOutcome {
    fn from(result: Result<Option<u64>, NetworkError>) -> Self {
        match result {
            Ok(rows_affected) => ReplicaOutcome::Applied { rows_affected },
            Err(NetworkError::Timeout(_)) => ReplicaOutcome::TimedOut,
            Err(NetworkError::Status { status, message }) => ReplicaOutcome::Rejected { status, message },
            // The replica answered 2xx with a body we could not read.
            Err(NetworkError::Decode(_)) => ReplicaOutcome::Applied { rows_affected: None },
            Err(e) => ReplicaOutcome::Unreachable { error: e.to_string() },
        }
    }
}

/// Tasks spawned for one forwarded mutation
#[derive(Debug)]
pub struct Dispatch {
    /// Id carried in the mutation id header
    pub mutation_id: Uuid,
    tasks: Vec<JoinHandle<()>>,
}

impl Dispatch {
    /// Waits for every replica to answer or time out
    pub async fn join(self) {
        for task in self.tasks {
            let _ = task.await;
        }
    }
}

/// Forwards applied mutations from the primary to every replica.
///
/// One task per replica per mutation. Nothing waits on the tasks unless the
/// caller joins the returned [`Dispatch`], and a failed attempt is recorded,
/// never retried.
#[derive(Debug, Clone)]
pub struct Replicator {
    client: ReplicationClient,
    peers: Arc<[String]>,
    timeout: Duration,
    metrics: Arc<MetricsCollector>,
    event_tx: broadcast::Sender<ReplicationEvent>,
}

impl Replicator {
    /// Create a replicator for `peers`
    pub fn new(
        client: ReplicationClient,
        peers: Vec<String>,
        timeout: Duration,
        metrics: Arc<MetricsCollector>,
        event_tx: broadcast::Sender<ReplicationEvent>,
    ) -> Self {
        for peer in &peers {
            metrics.register_replica(peer);
        }
        Self {
            client,
            peers: peers.into(),
            timeout,
            metrics,
            event_tx,
        }
    }

    /// Replica addresses
    pub fn peers(&self) -> &[String] {
        &self.peers
    }

    /// Sends `mutation` to every replica in the background
    pub fn forward(&self, mutation: Mutation) -> Dispatch {
        let mutation_id = Uuid::new_v4();
        let mutation = Arc::new(mutation);
        self.metrics.record_forwarded();

        let tasks = self
            .peers
            .iter()
            .cloned()
            .map(|replica| {
                let this = self.clone();
                let mutation = mutation.clone();
                tokio::spawn(async move {
                    this.forward_one(replica, &mutation, mutation_id).await;
                })
            })
            .collect();

        Dispatch { mutation_id, tasks }
    }

    async fn forward_one(&self, replica: String, mutation: &Mutation, mutation_id: Uuid) {
        let result = self
            .client
            .forward(&replica, mutation, mutation_id, self.timeout)
            .await
            .map(|response| response.rows_affected);

        let record = ReplicaRecord {
            mutation_id,
            kind: mutation.kind(),
            outcome: ReplicaOutcome::from(result),
            at: Utc::now(),
        };

        match &record.outcome {
            ReplicaOutcome::Applied { rows_affected } => {
                tracing::debug!(%replica, %mutation_id, kind = %record.kind, ?rows_affected, "replica applied mutation");
            }
            outcome => {
                tracing::warn!(%replica, %mutation_id, kind = %record.kind, ?outcome, "replication to replica failed");
            }
        }

        self.metrics.record_outcome(&replica, &record);
        let _ = self.event_tx.send(ReplicationEvent::MutationForwarded { replica, record });
    }
}
