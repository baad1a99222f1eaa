use std::time::Instant;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::{ReplicaOutcome, ReplicaRecord};

/// Replication metrics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationMetrics {
    /// Mutations handed to the replicator
    pub mutations_forwarded: u64,
    /// Forward attempts a replica applied
    pub replication_successes: u64,
    /// Forward attempts that failed for any reason
    pub replication_failures: u64,
    /// Forward attempts that timed out
    pub replication_timeouts: u64,
    /// Successful liveness probes
    pub probes_succeeded: u64,
    /// Failed liveness probes
    pub probes_failed: u64,
    /// Elections started
    pub elections_started: u64,
    /// Elections that ended without promotion
    pub elections_abandoned: u64,
    /// Promotions of this node
    pub promotions: u64,
}

/// Replica-specific metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicaMetrics {
    /// Replica address
    pub addr: String,
    /// Forward attempts the replica applied
    pub applied: u64,
    /// Forward attempts that failed
    pub failed: u64,
    /// Last successful forward, unix millis
    pub last_success: Option<i64>,
    /// Most recent attempt
    pub last: Option<ReplicaRecord>,
}

impl ReplicaMetrics {
    fn new(addr: &str) -> Self {
        Self {
            addr: addr.to_string(),
            applied: 0,
            failed: 0,
            last_success: None,
            last: None,
        }
    }
}

/// Metrics collector for the replication system
#[derive(Debug)]
pub struct MetricsCollector {
    /// Global metrics
    metrics: Mutex<ReplicationMetrics>,
    /// Per-replica metrics
    replicas: DashMap<String, ReplicaMetrics>,
    /// Metrics collection start time
    start_time: Instant,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            metrics: Mutex::new(ReplicationMetrics::default()),
            replicas: DashMap::new(),
            start_time: Instant::now(),
        }
    }

    /// Registers a replica so it is reported before its first forward
    pub fn register_replica(&self, addr: &str) {
        self.replicas
            .entry(addr.to_string())
            .or_insert_with(|| ReplicaMetrics::new(addr));
    }

    /// Record a mutation handed to the replicator
    pub fn record_forwarded(&self) {
        self.metrics.lock().mutations_forwarded += 1;
    }

    /// Record the outcome of one forward attempt
    pub fn record_outcome(&self, addr: &str, record: &ReplicaRecord) {
        {
            let mut metrics = self.metrics.lock();
            match record.outcome {
                ReplicaOutcome::Applied { .. } => metrics.replication_successes += 1,
                ReplicaOutcome::TimedOut => {
                    metrics.replication_failures += 1;
                    metrics.replication_timeouts += 1;
                }
                _ => metrics.replication_failures += 1,
            }
        }

        let mut replica = self
            .replicas
            .entry(addr.to_string())
            .or_insert_with(|| ReplicaMetrics::new(addr));
        if record.outcome.is_applied() {
            replica.applied += 1;
            replica.last_success = Some(record.at.timestamp_millis());
        } else {
            replica.failed += 1;
        }
        replica.last = Some(record.clone());
    }

    /// Record a liveness probe
    pub fn record_probe(&self, success: bool) {
        let mut metrics = self.metrics.lock();
        if success {
            metrics.probes_succeeded += 1;
        } else {
            metrics.probes_failed += 1;
        }
    }

    /// Record an election start
    pub fn record_election_started(&self) {
        self.metrics.lock().elections_started += 1;
    }

    /// Record an election that ended without promotion
    pub fn record_election_abandoned(&self) {
        self.metrics.lock().elections_abandoned += 1;
    }

    /// Record a promotion
    pub fn record_promotion(&self) {
        self.metrics.lock().promotions += 1;
    }

    /// Get current metrics
    pub fn get_metrics(&self) -> ReplicationMetrics {
        self.metrics.lock().clone()
    }

    /// Get metrics for a specific replica
    pub fn get_replica_metrics(&self, addr: &str) -> Option<ReplicaMetrics> {
        self.replicas.get(addr).map(|r| r.clone())
    }

    /// Get metrics for all replicas, ordered by address
    pub fn get_all_replica_metrics(&self) -> Vec<ReplicaMetrics> {
        let mut all: Vec<_> = self.replicas.iter().map(|r| r.value().clone()).collect();
        all.sort_by(|a, b| a.addr.cmp(&b.addr));
        all
    }

    /// Get uptime in seconds
    pub fn uptime(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
