//! Response bodies that only the HTTP layer produces.
//!
//! Shapes shared with the replication client live in [`crate::protocol`].

use serde::Serialize;

use crate::replication::{NodeRole, ReplicaMetrics, ReplicationMetrics};

/// Body of `GET /replication/status`
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    /// Current role
    pub role: NodeRole,
    /// This node's address
    pub self_address: String,
    /// Address believed to be primary
    pub primary_address: String,
    /// Whether an election is running
    pub election_in_progress: bool,
    /// Promotion policy
    pub eligibility: String,
    /// Statement guard mode
    pub statement_guard: String,
    /// Per-replica forwarding state, ordered by address
    pub replicas: Vec<ReplicaMetrics>,
    /// Counters
    pub metrics: ReplicationMetrics,
    /// Seconds since start
    pub uptime_secs: u64,
}
