//! Primary-replica replication and failover.
//!
//! A primary forwards every applied mutation to each replica through the
//! [`Replicator`]. Every other node runs a [`LivenessProber`] against the
//! primary it believes in and hands failures to the
//! [`ElectionCoordinator`], which may promote the node. All role state lives
//! in [`NodeState`].

use std::fmt;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::protocol::MutationKind;

mod election;
mod fanout;
mod metrics;
mod prober;
mod state;

pub use election::{ElectionCoordinator, ElectionOutcome, ElectionSettings};
pub use fanout::{Dispatch, Replicator};
pub use metrics::{MetricsCollector, ReplicaMetrics, ReplicationMetrics};
pub use prober::{HttpProbe, LivenessProbe, LivenessProber};
pub use state::{NodeState, RoleSnapshot};

/// Replication node role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// Serves reads, applies forwarded mutations, watches the primary
    Replica,
    /// Accepts client mutations and forwards them
    Primary,
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRole::Replica => write!(f, "replica"),
            NodeRole::Primary => write!(f, "primary"),
        }
    }
}

/// Result of forwarding one mutation to one replica
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReplicaOutcome {
    /// The replica applied the mutation
    Applied {
        /// Rows the replica reported, when it reported any
        rows_affected: Option<u64>,
    },
    /// The replica answered with an error status
    Rejected {
        /// HTTP status code
        status: u16,
        /// Error message from the replica
        message: String,
    },
    /// No answer within the forward timeout
    TimedOut,
    /// Transport failure before any answer
    Unreachable {
        /// Transport error
        error: String,
    },
}

impl ReplicaOutcome {
    /// Whether the replica applied the mutation
    pub fn is_applied(&self) -> bool {
        matches!(self, ReplicaOutcome::Applied { .. })
    }
}

/// Last forwarded mutation seen by a replica
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicaRecord {
    /// Id sent in the mutation id header
    pub mutation_id: Uuid,
    /// Mutation kind
    pub kind: MutationKind,
    /// What happened
    pub outcome: ReplicaOutcome,
    /// When the attempt finished
    pub at: DateTime<Utc>,
}

/// Replication events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReplicationEvent {
    /// A forwarded mutation finished on one replica
    MutationForwarded {
        /// Replica address
        replica: String,
        /// Attempt record
        record: ReplicaRecord,
    },
    /// A liveness probe against the primary failed
    ProbeFailed {
        /// Primary address probed
        primary: String,
        /// Failure
        error: String,
    },
    /// An election started
    ElectionStarted {
        /// Primary address believed lost
        primary: String,
    },
    /// An election ended without promotion
    ElectionAbandoned {
        /// Primary address at the end of the election
        primary: String,
        /// Why the node stayed a replica
        reason: String,
    },
    /// A peer reported itself primary during an election
    PrimaryDiscovered {
        /// New primary address
        primary: String,
    },
    /// This node became primary
    Promoted {
        /// This node's address, now the primary address
        address: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_test::{assert_tokens, Token};

    #[test]
    fn test_role_wire_names() {
        assert_tokens(
            &NodeRole::Primary,
            &[Token::UnitVariant { name: "NodeRole", variant: "primary" }],
        );
        assert_tokens(
            &NodeRole::Replica,
            &[Token::UnitVariant { name: "NodeRole", variant: "replica" }],
        );
        assert_eq!(NodeRole::Primary.to_string(), "primary");
    }

    #[test]
    fn test_outcome_shape() {
        let outcome = ReplicaOutcome::Rejected { status: 500, message: "no such table".into() };
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            serde_json::json!({"outcome": "rejected", "status": 500, "message": "no such table"})
        );
        assert!(!outcome.is_applied());

        let outcome = ReplicaOutcome::TimedOut;
        assert_eq!(serde_json::to_value(&outcome).unwrap(), serde_json::json!({"outcome": "timed_out"}));
    }
}
