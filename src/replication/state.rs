use std::sync::Arc;
use parking_lot::RwLock;
use serde::Serialize;

use super::NodeRole;

#[derive(Debug)]
struct Inner {
    role: NodeRole,
    primary: String,
    election_in_progress: bool,
}

/// Consistent view of the role state at one instant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleSnapshot {
    /// Current role
    pub role: NodeRole,
    /// Address believed to be primary
    pub primary: String,
    /// Whether an election is running
    pub election_in_progress: bool,
}

/// Role, primary address and election guard of this node.
///
/// Shared by the HTTP handlers, the prober and the election coordinator.
/// The lock is never held across an await point.
#[derive(Debug, Clone)]
pub struct NodeState {
    self_address: Arc<str>,
    inner: Arc<RwLock<Inner>>,
}

impl NodeState {
    /// Creates the state of a replica following `primary`
    pub fn replica(self_address: impl Into<String>, primary: impl Into<String>) -> Self {
        Self::new(self_address.into(), primary.into(), NodeRole::Replica)
    }

    /// Creates the state of a node that starts as primary
    pub fn primary(self_address: impl Into<String>) -> Self {
        let address = self_address.into();
        Self::new(address.clone(), address, NodeRole::Primary)
    }

    fn new(self_address: String, primary: String, role: NodeRole) -> Self {
        Self {
            self_address: self_address.into(),
            inner: Arc::new(RwLock::new(Inner {
                role,
                primary,
                election_in_progress: false,
            })),
        }
    }

    /// This node's own address
    pub fn self_address(&self) -> &str {
        &self.self_address
    }

    /// Current role
    pub fn role(&self) -> NodeRole {
        self.inner.read().role
    }

    /// Whether this node is primary
    pub fn is_primary(&self) -> bool {
        self.role() == NodeRole::Primary
    }

    /// Address this node believes to be primary
    pub fn primary_address(&self) -> String {
        self.inner.read().primary.clone()
    }

    /// Whether an election is running
    pub fn election_in_progress(&self) -> bool {
        self.inner.read().election_in_progress
    }

    /// Snapshot of all fields under one lock acquisition
    pub fn snapshot(&self) -> RoleSnapshot {
        let inner = self.inner.read();
        RoleSnapshot {
            role: inner.role,
            primary: inner.primary.clone(),
            election_in_progress: inner.election_in_progress,
        }
    }

    /// Sets the election guard. Returns false if it was already set.
    pub fn try_begin_election(&self) -> bool {
        let mut inner = self.inner.write();
        if inner.election_in_progress {
            return false;
        }
        inner.election_in_progress = true;
        true
    }

    /// Clears the election guard
    pub fn finish_election(&self) {
        self.inner.write().election_in_progress = false;
    }

    /// Becomes primary and points the primary address at this node.
    ///
    /// Returns false if the node already was primary. Also clears the
    /// election guard.
    pub fn promote(&self) -> bool {
        let mut inner = self.inner.write();
        inner.election_in_progress = false;
        if inner.role == NodeRole::Primary {
            return false;
        }
        inner.role = NodeRole::Primary;
        inner.primary = self.self_address.to_string();
        true
    }

    /// Follows a primary found elsewhere. Ignored once this node is primary.
    pub fn adopt_primary(&self, primary: impl Into<String>) -> bool {
        let mut inner = self.inner.write();
        if inner.role == NodeRole::Primary {
            return false;
        }
        inner.primary = primary.into();
        true
    }
}
