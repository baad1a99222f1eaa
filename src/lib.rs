//! Rhizome replicates relational mutations from a primary to its replicas.
//!
//! Clients send schema and data mutations to the primary, which applies them
//! locally and forwards each one to every replica over HTTP. Replicas serve
//! reads, watch the primary with a liveness probe and promote themselves when
//! it stops answering.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// HTTP API
pub mod api;
/// Node configuration
pub mod config;
/// Relational engine adapters and statement assembly
pub mod database;
pub mod error;
/// Inter-node HTTP client
pub mod network;
/// Node wiring
pub mod node;
/// Wire protocol
pub mod protocol;
/// Replication fan-out, liveness probing and elections
pub mod replication;

// Re-export common types
pub use config::{EligibilityPolicy, NodeConfig};
pub use error::{Error, Result};
pub use node::Node;
pub use protocol::Mutation;
pub use replication::{NodeRole, NodeState, ReplicationEvent};

/// Version of the rhizome library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Feature flags
pub mod features {
    /// Whether the PostgreSQL backend is compiled in
    pub const POSTGRES: bool = cfg!(feature = "postgres");
}
