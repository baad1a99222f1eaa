//! Network module providing inter-node HTTP calls.
//!
//! Every call a node makes to another node goes through
//! [`ReplicationClient`]: liveness probes, the `/is-master` question asked
//! during elections and mutations forwarded from the primary. Each call is
//! bounded by an explicit timeout and never retried.

mod client;

pub use client::ReplicationClient;
pub use crate::error::NetworkError;
