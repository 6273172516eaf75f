//! # error
//!
//! why: surface the few operator mistakes the simulator can reject
//! relations: returned by config.rs and cluster.rs commands
//! what: SimError

use raft_election::{ConfigError, NodeId};
use thiserror::Error;

/// Errors from configuration and coordinator commands.
///
/// Protocol anomalies (stale terms, dead endpoints, vote conflicts) are never
/// errors; they are dropped inside the simulation.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("cluster must have at least one node")]
    EmptyCluster,

    #[error("election timeout for node {index} must be positive")]
    ZeroTimeout { index: usize },

    #[error("invalid election config: {0}")]
    Election(#[from] ConfigError),

    #[error("invalid network config: {0}")]
    Network(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
