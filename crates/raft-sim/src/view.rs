//! # view
//!
//! why: read-only snapshots for the presentation layer, consistent as of the last event
//! relations: built by cluster.rs from raft-election nodes and network flights
//! what: NodeSnapshot, ClusterView

use crate::network::{InFlightMessage, NetworkStats};
use raft_election::{Millis, NodeId, NodeState, RaftNode};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub state: NodeState,
    pub term: u64,
    pub elapsed: Millis,
    pub election_timeout: Millis,
    pub voted_for: Option<NodeId>,
    /// Size of the current ballot; meaningful for candidates and fresh leaders
    pub votes_received: usize,
    pub alive: bool,
}

impl NodeSnapshot {
    pub fn new(node: &RaftNode, alive: bool) -> Self {
        Self {
            id: node.id.clone(),
            state: node.state,
            term: node.current_term,
            elapsed: node.elapsed,
            election_timeout: node.election_timeout,
            voted_for: node.voted_for.clone(),
            votes_received: node.votes_received.len(),
            alive,
        }
    }
}

/// Everything a renderer needs for one frame
#[derive(Debug, Clone, Serialize)]
pub struct ClusterView {
    pub now: Millis,
    pub running: bool,
    pub leader: Option<NodeId>,
    pub nodes: Vec<NodeSnapshot>,
    pub in_flight: Vec<InFlightMessage>,
    pub stats: NetworkStats,
}
