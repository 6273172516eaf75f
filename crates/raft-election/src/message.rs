//! # message
//!
//! why: define the election rpc messages exchanged between nodes
//! relations: consumed by node.rs transitions, carried in flight by raft-sim
//! what: NodeId, RaftMessage (VoteRequest, VoteResponse, Heartbeat), MessageKind

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a cluster member
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// All messages a node can receive from a peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RaftMessage {
    /// Candidate asking for a vote in `term`
    VoteRequest { term: u64, candidate_id: NodeId },
    /// Answer to a vote request; only grants travel in this protocol
    VoteResponse {
        term: u64,
        granted: bool,
        voter: NodeId,
    },
    /// Leader reasserting its leadership for `term`
    Heartbeat { term: u64, leader_id: NodeId },
}

/// Message discriminant, used for in-flight views and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    VoteRequest,
    VoteResponse,
    Heartbeat,
}

impl RaftMessage {
    /// The term asserted by the sender
    pub fn term(&self) -> u64 {
        match self {
            Self::VoteRequest { term, .. }
            | Self::VoteResponse { term, .. }
            | Self::Heartbeat { term, .. } => *term,
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Self::VoteRequest { .. } => MessageKind::VoteRequest,
            Self::VoteResponse { .. } => MessageKind::VoteResponse,
            Self::Heartbeat { .. } => MessageKind::Heartbeat,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::VoteRequest => "vote_request",
            Self::VoteResponse => "vote_response",
            Self::Heartbeat => "heartbeat",
        };
        f.write_str(name)
    }
}
