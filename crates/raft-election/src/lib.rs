//! # raft-election
//!
//! why: model the leader election half of raft as a pure, directly testable state machine
//! relations: driven by raft-sim (network simulator + cluster coordinator)
//! what: node state machine, election messages, effects, election config

pub mod config;
pub mod error;
pub mod message;
pub mod node;

pub use config::ElectionConfig;
pub use error::ConfigError;
pub use message::{MessageKind, NodeId, RaftMessage};
pub use node::{Effect, ElectionEvent, NodeState, RaftNode};

/// Simulated time, in milliseconds.
pub type Millis = u64;
