//! # raft-sim
//!
//! why: run raft-election state machines against a deterministic, lossy, delayed network
//! relations: drives raft-election nodes; consumed by a presentation layer via views
//! what: event queue, network simulator, cluster coordinator, snapshots, frame clock

pub mod clock;
pub mod cluster;
pub mod config;
pub mod error;
pub mod network;
pub mod queue;
pub mod view;

pub use clock::FrameClock;
pub use cluster::Cluster;
pub use config::SimConfig;
pub use error::SimError;
pub use network::{FlightId, InFlightMessage, Membership, NetworkConfig, NetworkSimulator, NetworkStats};
pub use queue::EventQueue;
pub use view::{ClusterView, NodeSnapshot};

pub use raft_election::{MessageKind, Millis, NodeId, NodeState};
