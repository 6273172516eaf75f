//! # node
//!
//! why: define the election state machine and its single transition function
//! relations: uses message.rs for rpc types; raft-sim feeds it events and routes its effects
//! what: NodeState enum, ElectionEvent, Effect, RaftNode with step()

use crate::message::{NodeId, RaftMessage};
use crate::Millis;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, trace};

/// The three possible states a node can be in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeState {
    /// Passive state - waits for heartbeats, votes when asked
    Follower,
    /// Transitional state - requesting votes to become leader
    Candidate,
    /// Active state - heartbeats keep followers in line
    Leader,
}

impl Default for NodeState {
    fn default() -> Self {
        Self::Follower
    }
}

/// Input to the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElectionEvent {
    /// Simulated time passed
    Tick { dt: Millis },
    /// A peer's message was delivered
    Message(RaftMessage),
}

/// Output of a transition, for the network layer to act on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// Entered (or re-entered) candidacy; peers should be asked for votes
    BecameCandidate { term: u64 },
    /// Won the election; peers should start receiving heartbeats
    BecameLeader { term: u64 },
    /// A candidate or leader stepped down
    BecameFollower { term: u64 },
    /// This node voted for `candidate_id` in `term`
    VoteGranted { candidate_id: NodeId, term: u64 },
}

/// A single member's election state
///
/// Invariants:
/// - `current_term` never decreases
/// - `voted_for` changes within a term only from `None` to `Some`
/// - a candidate's own id is in `votes_received` from the moment it enters candidacy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaftNode {
    /// Unique identifier for this node
    pub id: NodeId,
    /// Current state (Follower, Candidate, or Leader)
    pub state: NodeState,
    /// Current term number
    pub current_term: u64,
    /// Node that received our vote in the current term (if any)
    pub voted_for: Option<NodeId>,
    /// Voters that granted us a vote in the current candidacy
    pub votes_received: BTreeSet<NodeId>,
    /// Randomized timeout, fixed for the node's lifetime
    pub election_timeout: Millis,
    /// Time since the timer was last reset
    pub elapsed: Millis,
    /// Number of members in the cluster, for quorum math
    pub cluster_size: usize,
}

impl RaftNode {
    /// Create a new node in Follower state at term 0
    pub fn new(id: impl Into<NodeId>, cluster_size: usize, election_timeout: Millis) -> Self {
        Self {
            id: id.into(),
            state: NodeState::Follower,
            current_term: 0,
            voted_for: None,
            votes_received: BTreeSet::new(),
            election_timeout,
            elapsed: 0,
            cluster_size,
        }
    }

    /// Votes needed to win: a strict majority of the cluster
    pub fn quorum_size(&self) -> usize {
        self.cluster_size / 2 + 1
    }

    pub fn has_quorum(&self) -> bool {
        self.votes_received.len() >= self.quorum_size()
    }

    pub fn is_leader(&self) -> bool {
        self.state == NodeState::Leader
    }

    /// Fraction of the election timeout used up, clamped to `[0, 1]`
    pub fn timeout_progress(&self) -> f64 {
        if self.election_timeout == 0 {
            return 1.0;
        }
        (self.elapsed as f64 / self.election_timeout as f64).min(1.0)
    }

    /// Apply one event and report what the network layer must do about it.
    ///
    /// Events that match no transition are dropped without touching state.
    pub fn step(&mut self, event: ElectionEvent) -> Vec<Effect> {
        let mut effects = Vec::new();
        match event {
            ElectionEvent::Tick { dt } => self.on_tick(dt, &mut effects),
            ElectionEvent::Message(message) => self.on_message(message, &mut effects),
        }
        effects
    }

    fn on_tick(&mut self, dt: Millis, effects: &mut Vec<Effect>) {
        self.elapsed = self.elapsed.saturating_add(dt);
        match self.state {
            NodeState::Follower | NodeState::Candidate => {
                if self.elapsed >= self.election_timeout {
                    self.become_candidate(effects);
                }
            }
            // heartbeat cadence lives in the network layer
            NodeState::Leader => {}
        }
    }

    fn on_message(&mut self, message: RaftMessage, effects: &mut Vec<Effect>) {
        if message.term() > self.current_term {
            self.adopt_higher_term(message, effects);
            return;
        }

        match (self.state, message) {
            // any leader's heartbeat resets the timer; only a higher term is adopted
            (NodeState::Follower, RaftMessage::Heartbeat { .. }) => {
                self.elapsed = 0;
            }
            (NodeState::Follower, RaftMessage::VoteRequest { term, candidate_id }) => {
                self.handle_vote_request(term, candidate_id, effects);
            }
            (NodeState::Candidate, RaftMessage::Heartbeat { term, leader_id }) => {
                debug!(node = %self.id, leader = %leader_id, term, "candidate yields to leader");
                self.become_follower(effects);
            }
            (NodeState::Candidate, RaftMessage::VoteResponse { term, granted, voter }) => {
                self.handle_vote_response(term, granted, voter, effects);
            }
            (state, message) => {
                trace!(node = %self.id, ?state, kind = %message.kind(), term = message.term(), "message ignored");
            }
        }
    }

    /// Any message from a newer term demotes us to follower of that term.
    /// A vote request from that term is granted on the spot.
    fn adopt_higher_term(&mut self, message: RaftMessage, effects: &mut Vec<Effect>) {
        let term = message.term();
        debug!(node = %self.id, from_term = self.current_term, to_term = term, kind = %message.kind(), "adopting higher term");
        self.current_term = term;
        self.voted_for = None;
        self.become_follower(effects);

        if let RaftMessage::VoteRequest { candidate_id, .. } = message {
            self.grant_vote(candidate_id, effects);
        }
    }

    fn handle_vote_request(&mut self, term: u64, candidate_id: NodeId, effects: &mut Vec<Effect>) {
        let term_ok = term >= self.current_term;
        let vote_free = match &self.voted_for {
            None => true,
            Some(voted) => *voted == candidate_id,
        };

        if term_ok && vote_free {
            self.grant_vote(candidate_id, effects);
        } else {
            trace!(node = %self.id, candidate = %candidate_id, term, "vote denied");
        }
    }

    fn grant_vote(&mut self, candidate_id: NodeId, effects: &mut Vec<Effect>) {
        trace!(node = %self.id, candidate = %candidate_id, term = self.current_term, "vote granted");
        self.voted_for = Some(candidate_id.clone());
        self.elapsed = 0;
        effects.push(Effect::VoteGranted {
            candidate_id,
            term: self.current_term,
        });
    }

    fn handle_vote_response(&mut self, term: u64, granted: bool, voter: NodeId, effects: &mut Vec<Effect>) {
        // responses for an earlier candidacy fail the term check
        if term != self.current_term || !granted {
            trace!(node = %self.id, voter = %voter, term, granted, "vote response ignored");
            return;
        }
        self.votes_received.insert(voter);
        self.check_quorum(effects);
    }

    fn become_candidate(&mut self, effects: &mut Vec<Effect>) {
        self.current_term += 1;
        self.elapsed = 0;
        self.state = NodeState::Candidate;
        self.voted_for = Some(self.id.clone());
        self.votes_received.clear();
        self.votes_received.insert(self.id.clone());
        debug!(node = %self.id, term = self.current_term, "election started");
        effects.push(Effect::BecameCandidate {
            term: self.current_term,
        });
        self.check_quorum(effects);
    }

    fn check_quorum(&mut self, effects: &mut Vec<Effect>) {
        if self.state == NodeState::Candidate && self.has_quorum() {
            self.become_leader(effects);
        }
    }

    fn become_leader(&mut self, effects: &mut Vec<Effect>) {
        self.state = NodeState::Leader;
        self.elapsed = 0;
        debug!(node = %self.id, term = self.current_term, votes = self.votes_received.len(), "became leader");
        effects.push(Effect::BecameLeader {
            term: self.current_term,
        });
    }

    fn become_follower(&mut self, effects: &mut Vec<Effect>) {
        let previous = self.state;
        self.state = NodeState::Follower;
        self.elapsed = 0;
        if previous != NodeState::Follower {
            effects.push(Effect::BecameFollower {
                term: self.current_term,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heartbeat(term: u64, leader: &str) -> ElectionEvent {
        ElectionEvent::Message(RaftMessage::Heartbeat {
            term,
            leader_id: NodeId::from(leader),
        })
    }

    #[test]
    fn new_node_starts_as_follower() {
        let node = RaftNode::new("node-0", 5, 3000);
        assert_eq!(node.state, NodeState::Follower);
        assert_eq!(node.current_term, 0);
        assert_eq!(node.voted_for, None);
        assert!(node.votes_received.is_empty());
        assert_eq!(node.elapsed, 0);
    }

    #[test]
    fn tick_below_timeout_only_accumulates() {
        let mut node = RaftNode::new("node-0", 5, 3000);
        let effects = node.step(ElectionEvent::Tick { dt: 2999 });
        assert!(effects.is_empty());
        assert_eq!(node.elapsed, 2999);
        assert_eq!(node.state, NodeState::Follower);
    }

    #[test]
    fn timeout_progress_is_clamped() {
        let mut node = RaftNode::new("node-0", 5, 2000);
        node.elapsed = 500;
        assert!((node.timeout_progress() - 0.25).abs() < f64::EPSILON);
        node.elapsed = 5000;
        assert_eq!(node.timeout_progress(), 1.0);
    }

    #[test]
    fn lower_term_heartbeat_resets_timer_but_keeps_term() {
        let mut node = RaftNode::new("node-0", 5, 3000);
        node.current_term = 3;
        node.elapsed = 1200;
        let effects = node.step(heartbeat(2, "node-1"));
        assert!(effects.is_empty());
        assert_eq!(node.elapsed, 0);
        assert_eq!(node.current_term, 3);
    }

    #[test]
    fn leader_ignores_same_term_vote_request() {
        let mut node = RaftNode::new("node-0", 1, 2000);
        node.step(ElectionEvent::Tick { dt: 2000 });
        assert!(node.is_leader());

        let effects = node.step(ElectionEvent::Message(RaftMessage::VoteRequest {
            term: 1,
            candidate_id: NodeId::from("node-4"),
        }));
        assert!(effects.is_empty());
        assert_eq!(node.voted_for, Some(NodeId::from("node-0")));
    }
}
