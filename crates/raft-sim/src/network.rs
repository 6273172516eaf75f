//! # network
//!
//! why: turn state machine effects into delayed, loss-on-death message deliveries
//! relations: reads and mutates nodes through the Membership trait; owned by cluster.rs
//! what: NetworkConfig, Membership, NetworkSimulator, in-flight registry, stats

use crate::error::SimError;
use crate::queue::EventQueue;
use raft_election::{Effect, MessageKind, Millis, NodeId, NodeState, RaftMessage, RaftNode};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Identifier of one visible message transit
pub type FlightId = u64;

/// Latencies of the simulated network, in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Inclusive lower bound of a vote request's transit time
    pub vote_request_delay_min: Millis,
    /// Exclusive upper bound of a vote request's transit time
    pub vote_request_delay_max: Millis,
    /// Time a voter takes before its answer leaves
    pub vote_processing_delay: Millis,
    /// Transit time of a granted vote back to the candidate
    pub vote_response_delay: Millis,
    /// Transit time of a heartbeat
    pub heartbeat_delay: Millis,
    /// Time between heartbeat rounds while a node stays leader
    pub heartbeat_interval: Millis,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            vote_request_delay_min: 400,
            vote_request_delay_max: 600,
            vote_processing_delay: 100,
            vote_response_delay: 400,
            heartbeat_delay: 300,
            heartbeat_interval: 1000,
        }
    }
}

impl NetworkConfig {
    pub fn validate(&self) -> Result<(), SimError> {
        if self.vote_request_delay_min >= self.vote_request_delay_max {
            return Err(SimError::Network(format!(
                "vote request delay range [{}, {}) is empty",
                self.vote_request_delay_min, self.vote_request_delay_max
            )));
        }
        if self.heartbeat_interval == 0 {
            return Err(SimError::Network("heartbeat interval must be positive".into()));
        }
        Ok(())
    }
}

/// The cluster as seen by the network: who exists, who is alive, and a way in.
///
/// Liveness is owned by the implementor; the network only reads it.
pub trait Membership {
    /// Every known member, alive or not
    fn member_ids(&self) -> Vec<NodeId>;

    fn is_alive(&self, id: &NodeId) -> bool;

    /// Current state machine of a member
    fn machine(&self, id: &NodeId) -> Option<&RaftNode>;

    /// Hand a message to a member's state machine and return its effects
    fn deliver(&mut self, to: &NodeId, message: RaftMessage) -> Vec<Effect>;
}

/// A message currently travelling between two nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InFlightMessage {
    pub id: FlightId,
    pub kind: MessageKind,
    pub from: NodeId,
    pub to: NodeId,
    pub term: u64,
    /// Time since launch, capped at `duration`
    pub elapsed: Millis,
    /// Total transit time
    pub duration: Millis,
}

impl InFlightMessage {
    /// Fraction of the trip completed, in `[0, 1]`
    pub fn progress(&self) -> f64 {
        if self.duration == 0 {
            return 1.0;
        }
        self.elapsed as f64 / self.duration as f64
    }
}

/// Cumulative delivery counters since the last reset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NetworkStats {
    pub sent: u64,
    pub delivered: u64,
    /// Lost because an endpoint was dead when the message resolved
    pub dropped: u64,
}

#[derive(Debug, Clone)]
struct Flight {
    from: NodeId,
    to: NodeId,
    message: RaftMessage,
    launched_at: Millis,
    duration: Millis,
}

#[derive(Debug)]
enum Pending {
    /// A flight reaches its destination
    Arrive(FlightId),
    /// A voter's answer is decided from its state at this moment
    ResolveVote {
        candidate: NodeId,
        voter: NodeId,
        term: u64,
    },
    /// Periodic heartbeat broadcast of a leader elected in `term`
    HeartbeatRound { leader: NodeId, term: u64 },
}

/// Discrete-event network between cluster members.
///
/// Every delay is an entry in one [`EventQueue`]; [`advance`](Self::advance)
/// resolves the entries that are due. Killing a node cancels nothing: its
/// messages are dropped when they resolve.
#[derive(Debug)]
pub struct NetworkSimulator {
    config: NetworkConfig,
    rng: ChaCha8Rng,
    queue: EventQueue<Pending>,
    flights: BTreeMap<FlightId, Flight>,
    next_flight: FlightId,
    stats: NetworkStats,
}

impl NetworkSimulator {
    pub fn new(config: NetworkConfig, seed: u64) -> Self {
        Self {
            config,
            rng: ChaCha8Rng::seed_from_u64(seed),
            queue: EventQueue::new(),
            flights: BTreeMap::new(),
            next_flight: 0,
            stats: NetworkStats::default(),
        }
    }

    pub fn stats(&self) -> NetworkStats {
        self.stats
    }

    /// Number of scheduled actions, visible transits and internal timers alike
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Deadline of the earliest scheduled action
    pub fn next_deadline(&self) -> Option<Millis> {
        self.queue.peek_time()
    }

    /// Forget every scheduled delivery and timer
    pub fn clear(&mut self) {
        self.queue.clear();
        self.flights.clear();
        self.stats = NetworkStats::default();
    }

    /// Messages in transit at time `now`, oldest launch first
    pub fn in_flight(&self, now: Millis) -> Vec<InFlightMessage> {
        self.flights
            .iter()
            .map(|(id, flight)| InFlightMessage {
                id: *id,
                kind: flight.message.kind(),
                from: flight.from.clone(),
                to: flight.to.clone(),
                term: flight.message.term(),
                elapsed: now.saturating_sub(flight.launched_at).min(flight.duration),
                duration: flight.duration,
            })
            .collect()
    }

    /// React to the effects `origin` produced at time `now`
    pub fn on_effects<M: Membership>(&mut self, now: Millis, origin: &NodeId, effects: &[Effect], members: &M) {
        for effect in effects {
            match effect {
                Effect::BecameCandidate { term } => {
                    if members.is_alive(origin) {
                        self.broadcast_vote_requests(now, origin, *term, members);
                    }
                }
                Effect::BecameLeader { term } => {
                    if members.is_alive(origin) {
                        self.broadcast_heartbeats(now, origin, *term, members);
                    }
                    self.schedule_heartbeat_round(now, origin.clone(), *term);
                }
                Effect::BecameFollower { .. } | Effect::VoteGranted { .. } => {}
            }
        }
    }

    /// Resolve everything due at or before `now`; returns how many actions ran
    pub fn advance<M: Membership>(&mut self, now: Millis, members: &mut M) -> usize {
        let mut resolved = 0;
        while let Some((at, pending)) = self.queue.pop_due(now) {
            match pending {
                Pending::Arrive(flight) => self.arrive(at, flight, members),
                Pending::ResolveVote { candidate, voter, term } => {
                    self.resolve_vote(at, candidate, voter, term, members)
                }
                Pending::HeartbeatRound { leader, term } => self.heartbeat_round(at, leader, term, members),
            }
            resolved += 1;
        }
        resolved
    }

    fn broadcast_vote_requests<M: Membership>(&mut self, now: Millis, candidate: &NodeId, term: u64, members: &M) {
        // dead peers are still addressed; the request is lost on arrival
        for peer in members.member_ids() {
            if peer == *candidate {
                continue;
            }
            let delay = self
                .rng
                .gen_range(self.config.vote_request_delay_min..self.config.vote_request_delay_max);
            let message = RaftMessage::VoteRequest {
                term,
                candidate_id: candidate.clone(),
            };
            self.launch(now, candidate.clone(), peer, message, delay);
        }
    }

    fn broadcast_heartbeats<M: Membership>(&mut self, now: Millis, leader: &NodeId, term: u64, members: &M) {
        for peer in members.member_ids() {
            if peer == *leader || !members.is_alive(&peer) {
                continue;
            }
            let message = RaftMessage::Heartbeat {
                term,
                leader_id: leader.clone(),
            };
            let delay = self.config.heartbeat_delay;
            self.launch(now, leader.clone(), peer, message, delay);
        }
    }

    fn launch(&mut self, now: Millis, from: NodeId, to: NodeId, message: RaftMessage, duration: Millis) {
        let id = self.next_flight;
        self.next_flight += 1;
        trace!(flight = id, kind = %message.kind(), from = %from, to = %to, duration, "message launched");
        self.flights.insert(
            id,
            Flight {
                from,
                to,
                message,
                launched_at: now,
                duration,
            },
        );
        self.queue.push(now.saturating_add(duration), Pending::Arrive(id));
        self.stats.sent += 1;
    }

    fn arrive<M: Membership>(&mut self, at: Millis, id: FlightId, members: &mut M) {
        let Some(flight) = self.flights.remove(&id) else {
            return;
        };
        if !members.is_alive(&flight.from) || !members.is_alive(&flight.to) {
            trace!(flight = id, kind = %flight.message.kind(), from = %flight.from, to = %flight.to, "message dropped: endpoint dead");
            self.stats.dropped += 1;
            return;
        }

        let kind = flight.message.kind();
        let term = flight.message.term();
        trace!(flight = id, %kind, from = %flight.from, to = %flight.to, term, "message delivered");
        let effects = members.deliver(&flight.to, flight.message);
        self.stats.delivered += 1;

        if kind == MessageKind::VoteRequest {
            self.queue.push(
                at.saturating_add(self.config.vote_processing_delay),
                Pending::ResolveVote {
                    candidate: flight.from.clone(),
                    voter: flight.to.clone(),
                    term,
                },
            );
        }
        self.on_effects(at, &flight.to, &effects, members);
    }

    fn resolve_vote<M: Membership>(&mut self, at: Millis, candidate: NodeId, voter: NodeId, term: u64, members: &M) {
        if !members.is_alive(&candidate) || !members.is_alive(&voter) {
            trace!(candidate = %candidate, voter = %voter, term, "vote lost: endpoint dead");
            return;
        }
        // current state, not the state at request time
        let granted = members
            .machine(&voter)
            .map(|node| node.current_term == term && node.voted_for.as_ref() == Some(&candidate))
            .unwrap_or(false);
        if !granted {
            trace!(candidate = %candidate, voter = %voter, term, "no vote to send");
            return;
        }

        let message = RaftMessage::VoteResponse {
            term,
            granted: true,
            voter: voter.clone(),
        };
        let delay = self.config.vote_response_delay;
        self.launch(at, voter, candidate, message, delay);
    }

    fn heartbeat_round<M: Membership>(&mut self, at: Millis, leader: NodeId, term: u64, members: &M) {
        let still_leading = members
            .machine(&leader)
            .map(|node| node.state == NodeState::Leader && node.current_term == term)
            .unwrap_or(false);
        if !still_leading {
            debug!(leader = %leader, term, "heartbeat rounds stopped");
            return;
        }

        // a dead leader keeps its timer but stays silent
        if members.is_alive(&leader) {
            self.broadcast_heartbeats(at, &leader, term, members);
        }
        self.schedule_heartbeat_round(at, leader, term);
    }

    fn schedule_heartbeat_round(&mut self, now: Millis, leader: NodeId, term: u64) {
        // past the end of representable time there is no next round
        match now.checked_add(self.config.heartbeat_interval) {
            Some(at) => self.queue.push(at, Pending::HeartbeatRound { leader, term }),
            None => trace!(leader = %leader, term, "heartbeat round beyond the end of time"),
        }
    }
}
