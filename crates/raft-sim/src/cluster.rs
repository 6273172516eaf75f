//! # cluster
//!
//! why: own node lifecycle and liveness, and fan the global clock out to live nodes
//! relations: holds raft-election nodes, routes their effects into network.rs
//! what: Cluster coordinator commands and queries, Members registry

use crate::config::SimConfig;
use crate::error::SimError;
use crate::network::{InFlightMessage, Membership, NetworkSimulator, NetworkStats};
use crate::view::{ClusterView, NodeSnapshot};
use raft_election::{Effect, ElectionEvent, Millis, NodeId, NodeState, RaftMessage, RaftNode};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use tracing::{info, trace};

#[derive(Debug)]
struct Member {
    machine: RaftNode,
    alive: bool,
}

/// Node registry with coordinator-owned liveness flags
#[derive(Debug, Default)]
struct Members {
    nodes: BTreeMap<NodeId, Member>,
}

impl Members {
    fn tick(&mut self, id: &NodeId, dt: Millis) -> Vec<Effect> {
        match self.nodes.get_mut(id) {
            Some(member) if member.alive => member.machine.step(ElectionEvent::Tick { dt }),
            _ => Vec::new(),
        }
    }

    fn snapshot(&self, id: &NodeId) -> Option<NodeSnapshot> {
        self.nodes
            .get(id)
            .map(|member| NodeSnapshot::new(&member.machine, member.alive))
    }
}

impl Membership for Members {
    fn member_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().cloned().collect()
    }

    fn is_alive(&self, id: &NodeId) -> bool {
        self.nodes.get(id).is_some_and(|member| member.alive)
    }

    fn machine(&self, id: &NodeId) -> Option<&RaftNode> {
        self.nodes.get(id).map(|member| &member.machine)
    }

    fn deliver(&mut self, to: &NodeId, message: RaftMessage) -> Vec<Effect> {
        match self.nodes.get_mut(to) {
            Some(member) if member.alive => member.machine.step(ElectionEvent::Message(message)),
            _ => Vec::new(),
        }
    }
}

/// The cluster coordinator.
///
/// Single-threaded and fully deterministic: given the same config and the same
/// sequence of commands, every run produces identical states.
#[derive(Debug)]
pub struct Cluster {
    config: SimConfig,
    rng: ChaCha8Rng,
    members: Members,
    network: NetworkSimulator,
    now: Millis,
    running: bool,
}

impl Cluster {
    /// Build a stopped cluster of `config.cluster_size` nodes
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        config.validate()?;
        let network = NetworkSimulator::new(config.network.clone(), config.seed.wrapping_add(1));
        let mut cluster = Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            members: Members::default(),
            network,
            now: 0,
            running: false,
            config,
        };
        cluster.initialize_cluster(cluster.config.cluster_size)?;
        Ok(cluster)
    }

    /// Discard every node and message, then create `n` fresh followers
    pub fn initialize_cluster(&mut self, n: usize) -> Result<(), SimError> {
        if n == 0 {
            return Err(SimError::EmptyCluster);
        }
        let timeouts: Vec<Millis> = (0..n)
            .map(|_| self.config.election.sample_timeout(&mut self.rng))
            .collect();
        self.rebuild(&timeouts);
        Ok(())
    }

    /// Like [`initialize_cluster`](Self::initialize_cluster), with one chosen timeout per node
    pub fn initialize_with_timeouts(&mut self, timeouts: &[Millis]) -> Result<(), SimError> {
        if timeouts.is_empty() {
            return Err(SimError::EmptyCluster);
        }
        if let Some(index) = timeouts.iter().position(|t| *t == 0) {
            return Err(SimError::ZeroTimeout { index });
        }
        self.rebuild(timeouts);
        Ok(())
    }

    fn rebuild(&mut self, timeouts: &[Millis]) {
        let size = timeouts.len();
        self.members.nodes = timeouts
            .iter()
            .enumerate()
            .map(|(i, timeout)| {
                let machine = RaftNode::new(format!("node-{i}"), size, *timeout);
                (machine.id.clone(), Member { machine, alive: true })
            })
            .collect();
        self.network.clear();
        self.now = 0;
        self.running = false;
        info!(size, ?timeouts, "cluster initialized");
    }

    pub fn start(&mut self) {
        self.running = true;
        info!(now = self.now, "simulation started");
    }

    /// Freeze the clock feed; node state is kept
    pub fn stop(&mut self) {
        self.running = false;
        info!(now = self.now, "simulation stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Advance simulated time by `dt`.
    ///
    /// The tick is cut at every network deadline inside it: nodes age up to the
    /// deadline, then the deliveries due there resolve. Does nothing while stopped.
    pub fn global_tick(&mut self, dt: Millis) {
        if !self.running {
            return;
        }
        let target = self.now.saturating_add(dt);
        while let Some(deadline) = self.network.next_deadline().filter(|at| *at <= target) {
            let step = deadline.saturating_sub(self.now);
            self.now = self.now.max(deadline);
            self.tick_members(step);
            self.network.advance(self.now, &mut self.members);
        }
        let step = target - self.now;
        self.now = target;
        self.tick_members(step);
    }

    fn tick_members(&mut self, step: Millis) {
        if step == 0 {
            return;
        }
        for id in self.members.member_ids() {
            let effects = self.members.tick(&id, step);
            if !effects.is_empty() {
                trace!(node = %id, ?effects, "tick effects");
                self.network.on_effects(self.now, &id, &effects, &self.members);
            }
        }
    }

    /// Feed `total` ms in ticks of at most `step` ms
    pub fn run_for(&mut self, total: Millis, step: Millis) {
        if step == 0 {
            return;
        }
        let mut remaining = total;
        while remaining > 0 {
            let dt = step.min(remaining);
            self.global_tick(dt);
            remaining -= dt;
        }
    }

    /// Kill a live node or revive a dead one; returns the new liveness
    pub fn toggle_liveness(&mut self, id: &NodeId) -> Result<bool, SimError> {
        let member = self
            .members
            .nodes
            .get_mut(id)
            .ok_or_else(|| SimError::UnknownNode(id.clone()))?;
        member.alive = !member.alive;
        info!(node = %id, alive = member.alive, now = self.now, "liveness toggled");
        Ok(member.alive)
    }

    pub fn now(&self) -> Millis {
        self.now
    }

    pub fn stats(&self) -> NetworkStats {
        self.network.stats()
    }

    pub fn node(&self, id: &NodeId) -> Option<NodeSnapshot> {
        self.members.snapshot(id)
    }

    /// Snapshots of every node, ordered by id
    pub fn nodes(&self) -> Vec<NodeSnapshot> {
        self.members
            .nodes
            .values()
            .map(|member| NodeSnapshot::new(&member.machine, member.alive))
            .collect()
    }

    pub fn in_flight(&self) -> Vec<InFlightMessage> {
        self.network.in_flight(self.now)
    }

    /// The live leader with the highest term, if any
    pub fn leader(&self) -> Option<NodeId> {
        self.members
            .nodes
            .values()
            .filter(|member| member.alive && member.machine.state == NodeState::Leader)
            .max_by_key(|member| member.machine.current_term)
            .map(|member| member.machine.id.clone())
    }

    pub fn view(&self) -> ClusterView {
        ClusterView {
            now: self.now,
            running: self.running,
            leader: self.leader(),
            nodes: self.nodes(),
            in_flight: self.in_flight(),
            stats: self.stats(),
        }
    }

    pub fn view_json(&self) -> Result<String, SimError> {
        Ok(serde_json::to_string(&self.view())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster() -> Cluster {
        Cluster::new(SimConfig::default()).unwrap()
    }

    #[test]
    fn new_cluster_is_stopped_and_fresh() {
        let cluster = cluster();
        assert!(!cluster.is_running());
        assert_eq!(cluster.now(), 0);

        let nodes = cluster.nodes();
        assert_eq!(nodes.len(), 5);
        for (i, node) in nodes.iter().enumerate() {
            assert_eq!(node.id, NodeId::new(format!("node-{i}")));
            assert_eq!(node.state, NodeState::Follower);
            assert_eq!(node.term, 0);
            assert!(node.alive);
            assert!((2000..6000).contains(&node.election_timeout));
        }
    }

    #[test]
    fn same_seed_same_timeouts() {
        let a: Vec<_> = cluster().nodes().into_iter().map(|n| n.election_timeout).collect();
        let b: Vec<_> = cluster().nodes().into_iter().map(|n| n.election_timeout).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn ticks_are_ignored_while_stopped() {
        let mut cluster = cluster();
        cluster.global_tick(10_000);
        assert_eq!(cluster.now(), 0);
        assert!(cluster.nodes().iter().all(|n| n.elapsed == 0));
    }

    #[test]
    fn stop_keeps_node_state() {
        let mut cluster = cluster();
        cluster.start();
        cluster.run_for(1000, 10);
        cluster.stop();
        cluster.run_for(1000, 10);

        assert_eq!(cluster.now(), 1000);
        assert!(cluster.nodes().iter().all(|n| n.elapsed == 1000));
    }

    #[test]
    fn reinitialize_discards_everything() {
        let mut cluster = cluster();
        cluster.start();
        cluster.run_for(8000, 10);
        cluster.toggle_liveness(&NodeId::from("node-1")).unwrap();

        cluster.initialize_cluster(3).unwrap();

        assert!(!cluster.is_running());
        assert_eq!(cluster.now(), 0);
        assert!(cluster.in_flight().is_empty());
        assert_eq!(cluster.stats(), NetworkStats::default());
        let nodes = cluster.nodes();
        assert_eq!(nodes.len(), 3);
        assert!(nodes.iter().all(|n| n.alive && n.term == 0 && n.state == NodeState::Follower));
    }

    #[test]
    fn unbounded_heartbeat_timing_still_elects() {
        let mut config = SimConfig::default();
        config.network.heartbeat_delay = Millis::MAX;
        config.network.heartbeat_interval = Millis::MAX;
        let mut cluster = Cluster::new(config).unwrap();
        cluster.initialize_with_timeouts(&[2000, 5000, 5500, 5800, 5900]).unwrap();
        cluster.start();

        cluster.run_for(3200, 10);
        assert_eq!(cluster.leader(), Some(NodeId::from("node-0")));

        cluster.global_tick(Millis::MAX);
        assert_eq!(cluster.now(), Millis::MAX);
        cluster.global_tick(1000);
        assert_eq!(cluster.now(), Millis::MAX);
    }

    #[test]
    fn toggle_flips_liveness() {
        let mut cluster = cluster();
        let id = NodeId::from("node-3");
        assert!(!cluster.toggle_liveness(&id).unwrap());
        assert!(!cluster.node(&id).unwrap().alive);
        assert!(cluster.toggle_liveness(&id).unwrap());
    }

    #[test]
    fn toggling_unknown_node_fails() {
        let mut cluster = cluster();
        let result = cluster.toggle_liveness(&NodeId::from("node-99"));
        assert!(matches!(result, Err(SimError::UnknownNode(id)) if id.as_str() == "node-99"));
    }

    #[test]
    fn empty_cluster_is_rejected() {
        let mut cluster = cluster();
        assert!(matches!(cluster.initialize_cluster(0), Err(SimError::EmptyCluster)));
        assert!(matches!(cluster.initialize_with_timeouts(&[]), Err(SimError::EmptyCluster)));
        assert!(matches!(
            cluster.initialize_with_timeouts(&[3000, 0]),
            Err(SimError::ZeroTimeout { index: 1 })
        ));
    }
}
