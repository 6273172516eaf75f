//! # safety property tests
//!
//! why: election safety must hold under any seed and any kill/revive schedule
//! relations: drives raft-sim's Cluster with generated command sequences
//! what: monotonic terms, one vote per term, one leader per term, frozen dead nodes

use proptest::prelude::*;
use raft_sim::{Cluster, NodeId, NodeSnapshot, NodeState, SimConfig};
use std::collections::HashMap;

#[derive(Debug, Clone)]
enum Op {
    Tick(u64),
    Toggle(usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        9 => (1u64..200).prop_map(Op::Tick),
        1 => (0usize..5).prop_map(Op::Toggle),
    ]
}

/// Everything observed so far, checked against each new snapshot
#[derive(Default)]
struct History {
    terms: HashMap<NodeId, u64>,
    votes: HashMap<(NodeId, u64), NodeId>,
    leaders: HashMap<u64, NodeId>,
}

impl History {
    fn check(&mut self, nodes: &[NodeSnapshot]) -> Result<(), TestCaseError> {
        for node in nodes {
            let last_term = self.terms.entry(node.id.clone()).or_insert(node.term);
            prop_assert!(node.term >= *last_term, "{} went back from term {} to {}", node.id, last_term, node.term);
            *last_term = node.term;

            if let Some(voted) = &node.voted_for {
                let first = self
                    .votes
                    .entry((node.id.clone(), node.term))
                    .or_insert_with(|| voted.clone());
                prop_assert_eq!(&*first, voted, "{} changed its vote in term {}", node.id, node.term);
            }

            if node.state == NodeState::Leader {
                let leader = self.leaders.entry(node.term).or_insert_with(|| node.id.clone());
                prop_assert_eq!(&*leader, &node.id, "two leaders in term {}", node.term);
            }
        }
        Ok(())
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn election_safety_holds(seed in any::<u64>(), ops in prop::collection::vec(arb_op(), 1..400)) {
        let config = SimConfig { seed, ..SimConfig::default() };
        let mut cluster = Cluster::new(config).unwrap();
        cluster.start();
        let mut history = History::default();

        for op in ops {
            match op {
                Op::Tick(dt) => {
                    let frozen: Vec<NodeSnapshot> =
                        cluster.nodes().into_iter().filter(|n| !n.alive).collect();
                    cluster.global_tick(dt);
                    for before in frozen {
                        prop_assert_eq!(cluster.node(&before.id).unwrap(), before);
                    }
                }
                Op::Toggle(i) => {
                    cluster.toggle_liveness(&NodeId::new(format!("node-{i}"))).unwrap();
                }
            }
            history.check(&cluster.nodes())?;
        }
    }

    #[test]
    fn full_cluster_elects_a_leader(seed in any::<u64>()) {
        let config = SimConfig { seed, ..SimConfig::default() };
        let mut cluster = Cluster::new(config).unwrap();
        cluster.start();

        let mut elected = false;
        for _ in 0..60 {
            cluster.run_for(1000, 10);
            if cluster.leader().is_some() {
                elected = true;
                break;
            }
        }
        prop_assert!(elected, "no leader after 60s with every node alive");
    }
}
