//! # config
//!
//! why: one serializable description of a simulation run
//! relations: consumed by cluster.rs; embeds raft-election's ElectionConfig and network.rs's NetworkConfig
//! what: SimConfig, json loading, validation

use crate::error::SimError;
use crate::network::NetworkConfig;
use raft_election::ElectionConfig;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Number of nodes created by `Cluster::new`
    pub cluster_size: usize,
    /// Seed for every random draw; equal seeds replay equal runs
    pub seed: u64,
    pub election: ElectionConfig,
    pub network: NetworkConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            cluster_size: 5,
            seed: 42,
            election: ElectionConfig::default(),
            network: NetworkConfig::default(),
        }
    }
}

impl SimConfig {
    /// Parse a config from json; absent fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self, SimError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SimError> {
        if self.cluster_size == 0 {
            return Err(SimError::EmptyCluster);
        }
        self.election.validate()?;
        self.network.validate()?;

        let heartbeat_gap = self
            .network
            .heartbeat_interval
            .saturating_add(self.network.heartbeat_delay);
        if heartbeat_gap >= self.election.election_timeout_min {
            warn!(
                heartbeat_gap,
                election_timeout_min = self.election.election_timeout_min,
                "heartbeats may arrive after follower timeouts; leaders will churn"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raft_election::ConfigError;

    #[test]
    fn default_config_is_valid() {
        let config = SimConfig::default();
        assert_eq!(config.cluster_size, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = SimConfig::from_json(r#"{ "cluster_size": 3, "network": { "heartbeat_interval": 500 } }"#).unwrap();
        assert_eq!(config.cluster_size, 3);
        assert_eq!(config.network.heartbeat_interval, 500);
        assert_eq!(config.network.heartbeat_delay, 300);
        assert_eq!(config.election, ElectionConfig::default());
    }

    #[test]
    fn zero_nodes_is_rejected() {
        let result = SimConfig::from_json(r#"{ "cluster_size": 0 }"#);
        assert!(matches!(result, Err(SimError::EmptyCluster)));
    }

    #[test]
    fn bad_election_range_is_rejected() {
        let result = SimConfig::from_json(
            r#"{ "election": { "election_timeout_min": 5000, "election_timeout_max": 100 } }"#,
        );
        assert!(matches!(
            result,
            Err(SimError::Election(ConfigError::EmptyTimeoutRange { .. }))
        ));
    }

    #[test]
    fn extreme_heartbeat_timing_is_accepted() {
        let config = SimConfig::from_json(
            r#"{ "network": { "heartbeat_interval": 18446744073709551615, "heartbeat_delay": 18446744073709551615 } }"#,
        )
        .unwrap();
        assert_eq!(config.network.heartbeat_interval, u64::MAX);
        assert_eq!(config.network.heartbeat_delay, u64::MAX);
    }

    #[test]
    fn malformed_json_is_reported() {
        assert!(matches!(SimConfig::from_json("{ nope"), Err(SimError::Json(_))));
    }
}
