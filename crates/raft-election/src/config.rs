//! # config
//!
//! why: keep election timing tunable instead of hard-coding it in the state machine
//! relations: read by raft-sim when it creates nodes
//! what: ElectionConfig, timeout sampling and validation

use crate::error::ConfigError;
use crate::Millis;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Election timing, in simulated milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElectionConfig {
    /// Inclusive lower bound of the randomized election timeout
    pub election_timeout_min: Millis,
    /// Exclusive upper bound of the randomized election timeout
    pub election_timeout_max: Millis,
}

impl Default for ElectionConfig {
    fn default() -> Self {
        // a 4s spread keeps simultaneous timeouts across 5 nodes rare
        Self {
            election_timeout_min: 2000,
            election_timeout_max: 6000,
        }
    }
}

impl ElectionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.election_timeout_min == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.election_timeout_min >= self.election_timeout_max {
            return Err(ConfigError::EmptyTimeoutRange {
                min: self.election_timeout_min,
                max: self.election_timeout_max,
            });
        }
        Ok(())
    }

    /// Draw one election timeout from `[min, max)`
    pub fn sample_timeout<R: Rng>(&self, rng: &mut R) -> Millis {
        rng.gen_range(self.election_timeout_min..self.election_timeout_max)
    }
}
