//! # error
//!
//! why: report invalid election configuration before a cluster is built
//! relations: returned by config.rs, wrapped by raft-sim's SimError
//! what: ConfigError

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The half-open timeout range `[min, max)` contains no value
    #[error("election timeout range [{min}, {max}) is empty")]
    EmptyTimeoutRange { min: u64, max: u64 },

    /// A zero timeout would put a node into candidacy on its first tick
    #[error("election timeout minimum must be positive")]
    ZeroTimeout,
}
