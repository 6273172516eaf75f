//! # clock
//!
//! why: feed the simulation from a frame-based time source
//! relations: its deltas go to Cluster::global_tick
//! what: FrameClock

use raft_election::Millis;

/// Converts absolute frame timestamps (fractional ms) into whole-ms tick deltas.
///
/// Fractions are carried to the next frame so no time is lost. The first
/// frame, and any frame that goes back in time, yields 0.
#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    last: Option<f64>,
    carry: f64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delta(&mut self, timestamp: f64) -> Millis {
        let Some(last) = self.last.replace(timestamp) else {
            return 0;
        };
        let elapsed = timestamp - last;
        if !elapsed.is_finite() || elapsed <= 0.0 {
            return 0;
        }

        self.carry += elapsed;
        let whole = self.carry.floor();
        self.carry -= whole;
        whole as Millis
    }

    /// Forget the previous frame, e.g. after the run was paused
    pub fn reset(&mut self) {
        self.last = None;
        self.carry = 0.0;
    }
}
