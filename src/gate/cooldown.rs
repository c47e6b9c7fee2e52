//! Weak-edge cooldown
//!
//! Tracks the realized edge of recent settled cycles. A run of consecutive
//! weak edges means the market has drifted against the strategy; the
//! tracker then arms an unconditional-reject window so the loop stops
//! churning gas until conditions change.

use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::warn;

/// Consecutive weak edges required to arm the cooldown.
const WEAK_EDGE_RUN: usize = 3;

pub struct EdgeCooldown {
    /// Realized edge below this (ETH-wei per FCT, signed) counts as weak
    warn_threshold: i128,
    duration: Duration,
    recent: VecDeque<i128>,
    armed_until: Option<Instant>,
}

impl EdgeCooldown {
    pub fn new(warn_threshold: i128, duration: Duration) -> Self {
        Self {
            warn_threshold,
            duration,
            recent: VecDeque::with_capacity(WEAK_EDGE_RUN),
            armed_until: None,
        }
    }

    /// Records the realized edge of a settled cycle. Arms the cooldown when
    /// the last [`WEAK_EDGE_RUN`] edges were all weak; the run then resets so
    /// re-arming needs a fresh run.
    pub fn record_edge(&mut self, edge_wei: i128) {
        if edge_wei >= self.warn_threshold {
            self.recent.clear();
            return;
        }
        self.recent.push_back(edge_wei);
        if self.recent.len() >= WEAK_EDGE_RUN {
            warn!(
                run = self.recent.len(),
                cooldown_secs = self.duration.as_secs(),
                "repeated weak edges, arming cooldown"
            );
            self.armed_until = Some(Instant::now() + self.duration);
            self.recent.clear();
        }
    }

    pub fn is_active(&self) -> bool {
        self.armed_until
            .map_or(false, |until| Instant::now() < until)
    }

    /// Time left on an armed cooldown, for logging.
    pub fn remaining(&self) -> Option<Duration> {
        self.armed_until
            .and_then(|until| until.checked_duration_since(Instant::now()))
            .filter(|d| !d.is_zero())
    }
}
