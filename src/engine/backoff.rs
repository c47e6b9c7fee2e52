//! Exponential backoff for hard cycle failures.

use std::time::Duration;

pub struct BackoffPolicy {
    base: Duration,
    ceiling: Duration,
    current: Option<Duration>,
}

impl BackoffPolicy {
    pub fn new(base: Duration, ceiling: Duration) -> Self {
        Self {
            base,
            ceiling,
            current: None,
        }
    }

    /// Next delay after a hard failure: base, then doubling up to the
    /// ceiling.
    pub fn next_delay(&mut self) -> Duration {
        let next = match self.current {
            None => self.base,
            Some(cur) => (cur * 2).min(self.ceiling),
        };
        self.current = Some(next);
        next
    }

    /// A successful cycle resets the progression.
    pub fn reset(&mut self) {
        self.current = None;
    }
}
