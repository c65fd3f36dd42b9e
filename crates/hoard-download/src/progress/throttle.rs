//! Progress throttling.
//!
//! Caps how often a job's byte counts are written to the table and
//! announced, so a fast transfer cannot flood subscribers.

use std::time::{Duration, Instant};

/// Rate-limiter for progress updates of one job.
#[derive(Debug)]
pub struct ProgressThrottle {
    last_emit: Option<Instant>,
    min_interval: Duration,
}

impl ProgressThrottle {
    /// Create a throttle with the given minimum interval.
    pub const fn new(min_interval: Duration) -> Self {
        Self {
            last_emit: None,
            min_interval,
        }
    }

    /// Whether enough time has passed since the last accepted update.
    /// Accepting records the current time.
    pub fn should_emit(&mut self) -> bool {
        let now = Instant::now();
        match self.last_emit {
            Some(last) if now.duration_since(last) < self.min_interval => false,
            _ => {
                self.last_emit = Some(now);
                true
            }
        }
    }

    /// Time left until the next update would be accepted.
    pub fn remaining(&self) -> Duration {
        self.last_emit.map_or(Duration::ZERO, |last| {
            self.min_interval.saturating_sub(last.elapsed())
        })
    }
}
