//! Bounded exponential backoff with optional jitter.

use std::time::Duration;

use rand::Rng;

use crate::config::ReconnectConfig;

/// Tracks attempts within one connect cycle.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    max_attempts: Option<u32>,
    jitter: bool,
    attempts: u32,
}

impl Backoff {
    pub fn new(config: &ReconnectConfig) -> Self {
        Self {
            base: config.base_delay,
            max: config.max_delay,
            max_attempts: config.max_attempts,
            jitter: config.jitter,
            attempts: 0,
        }
    }

    /// Attempts recorded so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Record a failed attempt. Returns the delay before the next one, or
    /// `None` once the attempt budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.attempts = self.attempts.saturating_add(1);
        if self.max_attempts.is_some_and(|max| self.attempts >= max) {
            return None;
        }
        let delay = self.ceiling(self.attempts - 1);
        if !self.jitter {
            return Some(delay);
        }
        // Equal jitter: half fixed, half random.
        let half = delay.as_millis() as u64 / 2;
        let extra = rand::thread_rng().gen_range(0..=half);
        Some(Duration::from_millis(half + extra))
    }

    /// Un-jittered delay for the given retry index.
    fn ceiling(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.min(31));
        self.base.saturating_mul(factor).min(self.max)
    }
}
