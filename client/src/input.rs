//! Outgoing input rate limiting

use std::time::{Duration, Instant};

/// Lets at most one INPUT through per `min_interval`. Inputs offered inside the
/// interval are dropped, never queued.
#[derive(Debug, Clone)]
pub struct InputThrottle {
    min_interval: Duration,
    last_sent: Option<Instant>,
}

impl InputThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_sent: None,
        }
    }

    /// Returns true and records `now` if an input may be sent.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_sent {
            if now.saturating_duration_since(last) < self.min_interval {
                return false;
            }
        }
        self.last_sent = Some(now);
        true
    }

    pub fn reset(&mut self) {
        self.last_sent = None;
    }
}
