//! Rate limiter enforcing both per-second and per-minute request limits.
//!
//! Callers reserve a send slot under a lock and sleep until it arrives,
//! so the limiter stays correct when several tasks share one client.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Rate limiter with dual constraints (per-second and per-minute)
#[derive(Debug)]
pub struct RateLimiter {
    /// Maximum requests per second
    max_per_second: f64,
    /// Maximum requests per minute
    max_per_minute: u32,
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    /// Most recently reserved send slot
    last_slot: Option<Instant>,
    /// Reserved slots within the last minute
    recent: VecDeque<Instant>,
}

impl RateLimiter {
    /// Create a new rate limiter
    pub fn new(max_per_second: f64, max_per_minute: u32) -> Self {
        Self {
            max_per_second,
            max_per_minute,
            state: Mutex::new(State::default()),
        }
    }

    /// Wait until a request can be made, respecting both rate limits
    pub async fn acquire(&self) {
        let slot = self.reserve(Instant::now());
        let now = Instant::now();
        if slot > now {
            tracing::debug!(
                wait_ms = (slot - now).as_millis(),
                "Rate limit: waiting for send slot"
            );
            tokio::time::sleep(slot - now).await;
        }
    }

    /// Reserve the next send slot at or after `now`
    fn reserve(&self, now: Instant) -> Instant {
        let mut state = self.state.lock().expect("rate limiter lock poisoned");

        // Drop slots that aged out of the one-minute window.
        while let Some(&front) = state.recent.front() {
            if now >= front + Duration::from_secs(60) {
                state.recent.pop_front();
            } else {
                break;
            }
        }

        let mut slot = now;

        // Per-second limit: keep a minimum interval from the previous slot.
        let min_interval = Duration::from_secs_f64(1.0 / self.max_per_second);
        if let Some(last) = state.last_slot {
            let earliest = last + min_interval;
            if earliest > slot {
                slot = earliest;
            }
        }

        // Per-minute limit: wait until the gating reservation is a minute old.
        if state.recent.len() >= self.max_per_minute as usize {
            let gate_index = state.recent.len() - self.max_per_minute as usize;
            let gate = state.recent[gate_index] + Duration::from_secs(60);
            if gate > slot {
                slot = gate;
            }
        }

        state.last_slot = Some(slot);
        state.recent.push_back(slot);
        slot
    }

    /// Number of reservations within the last minute
    pub fn current_minute_count(&self) -> usize {
        let now = Instant::now();
        let state = self.state.lock().expect("rate limiter lock poisoned");
        state
            .recent
            .iter()
            .filter(|&&slot| now < slot + Duration::from_secs(60))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_second_spacing() {
        let limiter = RateLimiter::new(2.0, 50);
        let now = Instant::now();

        let first = limiter.reserve(now);
        let second = limiter.reserve(now);
        let third = limiter.reserve(now);

        assert_eq!(first, now);
        assert!(second >= now + Duration::from_millis(500));
        assert!(third >= now + Duration::from_millis(1000));
    }

    #[test]
    fn test_per_minute_gate() {
        let limiter = RateLimiter::new(1000.0, 3);
        let now = Instant::now();

        for _ in 0..3 {
            limiter.reserve(now);
        }
        let fourth = limiter.reserve(now);

        // The fourth request must wait until the first slot is a minute old.
        assert!(fourth >= now + Duration::from_secs(59));
    }

    #[tokio::test]
    async fn test_acquire_spaces_requests() {
        let limiter = RateLimiter::new(20.0, 100);

        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }

        // 20 rps means 50ms between slots; three acquires span at least 100ms.
        assert!(start.elapsed() >= Duration::from_millis(90));
    }

    #[test]
    fn test_current_minute_count() {
        let limiter = RateLimiter::new(2.0, 50);
        assert_eq!(limiter.current_minute_count(), 0);

        limiter.reserve(Instant::now());
        assert_eq!(limiter.current_minute_count(), 1);
    }
}
