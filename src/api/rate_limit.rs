use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// How many checks pass between sweeps of idle callers.
const SWEEP_INTERVAL: u64 = 1024;

/// Rolling-window request throttle keyed by caller address. A caller may make
/// at most `max_requests` requests within any `window` span; excess requests
/// are rejected before they reach the store. A budget of 0 disables the
/// throttle.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    hits: DashMap<IpAddr, VecDeque<Instant>>,
    checks: AtomicU64,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        RateLimiter {
            max_requests,
            window,
            hits: DashMap::new(),
            checks: AtomicU64::new(0),
        }
    }

    /// Records one request for `addr` and reports whether it fits the budget.
    pub fn check(&self, addr: IpAddr) -> bool {
        self.check_at(addr, Instant::now())
    }

    fn check_at(&self, addr: IpAddr, now: Instant) -> bool {
        if self.max_requests == 0 {
            return true;
        }

        if self.checks.fetch_add(1, Ordering::Relaxed) % SWEEP_INTERVAL == SWEEP_INTERVAL - 1 {
            self.sweep(now);
        }

        let mut hits = self.hits.entry(addr).or_default();

        while hits
            .front()
            .is_some_and(|hit| now.duration_since(*hit) >= self.window)
        {
            hits.pop_front();
        }

        if hits.len() >= self.max_requests {
            return false;
        }

        hits.push_back(now);
        true
    }

    /// Drops callers whose most recent hit is older than the window, keeping
    /// the map bounded by the set of recently active addresses.
    fn sweep(&self, now: Instant) {
        self.hits
            .retain(|_, hits| hits.back().is_some_and(|hit| now.duration_since(*hit) < self.window));
    }

    #[cfg(test)]
    fn tracked_callers(&self) -> usize {
        self.hits.len()
    }
}
