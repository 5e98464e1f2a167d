//! Dispatch scheduling for per-key work.
//!
//! A token bucket bounds how fast tasks are released, and a semaphore
//! bounds how many are outstanding at once.

use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Dispatch rate configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchRate {
    /// Minimum spacing between two dispatches. Zero disables the limit.
    pub interval: Duration,
}

impl DispatchRate {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    /// No limit.
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn is_limited(&self) -> bool {
        !self.interval.is_zero()
    }

    /// Format as human-readable string.
    pub fn display(&self) -> String {
        if !self.is_limited() {
            return "unlimited".to_string();
        }
        let per_sec = 1.0 / self.interval.as_secs_f64();
        if per_sec >= 1.0 {
            format!("{:.0} keys/s", per_sec)
        } else {
            format!("1 key every {:.1}s", self.interval.as_secs_f64())
        }
    }
}

impl Default for DispatchRate {
    fn default() -> Self {
        Self::unlimited()
    }
}

/// Releases tasks at a bounded rate with a bounded number in flight.
#[derive(Clone)]
pub struct DispatchLimiter {
    limiter: Option<Arc<RateLimiter<governor::state::NotKeyed, governor::state::InMemoryState, governor::clock::DefaultClock>>>,
    in_flight: Option<Arc<Semaphore>>,
    rate: DispatchRate,
}

impl DispatchLimiter {
    /// `max_in_flight == 0` leaves the number of outstanding tasks unbounded.
    pub fn new(rate: DispatchRate, max_in_flight: usize) -> Self {
        // Burst of one: releases are evenly spaced rather than bunched
        let limiter = if rate.is_limited() {
            Quota::with_period(rate.interval)
                .map(|quota| Arc::new(RateLimiter::direct(quota.allow_burst(nonzero!(1u32)))))
        } else {
            None
        };

        let in_flight = if max_in_flight > 0 {
            Some(Arc::new(Semaphore::new(max_in_flight)))
        } else {
            None
        };

        Self {
            limiter,
            in_flight,
            rate,
        }
    }

    pub fn unlimited() -> Self {
        Self::new(DispatchRate::unlimited(), 0)
    }

    pub fn rate(&self) -> DispatchRate {
        self.rate
    }

    /// Wait for the next dispatch slot.
    ///
    /// The returned ticket holds an in-flight slot until dropped; move it
    /// into the spawned task.
    pub async fn acquire(&self) -> DispatchTicket {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        let permit = match &self.in_flight {
            // Never closed
            Some(sem) => Arc::clone(sem).acquire_owned().await.ok(),
            None => None,
        };

        DispatchTicket { _permit: permit }
    }

}

impl Default for DispatchLimiter {
    fn default() -> Self {
        Self::unlimited()
    }
}

/// Proof that a task may run; frees its in-flight slot on drop.
pub struct DispatchTicket {
    _permit: Option<OwnedSemaphorePermit>,
}

/// Timing for one run phase.
#[derive(Debug, Clone, Default)]
pub struct PhaseTimer {
    /// Operations completed.
    pub operations: u64,
    pub start_time: Option<Instant>,
    pub end_time: Option<Instant>,
}

impl PhaseTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.start_time = Some(Instant::now());
        self.operations = 0;
    }

    pub fn record(&mut self, operations: u64) {
        self.operations += operations;
    }

    pub fn stop(&mut self) {
        self.end_time = Some(Instant::now());
    }

    pub fn elapsed(&self) -> Duration {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => end.duration_since(start),
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        }
    }

    /// Average operations per second.
    pub fn rate(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.operations as f64 / elapsed
        } else {
            0.0
        }
    }
}
