//! # Container statistics and sliding-window rate tracking.
//!
//! [`Statistics`] keeps three monotonic counters (spawns, restarts,
//! failures) and two [`Rate`] windows (restarts per second, failures per
//! second). Counters are atomics so the supervising tasks can record events
//! without coordination; `failed()` gives a cheap non-blocking signal of
//! unhealthy state without inspecting every child.
//!
//! ## Rate semantics
//! [`Rate`] is a fixed-size circular buffer with one integer slot per
//! second. `add` increments the slot for the current second, resetting it
//! first if its last update is older than the window. `total` sums only
//! slots whose last update falls within the window, so events older than
//! `window` seconds never contribute, including across slot reuse.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

/// Sliding-window event counter with one-second resolution.
#[derive(Debug)]
pub struct Rate {
    window: u64,
    slots: Vec<Slot>,
    epoch: Instant,
}

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    /// Second (relative to the epoch) this slot last counted for.
    at: u64,
    count: u64,
}

impl Rate {
    /// Creates a rate tracker covering the last `window` seconds.
    pub fn new(window: u64) -> Self {
        let window = window.max(1);
        Self {
            window,
            slots: vec![Slot::default(); window as usize],
            epoch: Instant::now(),
        }
    }

    /// Seconds elapsed since this tracker was created.
    fn now(&self) -> u64 {
        self.epoch.elapsed().as_secs()
    }

    /// Records one event at the current time.
    pub fn add(&mut self) {
        self.add_at(self.now());
    }

    /// Total number of events within the window ending now.
    pub fn total(&self) -> u64 {
        self.total_at(self.now())
    }

    /// Average events per second over the window.
    pub fn per_second(&self) -> f64 {
        self.total() as f64 / self.window as f64
    }

    /// Average events per minute over the window.
    pub fn per_minute(&self) -> f64 {
        self.per_second() * 60.0
    }

    /// Records one event at second `at`.
    ///
    /// The slot is reset before incrementing when its last update does not
    /// belong to `at`; a slot can only hold seconds congruent to its index
    /// modulo the window, so a mismatch means the entry is stale.
    pub(crate) fn add_at(&mut self, at: u64) {
        let index = (at % self.window) as usize;
        let slot = &mut self.slots[index];
        if slot.at != at {
            slot.at = at;
            slot.count = 0;
        }
        slot.count += 1;
    }

    /// Sums events whose timestamp lies in `(at - window, at]`.
    pub(crate) fn total_at(&self, at: u64) -> u64 {
        self.slots
            .iter()
            .filter(|slot| slot.at <= at && at - slot.at < self.window)
            .map(|slot| slot.count)
            .sum()
    }
}

/// Window, in seconds, used by the statistics rate trackers.
const RATE_WINDOW: u64 = 60;

/// Tracks spawn/restart/failure counts for a container.
#[derive(Debug)]
pub struct Statistics {
    spawns: AtomicU64,
    restarts: AtomicU64,
    failures: AtomicU64,
    restart_rate: Mutex<Rate>,
    failure_rate: Mutex<Rate>,
}

impl Default for Statistics {
    fn default() -> Self {
        Self::new()
    }
}

impl Statistics {
    /// Creates an empty statistics instance.
    pub fn new() -> Self {
        Self {
            spawns: AtomicU64::new(0),
            restarts: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            restart_rate: Mutex::new(Rate::new(RATE_WINDOW)),
            failure_rate: Mutex::new(Rate::new(RATE_WINDOW)),
        }
    }

    /// Records one child spawn.
    pub fn record_spawn(&self) {
        self.spawns.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one child restart.
    pub fn record_restart(&self) {
        self.restarts.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut rate) = self.restart_rate.lock() {
            rate.add();
        }
    }

    /// Records one child failure.
    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut rate) = self.failure_rate.lock() {
            rate.add();
        }
    }

    /// How many children have been spawned.
    pub fn spawns(&self) -> u64 {
        self.spawns.load(Ordering::Relaxed)
    }

    /// How many children have been restarted.
    pub fn restarts(&self) -> u64 {
        self.restarts.load(Ordering::Relaxed)
    }

    /// How many children have failed.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Whether any child has failed.
    pub fn failed(&self) -> bool {
        self.failures() > 0
    }

    /// Restarts per second over the last minute.
    pub fn restart_rate(&self) -> f64 {
        self.restart_rate
            .lock()
            .map(|rate| rate.per_second())
            .unwrap_or(0.0)
    }

    /// Failures per second over the last minute.
    pub fn failure_rate(&self) -> f64 {
        self.failure_rate
            .lock()
            .map(|rate| rate.per_second())
            .unwrap_or(0.0)
    }

    /// Merges another statistics instance into this one.
    ///
    /// Used to aggregate over nested containers. Only the counters are
    /// merged; rates stay local to each instance.
    pub fn append(&self, other: &Statistics) {
        self.spawns.fetch_add(other.spawns(), Ordering::Relaxed);
        self.restarts.fetch_add(other.restarts(), Ordering::Relaxed);
        self.failures.fetch_add(other.failures(), Ordering::Relaxed);
    }
}
