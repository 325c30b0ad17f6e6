//! # Global runtime configuration.
//!
//! [`Config`] centralizes the timing knobs of a [`Container`](crate::Container):
//!
//! 1. **Shutdown behavior**: grace period for the interrupt phase of the
//!    two-phase stop escalation.
//! 2. **Liveness enforcement**: how often health-check ticks are broadcast,
//!    and the default startup/health-check deadlines applied to children
//!    whose [`ChildSpec`](crate::ChildSpec) does not override them.
//! 3. **Reaping**: how long to wait for a child whose channel closed before
//!    escalating to a forced kill.
//!
//! ## Sentinel values
//! - `startup_timeout = None` → no startup deadline
//! - `health_check_timeout = None` → no liveness deadline

use std::time::Duration;

/// Environment variable overriding [`processor_count`].
pub const PROCESSOR_COUNT: &str = "PROCVISOR_PROCESSOR_COUNT";

/// Returns the number of workers to spawn when no count is given.
///
/// Reads the `PROCVISOR_PROCESSOR_COUNT` environment variable if set to a
/// positive integer, otherwise the number of hardware processors.
pub fn processor_count() -> usize {
    std::env::var(PROCESSOR_COUNT)
        .ok()
        .and_then(|value| value.parse().ok())
        .filter(|count| *count > 0)
        .unwrap_or_else(num_cpus::get)
}

/// Global configuration for a container runtime.
///
/// All fields are public; [`Config::default`] is a reasonable starting point
/// for long-running worker pools.
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum time to wait for children to exit after the interrupt
    /// broadcast before escalating to kill.
    ///
    /// Used by [`Container::stop`](crate::Container::stop). The kill phase
    /// that follows is unconditional, so `stop` always completes in bounded
    /// time regardless of how children handle signals.
    pub grace: Duration,

    /// Interval between health-check broadcasts while waiting on the group.
    ///
    /// Every tick resumes each waiter with a sentinel token; the waiter
    /// compares its child's age against the applicable deadline. Timing
    /// enforcement therefore never needs a separate timer thread.
    pub health_check_interval: Duration,

    /// How long to wait for a child whose channel reached EOF to report its
    /// exit status before force-killing it.
    ///
    /// A child that closes all descriptors but keeps running must never
    /// stall the supervisor.
    pub reap_grace: Duration,

    /// Default startup deadline for children that do not override it.
    ///
    /// Applies from launch until the child's first ready message.
    pub startup_timeout: Option<Duration>,

    /// Default liveness deadline for children that do not override it.
    ///
    /// Applies after the child's first ready message; the age clock resets
    /// on every message the child sends.
    pub health_check_timeout: Option<Duration>,
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `grace = 10s`
    /// - `health_check_interval = 1s`
    /// - `reap_grace = 5s`
    /// - no startup or health-check deadlines
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(10),
            health_check_interval: Duration::from_secs(1),
            reap_grace: Duration::from_secs(5),
            startup_timeout: None,
            health_check_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processor_count_is_positive() {
        assert!(processor_count() > 0);
    }
}
