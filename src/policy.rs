//! # Pluggable failure policy.
//!
//! The scheduler owns the failure-handling *mechanism* (age clocks,
//! health-check ticks, kill escalation); [`Policy`] owns the failure
//! handling *decisions*. Operators plug in alerting, custom logging, or
//! gentler escalation by overriding the hooks without touching the
//! scheduler. The default behavior for a missed deadline is a warning plus
//! an unconditional kill, after which the exit is recorded as a failure
//! once the child actually goes down.

use std::time::Duration;

use crate::children::{Control, ExitStatus};

/// Decision hooks invoked by a container around child lifecycle events.
///
/// All hooks have default implementations; implementors override only what
/// they care about. Status classification lives on
/// [`ExitStatus`](crate::ExitStatus).
pub trait Policy: Send + Sync + 'static {
    /// Called before a child is launched for the first time.
    fn child_spawn(&self, name: &str, key: Option<&str>) {
        log::debug!("spawning child {name:?} (key: {key:?})");
    }

    /// Called after a child exits, with its final status.
    fn child_exit(&self, name: &str, key: Option<&str>, status: &ExitStatus) {
        if status.is_success() {
            log::debug!("child {name:?} (key: {key:?}) exited: {status}");
        } else {
            log::warn!("child {name:?} (key: {key:?}) exited: {status}");
        }
    }

    /// Called when a ready child exceeds its health-check deadline.
    fn health_check_failed(&self, child: &dyn Control, age: Duration, timeout: Duration) {
        log::warn!(
            "health check failed for {:?}: silent for {age:?} (limit {timeout:?}), killing",
            child.name()
        );
        child.kill();
    }

    /// Called when a child fails to report ready within its startup
    /// deadline.
    fn startup_failed(&self, child: &dyn Control, age: Duration, timeout: Duration) {
        log::warn!(
            "startup failed for {:?}: not ready after {age:?} (limit {timeout:?}), killing",
            child.name()
        );
        child.kill();
    }
}

/// The default policy: log, and kill children that miss their deadlines.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPolicy;

impl Policy for DefaultPolicy {}
