//! # OS signal forwarding into the scheduler.
//!
//! [`forward`] traps the supervising process's own termination signals and
//! translates them into the same broadcast tokens used for programmatic
//! stops, so there is exactly one code path for "stop everything".
//!
//! ## Signals
//! **Unix platforms:**
//! - `SIGINT` (Ctrl-C in terminal) → [`Group::interrupt`]
//! - `SIGTERM` (default kill signal, used by systemd/Kubernetes) →
//!   [`Group::terminate`]
//!
//! **Other platforms:**
//! - `Ctrl-C` via [`tokio::signal::ctrl_c`] → [`Group::interrupt`]
//!
//! The driver registers its listeners up front and then runs forever;
//! spawn it alongside the container and drop the task when supervision
//! ends. Because it waits on the runtime's signal reactor rather than
//! inside the blocking multi-wait itself, a signal that arrives while
//! every waiter is suspended is never lost.

use std::io;

use crate::core::group::Group;

/// Forwards process termination signals to `group` until dropped.
///
/// Each call creates independent signal listeners. Returns early only if
/// listener registration fails.
#[cfg(unix)]
pub async fn forward(group: &Group) -> io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    loop {
        tokio::select! {
            _ = sigint.recv() => group.interrupt(),
            _ = sigterm.recv() => group.terminate(),
        }
    }
}

/// Forwards process termination signals to `group` until dropped.
///
/// Each call creates independent signal listeners. Returns early only if
/// listener registration fails.
#[cfg(not(unix))]
pub async fn forward(group: &Group) -> io::Result<()> {
    loop {
        tokio::signal::ctrl_c().await?;
        group.interrupt();
    }
}
