//! # The child contract consumed by groups and containers.
//!
//! A child is one supervised worker: a forked process, a native thread, or
//! an in-runtime task. The engine never creates children itself; a
//! [`Launch`] collaborator does, and everything the engine needs afterwards
//! is expressed by two traits:
//!
//! - [`Control`] — the signal-injection surface (`interrupt`/`terminate`/
//!   `kill`), shared references only, so policies and callbacks can act on
//!   a child while its channel is being read.
//! - [`Child`] — adds exclusive access to the lifecycle [`Channel`] and the
//!   final [`ExitStatus`].
//!
//! `kill` must be unconditional for every implementation: a process gets
//! SIGKILL, a task is aborted with a synthesized killed status. It is the
//! backstop of the stop escalation and must not be trappable.

use std::fmt;
use std::io;

use async_trait::async_trait;

use super::channel::Channel;

/// Final classification of a child's exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// The child finished cleanly without a meaningful exit code.
    Success,
    /// The child exited with the given code.
    Exited(i32),
    /// The child was terminated by the given signal number.
    Signaled(i32),
}

impl ExitStatus {
    /// Whether the exit counts as a success.
    pub fn is_success(&self) -> bool {
        matches!(self, ExitStatus::Success | ExitStatus::Exited(0))
    }

    /// Whether the child was terminated by SIGSEGV.
    pub fn is_segfault(&self) -> bool {
        *self == ExitStatus::Signaled(libc::SIGSEGV)
    }

    /// Whether the child was terminated by SIGABRT.
    pub fn is_aborted(&self) -> bool {
        *self == ExitStatus::Signaled(libc::SIGABRT)
    }

    /// Whether the child was terminated by SIGKILL.
    pub fn is_killed(&self) -> bool {
        *self == ExitStatus::Signaled(libc::SIGKILL)
    }

    /// The terminating signal number, if the child was signaled.
    pub fn signal(&self) -> Option<i32> {
        match self {
            ExitStatus::Signaled(signal) => Some(*signal),
            _ => None,
        }
    }

    /// The exit code, if the child exited normally.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ExitStatus::Exited(code) => Some(*code),
            _ => None,
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Success => write!(f, "success"),
            ExitStatus::Exited(code) => write!(f, "exited with status {code}"),
            ExitStatus::Signaled(signal) => write!(f, "terminated by signal {signal}"),
        }
    }
}

/// Signal-injection surface of a child.
///
/// All methods take `&self` so a child can be signaled while its channel is
/// borrowed elsewhere; implementations use interior mechanisms that already
/// work this way (pid-directed signals, cancellation tokens, task aborts).
pub trait Control: Send + Sync {
    /// The child's display name.
    fn name(&self) -> &str;

    /// Requests a graceful stop (SIGINT equivalent).
    fn interrupt(&self);

    /// Requests termination (SIGTERM equivalent). Thread- and task-backed
    /// children treat this the same as `interrupt`.
    fn terminate(&self);

    /// Forcibly terminates the child. Must not be trappable.
    fn kill(&self);
}

/// One supervised child: signal surface plus channel and exit status.
#[async_trait]
pub trait Child: Control + Send + 'static {
    /// The child's lifecycle channel.
    fn channel_mut(&mut self) -> &mut Channel;

    /// Waits for the child to exit and returns its status.
    ///
    /// Must resolve promptly once `kill` has been delivered; the group's
    /// reaping path relies on this to guarantee bounded shutdown.
    async fn wait(&mut self) -> ExitStatus;
}

/// Collaborator that actually creates children.
///
/// The engine calls `start` once per launch (including every restart
/// iteration) and otherwise treats the result purely through the [`Child`]
/// contract. Fork+exec backends, thread backends, and the built-in task
/// backend all plug in here.
#[async_trait]
pub trait Launch: Send + Sync + 'static {
    /// Per-spawn workload description, cloned for every restart.
    type Work: Clone + Send + Sync + 'static;

    /// The concrete child type this launcher produces.
    type Child: Child;

    /// Starts one child running `work`.
    async fn start(&self, name: &str, work: Self::Work) -> io::Result<Self::Child>;
}
