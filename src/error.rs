//! Error types used by the supervision runtime and the notify protocol.
//!
//! Two failure surfaces exist:
//!
//! - [`SetupError`] — a launch collaborator failed while starting a child.
//!   This is the only error that propagates out of `spawn`/`run`; child
//!   crashes and timeouts are recorded in statistics instead (see
//!   [`Statistics`](crate::Statistics)).
//! - [`NotifyError`] — a readiness message could not be delivered.

use thiserror::Error;

/// A child could not be started.
///
/// Raised by [`Container::spawn`](crate::Container::spawn) and
/// [`Container::run`](crate::Container::run) when the [`Launch`](crate::Launch)
/// collaborator fails during the initial launch. Failures of already-running
/// children never surface here; they are counted as failures and handled by
/// the restart loop.
#[derive(Error, Debug)]
#[error("could not start child {name:?}")]
pub struct SetupError {
    /// Name of the child that failed to start.
    pub name: String,
    /// The underlying launch error.
    #[source]
    pub source: std::io::Error,
}

impl SetupError {
    pub(crate) fn new(name: impl Into<String>, source: std::io::Error) -> Self {
        Self {
            name: name.into(),
            source,
        }
    }
}

/// A readiness notification could not be sent or received.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum NotifyError {
    /// The encoded message exceeds the maximum datagram payload.
    ///
    /// The protocol forbids silent truncation, so an oversized message is a
    /// local error and nothing is written to the socket.
    #[error("notify message of {size} bytes exceeds the {limit} byte limit")]
    MessageTooLarge {
        /// Encoded size of the rejected message.
        size: usize,
        /// The transport's payload limit.
        limit: usize,
    },

    /// The transport failed at the I/O layer.
    #[error("notify transport error")]
    Io(#[from] std::io::Error),
}
