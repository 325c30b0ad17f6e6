//! Inherited-descriptor pipe transport.
//!
//! The supervisor passes a write descriptor to the child and names it in
//! the `NOTIFY_PIPE` environment variable; the child writes one JSON
//! object per line. This is the transport of choice for forked children,
//! since the descriptor survives exec and needs no filesystem path.

use std::io;
use std::os::fd::{FromRawFd, OwnedFd, RawFd};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::unix::pipe;

use crate::error::NotifyError;

use super::client::Client;
use super::message::Message;
use super::NOTIFY_PIPE;

/// Sends readiness messages over an inherited pipe descriptor.
#[derive(Debug)]
pub struct PipeClient {
    writer: pipe::Sender,
}

impl PipeClient {
    /// Takes ownership of `fd` and wraps it as a notify pipe.
    ///
    /// The caller must ensure `fd` is an open pipe write end that nothing
    /// else owns; the descriptor is closed when the client is dropped.
    pub fn from_fd(fd: RawFd) -> io::Result<Self> {
        // SAFETY: ownership of the descriptor is transferred to us by
        // contract; it stays valid until the OwnedFd closes it.
        let owned = unsafe { OwnedFd::from_raw_fd(fd) };
        let writer = pipe::Sender::from_owned_fd(owned)?;
        Ok(Self { writer })
    }

    /// Creates a client from the `NOTIFY_PIPE` environment variable.
    ///
    /// Call at most once per process: the variable names a descriptor and
    /// this takes ownership of it. An unparsable or unusable descriptor
    /// is logged and treated as "transport absent".
    pub fn open_environment() -> Option<Self> {
        let value = std::env::var(NOTIFY_PIPE).ok()?;
        let fd = match value.parse::<RawFd>() {
            Ok(fd) if fd >= 0 => fd,
            _ => {
                log::warn!("ignoring {NOTIFY_PIPE}={value:?}: not a descriptor number");
                return None;
            }
        };
        match Self::from_fd(fd) {
            Ok(client) => Some(client),
            Err(error) => {
                log::warn!("ignoring {NOTIFY_PIPE}={fd}: {error}");
                None
            }
        }
    }
}

#[async_trait]
impl Client for PipeClient {
    async fn send(&mut self, message: &Message) -> Result<(), NotifyError> {
        let mut frame = serde_json::to_vec(message).map_err(io::Error::from)?;
        frame.push(b'\n');
        self.writer.write_all(&frame).await?;
        Ok(())
    }
}
