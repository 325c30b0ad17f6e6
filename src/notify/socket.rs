//! UNIX datagram socket transport, bit-compatible with systemd's
//! `sd_notify`.
//!
//! The payload is ASCII text, one `KEY=VALUE` pair per line: keys
//! uppercased, booleans encoded as the literals `1`/`0`. A message whose
//! encoding exceeds [`MAXIMUM_MESSAGE_SIZE`] is a local error and nothing
//! is written; the protocol forbids silent truncation.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use tokio::net::UnixDatagram;

use crate::error::NotifyError;

use super::client::Client;
use super::message::Message;
use super::{MAXIMUM_MESSAGE_SIZE, NOTIFY_SOCKET};

/// Sends readiness messages to a supervisor's notify socket.
#[derive(Debug, Clone)]
pub struct SocketClient {
    path: PathBuf,
}

impl SocketClient {
    /// Creates a client sending to `path`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates a client from the `NOTIFY_SOCKET` environment variable.
    pub fn open_environment() -> Option<Self> {
        std::env::var(NOTIFY_SOCKET).ok().map(Self::open)
    }

    /// Encodes a message as systemd-style `KEY=VALUE` lines.
    pub(super) fn encode(message: &Message) -> String {
        let mut text = String::new();
        for (key, value) in message.iter() {
            text.push_str(&key.to_ascii_uppercase());
            text.push('=');
            match value {
                Value::Bool(true) => text.push('1'),
                Value::Bool(false) => text.push('0'),
                Value::String(string) => text.push_str(string),
                Value::Null => {}
                other => text.push_str(&other.to_string()),
            }
            text.push('\n');
        }
        text
    }
}

#[async_trait]
impl Client for SocketClient {
    async fn send(&mut self, message: &Message) -> Result<(), NotifyError> {
        let payload = Self::encode(message);
        if payload.len() > MAXIMUM_MESSAGE_SIZE {
            return Err(NotifyError::MessageTooLarge {
                size: payload.len(),
                limit: MAXIMUM_MESSAGE_SIZE,
            });
        }

        let socket = UnixDatagram::unbound()?;
        socket.send_to(payload.as_bytes(), &self.path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_booleans_as_literals() {
        let message = Message::new().with_ready(true).with_reloading(false);
        let payload = SocketClient::encode(&message);
        assert!(payload.contains("READY=1\n"));
        assert!(payload.contains("RELOADING=0\n"));
    }

    #[test]
    fn encodes_strings_and_integers_verbatim() {
        let message = Message::new().with_status("ok").with_errno(-1).with_pid(7);
        let payload = SocketClient::encode(&message);
        assert!(payload.contains("STATUS=ok\n"));
        assert!(payload.contains("ERRNO=-1\n"));
        assert!(payload.contains("PID=7\n"));
    }
}
