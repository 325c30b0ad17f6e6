//! Server side of the readiness protocol.
//!
//! A [`Server`] names a UNIX datagram socket path; [`Server::bind`]
//! produces a [`Bound`] endpoint whose `receive` yields one canonical
//! [`Message`] per datagram: keys lowercased, the literals `"1"`/`"0"`
//! coerced to booleans, `errno` and `pid` coerced to integers. Senders
//! are identified by the explicit `PID` field in the payload; datagram
//! sockets carry no reliable peer credentials on every platform, so the
//! protocol is self-describing.

use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::net::UnixDatagram;

use super::message::Message;
use super::MAXIMUM_MESSAGE_SIZE;

/// A notify socket address, not yet bound.
#[derive(Debug, Clone)]
pub struct Server {
    path: PathBuf,
}

impl Server {
    /// Uses the given socket path.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Generates a fresh socket path in the temp directory.
    pub fn generate() -> Self {
        let name = format!(
            "notify-{}-{:08x}.sock",
            std::process::id(),
            rand::random::<u32>()
        );
        Self::open(std::env::temp_dir().join(name))
    }

    /// The socket path children should be pointed at (via `NOTIFY_SOCKET`).
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Binds the datagram socket, replacing any stale socket file.
    pub fn bind(&self) -> io::Result<Bound> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        let socket = UnixDatagram::bind(&self.path)?;
        Ok(Bound {
            socket,
            path: self.path.clone(),
        })
    }
}

/// A bound notify socket; unlinks its path on drop.
#[derive(Debug)]
pub struct Bound {
    socket: UnixDatagram,
    path: PathBuf,
}

impl Bound {
    /// The bound socket path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Receives the next datagram and parses it into a canonical message.
    pub async fn receive(&self) -> io::Result<Message> {
        let mut buffer = [0u8; MAXIMUM_MESSAGE_SIZE];
        let (size, _) = self.socket.recv_from(&mut buffer).await?;
        Ok(parse(&buffer[..size]))
    }
}

impl Drop for Bound {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Parses `KEY=VALUE` lines into the canonical message form.
fn parse(payload: &[u8]) -> Message {
    let text = String::from_utf8_lossy(payload);
    let mut message = Message::new();
    for line in text.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.to_ascii_lowercase();
        let value = canonical(&key, value);
        message.insert(key, value);
    }
    message
}

fn canonical(key: &str, value: &str) -> Value {
    match key {
        "errno" | "pid" => value
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(value.to_owned())),
        _ => match value {
            "1" => Value::Bool(true),
            "0" => Value::Bool(false),
            _ => Value::String(value.to_owned()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_systemd_style_payload() {
        let message = parse(b"READY=1\nSTATUS=ok\n");
        assert!(message.is_ready());
        assert_eq!(message.status(), Some("ok"));
    }

    #[test]
    fn coerces_errno_and_pid_to_integers() {
        let message = parse(b"ERRNO=-1\nPID=1234\n");
        assert_eq!(message.errno(), Some(-1));
        assert_eq!(message.pid(), Some(1234));
    }

    #[test]
    fn skips_lines_without_a_separator() {
        let message = parse(b"garbage\nREADY=0\n");
        assert!(!message.is_ready());
        assert_eq!(message.iter().count(), 1);
    }

    #[test]
    fn trailing_separator_is_optional() {
        let message = parse(b"READY=1");
        assert!(message.is_ready());
    }
}
