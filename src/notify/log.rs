//! Append-only file transport.
//!
//! One JSON object per line, appended to the file named by the
//! `NOTIFY_LOG` environment variable. Useful when no supervisor socket
//! exists: the messages become a tail-able readiness log instead.

use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::error::NotifyError;

use super::client::Client;
use super::message::Message;
use super::NOTIFY_LOG;

/// Appends readiness messages to a log file.
#[derive(Debug, Clone)]
pub struct LogClient {
    path: PathBuf,
}

impl LogClient {
    /// Creates a client appending to `path`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates a client from the `NOTIFY_LOG` environment variable.
    pub fn open_environment() -> Option<Self> {
        std::env::var(NOTIFY_LOG).ok().map(Self::open)
    }
}

#[async_trait]
impl Client for LogClient {
    async fn send(&mut self, message: &Message) -> Result<(), NotifyError> {
        let mut frame = serde_json::to_vec(message).map_err(io::Error::from)?;
        frame.push(b'\n');

        // Open per message so concurrent writers interleave at line
        // granularity and a crashed child never holds the file.
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .await?;
        file.write_all(&frame).await?;
        file.flush().await?;
        Ok(())
    }
}
