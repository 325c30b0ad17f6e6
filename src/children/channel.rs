//! # Lifecycle message channel between a child and its supervisor.
//!
//! A [`Channel`] owns the read half of one OS pipe; the matching
//! [`ChannelWriter`] owns the write half. Messages are newline-terminated
//! JSON frames, delivered in FIFO order per child.
//!
//! ## Ownership invariant
//! After a child is created, the supervisor keeps only the [`Channel`] and
//! the child keeps only the [`ChannelWriter`]: for in-runtime children the
//! writer moves into the worker context, for forked children the writer's
//! descriptor is inherited and the parent's copy is dropped. Holding both
//! halves on the supervisor side breaks EOF detection, because the pipe
//! never reports closed while a write end is still open.
//!
//! ## Framing
//! A frame that fails to parse as JSON is degraded to a raw-line fallback
//! message instead of an error, so a crashing child's stray output cannot
//! abort the monitor.

use std::io;
use std::os::fd::{AsRawFd, RawFd};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::pipe;

use crate::notify::Message;

/// Read half of a child's lifecycle pipe.
#[derive(Debug)]
pub struct Channel {
    reader: pipe::Receiver,
    buffer: Vec<u8>,
    key: RawFd,
}

/// Write half of a child's lifecycle pipe.
#[derive(Debug)]
pub struct ChannelWriter {
    writer: pipe::Sender,
}

impl Channel {
    /// Creates a fresh pipe and returns both halves.
    pub fn open() -> io::Result<(Channel, ChannelWriter)> {
        let (writer, reader) = pipe::pipe()?;
        let key = reader.as_raw_fd();
        let channel = Channel {
            reader,
            buffer: Vec::new(),
            key,
        };
        Ok((channel, ChannelWriter { writer }))
    }

    /// The stable wait key for this channel: its read descriptor.
    ///
    /// Groups key their waiter table by this value.
    pub fn key(&self) -> RawFd {
        self.key
    }

    /// Receives the next message, or `None` once the write end is closed
    /// and the buffer is drained.
    ///
    /// Cancel-safe: partially read frames stay in the internal buffer, so a
    /// caller may race this future against a control channel without losing
    /// data.
    pub async fn receive(&mut self) -> Option<Message> {
        loop {
            if let Some(position) = self.buffer.iter().position(|byte| *byte == b'\n') {
                let frame: Vec<u8> = self.buffer.drain(..=position).collect();
                return Some(parse_frame(&frame[..position]));
            }

            let mut chunk = [0u8; 4096];
            match self.reader.read(&mut chunk).await {
                Ok(0) | Err(_) => {
                    // EOF: deliver any unterminated trailing fragment before
                    // reporting the channel closed.
                    if self.buffer.is_empty() {
                        return None;
                    }
                    let frame = std::mem::take(&mut self.buffer);
                    return Some(parse_frame(&frame));
                }
                Ok(read) => self.buffer.extend_from_slice(&chunk[..read]),
            }
        }
    }
}

impl ChannelWriter {
    /// Serializes `message` as one newline-terminated JSON frame and writes
    /// it to the pipe.
    pub async fn send(&mut self, message: &Message) -> io::Result<()> {
        let mut frame = serde_json::to_vec(message)?;
        frame.push(b'\n');
        self.writer.write_all(&frame).await
    }
}

fn parse_frame(frame: &[u8]) -> Message {
    match serde_json::from_slice(frame) {
        Ok(message) => message,
        Err(_) => Message::raw_line(String::from_utf8_lossy(frame).into_owned()),
    }
}
