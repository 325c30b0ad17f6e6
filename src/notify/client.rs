//! Client side of the readiness protocol.
//!
//! [`Client`] is the transport-independent surface children use to tell
//! their supervisor how they are doing. Transports implement `send`; the
//! readiness helpers share the field conventions across every transport
//! (and across [`WorkerContext`](crate::WorkerContext), which speaks the
//! same vocabulary over the lifecycle channel).

use async_trait::async_trait;

use crate::error::NotifyError;

use super::message::Message;

/// A readiness-protocol transport.
#[async_trait]
pub trait Client: Send + Sync {
    /// Sends one raw message.
    async fn send(&mut self, message: &Message) -> Result<(), NotifyError>;

    /// Reports the child ready to serve.
    async fn ready(&mut self) -> Result<(), NotifyError> {
        self.send(&Message::new().with_ready(true)).await
    }

    /// Reports a human-readable status line.
    async fn status(&mut self, text: &str) -> Result<(), NotifyError> {
        self.send(&Message::new().with_status(text)).await
    }

    /// Reports that the child is reloading; clears readiness.
    async fn reloading(&mut self) -> Result<(), NotifyError> {
        let message = Message::new()
            .with_ready(false)
            .with_reloading(true)
            .with_status("reloading");
        self.send(&message).await
    }

    /// Reports that the child is restarting; clears readiness.
    async fn restarting(&mut self) -> Result<(), NotifyError> {
        let message = Message::new()
            .with_ready(false)
            .with_restarting(true)
            .with_status("restarting");
        self.send(&message).await
    }

    /// Reports that the child is stopping.
    async fn stopping(&mut self) -> Result<(), NotifyError> {
        let message = Message::new().with_stopping(true).with_status("stopping");
        self.send(&message).await
    }

    /// Reports an error condition. `errno` defaults to -1.
    async fn error(&mut self, text: &str, errno: Option<i64>) -> Result<(), NotifyError> {
        let message = Message::new()
            .with_status(text)
            .with_errno(errno.unwrap_or(-1));
        self.send(&message).await
    }
}
