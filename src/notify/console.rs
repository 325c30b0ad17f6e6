//! Local logging fallback transport.
//!
//! Selected when no notify environment is present: messages go through
//! the `log` facade instead of a supervisor. Sending never fails, so a
//! child can use the same readiness calls whether or not anything is
//! listening.

use async_trait::async_trait;

use crate::error::NotifyError;

use super::client::Client;
use super::message::Message;

/// Logs readiness messages locally.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleClient;

impl ConsoleClient {
    /// Creates the fallback client.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Client for ConsoleClient {
    async fn send(&mut self, message: &Message) -> Result<(), NotifyError> {
        let text = serde_json::to_string(message).unwrap_or_else(|_| String::from("{}"));
        if message.errno().is_some() {
            log::warn!("notify: {text}");
        } else {
            log::info!("notify: {text}");
        }
        Ok(())
    }
}
