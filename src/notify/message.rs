//! # Readiness messages exchanged between children and their supervisor.
//!
//! A [`Message`] is an unordered set of key/value pairs. The canonical form
//! uses lowercase keys; the well-known keys (`ready`, `reloading`,
//! `stopping`, `status`, `errno`, `pid`) have typed accessors, but arbitrary
//! pairs pass through untouched so transports stay forward-compatible.
//!
//! The same type flows through every transport: JSON objects on the channel
//! pipe and the log file, `KEY=VALUE` lines on the datagram socket.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key under which an unparsable channel frame is preserved.
const LINE: &str = "line";

/// One readiness/status message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Message(Map<String, Value>);

impl Message {
    /// Creates an empty message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an unparsable raw line so stray child output is preserved
    /// rather than aborting the monitor.
    pub fn raw_line(line: impl Into<String>) -> Self {
        let mut message = Self::new();
        message.insert(LINE, Value::String(line.into()));
        message
    }

    /// Inserts a key/value pair, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Returns the value for `key`, if present.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Whether the message carries no pairs.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merges `other` into this message, overwriting duplicate keys.
    ///
    /// Containers fold successive messages into a per-child state this way,
    /// so the state always reflects the latest value of each key.
    pub fn merge(&mut self, other: &Message) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Iterates over all pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Sets the `ready` flag.
    pub fn with_ready(mut self, ready: bool) -> Self {
        self.insert("ready", ready);
        self
    }

    /// Sets the `reloading` flag.
    pub fn with_reloading(mut self, reloading: bool) -> Self {
        self.insert("reloading", reloading);
        self
    }

    /// Sets the `restarting` flag.
    pub fn with_restarting(mut self, restarting: bool) -> Self {
        self.insert("restarting", restarting);
        self
    }

    /// Sets the `stopping` flag.
    pub fn with_stopping(mut self, stopping: bool) -> Self {
        self.insert("stopping", stopping);
        self
    }

    /// Sets the human-readable `status` text.
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.insert("status", status.into());
        self
    }

    /// Sets the `errno` error code.
    pub fn with_errno(mut self, errno: i64) -> Self {
        self.insert("errno", errno);
        self
    }

    /// Sets the sending process id.
    ///
    /// Datagram sockets carry no reliable peer credentials on every
    /// platform, so the protocol is self-describing.
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.insert("pid", pid);
        self
    }

    /// Whether the `ready` flag is set and true.
    pub fn is_ready(&self) -> bool {
        self.flag("ready")
    }

    /// Whether the `reloading` flag is set and true.
    pub fn is_reloading(&self) -> bool {
        self.flag("reloading")
    }

    /// Whether the `restarting` flag is set and true.
    pub fn is_restarting(&self) -> bool {
        self.flag("restarting")
    }

    /// Whether the `stopping` flag is set and true.
    pub fn is_stopping(&self) -> bool {
        self.flag("stopping")
    }

    /// The `status` text, if any.
    pub fn status(&self) -> Option<&str> {
        self.get("status").and_then(Value::as_str)
    }

    /// The `errno` code, if any.
    pub fn errno(&self) -> Option<i64> {
        self.get("errno").and_then(Value::as_i64)
    }

    /// The sending process id, if any.
    pub fn pid(&self) -> Option<u32> {
        self.get("pid")
            .and_then(Value::as_u64)
            .and_then(|pid| u32::try_from(pid).ok())
    }

    /// The preserved raw line of an unparsable frame, if any.
    pub fn line(&self) -> Option<&str> {
        self.get(LINE).and_then(Value::as_str)
    }

    fn flag(&self, key: &str) -> bool {
        self.get(key).and_then(Value::as_bool).unwrap_or(false)
    }
}

impl FromIterator<(String, Value)> for Message {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(pairs: I) -> Self {
        Self(pairs.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_well_known_keys() {
        let message = Message::new()
            .with_ready(true)
            .with_status("serving")
            .with_pid(42);

        assert!(message.is_ready());
        assert_eq!(message.status(), Some("serving"));
        assert_eq!(message.pid(), Some(42));
        assert!(!message.is_stopping());
    }

    #[test]
    fn merge_overwrites_latest_value() {
        let mut state = Message::new().with_ready(false).with_status("starting");
        state.merge(&Message::new().with_ready(true));

        assert!(state.is_ready());
        assert_eq!(state.status(), Some("starting"));
    }

    #[test]
    fn json_round_trip_is_transparent() {
        let message = Message::new().with_ready(true).with_errno(-1);
        let encoded = serde_json::to_string(&message).unwrap();
        let decoded: Message = serde_json::from_str(&encoded).unwrap();

        assert_eq!(decoded, message);
        assert!(encoded.starts_with('{'));
    }

    #[test]
    fn raw_line_preserves_garbage() {
        let message = Message::raw_line("garbage");
        assert_eq!(message.line(), Some("garbage"));
        assert!(!message.is_ready());
    }
}
