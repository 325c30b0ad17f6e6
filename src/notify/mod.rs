//! # The readiness wire protocol.
//!
//! Children tell their supervisor "I am ready", "I am reloading", "status:
//! ...", "error: ..." through a [`Client`]; the supervisor side receives
//! socket datagrams through a [`Server`]. Four client transports exist,
//! probed in priority order by [`open`] at child startup:
//!
//! 1. [`PipeClient`] - `NOTIFY_PIPE` names an inherited descriptor;
//!    newline-delimited JSON.
//! 2. [`SocketClient`] - `NOTIFY_SOCKET` names a UNIX datagram socket;
//!    systemd-compatible `KEY=VALUE` lines.
//! 3. [`LogClient`] - `NOTIFY_LOG` names an append-only file; one JSON
//!    object per line.
//! 4. [`ConsoleClient`] - no environment; local logging fallback.

mod client;
mod console;
mod log;
mod message;
mod pipe;
mod server;
mod socket;

pub use client::Client;
pub use console::ConsoleClient;
pub use log::LogClient;
pub use message::Message;
pub use pipe::PipeClient;
pub use server::{Bound, Server};
pub use socket::SocketClient;

/// Environment variable naming the datagram socket path.
///
/// Matches systemd's `sd_notify` convention.
pub const NOTIFY_SOCKET: &str = "NOTIFY_SOCKET";

/// Environment variable naming an inherited pipe descriptor number.
pub const NOTIFY_PIPE: &str = "NOTIFY_PIPE";

/// Environment variable naming the append-only log file path.
pub const NOTIFY_LOG: &str = "NOTIFY_LOG";

/// Maximum encoded size of one notify message, in bytes.
///
/// Exceeding it is a local error; messages are never silently truncated.
pub const MAXIMUM_MESSAGE_SIZE: usize = 4096;

/// Opens the best available client transport for this environment.
///
/// Probes `NOTIFY_PIPE`, then `NOTIFY_SOCKET`, then `NOTIFY_LOG`, and
/// falls back to the console client, so a child can always notify.
pub fn open() -> Box<dyn Client> {
    if let Some(client) = PipeClient::open_environment() {
        return Box::new(client);
    }
    if let Some(client) = SocketClient::open_environment() {
        return Box::new(client);
    }
    if let Some(client) = LogClient::open_environment() {
        return Box::new(client);
    }
    Box::new(ConsoleClient::new())
}
