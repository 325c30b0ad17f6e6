//! # procvisor
//!
//! **Procvisor** is a process/thread supervision engine: it starts a pool
//! of worker children, multiplexes their lifecycle events, enforces
//! startup and health-check deadlines, performs ordered mark-and-sweep
//! reload of keyed workers, and shuts the pool down through an escalating
//! interrupt → kill sequence with timeouts at each phase. It underlies
//! long-running servers that need N parallel workers kept alive,
//! restarted on failure, and retired gracefully on deployment.
//!
//! ## Architecture
//! ```text
//!  ChildSpec   ChildSpec   ChildSpec
//!      │           │           │
//!      ▼           ▼           ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │ Container                                                │
//! │  - keyed map (mark-and-sweep reload bookkeeping)         │
//! │  - state map (status + age clock per child)              │
//! │  - Statistics (spawns/restarts/failures + rate windows)  │
//! │  - Policy (pluggable failure decisions)                  │
//! └──────┬───────────────┬───────────────┬───────────────────┘
//!        ▼               ▼               ▼
//!  supervising task supervising task supervising task   (one per child)
//!        │               │               │
//!        └───────────────┴───────────────┘
//!                        ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │ Group (cooperative waiter scheduler)                     │
//! │  wait table: channel read descriptor → control lane      │
//! │  broadcast tokens: Interrupt / Terminate / Kill /        │
//! │                    HealthCheck (snapshot-then-dispatch)  │
//! └──────┬───────────────┬───────────────┬───────────────────┘
//!        ▼               ▼               ▼
//!     Channel         Channel         Channel     (one pipe per child)
//!        ▲               ▲               ▲
//!     Child           Child           Child       (process/thread/task)
//! ```
//!
//! ## Lifecycle
//! Each child moves through `Starting → Ready → Exited`, with a
//! `Restarting` self-loop back to `Starting` while restarts are
//! requested. The deadline that applies switches from the startup timeout
//! to the health-check timeout at the first ready message; both are
//! enforced through periodic health-check sentinels inside the waiter,
//! never a separate timer.
//!
//! ## Shutdown
//! [`Container::stop`] escalates in two phases: broadcast interrupt and
//! wait up to the grace period, then kill whatever remains and wait
//! unconditionally. Kill cannot be trapped, so stop always completes in
//! bounded time, even against children that ignore every other signal.
//!
//! ## Features
//! | Area            | Description                                          | Key types / traits                  |
//! |-----------------|------------------------------------------------------|-------------------------------------|
//! | **Supervision** | Spawn, restart, health-check, and stop worker pools. | [`Container`], [`ChildSpec`]        |
//! | **Scheduling**  | One cooperative waiter per child over OS readiness.  | [`Group`], [`Token`], [`Tick`]      |
//! | **Backends**    | Pluggable child creation; task backend built in.     | [`Launch`], [`Child`], [`LocalLauncher`] |
//! | **Reload**      | Mark-and-sweep retirement of keyed workers.          | [`Container::reload`], [`Keyed`]    |
//! | **Readiness**   | systemd-compatible notify protocol, four transports. | [`notify`], [`Message`], [`Server`] |
//! | **Policy**      | Pluggable spawn/exit/timeout decision hooks.         | [`Policy`], [`DefaultPolicy`]       |
//! | **Statistics**  | Counters plus sliding-window restart/failure rates.  | [`Statistics`], [`Rate`]            |
//!
//! ## Example
//! ```no_run
//! use std::time::Duration;
//! use procvisor::{ChildSpec, Config, Container, LocalLauncher, WorkerFn};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.startup_timeout = Some(Duration::from_secs(5));
//!
//!     let container = Container::with_config(LocalLauncher, config);
//!
//!     let worker = WorkerFn::arc(|mut ctx| async move {
//!         ctx.ready().await?;
//!         ctx.cancelled().await;
//!         ctx.stopping().await?;
//!         Ok(())
//!     });
//!
//!     let spec = ChildSpec::new("worker").with_restart(true);
//!     container.run(None, spec, worker).await?;
//!     container.wait_until_ready().await;
//!
//!     // ... serve until a signal arrives ...
//!     container.stop().await;
//!     Ok(())
//! }
//! ```

mod children;
mod config;
mod core;
mod error;
mod policy;
mod statistics;

pub mod notify;

// ---- Public re-exports ----

pub use children::{
    Channel, ChannelWriter, Child, ChildId, Control, ExitStatus, Keyed, Launch, LocalChild,
    LocalLauncher, Worker, WorkerContext, WorkerFn, WorkerRef,
};
pub use config::{processor_count, Config, PROCESSOR_COUNT};
pub use core::{signals, ChildSpec, ChildState, Container, Group, Tick, Token};
pub use error::{NotifyError, SetupError};
pub use notify::{Client, Message, Server};
pub use policy::{DefaultPolicy, Policy};
pub use statistics::{Rate, Statistics};
