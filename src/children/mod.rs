//! # Children: the supervised units and their plumbing.
//!
//! This module provides everything that describes one supervised worker:
//! - [`Channel`] / [`ChannelWriter`] - the lifecycle pipe between a child
//!   and its supervisor
//! - [`Control`] / [`Child`] / [`Launch`] - the contracts the scheduler
//!   consumes; concrete backends satisfy them
//! - [`ExitStatus`] - tri-state exit classification with signal helpers
//! - [`Keyed`] - mark-and-sweep bookkeeping for reloadable children
//! - [`LocalLauncher`] and friends - the built-in task-backed backend

mod channel;
mod child;
mod keyed;
mod local;

pub use channel::{Channel, ChannelWriter};
pub use child::{Child, Control, ExitStatus, Launch};
pub use keyed::{ChildId, Keyed};
pub use local::{LocalChild, LocalLauncher, Worker, WorkerContext, WorkerFn, WorkerRef};
