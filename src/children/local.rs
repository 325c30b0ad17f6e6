//! # Task-backed children running inside the supervising runtime.
//!
//! The built-in backend: each child is one tokio task executing a
//! [`Worker`], wired to the supervisor through a regular lifecycle
//! [`Channel`]. This is the in-runtime analogue of a thread backend;
//! fork+exec backends live outside the crate and plug in through the same
//! [`Launch`] contract.
//!
//! ## Signal mapping
//! - `interrupt`/`terminate` cancel the worker's [`WorkerContext`] token;
//!   a cooperative worker observes it and returns.
//! - `kill` aborts the task. The abort takes effect at the worker's next
//!   await point and the exit is reported as killed (SIGKILL), matching
//!   what a forked child would report.
//! - A worker panic is reported as aborted (SIGABRT).
//!
//! ## Example
//! ```no_run
//! use procvisor::{ChildSpec, Container, LocalLauncher, WorkerFn};
//!
//! # async fn demo() -> Result<(), procvisor::SetupError> {
//! let container = Container::new(LocalLauncher);
//! let worker = WorkerFn::arc(|mut ctx| async move {
//!     ctx.ready().await?;
//!     ctx.cancelled().await;
//!     Ok(())
//! });
//! container.spawn(ChildSpec::new("ticker"), worker).await?;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::{AbortHandle, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::notify::Message;

use super::channel::{Channel, ChannelWriter};
use super::child::{Child, Control, ExitStatus, Launch};

/// Workload executed by a task-backed child.
///
/// `run` is called once per incarnation with a fresh [`WorkerContext`];
/// restarts call it again on the same worker value.
#[async_trait]
pub trait Worker: Send + Sync + 'static {
    /// Runs the workload to completion or cancellation.
    ///
    /// `Ok(())` is a successful exit; an error is reported as a non-zero
    /// exit status.
    async fn run(&self, ctx: WorkerContext) -> io::Result<()>;
}

/// Shared handle to a worker.
pub type WorkerRef = Arc<dyn Worker>;

/// Function-backed worker implementation.
///
/// Wraps a closure that creates a new future per incarnation, so restarts
/// never share mutable state implicitly; share state through an explicit
/// `Arc` inside the closure when needed.
#[derive(Debug)]
pub struct WorkerFn<F> {
    function: F,
}

impl<F, Fut> WorkerFn<F>
where
    F: Fn(WorkerContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = io::Result<()>> + Send + 'static,
{
    /// Creates a function-backed worker.
    ///
    /// Prefer [`WorkerFn::arc`] when you immediately need a [`WorkerRef`].
    pub fn new(function: F) -> Self {
        Self { function }
    }

    /// Creates the worker and returns it as a shared handle.
    pub fn arc(function: F) -> WorkerRef {
        Arc::new(Self::new(function))
    }
}

#[async_trait]
impl<F, Fut> Worker for WorkerFn<F>
where
    F: Fn(WorkerContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = io::Result<()>> + Send + 'static,
{
    async fn run(&self, ctx: WorkerContext) -> io::Result<()> {
        (self.function)(ctx).await
    }
}

/// Per-incarnation context handed to a [`Worker`].
///
/// Carries the child's name, the cancellation token signaled by
/// `interrupt`/`terminate`, and the write half of the lifecycle channel
/// with the same readiness helpers the notify clients expose.
#[derive(Debug)]
pub struct WorkerContext {
    name: String,
    writer: ChannelWriter,
    cancel: CancellationToken,
}

impl WorkerContext {
    fn new(name: String, writer: ChannelWriter, cancel: CancellationToken) -> Self {
        Self {
            name,
            writer,
            cancel,
        }
    }

    /// The child's display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a stop was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Completes once a stop is requested.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    /// Sends one raw lifecycle message.
    pub async fn send(&mut self, message: &Message) -> io::Result<()> {
        self.writer.send(message).await
    }

    /// Reports the child ready to serve.
    pub async fn ready(&mut self) -> io::Result<()> {
        self.send(&Message::new().with_ready(true)).await
    }

    /// Reports a human-readable status line.
    pub async fn status(&mut self, text: impl Into<String>) -> io::Result<()> {
        self.send(&Message::new().with_status(text)).await
    }

    /// Reports that the child is reloading; clears readiness.
    pub async fn reloading(&mut self) -> io::Result<()> {
        let message = Message::new()
            .with_ready(false)
            .with_reloading(true)
            .with_status("reloading");
        self.send(&message).await
    }

    /// Reports that the child is restarting; clears readiness.
    pub async fn restarting(&mut self) -> io::Result<()> {
        let message = Message::new()
            .with_ready(false)
            .with_restarting(true)
            .with_status("restarting");
        self.send(&message).await
    }

    /// Reports that the child is stopping.
    pub async fn stopping(&mut self) -> io::Result<()> {
        let message = Message::new().with_stopping(true).with_status("stopping");
        self.send(&message).await
    }

    /// Reports an error condition. `errno` defaults to -1.
    pub async fn error(&mut self, text: impl Into<String>, errno: Option<i64>) -> io::Result<()> {
        let message = Message::new()
            .with_status(text)
            .with_errno(errno.unwrap_or(-1));
        self.send(&message).await
    }
}

/// One task-backed child.
pub struct LocalChild {
    name: String,
    channel: Channel,
    cancel: CancellationToken,
    abort: AbortHandle,
    handle: Option<JoinHandle<io::Result<()>>>,
    status: Option<ExitStatus>,
}

impl Control for LocalChild {
    fn name(&self) -> &str {
        &self.name
    }

    fn interrupt(&self) {
        self.cancel.cancel();
    }

    // Tasks have no TERM distinct from INT; both request cooperative stop.
    fn terminate(&self) {
        self.cancel.cancel();
    }

    fn kill(&self) {
        self.abort.abort();
    }
}

#[async_trait]
impl Child for LocalChild {
    fn channel_mut(&mut self) -> &mut Channel {
        &mut self.channel
    }

    async fn wait(&mut self) -> ExitStatus {
        if let Some(handle) = self.handle.take() {
            self.status = Some(classify(handle.await));
        }
        self.status.unwrap_or(ExitStatus::Success)
    }
}

/// Maps a task join result onto the process-style exit classification.
fn classify(joined: Result<io::Result<()>, tokio::task::JoinError>) -> ExitStatus {
    match joined {
        Ok(Ok(())) => ExitStatus::Success,
        Ok(Err(error)) => ExitStatus::Exited(error.raw_os_error().unwrap_or(1)),
        Err(join) if join.is_cancelled() => ExitStatus::Signaled(libc::SIGKILL),
        Err(_) => ExitStatus::Signaled(libc::SIGABRT),
    }
}

/// Launches workers as tokio tasks inside the supervising runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalLauncher;

#[async_trait]
impl Launch for LocalLauncher {
    type Work = WorkerRef;
    type Child = LocalChild;

    async fn start(&self, name: &str, work: WorkerRef) -> io::Result<LocalChild> {
        let (channel, writer) = Channel::open()?;
        let cancel = CancellationToken::new();
        let ctx = WorkerContext::new(name.to_owned(), writer, cancel.clone());

        // The task owns the write half; dropping it on return or abort is
        // what produces EOF on the supervisor's read half.
        let handle = tokio::spawn(async move { work.run(ctx).await });
        let abort = handle.abort_handle();

        Ok(LocalChild {
            name: name.to_owned(),
            channel,
            cancel,
            abort,
            handle: Some(handle),
            status: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn worker_success_classifies_as_success() {
        let worker = WorkerFn::arc(|_ctx| async { Ok(()) });
        let mut child = LocalLauncher.start("ok", worker).await.unwrap();
        assert_eq!(child.wait().await, ExitStatus::Success);
    }

    #[tokio::test]
    async fn worker_error_classifies_as_exited() {
        let worker = WorkerFn::arc(|_ctx| async {
            Err(io::Error::new(io::ErrorKind::Other, "boom"))
        });
        let mut child = LocalLauncher.start("bad", worker).await.unwrap();
        assert_eq!(child.wait().await, ExitStatus::Exited(1));
    }

    #[tokio::test]
    async fn kill_classifies_as_sigkill() {
        let worker = WorkerFn::arc(|ctx| async move {
            // Ignores cancellation; only an abort can end it.
            loop {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                let _ = ctx.is_cancelled();
            }
        });
        let mut child = LocalLauncher.start("stuck", worker).await.unwrap();
        child.kill();
        assert!(child.wait().await.is_killed());
    }

    #[tokio::test]
    async fn interrupt_requests_cooperative_stop() {
        let worker = WorkerFn::arc(|ctx| async move {
            ctx.cancelled().await;
            Ok(())
        });
        let mut child = LocalLauncher.start("polite", worker).await.unwrap();
        child.interrupt();
        assert!(child.wait().await.is_success());
    }

    #[tokio::test]
    async fn context_messages_arrive_on_the_channel() {
        let worker = WorkerFn::arc(|mut ctx| async move {
            ctx.ready().await?;
            ctx.status("serving").await?;
            Ok(())
        });
        let mut child = LocalLauncher.start("chatty", worker).await.unwrap();

        let first = child.channel_mut().receive().await.unwrap();
        assert!(first.is_ready());
        let second = child.channel_mut().receive().await.unwrap();
        assert_eq!(second.status(), Some("serving"));
        assert!(child.channel_mut().receive().await.is_none());
    }
}
