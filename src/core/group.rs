//! # Group: the cooperative waiter scheduler.
//!
//! A [`Group`] runs one logical waiter per supervised child inside a single
//! thread of control. Each waiter is suspended in [`Group::wait_for`],
//! selecting between its child's lifecycle channel and a control lane that
//! carries broadcast [`Token`]s. The only blocking primitive is the
//! runtime's readiness reactor over the channels' read descriptors.
//!
//! ## Waiter table
//! The table maps a channel's wait key (its read descriptor) to the
//! waiter's control lane. An entry exists exactly while its child is being
//! awaited; it is removed only by the waiter that owns it, never by an
//! external iteration. Resuming one waiter can re-enter the group and
//! remove another entry, so every broadcast snapshots the lanes before
//! dispatching; sends to lanes that disappeared mid-pass are ignored.
//!
//! ## Shutdown escalation
//! [`Group::stop`] is two-phase: broadcast [`Token::Interrupt`] and wait up
//! to the grace period for the table to empty, then broadcast
//! [`Token::Kill`] and wait unconditionally. Kill is never skippable: it is
//! the backstop against children that trap or ignore every other signal,
//! so `stop` completes in bounded time. There is deliberately no
//! intermediate terminate-only phase; task- and thread-backed children
//! have no TERM distinct from INT, and kill must stay meaningful for them.
//!
//! ```text
//! stop(Some(grace)):
//!   interrupt() ──► wake, re-check remaining ──► table empty? done
//!                                            └─► grace elapsed:
//!   kill() ──► waiters forward kill ──► EOF ──► reap ──► table empties
//! ```
//!
//! ## Signals
//! OS signals delivered to the supervising process itself are translated
//! into these same tokens by [`signals::forward`](crate::signals::forward);
//! the signal driver runs as its own task on the reactor, so a signal that
//! arrives while every waiter is blocked is never lost.

use std::collections::HashMap;
use std::os::fd::RawFd;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, Notify};
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::children::{Child, Control, ExitStatus};
use crate::notify::Message;

/// How often the kill phase of [`Group::stop`] re-broadcasts while waiting
/// for the table to empty, covering waiters registered mid-stop.
const KILL_POLL: Duration = Duration::from_millis(100);

/// Broadcast token resuming a suspended waiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// Request a graceful stop (forwarded as `interrupt`).
    Interrupt,
    /// Request termination (forwarded as `terminate`).
    Terminate,
    /// Force termination (forwarded as `kill`, untrappable).
    Kill,
    /// Liveness sentinel; handed to the waiter's callback instead of the
    /// child, so the age threshold stays out of the scheduler.
    HealthCheck,
}

/// What a waiter's callback is resumed with.
#[derive(Debug)]
pub enum Tick {
    /// The child sent a lifecycle message.
    Message(Message),
    /// A health-check sentinel fired; the callback decides whether the
    /// child's age exceeds its deadline.
    HealthCheck,
}

enum Wake {
    Control(Option<Token>),
    Channel(Option<Message>),
}

/// Scheduler for an arbitrary number of concurrent child waiters.
#[derive(Debug)]
pub struct Group {
    waiters: Mutex<HashMap<RawFd, mpsc::UnboundedSender<Token>>>,
    changed: Notify,
    reap_grace: Duration,
}

impl Group {
    /// Creates an empty group.
    ///
    /// `reap_grace` bounds how long a waiter waits for a child whose
    /// channel reached EOF before escalating to a forced kill.
    pub fn new(reap_grace: Duration) -> Self {
        Self {
            waiters: Mutex::new(HashMap::new()),
            changed: Notify::new(),
            reap_grace,
        }
    }

    /// Number of children currently being awaited.
    pub fn len(&self) -> usize {
        self.table().len()
    }

    /// Whether no child is currently being awaited.
    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }

    /// Awaits `child` until it exits, relaying every resume into `callback`.
    ///
    /// Registers the waiter under the channel's wait key, then loops:
    /// - a signal token is forwarded to the child and the loop continues
    ///   (the child must still eventually close its channel);
    /// - [`Token::HealthCheck`] resumes the callback with
    ///   [`Tick::HealthCheck`];
    /// - a received message resumes the callback with [`Tick::Message`];
    /// - EOF reaps the child: `wait` bounded by the reap grace, then an
    ///   unconditional kill, so an unresponsive child that closed all
    ///   descriptors but kept running cannot stall the supervisor.
    ///
    /// Returns the child's exit status. The waiter deregisters itself on
    /// any exit path.
    pub async fn wait_for<C, F>(&self, child: &mut C, mut callback: F) -> ExitStatus
    where
        C: Child,
        F: FnMut(&dyn Control, Tick) + Send,
    {
        let (sender, mut control) = mpsc::unbounded_channel();
        let registration = self.register(child.channel_mut().key(), sender);

        loop {
            let wake = {
                let channel = child.channel_mut();
                tokio::select! {
                    token = control.recv() => Wake::Control(token),
                    message = channel.receive() => Wake::Channel(message),
                }
            };

            match wake {
                Wake::Control(Some(Token::Interrupt)) => child.interrupt(),
                Wake::Control(Some(Token::Terminate)) => child.terminate(),
                Wake::Control(Some(Token::Kill)) => child.kill(),
                Wake::Control(Some(Token::HealthCheck)) => {
                    callback(&*child, Tick::HealthCheck);
                }
                // Unreachable while the registration holds a sender clone.
                Wake::Control(None) => continue,
                Wake::Channel(Some(message)) => {
                    callback(&*child, Tick::Message(message));
                    self.changed.notify_waiters();
                }
                Wake::Channel(None) => break,
            }
        }

        let status = self.reap(child).await;
        drop(registration);
        status
    }

    /// Waits for a child whose channel closed to report its exit status.
    async fn reap<C: Child>(&self, child: &mut C) -> ExitStatus {
        match time::timeout(self.reap_grace, child.wait()).await {
            Ok(status) => status,
            Err(_) => {
                log::warn!(
                    "child {:?} still running {:?} after closing its channel, killing",
                    child.name(),
                    self.reap_grace
                );
                child.kill();
                child.wait().await
            }
        }
    }

    /// Broadcasts [`Token::Interrupt`] to every waiter.
    pub fn interrupt(&self) {
        self.broadcast(Token::Interrupt);
    }

    /// Broadcasts [`Token::Terminate`] to every waiter.
    pub fn terminate(&self) {
        self.broadcast(Token::Terminate);
    }

    /// Broadcasts [`Token::Kill`] to every waiter.
    pub fn kill(&self) {
        self.broadcast(Token::Kill);
    }

    /// Broadcasts the health-check sentinel to every waiter.
    pub fn health_check(&self) {
        self.broadcast(Token::HealthCheck);
    }

    /// Delivers `token` to the waiter registered under `key`, if any.
    ///
    /// The reload sweep retires specific children this way without waking
    /// the rest of the pool.
    pub fn deliver(&self, key: RawFd, token: Token) -> bool {
        let sender = self.table().get(&key).cloned();
        match sender {
            Some(sender) => sender.send(token).is_ok(),
            None => false,
        }
    }

    /// Pumps the scheduler for up to `duration`.
    ///
    /// Returns early when any state changes: a message was delivered or a
    /// waiter registered or deregistered. Callers poll their own condition
    /// around this.
    pub async fn sleep(&self, duration: Duration) {
        let changed = self.changed.notified();
        tokio::pin!(changed);
        tokio::select! {
            _ = &mut changed => {}
            _ = time::sleep(duration) => {}
        }
    }

    /// Blocks until the waiter table empties, broadcasting a health-check
    /// sentinel every `interval`.
    pub async fn wait(&self, interval: Duration) {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; consume it so the initial
        // sentinel fires one full interval in.
        ticker.tick().await;

        while !self.is_empty() {
            let changed = self.changed.notified();
            tokio::pin!(changed);
            tokio::select! {
                _ = ticker.tick() => self.health_check(),
                _ = &mut changed => {}
            }
        }
    }

    /// Stops every child through the two-phase escalation.
    ///
    /// With `Some(grace)`, broadcasts interrupt and waits up to `grace` for
    /// the table to empty, re-checking the remaining time after every wake.
    /// Whatever remains once the grace elapses (or immediately, with
    /// `None`) is killed and waited on unconditionally.
    pub async fn stop(&self, graceful: Option<Duration>) {
        if let Some(grace) = graceful {
            self.interrupt();
            let deadline = Instant::now() + grace;
            while !self.is_empty() {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                self.sleep(remaining).await;
            }
        }

        // Re-broadcast on every wake so a waiter registered mid-stop is
        // still reached.
        while !self.is_empty() {
            self.kill();
            self.sleep(KILL_POLL).await;
        }
    }

    fn register(&self, key: RawFd, sender: mpsc::UnboundedSender<Token>) -> Registration<'_> {
        self.table().insert(key, sender.clone());
        self.changed.notify_waiters();
        Registration {
            group: self,
            key,
            _sender: sender,
        }
    }

    /// Wakes everything blocked in [`Group::sleep`] or [`Group::wait`].
    ///
    /// Containers call this after finishing a child's exit bookkeeping,
    /// which happens outside the waiter table.
    pub(crate) fn wake(&self) {
        self.changed.notify_waiters();
    }

    fn broadcast(&self, token: Token) {
        // Snapshot before dispatch: resuming one waiter may remove another
        // entry, and sends must not happen under the table lock.
        let lanes: Vec<_> = self.table().values().cloned().collect();
        for lane in lanes {
            let _ = lane.send(token);
        }
    }

    fn table(&self) -> MutexGuard<'_, HashMap<RawFd, mpsc::UnboundedSender<Token>>> {
        self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Keeps a waiter's table entry alive for exactly the span of its
/// `wait_for` call.
///
/// Holding a sender clone guarantees the control lane cannot close while
/// the waiter is registered.
struct Registration<'a> {
    group: &'a Group,
    key: RawFd,
    _sender: mpsc::UnboundedSender<Token>,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.group.table().remove(&self.key);
        self.group.changed.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::children::{Launch, LocalLauncher, WorkerFn};

    fn cooperative() -> crate::children::WorkerRef {
        WorkerFn::arc(|ctx| async move {
            ctx.cancelled().await;
            Ok(())
        })
    }

    fn stubborn() -> crate::children::WorkerRef {
        WorkerFn::arc(|_ctx| async move {
            loop {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
    }

    #[tokio::test]
    async fn interrupt_reaches_a_cooperative_child() {
        let group = Arc::new(Group::new(Duration::from_secs(1)));
        let mut child = LocalLauncher.start("w", cooperative()).await.unwrap();

        let waiter = {
            let group = Arc::clone(&group);
            tokio::spawn(async move { group.wait_for(&mut child, |_, _| {}).await })
        };

        while group.is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        group.interrupt();
        assert!(waiter.await.unwrap().is_success());
        assert!(group.is_empty());
    }

    #[tokio::test]
    async fn stop_escalates_to_kill_for_stubborn_children() {
        let group = Arc::new(Group::new(Duration::from_secs(1)));
        let mut child = LocalLauncher.start("stuck", stubborn()).await.unwrap();

        let waiter = {
            let group = Arc::clone(&group);
            tokio::spawn(async move { group.wait_for(&mut child, |_, _| {}).await })
        };

        while group.is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let started = std::time::Instant::now();
        group.stop(Some(Duration::from_millis(100))).await;
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(waiter.await.unwrap().is_killed());
    }

    #[tokio::test]
    async fn health_check_resumes_the_callback() {
        let group = Arc::new(Group::new(Duration::from_secs(1)));
        let mut child = LocalLauncher.start("w", cooperative()).await.unwrap();
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();

        let waiter = {
            let group = Arc::clone(&group);
            tokio::spawn(async move {
                group
                    .wait_for(&mut child, move |_, tick| {
                        if matches!(tick, Tick::HealthCheck) {
                            let _ = seen_tx.send(());
                        }
                    })
                    .await
            })
        };

        while group.is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        group.health_check();
        seen_rx.recv().await.unwrap();

        group.stop(None).await;
        waiter.await.unwrap();
    }
}
