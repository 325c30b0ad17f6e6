//! # Container: the user-facing spawn/run/stop/reload surface.
//!
//! A [`Container`] layers keyed bookkeeping, statistics, and the failure
//! [`Policy`] on top of a [`Group`]. One supervising task runs per child;
//! everything else is shared state behind short-lived locks.
//!
//! ```text
//! ChildSpec ──► Container::spawn ──► Launch::start ──► Child
//!                                          │
//!                                          ▼
//! loop {                            supervising task
//!   ├─► admit: keyed + state entries, fresh age clock
//!   ├─► Group::wait_for(child)
//!   │      ├─ message      ─► merge into state, reset age clock
//!   │      └─ health check ─► age > deadline?
//!   │             ├─ before first ready ─► Policy::startup_failed
//!   │             └─ after  first ready ─► Policy::health_check_failed
//!   ├─► exit: drop state, classify, update statistics
//!   ├─► Policy::child_exit
//!   └─► restart requested, container running, not retired? ─► loop
//! }
//! ```
//!
//! ## Deadlines
//! The applicable timeout switches from `startup_timeout` to
//! `health_check_timeout` at the child's first ready message. Both are
//! enforced only through the periodic health-check sentinel, never a
//! separate timer task, so all timing decisions stay inside the waiter.
//!
//! ## Reload
//! [`Container::reload`] clears every keyed mark, runs the caller's block
//! (re-spawning a tracked key just re-marks it), then sweeps: entries left
//! unmarked are retired and their children sent terminate. Only workers
//! whose key reappeared in the reload survive.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::children::{Child, ChildId, Control, Keyed, Launch};
use crate::config::{processor_count, Config};
use crate::error::SetupError;
use crate::notify::Message;
use crate::policy::{DefaultPolicy, Policy};
use crate::statistics::Statistics;

use super::group::{Group, Tick, Token};

/// How often stop and wait re-check a supervisor that is between
/// incarnations or finishing its exit bookkeeping.
const SETTLE_POLL: Duration = Duration::from_millis(10);

/// Options for one [`Container::spawn`] call.
#[derive(Debug, Clone)]
pub struct ChildSpec {
    /// Display name of the child.
    pub name: String,
    /// Whether to relaunch the child after it exits.
    pub restart: bool,
    /// Stable key tracking the child across reload cycles.
    pub key: Option<String>,
    /// Deadline for the first ready message; `None` inherits
    /// [`Config::startup_timeout`].
    pub startup_timeout: Option<Duration>,
    /// Deadline between messages once ready; `None` inherits
    /// [`Config::health_check_timeout`].
    pub health_check_timeout: Option<Duration>,
}

impl ChildSpec {
    /// Creates a spec with no restart, no key, and inherited deadlines.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            restart: false,
            key: None,
            startup_timeout: None,
            health_check_timeout: None,
        }
    }

    /// Relaunch the child whenever it exits.
    pub fn with_restart(mut self, restart: bool) -> Self {
        self.restart = restart;
        self
    }

    /// Track the child under a stable key across reloads.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Override the startup deadline for this child.
    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = Some(timeout);
        self
    }

    /// Override the liveness deadline for this child.
    pub fn with_health_check_timeout(mut self, timeout: Duration) -> Self {
        self.health_check_timeout = Some(timeout);
        self
    }
}

/// Last known state of one supervised child.
#[derive(Debug, Clone)]
pub struct ChildState {
    name: String,
    status: Message,
    ready_seen: bool,
    updated: Instant,
}

impl ChildState {
    fn new(name: String) -> Self {
        Self {
            name,
            status: Message::new(),
            ready_seen: false,
            updated: Instant::now(),
        }
    }

    /// Folds a message into the state and resets the age clock.
    fn update(&mut self, message: &Message) {
        self.status.merge(message);
        if message.is_ready() {
            self.ready_seen = true;
        }
        self.updated = Instant::now();
    }

    /// The child's display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The merged status message, latest value per key.
    pub fn status(&self) -> &Message {
        &self.status
    }

    /// Whether the status currently shows the readiness flag.
    pub fn is_ready(&self) -> bool {
        self.status.is_ready()
    }

    /// Time since the child last sent a message (or since launch).
    pub fn age(&self) -> Duration {
        self.updated.elapsed()
    }
}

struct Shared {
    group: Group,
    config: Config,
    policy: Arc<dyn Policy>,
    statistics: Statistics,
    keyed: Mutex<HashMap<String, Keyed>>,
    state: Mutex<HashMap<ChildId, ChildState>>,
    sequence: AtomicU64,
    running: AtomicBool,
    /// Supervising tasks that have not finished their exit bookkeeping.
    ///
    /// The waiter table alone cannot answer "is everything done": it is
    /// briefly empty between a restart iteration's exit and the next
    /// incarnation's registration. Stop and wait settle on this instead.
    active: AtomicUsize,
}

impl Shared {
    fn keyed_table(&self) -> MutexGuard<'_, HashMap<String, Keyed>> {
        self.keyed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state_table(&self) -> MutexGuard<'_, HashMap<ChildId, ChildState>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a fresh incarnation in the keyed and state tables.
    fn admit(&self, id: ChildId, spec: &ChildSpec, wait_key: std::os::fd::RawFd, retire: &CancellationToken) {
        if let Some(key) = &spec.key {
            let mut keyed = self.keyed_table();
            match keyed.get_mut(key) {
                Some(entry) => entry.track(id, wait_key),
                None => {
                    keyed.insert(
                        key.clone(),
                        Keyed::new(key.clone(), id, wait_key, retire.clone()),
                    );
                }
            }
        }
        self.state_table().insert(id, ChildState::new(spec.name.clone()));
    }

    fn update(&self, id: ChildId, message: &Message) {
        if let Some(entry) = self.state_table().get_mut(&id) {
            entry.update(message);
        }
    }

    /// Age clock and first-ready latch for the health-check decision.
    fn age(&self, id: ChildId) -> Option<(Duration, bool)> {
        self.state_table()
            .get(&id)
            .map(|entry| (entry.age(), entry.ready_seen))
    }
}

/// Supervises a pool of children produced by a [`Launch`] collaborator.
pub struct Container<L: Launch> {
    launcher: Arc<L>,
    shared: Arc<Shared>,
}

impl<L: Launch> Container<L> {
    /// Creates a container with the default configuration and policy.
    pub fn new(launcher: L) -> Self {
        Self::with(launcher, Config::default(), Arc::new(DefaultPolicy))
    }

    /// Creates a container with a custom configuration.
    pub fn with_config(launcher: L, config: Config) -> Self {
        Self::with(launcher, config, Arc::new(DefaultPolicy))
    }

    /// Creates a container with a custom configuration and policy.
    pub fn with(launcher: L, config: Config, policy: Arc<dyn Policy>) -> Self {
        let group = Group::new(config.reap_grace);
        Self {
            launcher: Arc::new(launcher),
            shared: Arc::new(Shared {
                group,
                config,
                policy,
                statistics: Statistics::new(),
                keyed: Mutex::new(HashMap::new()),
                state: Mutex::new(HashMap::new()),
                sequence: AtomicU64::new(1),
                running: AtomicBool::new(true),
                active: AtomicUsize::new(0),
            }),
        }
    }

    /// Starts one supervised child.
    ///
    /// If `spec.key` is already tracked, the existing entry is re-marked
    /// and no new child is launched; returns `Ok(false)`. Otherwise the
    /// first incarnation is started inline, so launch failures propagate
    /// to the caller as a [`SetupError`]; failures of later restart
    /// iterations are logged and counted instead. Returns `Ok(true)` once
    /// the supervising task is running.
    pub async fn spawn(&self, spec: ChildSpec, work: L::Work) -> Result<bool, SetupError> {
        if let Some(key) = &spec.key {
            if self.mark(key) {
                return Ok(false);
            }
        }

        self.shared.statistics.record_spawn();
        self.shared.policy.child_spawn(&spec.name, spec.key.as_deref());

        let mut child = self
            .launcher
            .start(&spec.name, work.clone())
            .await
            .map_err(|error| SetupError::new(&spec.name, error))?;

        let id = self.shared.sequence.fetch_add(1, Ordering::Relaxed);
        let retire = CancellationToken::new();
        let wait_key = child.channel_mut().key();
        self.shared.admit(id, &spec, wait_key, &retire);
        self.shared.active.fetch_add(1, Ordering::AcqRel);

        let shared = Arc::clone(&self.shared);
        let launcher = Arc::clone(&self.launcher);
        tokio::spawn(supervise(shared, launcher, spec, work, child, id, retire));
        Ok(true)
    }

    /// Spawns `count` children with identical options.
    ///
    /// `None` uses [`processor_count`]. Each worker's name gets a
    /// `-<index>` suffix; keyed specs are normally spawned one at a time
    /// instead, since a shared key collapses to a single child.
    pub async fn run(
        &self,
        count: Option<usize>,
        spec: ChildSpec,
        work: L::Work,
    ) -> Result<usize, SetupError> {
        let count = count.unwrap_or_else(processor_count);
        for index in 0..count {
            let mut worker = spec.clone();
            worker.name = format!("{}-{}", spec.name, index + 1);
            self.spawn(worker, work.clone()).await?;
        }
        Ok(count)
    }

    /// Blocks until every tracked child reports ready or exits.
    ///
    /// Exited children are vacuously ready, so a pool whose children all
    /// crashed during startup does not hang here.
    pub async fn wait_until_ready(&self) {
        while !self.is_ready() {
            self.shared
                .group
                .sleep(self.shared.config.health_check_interval)
                .await;
        }
    }

    /// Whether every tracked child currently shows the readiness flag.
    ///
    /// A supervisor between incarnations counts as a child that is still
    /// starting, so a pool mid-restart is not spuriously ready.
    pub fn is_ready(&self) -> bool {
        let state = self.shared.state_table();
        state.values().all(ChildState::is_ready)
            && state.len() == self.shared.active.load(Ordering::Acquire)
    }

    /// Mark-and-sweep reload of keyed children.
    ///
    /// Clears every mark, runs `body` (which re-spawns the keys it still
    /// wants, re-marking them), then retires every entry left unmarked:
    /// its restart loop ends and its child is sent terminate. Returns
    /// whether anything was swept.
    pub async fn reload<F, Fut>(&self, body: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ()>,
    {
        {
            let mut keyed = self.shared.keyed_table();
            for entry in keyed.values_mut() {
                entry.clear();
            }
        }

        body().await;

        let swept: Vec<Keyed> = {
            let mut keyed = self.shared.keyed_table();
            let unmarked: Vec<String> = keyed
                .values()
                .filter(|entry| !entry.is_marked())
                .map(|entry| entry.key().to_owned())
                .collect();
            unmarked
                .into_iter()
                .filter_map(|key| keyed.remove(&key))
                .collect()
        };

        for entry in &swept {
            log::info!("retiring child for key {:?}", entry.key());
            entry.retire();
            self.shared.group.deliver(entry.wait_key(), Token::Terminate);
        }
        !swept.is_empty()
    }

    /// Whether `key` is currently tracked.
    pub fn find(&self, key: &str) -> bool {
        self.shared.keyed_table().contains_key(key)
    }

    /// Stops every child using the configured grace period.
    pub async fn stop(&self) {
        self.stop_within(Some(self.shared.config.grace)).await;
    }

    /// Stops every child through the two-phase escalation.
    ///
    /// The running flag is cleared for the duration, so restart loops end
    /// instead of relaunching, and re-armed afterwards so the container
    /// can be reused.
    pub async fn stop_within(&self, graceful: Option<Duration>) {
        self.shared.running.store(false, Ordering::Relaxed);
        self.shared.group.stop(graceful).await;

        // Settle: let supervising tasks finish their exit bookkeeping, and
        // keep killing in case one slipped a final restart in just before
        // the running flag flipped.
        while self.shared.active.load(Ordering::Acquire) != 0 {
            self.shared.group.kill();
            self.shared.group.sleep(SETTLE_POLL).await;
        }
        self.shared.running.store(true, Ordering::Relaxed);
    }

    /// Whether the container is accepting restarts.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Relaxed)
    }

    /// Blocks until every supervised child has exited, broadcasting
    /// health-check sentinels at the configured interval.
    pub async fn wait(&self) {
        loop {
            self.shared
                .group
                .wait(self.shared.config.health_check_interval)
                .await;
            if self.shared.active.load(Ordering::Acquire) == 0 {
                return;
            }
            // A supervisor is between incarnations or finishing its exit
            // bookkeeping; give it a beat and re-enter the wait.
            self.shared.group.sleep(SETTLE_POLL).await;
        }
    }

    /// Pumps the scheduler for up to `duration`.
    pub async fn sleep(&self, duration: Duration) {
        self.shared.group.sleep(duration).await;
    }

    /// The underlying scheduler, for wiring OS signal forwarding.
    pub fn group(&self) -> &Group {
        &self.shared.group
    }

    /// Spawn/restart/failure counters.
    pub fn statistics(&self) -> &Statistics {
        &self.shared.statistics
    }

    /// Whether any child has failed.
    pub fn failed(&self) -> bool {
        self.shared.statistics.failed()
    }

    /// Snapshot of every tracked child's last known state.
    pub fn state(&self) -> Vec<ChildState> {
        self.shared.state_table().values().cloned().collect()
    }

    /// Re-marks an existing keyed entry. Returns whether it was present.
    fn mark(&self, key: &str) -> bool {
        match self.shared.keyed_table().get_mut(key) {
            Some(entry) => {
                entry.mark();
                true
            }
            None => false,
        }
    }
}

/// The per-child supervising loop: one incarnation per iteration.
async fn supervise<L: Launch>(
    shared: Arc<Shared>,
    launcher: Arc<L>,
    spec: ChildSpec,
    work: L::Work,
    mut child: L::Child,
    mut id: ChildId,
    retire: CancellationToken,
) {
    let startup_timeout = spec.startup_timeout.or(shared.config.startup_timeout);
    let health_check_timeout = spec.health_check_timeout.or(shared.config.health_check_timeout);

    loop {
        let status = {
            let relay = Arc::clone(&shared);
            shared
                .group
                .wait_for(&mut child, |control: &dyn Control, tick| match tick {
                    Tick::Message(message) => relay.update(id, &message),
                    Tick::HealthCheck => {
                        let Some((age, ready)) = relay.age(id) else {
                            return;
                        };
                        let limit = if ready {
                            health_check_timeout
                        } else {
                            startup_timeout
                        };
                        if let Some(limit) = limit {
                            if age > limit {
                                if ready {
                                    relay.policy.health_check_failed(control, age, limit);
                                } else {
                                    relay.policy.startup_failed(control, age, limit);
                                }
                            }
                        }
                    }
                })
                .await
        };

        shared.state_table().remove(&id);
        if !status.is_success() {
            shared.statistics.record_failure();
        }
        shared.policy.child_exit(&spec.name, spec.key.as_deref(), &status);

        let restart = spec.restart
            && shared.running.load(Ordering::Relaxed)
            && !retire.is_cancelled();
        if !restart {
            break;
        }

        shared.statistics.record_restart();
        match launcher.start(&spec.name, work.clone()).await {
            Ok(next) => {
                child = next;
                id = shared.sequence.fetch_add(1, Ordering::Relaxed);
                let wait_key = child.channel_mut().key();
                shared.admit(id, &spec, wait_key, &retire);
            }
            Err(error) => {
                log::error!("could not restart child {:?}: {error}", spec.name);
                shared.statistics.record_failure();
                break;
            }
        }
    }

    // Drop the keyed entry unless a newer incarnation reused the key.
    if let Some(key) = &spec.key {
        let mut keyed = shared.keyed_table();
        if keyed.get(key).map(|entry| entry.child()) == Some(id) {
            keyed.remove(key);
        }
    }

    shared.active.fetch_sub(1, Ordering::AcqRel);
    shared.group.wake();
}
