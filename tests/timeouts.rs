//! Startup and health-check deadline enforcement through the periodic
//! health-check sentinel.

use std::time::{Duration, Instant};

use procvisor::{ChildSpec, Config, Container, LocalLauncher, WorkerFn};

fn quick_config() -> Config {
    let mut config = Config::default();
    config.health_check_interval = Duration::from_millis(25);
    config.reap_grace = Duration::from_secs(1);
    config
}

#[tokio::test]
async fn silent_child_is_killed_after_the_startup_timeout() {
    let container = Container::with_config(LocalLauncher, quick_config());

    // Never reports ready, never exits on its own.
    let worker = WorkerFn::arc(|_ctx| async {
        loop {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    });
    let spec = ChildSpec::new("mute").with_startup_timeout(Duration::from_millis(150));
    container.spawn(spec, worker).await.unwrap();

    let started = Instant::now();
    container.wait().await;
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(140), "killed early: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(5), "kill never fired: {elapsed:?}");
    assert_eq!(container.statistics().failures(), 1);
    assert!(container.state().is_empty());
}

#[tokio::test]
async fn messages_reset_the_health_check_clock() {
    let container = Container::with_config(LocalLauncher, quick_config());

    // Ready immediately, then chatty for ~240ms, then silent forever.
    let worker = WorkerFn::arc(|mut ctx| async move {
        ctx.ready().await?;
        for _ in 0..4 {
            tokio::time::sleep(Duration::from_millis(60)).await;
            ctx.status("alive").await?;
        }
        loop {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    });
    let spec = ChildSpec::new("stalling").with_health_check_timeout(Duration::from_millis(250));
    container.spawn(spec, worker).await.unwrap();

    let started = Instant::now();
    container.wait().await;
    let elapsed = started.elapsed();

    // Four resets push the deadline to roughly 240ms + 250ms; dying any
    // sooner would mean a reset was lost.
    assert!(elapsed >= Duration::from_millis(400), "clock not reset: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(5), "kill never fired: {elapsed:?}");
    assert_eq!(container.statistics().failures(), 1);
}

#[tokio::test]
async fn ready_switches_the_applicable_deadline() {
    let container = Container::with_config(LocalLauncher, quick_config());

    // Slow to start but within the startup budget; once ready it stays
    // silent longer than the startup timeout, which must no longer apply.
    let worker = WorkerFn::arc(|mut ctx| async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        ctx.ready().await?;
        ctx.cancelled().await;
        Ok(())
    });
    let spec = ChildSpec::new("slow-start")
        .with_startup_timeout(Duration::from_millis(200))
        .with_health_check_timeout(Duration::from_millis(900));
    container.spawn(spec, worker).await.unwrap();
    container.wait_until_ready().await;

    // Drive health checks well past the startup timeout; the child must
    // survive on the (longer) health-check deadline.
    let probe = tokio::time::timeout(Duration::from_millis(500), container.wait()).await;
    assert!(probe.is_err(), "child was killed after becoming ready");
    assert_eq!(container.statistics().failures(), 0);

    container.stop_within(Some(Duration::from_millis(500))).await;
}

#[tokio::test]
async fn children_without_deadlines_are_never_killed() {
    let container = Container::with_config(LocalLauncher, quick_config());

    // Silent and never ready, but no deadline applies.
    let worker = WorkerFn::arc(|ctx| async move {
        ctx.cancelled().await;
        Ok(())
    });
    container.spawn(ChildSpec::new("quiet"), worker).await.unwrap();

    let probe = tokio::time::timeout(Duration::from_millis(400), container.wait()).await;
    assert!(probe.is_err(), "child died without a deadline");
    assert_eq!(container.statistics().failures(), 0);

    container.stop_within(Some(Duration::from_millis(500))).await;
}
