//! Two-phase stop escalation: interrupt gives well-behaved children a
//! clean exit; kill bounds the wait for everyone else.

use std::time::{Duration, Instant};

use procvisor::{ChildSpec, Config, Container, LocalLauncher, WorkerFn, WorkerRef};

fn quick_config() -> Config {
    let mut config = Config::default();
    config.health_check_interval = Duration::from_millis(25);
    config.reap_grace = Duration::from_millis(500);
    config
}

fn cooperative_worker() -> WorkerRef {
    WorkerFn::arc(|mut ctx| async move {
        ctx.ready().await?;
        ctx.cancelled().await;
        ctx.stopping().await?;
        Ok(())
    })
}

fn stubborn_worker() -> WorkerRef {
    // Ignores cancellation entirely; only kill can end it.
    WorkerFn::arc(|mut ctx| async move {
        ctx.ready().await?;
        loop {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
}

#[tokio::test]
async fn graceful_stop_lets_cooperative_children_exit_cleanly() {
    let container = Container::with_config(LocalLauncher, quick_config());

    container
        .run(Some(3), ChildSpec::new("polite"), cooperative_worker())
        .await
        .unwrap();
    container.wait_until_ready().await;

    container.stop_within(Some(Duration::from_secs(5))).await;
    assert!(container.state().is_empty());
    assert_eq!(container.statistics().failures(), 0);
    assert!(container.is_running());
}

#[tokio::test]
async fn stop_returns_in_bounded_time_against_signal_trappers() {
    let container = Container::with_config(LocalLauncher, quick_config());

    container
        .run(
            Some(2),
            ChildSpec::new("trapper").with_restart(true),
            stubborn_worker(),
        )
        .await
        .unwrap();
    container.wait_until_ready().await;

    let started = Instant::now();
    container.stop_within(Some(Duration::from_millis(200))).await;
    let elapsed = started.elapsed();

    // Grace, plus the kill escalation; nowhere near unbounded.
    assert!(elapsed >= Duration::from_millis(200));
    assert!(elapsed < Duration::from_secs(5), "stop took {elapsed:?}");

    assert!(container.state().is_empty());
    // Killed children are failures, and the cleared running flag means no
    // restart sneaks in behind the stop.
    assert_eq!(container.statistics().failures(), 2);
    assert_eq!(container.statistics().spawns(), 2);
}

#[tokio::test]
async fn immediate_stop_skips_the_grace_phase() {
    let container = Container::with_config(LocalLauncher, quick_config());

    container
        .run(Some(2), ChildSpec::new("worker"), stubborn_worker())
        .await
        .unwrap();
    container.wait_until_ready().await;

    let started = Instant::now();
    container.stop_within(None).await;
    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(container.state().is_empty());
}

#[tokio::test]
async fn container_is_reusable_after_stop() {
    let container = Container::with_config(LocalLauncher, quick_config());

    container
        .spawn(ChildSpec::new("first"), cooperative_worker())
        .await
        .unwrap();
    container.stop_within(Some(Duration::from_secs(2))).await;
    assert!(container.state().is_empty());

    container
        .spawn(ChildSpec::new("second"), cooperative_worker())
        .await
        .unwrap();
    container.wait_until_ready().await;
    assert_eq!(container.state().len(), 1);
    container.stop_within(Some(Duration::from_secs(2))).await;
}
