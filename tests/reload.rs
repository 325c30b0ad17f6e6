//! Mark-and-sweep reload of keyed children.

use std::time::Duration;

use procvisor::{ChildSpec, Config, Container, LocalLauncher, WorkerFn, WorkerRef};

fn quick_config() -> Config {
    let mut config = Config::default();
    config.health_check_interval = Duration::from_millis(25);
    config.reap_grace = Duration::from_secs(1);
    config
}

fn ready_worker() -> WorkerRef {
    WorkerFn::arc(|mut ctx| async move {
        ctx.ready().await?;
        ctx.cancelled().await;
        Ok(())
    })
}

fn keyed_spec(key: &str) -> ChildSpec {
    ChildSpec::new(format!("worker-{key}"))
        .with_restart(true)
        .with_key(key)
}

async fn settle(container: &Container<LocalLauncher>, expected: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while container.state().len() != expected {
        assert!(
            tokio::time::Instant::now() < deadline,
            "pool never settled at {expected} children"
        );
        container.sleep(Duration::from_millis(25)).await;
    }
}

#[tokio::test]
async fn sweep_retires_keys_that_did_not_reappear() {
    let container = Container::with_config(LocalLauncher, quick_config());

    for key in ["x", "y", "z"] {
        assert!(container
            .spawn(keyed_spec(key), ready_worker())
            .await
            .unwrap());
    }
    container.wait_until_ready().await;
    assert_eq!(container.state().len(), 3);

    // Re-spawn only "x" and "z": both are already tracked, so the calls
    // just re-mark the keys without launching anything.
    let swept = container
        .reload(|| async {
            assert!(!container
                .spawn(keyed_spec("x"), ready_worker())
                .await
                .unwrap());
            assert!(!container
                .spawn(keyed_spec("z"), ready_worker())
                .await
                .unwrap());
        })
        .await;
    assert!(swept);

    assert!(container.find("x"));
    assert!(!container.find("y"));
    assert!(container.find("z"));

    // "y" was retired and terminated; its restart loop must not bring it
    // back.
    settle(&container, 2).await;
    assert_eq!(container.statistics().spawns(), 3);

    container.stop_within(Some(Duration::from_millis(500))).await;
}

#[tokio::test]
async fn empty_reload_retires_every_keyed_child() {
    let container = Container::with_config(LocalLauncher, quick_config());

    for key in ["a", "b"] {
        container
            .spawn(keyed_spec(key), ready_worker())
            .await
            .unwrap();
    }
    container.wait_until_ready().await;

    assert!(container.reload(|| async {}).await);
    assert!(!container.find("a"));
    assert!(!container.find("b"));
    settle(&container, 0).await;

    // Nothing left to sweep on the next cycle.
    assert!(!container.reload(|| async {}).await);
}

#[tokio::test]
async fn reload_can_introduce_new_keys() {
    let container = Container::with_config(LocalLauncher, quick_config());

    container
        .spawn(keyed_spec("old"), ready_worker())
        .await
        .unwrap();
    container.wait_until_ready().await;

    let swept = container
        .reload(|| async {
            assert!(container
                .spawn(keyed_spec("new"), ready_worker())
                .await
                .unwrap());
        })
        .await;
    assert!(swept);

    assert!(!container.find("old"));
    assert!(container.find("new"));
    settle(&container, 1).await;
    assert_eq!(container.state()[0].name(), "worker-new");

    container.stop_within(Some(Duration::from_millis(500))).await;
}
