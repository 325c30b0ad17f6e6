//! # Demo: supervised worker pool
//!
//! Spawns a pool of task-backed workers, waits until every worker reports
//! ready, lets them serve for a moment, then stops the pool through the
//! two-phase interrupt → kill escalation.
//!
//! Run with: `cargo run --example worker_pool`

use std::time::Duration;

use procvisor::{signals, ChildSpec, Config, Container, LocalLauncher, WorkerFn};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut config = Config::default();
    config.grace = Duration::from_secs(2);
    config.health_check_timeout = Some(Duration::from_secs(5));

    let container = Container::with_config(LocalLauncher, config);

    let worker = WorkerFn::arc(|mut ctx| async move {
        println!("[{}] starting", ctx.name());
        ctx.ready().await?;
        loop {
            let stopped = tokio::select! {
                _ = ctx.cancelled() => true,
                _ = tokio::time::sleep(Duration::from_millis(500)) => false,
            };
            if stopped {
                break;
            }
            ctx.status("serving").await?;
        }
        println!("[{}] stopping", ctx.name());
        ctx.stopping().await?;
        Ok(())
    });

    container
        .run(Some(4), ChildSpec::new("worker").with_restart(true), worker)
        .await?;
    container.wait_until_ready().await;
    println!("pool ready: {} workers", container.state().len());

    // Serve until the timer elapses; Ctrl-C and SIGTERM are forwarded to
    // the pool as the same interrupt/terminate broadcasts stop() uses.
    tokio::select! {
        _ = signals::forward(container.group()) => {}
        _ = tokio::time::sleep(Duration::from_secs(2)) => {}
    }
    container.stop().await;
    println!(
        "stopped: spawns={} failures={}",
        container.statistics().spawns(),
        container.statistics().failures()
    );
    Ok(())
}
