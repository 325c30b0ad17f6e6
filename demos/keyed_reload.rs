//! # Demo: mark-and-sweep reload of keyed workers
//!
//! Tracks one worker per "site" under a stable key, then reloads with a
//! smaller site list: workers whose key did not reappear in the reload
//! are retired automatically, the way a per-config-file pool tears down
//! workers for deleted files.
//!
//! Run with: `cargo run --example keyed_reload`

use std::time::Duration;

use procvisor::{ChildSpec, Container, LocalLauncher, SetupError, WorkerFn, WorkerRef};

fn site_worker() -> WorkerRef {
    WorkerFn::arc(|mut ctx| async move {
        println!("[{}] serving", ctx.name());
        ctx.ready().await?;
        ctx.cancelled().await;
        println!("[{}] retired", ctx.name());
        Ok(())
    })
}

async fn deploy(container: &Container<LocalLauncher>, sites: &[&str]) -> Result<(), SetupError> {
    for site in sites {
        let spec = ChildSpec::new(format!("site-{site}"))
            .with_restart(true)
            .with_key(*site);
        container.spawn(spec, site_worker()).await?;
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let container = Container::new(LocalLauncher);

    deploy(&container, &["alpha", "beta", "gamma"]).await?;
    container.wait_until_ready().await;
    println!("serving {} sites", container.state().len());

    // "beta" disappears from the configuration; the sweep retires it.
    container
        .reload(|| async {
            deploy(&container, &["alpha", "gamma"])
                .await
                .expect("re-deploy during reload");
        })
        .await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    println!("after reload: beta tracked = {}", container.find("beta"));

    container.stop().await;
    Ok(())
}
