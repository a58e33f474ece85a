//! Cold restarts under the supervisor

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use monkey_agent::agent::Agent;
use monkey_agent::samples::SampleKind;
use monkey_agent::supervisor::Supervisor;
use tokio::time::Instant;

use crate::helpers::*;

#[tokio::test(start_paused = true)]
async fn test_restart_rebuilds_state_from_scratch() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config("http://127.0.0.1:9", dir.path());
    let attempts = Arc::new(AtomicUsize::new(0));
    let started = Instant::now();

    let restarts = Supervisor::new(Duration::from_secs(10))
        .run(|| {
            let config = config.clone();
            let attempts = attempts.clone();

            async move {
                let agent = Agent::new(config, fake_providers(Arc::new(FakeHost::new(0, 0))))?;

                // nothing carries over from a previous attempt
                anyhow::ensure!(agent.samples().read(SampleKind::Cpu).await.is_err());
                agent.samples().collect(10).await?;

                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("heartbeat loop crashed");
                }
                Ok::<(), anyhow::Error>(())
            }
        })
        .await;

    assert_eq!(restarts, 1);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert!(started.elapsed() >= Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_setup_errors_are_retried() {
    let attempts = Arc::new(AtomicUsize::new(0));

    let restarts = Supervisor::new(Duration::from_secs(10))
        .run(|| {
            let attempts = attempts.clone();
            async move {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                anyhow::ensure!(attempt >= 3, "collector configuration failed");
                Ok::<(), anyhow::Error>(())
            }
        })
        .await;

    assert_eq!(restarts, 3);
}
