//! Fixed-size fan-out with first-error aggregation

use anyhow::{Result, anyhow};
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::warn;

/// Run every task concurrently, wait for all of them, and return the first
/// error any of them reported.
///
/// Failures are collected through a channel sized to the task count so no
/// task ever blocks on reporting. A panicking task counts as a failure.
pub async fn run_all<Fut>(tasks: Vec<(String, Fut)>) -> Result<()>
where
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    if tasks.is_empty() {
        return Ok(());
    }

    let (err_tx, mut err_rx) = mpsc::channel::<anyhow::Error>(tasks.len());
    let mut set = JoinSet::new();

    for (name, task) in tasks {
        let err_tx = err_tx.clone();
        set.spawn(async move {
            let result = AssertUnwindSafe(task)
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    Err(anyhow!("{name} panicked: {}", panic_message(&*panic)))
                });

            if let Err(e) = result {
                warn!(task = %name, error = %e, "Cleanup task failed");
                let _ = err_tx.try_send(e);
            }
        });
    }
    drop(err_tx);

    while set.join_next().await.is_some() {}

    match err_rx.try_recv() {
        Ok(e) => Err(e),
        Err(_) => Ok(()),
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
