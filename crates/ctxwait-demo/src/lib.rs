//! ctxwait demo: waits on an important worker while an optional one is
//! cancelled partway through.
pub mod config;

use anyhow::{ensure, Result};
use config::DemoConfig;
use ctxwait_core::Context;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::sleep;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Report {
    pub important_done: bool,
    pub optional_done: bool,
    /// Elapsed time in whole ticks
    pub ticks: u128,
}

pub async fn run(config: &DemoConfig) -> Result<Report> {
    let tick = config.tick;
    let important_done = Arc::new(AtomicBool::new(false));
    let optional_done = Arc::new(AtomicBool::new(false));

    let (ctx, waiter) = Context::background().with_wait();
    let (ctx, cancel) = ctx.with_cancel();
    info!(trace_id = ctx.trace_id(), tick_ms = tick.as_millis() as u64, "starting workers");
    let start = Instant::now();

    // Ignores cancellation and completes the scope when finished.
    tokio::spawn({
        let ctx = ctx.clone();
        let done = Arc::clone(&important_done);
        async move {
            sleep(tick * 5).await;
            done.store(true, Ordering::SeqCst);
            info!("important worker finished");
            ctx.complete();
        }
    });

    // Gives up as soon as the context is cancelled.
    tokio::spawn({
        let ctx = ctx.clone();
        let done = Arc::clone(&optional_done);
        async move {
            tokio::select! {
                _ = sleep(tick * 10) => {
                    done.store(true, Ordering::SeqCst);
                    info!("optional worker finished");
                    ctx.complete();
                }
                _ = ctx.cancelled() => info!("optional worker cancelled"),
            }
        }
    });

    tokio::spawn(async move {
        sleep(tick).await;
        cancel.cancel();
    });

    waiter.wait().await;

    let report = Report {
        important_done: important_done.load(Ordering::SeqCst),
        optional_done: optional_done.load(Ordering::SeqCst),
        ticks: start
            .elapsed()
            .as_millis()
            .checked_div(tick.as_millis())
            .unwrap_or_default(),
    };
    info!(?report, "scope completed");

    ensure!(report.important_done, "important worker was not waited for");
    ensure!(!report.optional_done, "optional worker was waited for");
    Ok(report)
}
