//! Binary entrypoint for the ctxwait demo.
use ctxwait_demo::{config::DemoConfig, run};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Tick length and log level can be overridden with CTXWAIT_TICK_MS / CTXWAIT_LOG
    let config = DemoConfig::from_env()?;
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .init();

    let report = run(&config).await?;
    tracing::info!(ticks = report.ticks as u64, "done");
    Ok(())
}
