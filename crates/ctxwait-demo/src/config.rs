//! Demo configuration from environment variables
use anyhow::{bail, Context as _, Result};
use std::time::Duration;
use tracing::Level;

pub const TICK_ENV: &str = "CTXWAIT_TICK_MS";
pub const LOG_ENV: &str = "CTXWAIT_LOG";

const DEFAULT_TICK_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoConfig {
    /// Length of one scenario time unit
    pub tick: Duration,
    pub log_level: Level,
}

impl DemoConfig {
    pub fn from_env() -> Result<Self> {
        Self::parse(
            std::env::var(TICK_ENV).ok().as_deref(),
            std::env::var(LOG_ENV).ok().as_deref(),
        )
    }

    pub fn parse(tick_ms: Option<&str>, log_level: Option<&str>) -> Result<Self> {
        let tick_ms = match tick_ms {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("{TICK_ENV} must be a whole number of milliseconds, got {raw:?}"))?,
            None => DEFAULT_TICK_MS,
        };
        if tick_ms == 0 {
            bail!("{TICK_ENV} must be greater than zero");
        }

        let log_level = match log_level {
            Some(raw) => raw
                .trim()
                .parse::<Level>()
                .map_err(|_| anyhow::anyhow!("{LOG_ENV} must be a log level, got {raw:?}"))?,
            None => Level::INFO,
        };

        Ok(Self {
            tick: Duration::from_millis(tick_ms),
            log_level,
        })
    }
}
