//! Logging setup. Everything goes to stderr so stdout stays the report.

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Overrides `-v` when set, e.g. `TRACEVIZ_LOG=traceviz_session=debug`.
pub const LOG_ENV: &str = "TRACEVIZ_LOG";

pub fn init(verbosity: u8) -> Result<()> {
    let env_filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_timer(fmt::time::ChronoLocal::new("%H:%M:%S%.3f".to_string())),
        )
        .try_init()
        .map_err(|err| anyhow!("failed to install log subscriber: {err}"))
}

fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}
