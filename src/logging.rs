//! Tracing subscriber setup for the `pyrilo` binary.

use anyhow::{anyhow, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "pyrilo=info";
const VERBOSE_LOG_FILTER: &str = "pyrilo=debug";

/// Install a stderr subscriber. `RUST_LOG` wins over the defaults; `verbose`
/// raises the default filter to debug.
pub fn init_logging(verbose: bool) -> Result<()> {
    let default_filter = if verbose {
        VERBOSE_LOG_FILTER
    } else {
        DEFAULT_LOG_FILTER
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(filter),
        )
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))
}
