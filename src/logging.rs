//! Structured logging setup
//!
//! Provides JSON-formatted and human-readable logging on top of the tracing
//! ecosystem. `RUST_LOG` takes precedence over the default filter. Logs go
//! to stderr so stdout stays free for command output.

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter directive when `RUST_LOG` is unset.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "oauth_callback=debug"
    } else {
        "oauth_callback=info"
    }
}

/// Initialize the global subscriber.
///
/// # Arguments
///
/// * `verbose` - Raise the default level to `debug`
/// * `json` - Emit JSON lines including the current span (and its request id)
///
/// # Errors
///
/// Returns error if the filter is invalid or a subscriber is already set
pub fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(verbose)))?;

    let registry = tracing_subscriber::registry().with(env_filter);

    if json {
        let layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_writer(std::io::stderr);
        registry.with(layer).try_init()?;
    } else {
        let layer = fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_writer(std::io::stderr);
        registry.with(layer).try_init()?;
    }

    Ok(())
}
