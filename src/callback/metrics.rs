//! Outcome metrics for the callback flow
//!
//! # Metrics
//!
//! - `oauth_callback_outcomes_total`: Counter of terminal outcomes, labelled
//!   by `outcome` (`success` or the failure reason)
//! - `oauth_callback_duration_seconds`: Histogram of time from request
//!   receipt to redirect, labelled by `outcome`
//!
//! Recording is a no-op unless a recorder is installed. With the
//! `prometheus` feature, [`install_exporter`] installs one that serves a
//! scrape endpoint on the same interface as the callback listener.

use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use metrics::{histogram, increment_counter};

use crate::callback::outcome::Outcome;
use crate::error::{CallbackError, Result};

/// Records one terminal outcome.
pub fn record_outcome(outcome: &Outcome, elapsed: Duration) {
    let label = outcome.label();
    increment_counter!("oauth_callback_outcomes_total", "outcome" => label);
    histogram!(
        "oauth_callback_duration_seconds",
        elapsed.as_secs_f64(),
        "outcome" => label
    );
}

/// Resolves the scrape endpoint address from the listener host.
///
/// # Errors
///
/// Returns [`CallbackError::Server`] if `host` does not resolve.
pub fn exporter_addr(host: &str, port: u16) -> Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()
        .map_err(|e| CallbackError::Server(format!("invalid metrics host {host}: {e}")))?
        .next()
        .ok_or_else(|| {
            CallbackError::Server(format!("metrics host {host} resolved to no address")).into()
        })
}

/// Installs the Prometheus exporter listening on `host:port`.
///
/// # Errors
///
/// Returns [`CallbackError::Server`] if the address does not resolve or
/// the exporter cannot be installed.
#[cfg(feature = "prometheus")]
pub fn install_exporter(host: &str, port: u16) -> Result<()> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let addr = exporter_addr(host, port)?;
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| CallbackError::Server(format!("failed to install metrics exporter: {e}")))?;

    tracing::info!(%addr, "Prometheus exporter listening");
    Ok(())
}

/// Without the `prometheus` feature there is no exporter to install.
#[cfg(not(feature = "prometheus"))]
pub fn install_exporter(host: &str, port: u16) -> Result<()> {
    tracing::warn!(
        host,
        port,
        "metrics.listen_port is set but the prometheus feature is disabled; metrics are not exported"
    );
    Ok(())
}
