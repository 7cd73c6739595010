//! Prometheus exporter for the internal events.

use std::net::SocketAddr;

use axum::extract::State;
use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use snafu::prelude::*;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{MetricsError, PrometheusInitSnafu};

/// Poll cycles are expected to take well under the poll interval.
const POLL_CYCLE_BUCKETS: &[f64] = &[0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0];

/// Install the global recorder and serve `/metrics` on `addr` until `shutdown`.
///
/// Must be called from within a tokio runtime. A bind failure is logged and
/// leaves the recorder installed; polling carries on without an endpoint.
pub fn init(addr: SocketAddr, shutdown: CancellationToken) -> Result<PrometheusHandle, MetricsError> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("fileplotter_poll_cycle_duration_seconds".to_string()),
            POLL_CYCLE_BUCKETS,
        )
        .context(PrometheusInitSnafu)?
        .install_recorder()
        .context(PrometheusInitSnafu)?;

    tokio::spawn(serve(addr, handle.clone(), shutdown));
    Ok(handle)
}

async fn serve(addr: SocketAddr, handle: PrometheusHandle, shutdown: CancellationToken) {
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            warn!(%addr, error = %e, "Metrics endpoint unavailable");
            return;
        }
    };
    info!(%addr, "Serving metrics");

    let app = Router::new()
        .route("/metrics", get(render))
        .route("/health", get(|| async { "ok\n" }))
        .with_state(handle);
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
    {
        warn!(error = %e, "Metrics endpoint stopped");
    }
}

async fn render(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}
