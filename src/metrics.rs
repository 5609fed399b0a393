use axum::{routing::get, Router};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and return a router exposing /metrics.
pub fn setup_metrics() -> anyhow::Result<Router> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    Ok(Router::new().route("/metrics", get(move || async move { handle.render() })))
}
