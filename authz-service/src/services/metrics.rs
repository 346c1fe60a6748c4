use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub fn init_metrics() -> anyhow::Result<()> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;

    if METRICS_HANDLE.set(handle).is_err() {
        tracing::warn!("Metrics recorder already initialized");
    }

    Ok(())
}

pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}

/// Record the outcome of one membership probe (`kind` is `org` or `team`).
pub fn record_probe(kind: &'static str, outcome: &'static str) {
    counter!("authz_probe_total", "kind" => kind, "outcome" => outcome).increment(1);
}

/// Record a final authorization decision.
pub fn record_decision(outcome: &'static str) {
    counter!("authz_decisions_total", "outcome" => outcome).increment(1);
}
