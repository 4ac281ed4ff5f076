// ABOUTME: Prometheus metrics for environment activity (steps, resets, messages, connections)
// ABOUTME: Thin wrappers over the metrics facade so call sites stay one-liners

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the global Prometheus recorder. Call once at startup.
pub fn init_metrics() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")
}

/// A handle backed by a recorder that is not installed globally.
/// Renders an empty exposition; used where no global recorder exists (tests, CLI).
pub fn detached_handle() -> PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}

/// `outcome` is one of "ok", "invalid", "error"
pub fn record_step(action: &'static str, outcome: &'static str) {
    metrics::counter!("teamsim_steps_total", "action" => action, "outcome" => outcome).increment(1);
}

pub fn record_reset() {
    metrics::counter!("teamsim_resets_total").increment(1);
}

pub fn record_episode_completed() {
    metrics::counter!("teamsim_episodes_completed_total").increment(1);
}

/// `source` is "agent" for step-driven messages, "relay" for live chat
pub fn record_message(source: &'static str) {
    metrics::counter!("teamsim_messages_total", "source" => source).increment(1);
}

pub fn ws_connection_opened() {
    metrics::gauge!("teamsim_ws_connections").increment(1.0);
}

pub fn ws_connection_closed() {
    metrics::gauge!("teamsim_ws_connections").decrement(1.0);
}
