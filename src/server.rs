// ABOUTME: Server state shared by the HTTP request layer and the WebSocket relay
// ABOUTME: Owns the single Environment behind a mutex and assembles the axum application

use crate::config::ServerConfig;
use crate::relay::{ws_handler, WsHub};
use crate::routes;
use anyhow::{Context, Result};
use axum::{extract::State, http::HeaderValue, response::IntoResponse, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use teamsim_core::Environment;
use tokio::sync::Mutex;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// The one environment instance of this process. Every mutation goes
/// through the mutex, so HTTP steps and relayed chat events never interleave.
pub type SharedEnvironment = Arc<Mutex<Environment>>;

#[derive(Clone)]
pub struct ServerState {
    pub env: SharedEnvironment,
    pub hub: WsHub,
    pub metrics: PrometheusHandle,
}

impl std::fmt::Debug for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerState")
            .field("env", &"<Environment>")
            .field("hub", &"<WsHub>")
            .field("metrics", &"<PrometheusHandle>")
            .finish()
    }
}

impl ServerState {
    pub fn new(env: Environment, metrics: PrometheusHandle) -> Self {
        Self {
            env: Arc::new(Mutex::new(env)),
            hub: WsHub::new(),
            metrics,
        }
    }
}

/// Build the full application: environment API, relay endpoint, health and metrics
pub fn build_router(state: ServerState, cors_origin: &str) -> Router {
    Router::new()
        .route("/", get(routes::index))
        .route("/health", get(routes::health))
        .route("/metrics", get(metrics_handler))
        .route("/ws", get(ws_handler))
        .nest("/env", routes::env_router())
        .layer(cors_layer(cors_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origin == "*" {
        return layer.allow_origin(Any);
    }
    match HeaderValue::from_str(origin) {
        Ok(value) => layer.allow_origin(value),
        Err(e) => {
            tracing::warn!(origin = %origin, error = %e, "Invalid CORS origin, allowing any");
            layer.allow_origin(Any)
        }
    }
}

async fn metrics_handler(State(state): State<ServerState>) -> impl IntoResponse {
    state.metrics.render()
}

/// Bind and serve until the process is stopped
pub async fn serve(config: &ServerConfig, state: ServerState) -> Result<()> {
    let app = build_router(state, &config.cors_origin);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(addr = %addr, "Environment API listening on http://{}/env", addr);
    tracing::info!(addr = %addr, "Live relay listening on ws://{}/ws", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
