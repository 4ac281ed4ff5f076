// ABOUTME: HTTP request layer for the environment - reset, state, step, actions and stats
// ABOUTME: Wraps every payload in a {success, ...} envelope; malformed steps get a 400

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use teamsim_core::{ActionCatalog, ActionRequest, EpisodeStats, Observation, StepResult};

use crate::relay::ServerMessage;
use crate::server::ServerState;

pub const INVALID_ACTION_FORMAT: &str =
    "Invalid action format. Expected: { action: { type: string, payload: object } }";

/// Failure envelope: `{success: false, error}` with a non-2xx status
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "success": false, "error": self.message })),
        )
            .into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub success: bool,
    pub state: Observation,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub success: bool,
    pub state: Observation,
}

#[derive(Debug, Serialize)]
pub struct StepResponse {
    pub success: bool,
    #[serde(flatten)]
    pub result: StepResult,
}

#[derive(Debug, Serialize)]
pub struct ActionsResponse {
    pub success: bool,
    #[serde(flatten)]
    pub catalog: ActionCatalog,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub success: bool,
    pub stats: EpisodeStats,
}

#[derive(Debug, Deserialize)]
pub struct StepRequest {
    #[serde(default)]
    pub action: Option<ActionRequest>,
}

pub fn env_router() -> Router<ServerState> {
    Router::new()
        .route("/reset", post(reset_handler))
        .route("/state", get(state_handler))
        .route("/step", post(step_handler))
        .route("/actions", get(actions_handler))
        .route("/stats", get(stats_handler))
}

pub async fn index() -> impl IntoResponse {
    Json(json!({
        "message": "teamsim environment API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "env": "/env/*",
            "health": "/health",
            "metrics": "/metrics",
            "relay": "/ws",
        },
    }))
}

pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn reset_handler(State(state): State<ServerState>) -> Json<ResetResponse> {
    let observation = state.env.lock().await.reset();
    Json(ResetResponse {
        success: true,
        state: observation,
        message: "Environment reset successfully",
    })
}

async fn state_handler(State(state): State<ServerState>) -> Json<StateResponse> {
    let observation = state.env.lock().await.observe();
    Json(StateResponse {
        success: true,
        state: observation,
    })
}

async fn step_handler(
    State(state): State<ServerState>,
    body: Result<Json<StepRequest>, JsonRejection>,
) -> Result<Json<StepResponse>, ApiError> {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Rejected step body");
            return Err(ApiError::bad_request(INVALID_ACTION_FORMAT));
        }
    };
    let action = match request.action {
        Some(action) if !action.kind.is_empty() => action,
        _ => return Err(ApiError::bad_request(INVALID_ACTION_FORMAT)),
    };

    let result = state.env.lock().await.step(&action);

    if let Some(message) = result.message.clone() {
        let channel_id = message.channel_id.clone();
        state
            .hub
            .broadcast_to_room(&channel_id, ServerMessage::NewMessage { message });
    }

    Ok(Json(StepResponse {
        success: true,
        result,
    }))
}

async fn actions_handler(State(state): State<ServerState>) -> Json<ActionsResponse> {
    let catalog = state.env.lock().await.list_actions();
    Json(ActionsResponse {
        success: true,
        catalog,
    })
}

async fn stats_handler(State(state): State<ServerState>) -> Json<StatsResponse> {
    let stats = state.env.lock().await.stats();
    Json(StatsResponse {
        success: true,
        stats,
    })
}
