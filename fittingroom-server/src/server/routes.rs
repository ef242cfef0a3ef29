//! HTTP routes.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use fittingroom::core::PollResponse;
use fittingroom::designer::{ApparelDesigner, InspireResult};
use fittingroom::errors::{ErrorBody, FittingRoomError};
use fittingroom::orchestrator::{GenerationOrchestrator, Submission, TryOnPayload, TryOnRequest};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<GenerationOrchestrator>,
    pub designer: Arc<ApparelDesigner>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/virtual-try-on", post(virtual_try_on))
        .route("/api/generation-status/{generation_id}", get(generation_status))
        .route("/api/generation/{generation_id}/cancel", post(cancel_generation))
        .route("/api/imagen-inspire", post(imagen_inspire))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// An error rendered as `{error, kind}` JSON.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody {
                error: message.into(),
                kind: "input_error".to_string(),
            },
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            body: ErrorBody {
                error: message.into(),
                kind: "not_found".to_string(),
            },
        }
    }
}

/// Maps a domain error to an HTTP status.
pub fn status_for(err: &FittingRoomError) -> StatusCode {
    match err {
        FittingRoomError::Input(_) => StatusCode::BAD_REQUEST,
        FittingRoomError::Composition(_) | FittingRoomError::Storage(_) | FittingRoomError::Design(_) => {
            StatusCode::BAD_GATEWAY
        }
        FittingRoomError::ServiceShutdown => StatusCode::SERVICE_UNAVAILABLE,
        FittingRoomError::Registry(_) | FittingRoomError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<FittingRoomError> for ApiError {
    fn from(err: FittingRoomError) -> Self {
        let status = status_for(&err);
        if status.is_server_error() {
            tracing::error!(kind = err.kind(), error = %err, "Request failed");
        } else {
            tracing::info!(kind = err.kind(), error = %err, "Request rejected");
        }
        Self {
            status,
            body: ErrorBody::from(&err),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

async fn virtual_try_on(
    State(state): State<AppState>,
    payload: Result<Json<TryOnPayload>, JsonRejection>,
) -> Result<Json<Submission>, ApiError> {
    let Json(payload) = payload?;
    let request = TryOnRequest::try_from(payload).map_err(FittingRoomError::from)?;
    let submission = state.orchestrator.submit(request).await?;
    Ok(Json(submission))
}

async fn generation_status(
    State(state): State<AppState>,
    Path(generation_id): Path<String>,
) -> Json<PollResponse> {
    Json(state.orchestrator.poll(&generation_id))
}

async fn cancel_generation(
    State(state): State<AppState>,
    Path(generation_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if state.orchestrator.cancel(&generation_id) {
        Ok((StatusCode::ACCEPTED, Json(json!({ "status": "cancelling" }))))
    } else {
        Err(ApiError::not_found(format!(
            "No running generation with id '{generation_id}'"
        )))
    }
}

#[derive(Debug, Deserialize)]
struct InspirePayload {
    #[serde(default)]
    prompt: String,
}

async fn imagen_inspire(
    State(state): State<AppState>,
    payload: Result<Json<InspirePayload>, JsonRejection>,
) -> Result<Json<InspireResult>, ApiError> {
    let Json(payload) = payload?;
    let result = state.designer.inspire(&payload.prompt).await?;
    Ok(Json(result))
}

async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    let status = if state.orchestrator.is_shutting_down() {
        "shutting_down"
    } else {
        "ok"
    };
    Json(json!({
        "status": status,
        "inFlight": state.orchestrator.in_flight(),
    }))
}
