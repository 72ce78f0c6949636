pub mod callback;
pub mod payments;

use crate::AppState;
use axum::{extract::State, http::StatusCode, Json};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: String,
    pub service: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CallbackStats {
    pub total_callbacks: i64,
    pub processed_callbacks: i64,
    pub pending_callbacks: i64,
    /// Seconds since the process started.
    pub uptime: f64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatsResponse {
    pub success: bool,
    pub stats: CallbackStats,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up", body = HealthStatus)
    ),
    tag = "Health"
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "OK".to_string(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        service: state.service_name.to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/stats",
    responses(
        (status = 200, description = "Callback counters", body = StatsResponse),
        (status = 500, description = "Internal server error", body = ErrorBody)
    ),
    tag = "Health"
)]
pub async fn stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, AppError> {
    let counts = state.callbacks.counts().await?;

    Ok(Json(StatsResponse {
        success: true,
        stats: CallbackStats {
            total_callbacks: counts.total,
            processed_callbacks: counts.processed,
            pending_callbacks: counts.pending(),
            uptime: state.started_at.elapsed().as_secs_f64(),
        },
    }))
}

pub async fn not_found() -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            success: false,
            message: "Endpoint not found".to_string(),
        }),
    )
}
