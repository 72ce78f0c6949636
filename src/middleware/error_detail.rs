use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::config::Environment;
use crate::error::ErrorDetail;

/// In development, rewrites 500 responses produced by `AppError` so the body
/// also carries the raw error text. Production responses pass through untouched.
pub async fn expose_error_detail(
    State(environment): State<Environment>,
    req: Request,
    next: Next,
) -> Response {
    let response = next.run(req).await;
    if !environment.is_development() {
        return response;
    }

    match response.extensions().get::<ErrorDetail>().cloned() {
        Some(ErrorDetail(detail)) => (
            response.status(),
            Json(json!({
                "success": false,
                "message": "Internal server error",
                "error": detail,
            })),
        )
            .into_response(),
        None => response,
    }
}
