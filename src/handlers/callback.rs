use axum::{
    async_trait,
    extract::{FromRequest, Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::domain::CallbackEnvelope;
use crate::error::AppError;
use crate::services::ReconcileOutcome;
use crate::utils::sanitize::sanitize_json;
use crate::AppState;

/// A callback body, accepted as a JSON object or as a url-encoded form.
#[derive(Debug)]
pub struct CallbackBody(pub Map<String, Value>);

#[async_trait]
impl<S> FromRequest<S> for CallbackBody
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map_or(false, |ct| ct.starts_with("application/x-www-form-urlencoded"));

        if is_form {
            let Form(fields) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|e| invalid_payload(e.body_text()))?;
            return Ok(CallbackBody(
                fields
                    .into_iter()
                    .map(|(key, value)| (key, Value::String(value)))
                    .collect(),
            ));
        }

        let Json(value) = Json::<Value>::from_request(req, state)
            .await
            .map_err(|e| invalid_payload(e.body_text()))?;
        match value {
            Value::Object(map) => Ok(CallbackBody(map)),
            _ => Ok(CallbackBody(Map::new())),
        }
    }
}

fn invalid_payload(reason: String) -> Response {
    tracing::warn!(reason = %reason, "Unreadable MoMo callback body");
    (StatusCode::BAD_REQUEST, "Invalid callback payload").into_response()
}

#[utoipa::path(
    post,
    path = "/momo-callback",
    request_body(content = Object, description = "Provider callback payload"),
    responses(
        (status = 200, description = "Callback received and processed", body = String),
        (status = 400, description = "Missing transactionId", body = String),
        (status = 500, description = "Internal Server Error", body = String)
    ),
    tag = "Callbacks"
)]
pub async fn momo_callback(
    State(state): State<AppState>,
    CallbackBody(payload): CallbackBody,
) -> Response {
    let envelope = match CallbackEnvelope::from_payload(payload) {
        Ok(envelope) => envelope,
        Err(_) => {
            tracing::error!("Missing transactionId in callback");
            return (StatusCode::BAD_REQUEST, "Missing transactionId").into_response();
        }
    };

    tracing::info!(
        transaction_id = %envelope.transaction_id,
        status = ?envelope.status,
        reference_id = ?envelope.reference_id,
        data = %sanitize_json(&envelope.raw()),
        "Received MoMo callback"
    );

    match receive(&state, &envelope).await {
        Ok(outcome) => {
            tracing::info!(
                transaction_id = %envelope.transaction_id,
                matched = !matches!(outcome, ReconcileOutcome::TransactionNotFound),
                "Callback processed successfully"
            );
            (StatusCode::OK, "Callback received and processed").into_response()
        }
        Err(e) => {
            tracing::error!(
                transaction_id = %envelope.transaction_id,
                error = %e,
                "Error processing MoMo callback"
            );
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}

async fn receive(state: &AppState, envelope: &CallbackEnvelope) -> Result<ReconcileOutcome, AppError> {
    state
        .callbacks
        .record_callback(&envelope.transaction_id, &envelope.payload)
        .await?;

    let outcome = state
        .engine
        .reconcile(
            &envelope.transaction_id,
            envelope.status.as_deref(),
            &envelope.raw(),
        )
        .await?;
    Ok(outcome)
}
