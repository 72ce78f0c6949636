use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::ports::StoreError;
use crate::services::reconciliation::ReconciliationError;
use crate::validation::ValidationError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store read error: {0}")]
    StoreRead(String),

    #[error("Store write error: {0}")]
    StoreWrite(String),

    #[error(transparent)]
    Reconciliation(#[from] ReconciliationError),
}

/// Raw error text attached to 500 responses, surfaced only in development.
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub String);

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::StoreRead(_)
            | AppError::StoreWrite(_)
            | AppError::Reconciliation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to API clients.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation(msg) | AppError::NotFound(msg) => msg.clone(),
            _ => "Internal server error".to_string(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Read(msg) => AppError::StoreRead(msg),
            StoreError::Write(msg) => AppError::StoreWrite(msg),
            StoreError::Missing(path) => {
                tracing::warn!(path = %path, "Document vanished during request");
                AppError::NotFound("Transaction not found".to_string())
            }
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(e: ValidationError) -> Self {
        AppError::Validation(e.message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = Json(json!({
            "success": false,
            "message": self.public_message(),
        }));

        let mut response = (status, body).into_response();
        if status.is_server_error() {
            response.extensions_mut().insert(ErrorDetail(self.to_string()));
        }
        response
    }
}
