//! Provider status vocabulary → internal transaction lifecycle.

use serde_json::Value;

use crate::domain::TransactionStatus;

pub const PROCESSING_MESSAGE: &str = "Payment is being processed";
pub const REJECTED_MESSAGE: &str = "Payment was rejected";
pub const TIMEOUT_MESSAGE: &str = "Payment timed out";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMapping {
    pub status: TransactionStatus,
    pub error_message: Option<String>,
}

impl StatusMapping {
    fn new(status: TransactionStatus, error_message: Option<String>) -> Self {
        Self {
            status,
            error_message,
        }
    }
}

/// Maps a provider status (case-sensitive) to the internal status and the
/// message stored on the transaction. Total: unknown or missing statuses fail.
pub fn map_status(provider_status: Option<&str>, payload: &Value) -> StatusMapping {
    match provider_status {
        Some("SUCCESSFUL" | "SUCCESS") => StatusMapping::new(TransactionStatus::Completed, None),
        Some("PENDING" | "INITIATED") => StatusMapping::new(
            TransactionStatus::Processing,
            Some(PROCESSING_MESSAGE.to_string()),
        ),
        Some("FAILED" | "REJECTED" | "CANCELLED") => {
            let message = payload
                .get("message")
                .and_then(Value::as_str)
                .filter(|m| !m.is_empty())
                .unwrap_or(REJECTED_MESSAGE);
            StatusMapping::new(TransactionStatus::Failed, Some(message.to_string()))
        }
        Some("TIMEOUT") => {
            StatusMapping::new(TransactionStatus::Failed, Some(TIMEOUT_MESSAGE.to_string()))
        }
        Some(other) => StatusMapping::new(
            TransactionStatus::Failed,
            Some(format!("Unknown status: {}", other)),
        ),
        None => StatusMapping::new(
            TransactionStatus::Failed,
            Some("Unknown status: <missing>".to_string()),
        ),
    }
}
