use axum::{
    extract::{Path, State},
    Json,
};
use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use utoipa::ToSchema;

use crate::domain::{TransactionRecord, TransactionStatus};
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionView {
    pub id: String,
    #[schema(value_type = String, example = "completed")]
    pub status: TransactionStatus,
    #[schema(value_type = f64, example = 5000)]
    #[serde(serialize_with = "amount_as_number")]
    pub amount: BigDecimal,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub method: Option<String>,
    #[schema(value_type = String)]
    pub date: DateTime<Utc>,
    pub reference: String,
    pub error: Option<String>,
}

/// Amounts go out as JSON numbers: integral amounts as integers, the rest as floats.
fn amount_as_number<S: Serializer>(amount: &BigDecimal, serializer: S) -> Result<S::Ok, S::Error> {
    if *amount == amount.with_scale(0) {
        if let Some(whole) = amount.to_i64() {
            return serializer.serialize_i64(whole);
        }
    }
    match amount.to_f64() {
        Some(value) if value.is_finite() => serializer.serialize_f64(value),
        _ => serializer.serialize_str(&amount.to_string()),
    }
}

impl From<TransactionRecord> for TransactionView {
    fn from(tx: TransactionRecord) -> Self {
        Self {
            id: tx.id,
            status: tx.status,
            amount: tx.amount,
            kind: tx.kind,
            method: tx.method,
            date: tx.created_at,
            reference: tx.reference,
            error: tx.error,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentStatusResponse {
    pub success: bool,
    pub transaction: TransactionView,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RetryRequest {
    /// Accepted as a string or a bare number.
    #[serde(default, deserialize_with = "string_or_number")]
    pub phone_number: Option<String>,
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RetryResponse {
    pub success: bool,
    pub message: String,
    pub transaction_id: String,
}

#[utoipa::path(
    get,
    path = "/payment-status/{transactionId}",
    params(("transactionId" = String, Path, description = "Provider transaction reference")),
    responses(
        (status = 200, description = "Transaction found", body = PaymentStatusResponse),
        (status = 404, description = "Transaction not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Payments"
)]
pub async fn payment_status(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
) -> Result<Json<PaymentStatusResponse>, AppError> {
    let tx = state
        .locator
        .find_by_reference(&transaction_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Transaction not found".to_string()))?;

    Ok(Json(PaymentStatusResponse {
        success: true,
        transaction: tx.into(),
    }))
}

#[utoipa::path(
    post,
    path = "/retry-payment/{transactionId}",
    params(("transactionId" = String, Path, description = "Provider transaction reference")),
    request_body = RetryRequest,
    responses(
        (status = 200, description = "Payment retry initiated", body = RetryResponse),
        (status = 400, description = "Phone number is required"),
        (status = 404, description = "Transaction not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Payments"
)]
pub async fn retry_payment(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
    body: Option<Json<RetryRequest>>,
) -> Result<Json<RetryResponse>, AppError> {
    let phone_number = body
        .and_then(|Json(request)| request.phone_number)
        .unwrap_or_default();

    state
        .retries
        .initiate_retry(&transaction_id, &phone_number)
        .await?;

    Ok(Json(RetryResponse {
        success: true,
        message: "Payment retry initiated".to_string(),
        transaction_id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn view(amount: &str) -> Value {
        let tx = TransactionRecord::new(
            "tx-1",
            "user-1",
            "REF1",
            BigDecimal::from_str(amount).unwrap(),
            None,
            None,
        );
        serde_json::to_value(TransactionView::from(tx)).unwrap()
    }

    #[test]
    fn test_amount_serializes_as_number() {
        assert_eq!(view("5000")["amount"], serde_json::json!(5000));
        assert_eq!(view("5000.00")["amount"], serde_json::json!(5000));
        assert_eq!(view("12.5")["amount"], serde_json::json!(12.5));
    }

    #[test]
    fn test_phone_number_accepts_numbers() {
        let request: RetryRequest =
            serde_json::from_str(r#"{"phoneNumber": 256700123456}"#).unwrap();
        assert_eq!(request.phone_number.as_deref(), Some("256700123456"));

        let request: RetryRequest = serde_json::from_str(r#"{"phoneNumber": null}"#).unwrap();
        assert!(request.phone_number.is_none());

        let request: RetryRequest = serde_json::from_str("{}").unwrap();
        assert!(request.phone_number.is_none());
    }
}
