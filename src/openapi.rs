//! OpenAPI document for the webhook server, served at `/api-docs/openapi.json`.

use utoipa::OpenApi;

use crate::handlers::payments::{
    PaymentStatusResponse, RetryRequest, RetryResponse, TransactionView,
};
use crate::handlers::{CallbackStats, ErrorBody, HealthStatus, StatsResponse};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Smart SACCO Webhook Server",
        version = "0.1.0",
        description = "Receives MoMo payment callbacks and reconciles them into SACCO transactions, savings and notifications."
    ),
    paths(
        crate::handlers::callback::momo_callback,
        crate::handlers::payments::payment_status,
        crate::handlers::payments::retry_payment,
        crate::handlers::health,
        crate::handlers::stats,
    ),
    components(
        schemas(
            HealthStatus,
            CallbackStats,
            StatsResponse,
            ErrorBody,
            TransactionView,
            PaymentStatusResponse,
            RetryRequest,
            RetryResponse,
        )
    ),
    tags(
        (name = "Callbacks", description = "Provider callback intake"),
        (name = "Payments", description = "Payment status and retries"),
        (name = "Health", description = "Liveness and counters")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();

        for expected in [
            "/momo-callback",
            "/payment-status/{transactionId}",
            "/retry-payment/{transactionId}",
            "/health",
            "/stats",
        ] {
            assert!(
                paths.iter().any(|p| p.as_str() == expected),
                "missing {}",
                expected
            );
        }
    }
}
