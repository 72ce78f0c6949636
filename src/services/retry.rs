//! Marks a transaction for payment retry.
//!
//! Re-submitting the collection request to the provider is not done here.

use chrono::Utc;
use std::sync::Arc;

use crate::domain::{RetryUpdate, TransactionRecord};
use crate::error::AppError;
use crate::ports::SaccoStore;
use crate::services::transaction_locator::TransactionLocator;
use crate::validation::validate_phone_number;

#[derive(Clone)]
pub struct RetryService {
    store: Arc<dyn SaccoStore>,
    locator: TransactionLocator,
}

impl RetryService {
    pub fn new(store: Arc<dyn SaccoStore>) -> Self {
        Self {
            locator: TransactionLocator::new(store.clone()),
            store,
        }
    }

    pub async fn initiate_retry(
        &self,
        reference: &str,
        phone_number: &str,
    ) -> Result<TransactionRecord, AppError> {
        let phone_number = validate_phone_number(phone_number).map_err(|e| {
            tracing::debug!(reference = %reference, error = %e, "Rejected retry request");
            AppError::from(e)
        })?;

        let tx = self
            .locator
            .find_by_reference(reference)
            .await?
            .ok_or_else(|| AppError::NotFound("Transaction not found".to_string()))?;

        let update = RetryUpdate {
            phone_number,
            requested_at: Utc::now(),
        };
        let updated = self.store.apply_retry(&tx.user_id, &tx.id, &update).await?;

        tracing::info!(
            reference = %reference,
            user_id = %updated.user_id,
            retry_count = updated.retry_count,
            "Payment retry initiated"
        );
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryStore;
    use crate::domain::TransactionStatus;
    use bigdecimal::BigDecimal;

    async fn seeded() -> (Arc<MemoryStore>, RetryService) {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_transaction(&TransactionRecord::new(
                "tx-1", "user-1", "REF123", BigDecimal::from(5000), None, None,
            ))
            .await
            .unwrap();
        (store.clone(), RetryService::new(store))
    }

    #[tokio::test]
    async fn test_empty_phone_number_is_rejected_without_mutation() {
        let (store, service) = seeded().await;

        let err = service.initiate_retry("REF123", "  ").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(ref msg) if msg == "Phone number is required"));

        let tx = store.get_transaction("user-1", "tx-1").await.unwrap().unwrap();
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert_eq!(tx.retry_count, 0);
    }

    #[tokio::test]
    async fn test_overlong_phone_number_has_its_own_message() {
        let (_store, service) = seeded().await;
        let err = service.initiate_retry("REF123", &"7".repeat(33)).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Validation(ref msg) if msg == "Phone number must be at most 32 characters"
        ));
    }

    #[tokio::test]
    async fn test_unknown_reference_is_not_found() {
        let (_store, service) = seeded().await;
        let err = service.initiate_retry("NOPE", "256700000000").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_each_retry_increments_count_by_one() {
        let (store, service) = seeded().await;

        let first = service.initiate_retry("REF123", "256700000001").await.unwrap();
        assert_eq!(first.retry_count, 1);
        let second = service.initiate_retry("REF123", "256700000002").await.unwrap();
        assert_eq!(second.retry_count, 2);

        let tx = store.get_transaction("user-1", "tx-1").await.unwrap().unwrap();
        assert_eq!(tx.status, TransactionStatus::Retrying);
        assert_eq!(tx.retry_count, 2);
        assert_eq!(tx.phone_number.as_deref(), Some("256700000002"));
        assert!(tx.last_retry_at.is_some());
    }
}
