//! Persistence of raw provider callbacks and their reconciliation progress.

use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::domain::{CallbackRecord, ReconciliationStage};
use crate::ports::{CallbackCounts, SaccoStore, StoreResult};

#[derive(Clone)]
pub struct CallbackStore {
    store: Arc<dyn SaccoStore>,
}

impl CallbackStore {
    pub fn new(store: Arc<dyn SaccoStore>) -> Self {
        Self { store }
    }

    /// Last write wins: a redelivered callback replaces the stored payload and
    /// resets `processed`, even if the earlier delivery was reconciled.
    pub async fn record_callback(
        &self,
        transaction_id: &str,
        payload: &Map<String, Value>,
    ) -> StoreResult<()> {
        self.store
            .upsert_callback(transaction_id, payload, Utc::now())
            .await?;
        tracing::debug!(transaction_id = %transaction_id, "Callback recorded");
        Ok(())
    }

    pub async fn checkpoint(
        &self,
        transaction_id: &str,
        stage: ReconciliationStage,
    ) -> StoreResult<()> {
        self.store.set_callback_stage(transaction_id, stage).await
    }

    /// Only called once the whole reconciliation pass has succeeded.
    pub async fn mark_processed(&self, transaction_id: &str) -> StoreResult<()> {
        self.store
            .mark_callback_processed(transaction_id, Utc::now())
            .await
    }

    pub async fn get(&self, transaction_id: &str) -> StoreResult<Option<CallbackRecord>> {
        self.store.get_callback(transaction_id).await
    }

    pub async fn unfinished(&self) -> StoreResult<Vec<CallbackRecord>> {
        self.store.list_unfinished_callbacks().await
    }

    pub async fn counts(&self) -> StoreResult<CallbackCounts> {
        self.store.callback_counts().await
    }
}
