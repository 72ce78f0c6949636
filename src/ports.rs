//! Storage port consumed by the reconciliation services.
//!
//! The store is a document store partitioned per user, with a process-wide
//! `momo_callbacks` collection. Every method is a single-document operation
//! (or a read); nothing here spans documents atomically.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    CallbackRecord, NotificationRecord, ReconciliationStage, RetryUpdate, SavingsRecord,
    StatusUpdate, TransactionRecord, TransactionStatus,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store read failed: {0}")]
    Read(String),

    #[error("store write failed: {0}")]
    Write(String),

    #[error("document not found: {0}")]
    Missing(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallbackCounts {
    pub total: i64,
    pub processed: i64,
}

impl CallbackCounts {
    pub fn pending(&self) -> i64 {
        self.total - self.processed
    }
}

#[async_trait]
pub trait SaccoStore: Send + Sync {
    /// Overwrites the callback document with a freshly received, unprocessed copy.
    async fn upsert_callback(
        &self,
        transaction_id: &str,
        payload: &Map<String, Value>,
        received_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    async fn get_callback(&self, transaction_id: &str) -> StoreResult<Option<CallbackRecord>>;

    async fn set_callback_stage(
        &self,
        transaction_id: &str,
        stage: ReconciliationStage,
    ) -> StoreResult<()>;

    /// Flags the callback processed and clears its reconciliation stage.
    async fn mark_callback_processed(
        &self,
        transaction_id: &str,
        processed_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Unprocessed callbacks that carry a reconciliation stage, oldest first.
    async fn list_unfinished_callbacks(&self) -> StoreResult<Vec<CallbackRecord>>;

    async fn callback_counts(&self) -> StoreResult<CallbackCounts>;

    async fn insert_transaction(&self, tx: &TransactionRecord) -> StoreResult<()>;

    async fn get_transaction(
        &self,
        user_id: &str,
        id: &str,
    ) -> StoreResult<Option<TransactionRecord>>;

    /// All transactions, across users, whose `reference` equals `reference`,
    /// in creation order.
    async fn find_transactions_by_reference(
        &self,
        reference: &str,
    ) -> StoreResult<Vec<TransactionRecord>>;

    async fn update_transaction_status(
        &self,
        user_id: &str,
        id: &str,
        update: &StatusUpdate,
    ) -> StoreResult<()>;

    /// Atomically marks the transaction `retrying` and increments its retry count.
    async fn apply_retry(
        &self,
        user_id: &str,
        id: &str,
        update: &RetryUpdate,
    ) -> StoreResult<TransactionRecord>;

    async fn insert_savings(&self, savings: &SavingsRecord) -> StoreResult<()>;

    /// The user's savings records linked to `transaction_id`, in creation order.
    async fn find_savings_by_transaction(
        &self,
        user_id: &str,
        transaction_id: &str,
    ) -> StoreResult<Vec<SavingsRecord>>;

    async fn update_savings_status(
        &self,
        user_id: &str,
        savings_id: &str,
        status: TransactionStatus,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    async fn insert_notification(&self, notification: &NotificationRecord) -> StoreResult<Uuid>;

    async fn list_notifications(&self, user_id: &str) -> StoreResult<Vec<NotificationRecord>>;

    /// Cheap connectivity probe.
    async fn ping(&self) -> StoreResult<()>;
}
