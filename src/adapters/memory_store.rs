//! In-memory implementation of SaccoStore, used by tests and local runs
//! without a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    CallbackRecord, NotificationRecord, ReconciliationStage, RetryUpdate, SavingsRecord,
    StatusUpdate, TransactionRecord, TransactionStatus,
};
use crate::ports::{CallbackCounts, SaccoStore, StoreError, StoreResult};

/// Write operations that can be made to fail on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryOp {
    UpsertCallback,
    SetCallbackStage,
    MarkCallbackProcessed,
    UpdateTransaction,
    UpdateSavings,
    InsertNotification,
}

type DocKey = (String, String);

#[derive(Default)]
struct Collections {
    callbacks: HashMap<String, CallbackRecord>,
    transactions: HashMap<DocKey, TransactionRecord>,
    /// reference -> (user_id, transaction id), in insertion order.
    reference_index: HashMap<String, Vec<DocKey>>,
    savings: Vec<SavingsRecord>,
    notifications: Vec<NotificationRecord>,
}

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<Collections>,
    failing: Mutex<HashSet<MemoryOp>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every subsequent call of `op` returns a write error.
    pub fn fail_on(&self, op: MemoryOp) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(op);
        }
    }

    pub fn recover(&self, op: MemoryOp) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.remove(&op);
        }
    }

    fn check(&self, op: MemoryOp) -> StoreResult<()> {
        let failing = self
            .failing
            .lock()
            .map_err(|e| StoreError::Write(e.to_string()))?;
        if failing.contains(&op) {
            return Err(StoreError::Write(format!("{:?} unavailable", op)));
        }
        Ok(())
    }
}

fn key(user_id: &str, id: &str) -> DocKey {
    (user_id.to_string(), id.to_string())
}

#[async_trait]
impl SaccoStore for MemoryStore {
    async fn upsert_callback(
        &self,
        transaction_id: &str,
        payload: &Map<String, Value>,
        received_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.check(MemoryOp::UpsertCallback)?;
        let mut record = CallbackRecord::received(transaction_id, payload.clone());
        record.received_at = received_at;
        self.collections
            .write()
            .await
            .callbacks
            .insert(transaction_id.to_string(), record);
        Ok(())
    }

    async fn get_callback(&self, transaction_id: &str) -> StoreResult<Option<CallbackRecord>> {
        Ok(self
            .collections
            .read()
            .await
            .callbacks
            .get(transaction_id)
            .cloned())
    }

    async fn set_callback_stage(
        &self,
        transaction_id: &str,
        stage: ReconciliationStage,
    ) -> StoreResult<()> {
        self.check(MemoryOp::SetCallbackStage)?;
        let mut collections = self.collections.write().await;
        let record = collections
            .callbacks
            .get_mut(transaction_id)
            .ok_or_else(|| StoreError::Missing(format!("momo_callbacks/{}", transaction_id)))?;
        record.stage = Some(stage);
        Ok(())
    }

    async fn mark_callback_processed(
        &self,
        transaction_id: &str,
        processed_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.check(MemoryOp::MarkCallbackProcessed)?;
        let mut collections = self.collections.write().await;
        let record = collections
            .callbacks
            .get_mut(transaction_id)
            .ok_or_else(|| StoreError::Missing(format!("momo_callbacks/{}", transaction_id)))?;
        record.processed = true;
        record.processed_at = Some(processed_at);
        record.stage = None;
        Ok(())
    }

    async fn list_unfinished_callbacks(&self) -> StoreResult<Vec<CallbackRecord>> {
        let collections = self.collections.read().await;
        let mut unfinished: Vec<CallbackRecord> = collections
            .callbacks
            .values()
            .filter(|record| !record.processed && record.stage.is_some())
            .cloned()
            .collect();
        unfinished.sort_by_key(|record| record.received_at);
        Ok(unfinished)
    }

    async fn callback_counts(&self) -> StoreResult<CallbackCounts> {
        let collections = self.collections.read().await;
        let total = collections.callbacks.len() as i64;
        let processed = collections
            .callbacks
            .values()
            .filter(|record| record.processed)
            .count() as i64;
        Ok(CallbackCounts { total, processed })
    }

    async fn insert_transaction(&self, tx: &TransactionRecord) -> StoreResult<()> {
        let mut collections = self.collections.write().await;
        let doc_key = key(&tx.user_id, &tx.id);
        if collections.transactions.contains_key(&doc_key) {
            return Err(StoreError::Write(format!(
                "users/{}/transactions/{} already exists",
                tx.user_id, tx.id
            )));
        }
        collections
            .reference_index
            .entry(tx.reference.clone())
            .or_default()
            .push(doc_key.clone());
        collections.transactions.insert(doc_key, tx.clone());
        Ok(())
    }

    async fn get_transaction(
        &self,
        user_id: &str,
        id: &str,
    ) -> StoreResult<Option<TransactionRecord>> {
        Ok(self
            .collections
            .read()
            .await
            .transactions
            .get(&key(user_id, id))
            .cloned())
    }

    async fn find_transactions_by_reference(
        &self,
        reference: &str,
    ) -> StoreResult<Vec<TransactionRecord>> {
        let collections = self.collections.read().await;
        let matches = collections
            .reference_index
            .get(reference)
            .map(|keys| {
                keys.iter()
                    .filter_map(|doc_key| collections.transactions.get(doc_key).cloned())
                    .collect()
            })
            .unwrap_or_default();
        Ok(matches)
    }

    async fn update_transaction_status(
        &self,
        user_id: &str,
        id: &str,
        update: &StatusUpdate,
    ) -> StoreResult<()> {
        self.check(MemoryOp::UpdateTransaction)?;
        let mut collections = self.collections.write().await;
        let tx = collections
            .transactions
            .get_mut(&key(user_id, id))
            .ok_or_else(|| StoreError::Missing(format!("users/{}/transactions/{}", user_id, id)))?;
        update.apply_to(tx);
        Ok(())
    }

    async fn apply_retry(
        &self,
        user_id: &str,
        id: &str,
        update: &RetryUpdate,
    ) -> StoreResult<TransactionRecord> {
        self.check(MemoryOp::UpdateTransaction)?;
        let mut collections = self.collections.write().await;
        let tx = collections
            .transactions
            .get_mut(&key(user_id, id))
            .ok_or_else(|| StoreError::Missing(format!("users/{}/transactions/{}", user_id, id)))?;
        update.apply_to(tx);
        Ok(tx.clone())
    }

    async fn insert_savings(&self, savings: &SavingsRecord) -> StoreResult<()> {
        self.collections.write().await.savings.push(savings.clone());
        Ok(())
    }

    async fn find_savings_by_transaction(
        &self,
        user_id: &str,
        transaction_id: &str,
    ) -> StoreResult<Vec<SavingsRecord>> {
        Ok(self
            .collections
            .read()
            .await
            .savings
            .iter()
            .filter(|s| s.user_id == user_id && s.transaction_id == transaction_id)
            .cloned()
            .collect())
    }

    async fn update_savings_status(
        &self,
        user_id: &str,
        savings_id: &str,
        status: TransactionStatus,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.check(MemoryOp::UpdateSavings)?;
        let mut collections = self.collections.write().await;
        let savings = collections
            .savings
            .iter_mut()
            .find(|s| s.user_id == user_id && s.id == savings_id)
            .ok_or_else(|| {
                StoreError::Missing(format!("users/{}/savings/{}", user_id, savings_id))
            })?;
        savings.status = status;
        savings.updated_at = updated_at;
        Ok(())
    }

    async fn insert_notification(&self, notification: &NotificationRecord) -> StoreResult<Uuid> {
        self.check(MemoryOp::InsertNotification)?;
        self.collections
            .write()
            .await
            .notifications
            .push(notification.clone());
        Ok(notification.id)
    }

    async fn list_notifications(&self, user_id: &str) -> StoreResult<Vec<NotificationRecord>> {
        Ok(self
            .collections
            .read()
            .await
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use serde_json::json;

    fn payload(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_reference_index_spans_users_in_insertion_order() {
        let store = MemoryStore::new();
        let first = TransactionRecord::new("tx-a", "alice", "REF1", BigDecimal::from(10), None, None);
        let second = TransactionRecord::new("tx-b", "bob", "REF1", BigDecimal::from(20), None, None);
        let other = TransactionRecord::new("tx-c", "bob", "REF2", BigDecimal::from(30), None, None);
        store.insert_transaction(&first).await.unwrap();
        store.insert_transaction(&second).await.unwrap();
        store.insert_transaction(&other).await.unwrap();

        let found = store.find_transactions_by_reference("REF1").await.unwrap();
        let owners: Vec<&str> = found.iter().map(|tx| tx.user_id.as_str()).collect();
        assert_eq!(owners, vec!["alice", "bob"]);
        assert!(store
            .find_transactions_by_reference("missing")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_transaction_document_is_rejected() {
        let store = MemoryStore::new();
        let tx = TransactionRecord::new("tx-a", "alice", "REF1", BigDecimal::from(10), None, None);
        store.insert_transaction(&tx).await.unwrap();
        assert!(matches!(
            store.insert_transaction(&tx).await,
            Err(StoreError::Write(_))
        ));
    }

    #[tokio::test]
    async fn test_unfinished_callbacks_exclude_processed_and_unstaged() {
        let store = MemoryStore::new();
        let now = Utc::now();
        for id in ["a", "b", "c"] {
            store
                .upsert_callback(id, &payload(json!({"transactionId": id})), now)
                .await
                .unwrap();
        }
        store
            .set_callback_stage("a", ReconciliationStage::Started)
            .await
            .unwrap();
        store
            .set_callback_stage("b", ReconciliationStage::Notified)
            .await
            .unwrap();
        store.mark_callback_processed("b", now).await.unwrap();

        let unfinished = store.list_unfinished_callbacks().await.unwrap();
        assert_eq!(unfinished.len(), 1);
        assert_eq!(unfinished[0].transaction_id, "a");

        let counts = store.callback_counts().await.unwrap();
        assert_eq!(counts, CallbackCounts { total: 3, processed: 1 });
        assert_eq!(counts.pending(), 2);
    }

    #[tokio::test]
    async fn test_fail_on_injects_write_errors() {
        let store = MemoryStore::new();
        store.fail_on(MemoryOp::UpsertCallback);
        let result = store
            .upsert_callback("a", &Map::new(), Utc::now())
            .await;
        assert!(matches!(result, Err(StoreError::Write(_))));

        store.recover(MemoryOp::UpsertCallback);
        assert!(store.upsert_callback("a", &Map::new(), Utc::now()).await.is_ok());
    }
}
