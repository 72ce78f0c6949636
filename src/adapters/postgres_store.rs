//! Postgres implementation of SaccoStore.
//!
//! User partitions are a `user_id` column; the reference lookup is served by
//! `transactions_reference_idx`. `seq` columns give the store-default order.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{
    CallbackRecord, NotificationCategory, NotificationRecord, ReconciliationStage, RetryUpdate,
    SavingsRecord, StatusUpdate, TransactionRecord, TransactionStatus,
};
use crate::ports::{CallbackCounts, SaccoStore, StoreError, StoreResult};

const TRANSACTION_COLUMNS: &str = "user_id, id, reference, amount, kind, method, status, error, \
     retry_count, phone_number, momo_callback, created_at, updated_at, completed_at, last_retry_at";

/// Postgres-backed document store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn read_err(e: sqlx::Error) -> StoreError {
    StoreError::Read(e.to_string())
}

fn write_err(e: sqlx::Error) -> StoreError {
    StoreError::Write(e.to_string())
}

fn expect_one(rows_affected: u64, path: String) -> StoreResult<()> {
    if rows_affected == 0 {
        return Err(StoreError::Missing(path));
    }
    Ok(())
}

fn parse_status(raw: &str) -> StoreResult<TransactionStatus> {
    raw.parse().map_err(|e| StoreError::Read(format!("{}", e)))
}

#[async_trait]
impl SaccoStore for PostgresStore {
    async fn upsert_callback(
        &self,
        transaction_id: &str,
        payload: &Map<String, Value>,
        received_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO momo_callbacks (
                transaction_id, payload, received_at, processed, processed_at, reconciliation_stage
            ) VALUES ($1, $2, $3, FALSE, NULL, NULL)
            ON CONFLICT (transaction_id) DO UPDATE SET
                payload = EXCLUDED.payload,
                received_at = EXCLUDED.received_at,
                processed = FALSE,
                processed_at = NULL,
                reconciliation_stage = NULL
            "#,
        )
        .bind(transaction_id)
        .bind(Value::Object(payload.clone()))
        .bind(received_at)
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        Ok(())
    }

    async fn get_callback(&self, transaction_id: &str) -> StoreResult<Option<CallbackRecord>> {
        let row = sqlx::query_as::<_, CallbackRow>(
            "SELECT * FROM momo_callbacks WHERE transaction_id = $1",
        )
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(read_err)?;

        row.map(CallbackRow::into_domain).transpose()
    }

    async fn set_callback_stage(
        &self,
        transaction_id: &str,
        stage: ReconciliationStage,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE momo_callbacks SET reconciliation_stage = $2 WHERE transaction_id = $1",
        )
        .bind(transaction_id)
        .bind(stage.as_str())
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        expect_one(result.rows_affected(), format!("momo_callbacks/{}", transaction_id))
    }

    async fn mark_callback_processed(
        &self,
        transaction_id: &str,
        processed_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE momo_callbacks
            SET processed = TRUE, processed_at = $2, reconciliation_stage = NULL
            WHERE transaction_id = $1
            "#,
        )
        .bind(transaction_id)
        .bind(processed_at)
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        expect_one(result.rows_affected(), format!("momo_callbacks/{}", transaction_id))
    }

    async fn list_unfinished_callbacks(&self) -> StoreResult<Vec<CallbackRecord>> {
        let rows = sqlx::query_as::<_, CallbackRow>(
            r#"
            SELECT * FROM momo_callbacks
            WHERE processed = FALSE AND reconciliation_stage IS NOT NULL
            ORDER BY received_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(read_err)?;

        rows.into_iter().map(CallbackRow::into_domain).collect()
    }

    async fn callback_counts(&self) -> StoreResult<CallbackCounts> {
        let (total, processed): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COUNT(*) FILTER (WHERE processed)
            FROM momo_callbacks
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(read_err)?;

        Ok(CallbackCounts { total, processed })
    }

    async fn insert_transaction(&self, tx: &TransactionRecord) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO transactions (
                user_id, id, reference, amount, kind, method, status, error,
                retry_count, phone_number, momo_callback, created_at, updated_at,
                completed_at, last_retry_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(&tx.user_id)
        .bind(&tx.id)
        .bind(&tx.reference)
        .bind(&tx.amount)
        .bind(&tx.kind)
        .bind(&tx.method)
        .bind(tx.status.as_str())
        .bind(&tx.error)
        .bind(tx.retry_count)
        .bind(&tx.phone_number)
        .bind(&tx.momo_callback)
        .bind(tx.created_at)
        .bind(tx.updated_at)
        .bind(tx.completed_at)
        .bind(tx.last_retry_at)
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        Ok(())
    }

    async fn get_transaction(
        &self,
        user_id: &str,
        id: &str,
    ) -> StoreResult<Option<TransactionRecord>> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM transactions WHERE user_id = $1 AND id = $2",
            TRANSACTION_COLUMNS
        ))
        .bind(user_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(read_err)?;

        row.map(TransactionRow::into_domain).transpose()
    }

    async fn find_transactions_by_reference(
        &self,
        reference: &str,
    ) -> StoreResult<Vec<TransactionRecord>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM transactions WHERE reference = $1 ORDER BY seq ASC",
            TRANSACTION_COLUMNS
        ))
        .bind(reference)
        .fetch_all(&self.pool)
        .await
        .map_err(read_err)?;

        rows.into_iter().map(TransactionRow::into_domain).collect()
    }

    async fn update_transaction_status(
        &self,
        user_id: &str,
        id: &str,
        update: &StatusUpdate,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET status = $3,
                error = $4,
                momo_callback = $5,
                updated_at = $6,
                completed_at = COALESCE($7, completed_at)
            WHERE user_id = $1 AND id = $2
            "#,
        )
        .bind(user_id)
        .bind(id)
        .bind(update.status.as_str())
        .bind(&update.error)
        .bind(&update.momo_callback)
        .bind(update.updated_at)
        .bind(update.completed_at)
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        expect_one(
            result.rows_affected(),
            format!("users/{}/transactions/{}", user_id, id),
        )
    }

    async fn apply_retry(
        &self,
        user_id: &str,
        id: &str,
        update: &RetryUpdate,
    ) -> StoreResult<TransactionRecord> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            UPDATE transactions
            SET status = 'retrying',
                retry_count = retry_count + 1,
                phone_number = $3,
                last_retry_at = $4,
                updated_at = $4
            WHERE user_id = $1 AND id = $2
            RETURNING {}
            "#,
            TRANSACTION_COLUMNS
        ))
        .bind(user_id)
        .bind(id)
        .bind(&update.phone_number)
        .bind(update.requested_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(write_err)?;

        row.ok_or_else(|| StoreError::Missing(format!("users/{}/transactions/{}", user_id, id)))?
            .into_domain()
    }

    async fn insert_savings(&self, savings: &SavingsRecord) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO savings (user_id, id, transaction_id, amount, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&savings.user_id)
        .bind(&savings.id)
        .bind(&savings.transaction_id)
        .bind(&savings.amount)
        .bind(savings.status.as_str())
        .bind(savings.created_at)
        .bind(savings.updated_at)
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        Ok(())
    }

    async fn find_savings_by_transaction(
        &self,
        user_id: &str,
        transaction_id: &str,
    ) -> StoreResult<Vec<SavingsRecord>> {
        let rows = sqlx::query_as::<_, SavingsRow>(
            r#"
            SELECT user_id, id, transaction_id, amount, status, created_at, updated_at
            FROM savings
            WHERE user_id = $1 AND transaction_id = $2
            ORDER BY seq ASC
            "#,
        )
        .bind(user_id)
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await
        .map_err(read_err)?;

        rows.into_iter().map(SavingsRow::into_domain).collect()
    }

    async fn update_savings_status(
        &self,
        user_id: &str,
        savings_id: &str,
        status: TransactionStatus,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE savings SET status = $3, updated_at = $4 WHERE user_id = $1 AND id = $2",
        )
        .bind(user_id)
        .bind(savings_id)
        .bind(status.as_str())
        .bind(updated_at)
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        expect_one(
            result.rows_affected(),
            format!("users/{}/savings/{}", user_id, savings_id),
        )
    }

    async fn insert_notification(&self, notification: &NotificationRecord) -> StoreResult<Uuid> {
        let data = serde_json::to_value(&notification.data)
            .map_err(|e| StoreError::Write(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, title, message, category, created_at, is_read, data)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(notification.id)
        .bind(&notification.user_id)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.category.code())
        .bind(notification.created_at)
        .bind(notification.is_read)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        Ok(notification.id)
    }

    async fn list_notifications(&self, user_id: &str) -> StoreResult<Vec<NotificationRecord>> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT id, user_id, title, message, category, created_at, is_read, data
            FROM notifications
            WHERE user_id = $1
            ORDER BY seq ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(read_err)?;

        rows.into_iter().map(NotificationRow::into_domain).collect()
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(read_err)?;
        Ok(())
    }
}

/// Internal row types for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct CallbackRow {
    transaction_id: String,
    payload: Value,
    received_at: DateTime<Utc>,
    processed: bool,
    processed_at: Option<DateTime<Utc>>,
    reconciliation_stage: Option<String>,
}

impl CallbackRow {
    fn into_domain(self) -> StoreResult<CallbackRecord> {
        let payload = match self.payload {
            Value::Object(map) => map,
            other => {
                return Err(StoreError::Read(format!(
                    "callback {} payload is not an object: {}",
                    self.transaction_id, other
                )))
            }
        };
        let stage = self
            .reconciliation_stage
            .map(|raw| raw.parse::<ReconciliationStage>())
            .transpose()
            .map_err(StoreError::Read)?;

        Ok(CallbackRecord {
            transaction_id: self.transaction_id,
            payload,
            received_at: self.received_at,
            processed: self.processed,
            processed_at: self.processed_at,
            stage,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    user_id: String,
    id: String,
    reference: String,
    amount: BigDecimal,
    kind: Option<String>,
    method: Option<String>,
    status: String,
    error: Option<String>,
    retry_count: i32,
    phone_number: Option<String>,
    momo_callback: Option<Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    last_retry_at: Option<DateTime<Utc>>,
}

impl TransactionRow {
    fn into_domain(self) -> StoreResult<TransactionRecord> {
        Ok(TransactionRecord {
            status: parse_status(&self.status)?,
            id: self.id,
            user_id: self.user_id,
            reference: self.reference,
            amount: self.amount,
            kind: self.kind,
            method: self.method,
            error: self.error,
            retry_count: self.retry_count,
            phone_number: self.phone_number,
            momo_callback: self.momo_callback,
            created_at: self.created_at,
            updated_at: self.updated_at,
            completed_at: self.completed_at,
            last_retry_at: self.last_retry_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SavingsRow {
    user_id: String,
    id: String,
    transaction_id: String,
    amount: BigDecimal,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SavingsRow {
    fn into_domain(self) -> StoreResult<SavingsRecord> {
        Ok(SavingsRecord {
            status: parse_status(&self.status)?,
            id: self.id,
            user_id: self.user_id,
            transaction_id: self.transaction_id,
            amount: self.amount,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    user_id: String,
    title: String,
    message: String,
    category: i16,
    created_at: DateTime<Utc>,
    is_read: bool,
    data: Value,
}

impl NotificationRow {
    fn into_domain(self) -> StoreResult<NotificationRecord> {
        Ok(NotificationRecord {
            category: NotificationCategory::try_from(self.category).map_err(StoreError::Read)?,
            data: serde_json::from_value(self.data).map_err(|e| StoreError::Read(e.to_string()))?,
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            message: self.message,
            created_at: self.created_at,
            is_read: self.is_read,
        })
    }
}
