//! Transaction domain entity.
//! A user's payment attempt, correlated with provider callbacks through its reference.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Internal transaction lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Retrying,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Processing => "processing",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Retrying => "retrying",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown transaction status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for TransactionStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "processing" => Ok(TransactionStatus::Processing),
            "completed" => Ok(TransactionStatus::Completed),
            "failed" => Ok(TransactionStatus::Failed),
            "retrying" => Ok(TransactionStatus::Retrying),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// A transaction document living in `users/{user_id}/transactions/{id}`.
///
/// `user_id` is the storage partition, it is never rendered to API clients.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub id: String,
    pub user_id: String,
    pub reference: String,
    pub amount: BigDecimal,
    pub kind: Option<String>,
    pub method: Option<String>,
    pub status: TransactionStatus,
    pub error: Option<String>,
    pub retry_count: i32,
    pub phone_number: Option<String>,
    pub momo_callback: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_retry_at: Option<DateTime<Utc>>,
}

impl TransactionRecord {
    /// A fresh `pending` transaction, as written by the deposit initiation flow.
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        reference: impl Into<String>,
        amount: BigDecimal,
        kind: Option<String>,
        method: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            user_id: user_id.into(),
            reference: reference.into(),
            amount,
            kind,
            method,
            status: TransactionStatus::Pending,
            error: None,
            retry_count: 0,
            phone_number: None,
            momo_callback: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            last_retry_at: None,
        }
    }
}

/// Fields overwritten on a transaction when a callback is applied.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub status: TransactionStatus,
    pub error: Option<String>,
    pub momo_callback: serde_json::Value,
    pub updated_at: DateTime<Utc>,
    /// Only `Some` when the new status is `completed`.
    pub completed_at: Option<DateTime<Utc>>,
}

impl StatusUpdate {
    pub fn new(
        status: TransactionStatus,
        error: Option<String>,
        momo_callback: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            status,
            error,
            momo_callback,
            updated_at: now,
            completed_at: (status == TransactionStatus::Completed).then_some(now),
        }
    }

    pub fn apply_to(&self, tx: &mut TransactionRecord) {
        tx.status = self.status;
        tx.error = self.error.clone();
        tx.momo_callback = Some(self.momo_callback.clone());
        tx.updated_at = self.updated_at;
        if self.completed_at.is_some() {
            tx.completed_at = self.completed_at;
        }
    }
}

/// Fields written when a payment retry is requested.
#[derive(Debug, Clone)]
pub struct RetryUpdate {
    pub phone_number: String,
    pub requested_at: DateTime<Utc>,
}

impl RetryUpdate {
    pub fn apply_to(&self, tx: &mut TransactionRecord) {
        tx.status = TransactionStatus::Retrying;
        tx.retry_count += 1;
        tx.phone_number = Some(self.phone_number.clone());
        tx.last_retry_at = Some(self.requested_at);
        tx.updated_at = self.requested_at;
    }
}
