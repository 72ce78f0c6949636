//! Savings ledger entry, mirroring the status of the transaction that funded it.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};

use super::transaction::TransactionStatus;

/// A savings document living in `users/{user_id}/savings/{id}`.
#[derive(Debug, Clone, PartialEq)]
pub struct SavingsRecord {
    pub id: String,
    pub user_id: String,
    /// Document id of the originating transaction (not its provider reference).
    pub transaction_id: String,
    pub amount: BigDecimal,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SavingsRecord {
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        transaction_id: impl Into<String>,
        amount: BigDecimal,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            user_id: user_id.into(),
            transaction_id: transaction_id.into(),
            amount,
            status: TransactionStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}
