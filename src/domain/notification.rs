//! In-app notification documents.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::transaction::TransactionStatus;

/// Category codes understood by the mobile app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i16", try_from = "i16")]
pub enum NotificationCategory {
    Payment,
    General,
}

impl NotificationCategory {
    pub fn code(&self) -> i16 {
        match self {
            NotificationCategory::Payment => 0,
            NotificationCategory::General => 3,
        }
    }
}

impl From<NotificationCategory> for i16 {
    fn from(category: NotificationCategory) -> Self {
        category.code()
    }
}

impl TryFrom<i16> for NotificationCategory {
    type Error = String;

    fn try_from(code: i16) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(NotificationCategory::Payment),
            3 => Ok(NotificationCategory::General),
            other => Err(format!("unsupported notification category {}", other)),
        }
    }
}

/// Transaction context embedded in a payment notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    /// The provider reference of the transaction.
    pub transaction_id: String,
    pub amount: BigDecimal,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: TransactionStatus,
}

/// A document in `users/{user_id}/notifications`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub id: Uuid,
    #[serde(skip)]
    pub user_id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub category: NotificationCategory,
    #[serde(rename = "date")]
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
    pub data: NotificationData,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_serializes_as_code() {
        assert_eq!(
            serde_json::to_value(NotificationCategory::Payment).unwrap(),
            serde_json::json!(0)
        );
        assert_eq!(
            serde_json::to_value(NotificationCategory::General).unwrap(),
            serde_json::json!(3)
        );
        assert!(serde_json::from_value::<NotificationCategory>(serde_json::json!(1)).is_err());
    }
}
