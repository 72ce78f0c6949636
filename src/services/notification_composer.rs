//! User-facing wording for payment status changes.

use bigdecimal::BigDecimal;
use chrono::Utc;
use uuid::Uuid;

use crate::domain::{
    NotificationCategory, NotificationData, NotificationRecord, TransactionRecord,
    TransactionStatus,
};

pub const CURRENCY: &str = "UGX";
const DEFAULT_KIND: &str = "payment";
const DEFAULT_METHOD: &str = "Mobile Money";

/// Two decimal places, rounded half up.
pub fn format_amount(amount: &BigDecimal) -> String {
    amount.round(2).with_scale(2).to_string()
}

/// Builds the notification for `user_id`; storing it is left to the caller.
pub fn compose(
    user_id: &str,
    transaction: &TransactionRecord,
    status: TransactionStatus,
    error_message: Option<&str>,
) -> NotificationRecord {
    let kind = transaction.kind.as_deref().unwrap_or(DEFAULT_KIND);
    let method = transaction.method.as_deref().unwrap_or(DEFAULT_METHOD);
    let subject = format!(
        "Your {} of {} {} via {}",
        kind,
        CURRENCY,
        format_amount(&transaction.amount),
        method
    );

    let (title, message) = match status {
        TransactionStatus::Completed => (
            "Payment Successful",
            format!("{} has been completed successfully.", subject),
        ),
        TransactionStatus::Processing => {
            ("Payment Processing", format!("{} is being processed.", subject))
        }
        TransactionStatus::Failed => (
            "Payment Failed",
            format!("{} failed. {}", subject, error_message.unwrap_or_default())
                .trim_end()
                .to_string(),
        ),
        other => ("Payment Update", format!("{} status: {}", subject, other)),
    };

    let category = if status == TransactionStatus::Completed {
        NotificationCategory::Payment
    } else {
        NotificationCategory::General
    };

    NotificationRecord {
        id: Uuid::new_v4(),
        user_id: user_id.to_string(),
        title: title.to_string(),
        message,
        category,
        created_at: Utc::now(),
        is_read: false,
        data: NotificationData {
            transaction_id: transaction.reference.clone(),
            amount: transaction.amount.clone(),
            kind: kind.to_string(),
            status,
        },
    }
}
