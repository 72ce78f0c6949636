//! Framework-agnostic records handled by the reconciliation services.

pub mod callback;
pub mod notification;
pub mod savings;
pub mod transaction;

pub use callback::{CallbackEnvelope, CallbackRecord, ReconciliationStage};
pub use notification::{NotificationCategory, NotificationData, NotificationRecord};
pub use savings::SavingsRecord;
pub use transaction::{RetryUpdate, StatusUpdate, TransactionRecord, TransactionStatus};
