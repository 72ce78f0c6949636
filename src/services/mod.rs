pub mod callback_store;
pub mod notification_composer;
pub mod reconciliation;
pub mod retry;
pub mod status_mapper;
pub mod transaction_locator;

pub use callback_store::CallbackStore;
pub use reconciliation::{ReconcileOutcome, ReconciliationEngine, ReconciliationError};
pub use retry::RetryService;
pub use status_mapper::{map_status, StatusMapping};
pub use transaction_locator::TransactionLocator;
