//! Cross-user lookup of the transaction a callback refers to.

use std::sync::Arc;

use crate::domain::TransactionRecord;
use crate::ports::{SaccoStore, StoreResult};

#[derive(Clone)]
pub struct TransactionLocator {
    store: Arc<dyn SaccoStore>,
}

impl TransactionLocator {
    pub fn new(store: Arc<dyn SaccoStore>) -> Self {
        Self { store }
    }

    /// The transaction whose `reference` equals `reference`, in any user's partition.
    ///
    /// References are unique by contract. If duplicates exist anyway, the first in
    /// store order is returned and the ambiguity is logged; no other tie-break applies.
    pub async fn find_by_reference(&self, reference: &str) -> StoreResult<Option<TransactionRecord>> {
        let mut matches = self.store.find_transactions_by_reference(reference).await?;
        if matches.len() > 1 {
            tracing::warn!(
                reference = %reference,
                matches = matches.len(),
                owners = ?matches.iter().map(|tx| tx.user_id.as_str()).collect::<Vec<_>>(),
                "Multiple transactions share a reference, using the first"
            );
        }
        if matches.is_empty() {
            return Ok(None);
        }
        Ok(Some(matches.swap_remove(0)))
    }
}
