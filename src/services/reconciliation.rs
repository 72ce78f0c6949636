//! Callback reconciliation.
//!
//! A pass applies one provider callback to the platform's records, in order:
//! locate the transaction, map the provider status, update the transaction,
//! mirror the status onto the linked savings entry, notify the user, and mark
//! the callback processed. The writes are independent single-document updates;
//! the callback record carries a stage marker after each one so an interrupted
//! pass can be resumed instead of leaving silent partial state.

use chrono::Utc;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::NotificationFailurePolicy;
use crate::domain::{ReconciliationStage, StatusUpdate, TransactionRecord, TransactionStatus};
use crate::ports::{SaccoStore, StoreError};
use crate::services::callback_store::CallbackStore;
use crate::services::notification_composer;
use crate::services::status_mapper::{map_status, StatusMapping};
use crate::services::transaction_locator::TransactionLocator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconciliationStep {
    LoadCallbacks,
    Locate,
    Checkpoint,
    UpdateTransaction,
    UpdateSavings,
    Notify,
    MarkProcessed,
}

impl fmt::Display for ReconciliationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReconciliationStep::LoadCallbacks => "load callbacks",
            ReconciliationStep::Locate => "locate transaction",
            ReconciliationStep::Checkpoint => "checkpoint",
            ReconciliationStep::UpdateTransaction => "update transaction",
            ReconciliationStep::UpdateSavings => "update savings",
            ReconciliationStep::Notify => "notify user",
            ReconciliationStep::MarkProcessed => "mark callback processed",
        };
        f.write_str(name)
    }
}

/// The first failing step of a pass. Steps applied before it stay applied.
#[derive(Debug, Error)]
#[error("reconciliation of {transaction_id} failed at {step}: {source}")]
pub struct ReconciliationError {
    pub transaction_id: String,
    pub step: ReconciliationStep,
    #[source]
    pub source: StoreError,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// No transaction carries the callback's reference; nothing was changed.
    TransactionNotFound,
    Applied {
        user_id: String,
        transaction_id: String,
        status: TransactionStatus,
        savings_updated: bool,
        notification_id: Option<Uuid>,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResumeReport {
    pub resumed: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct ReconciliationEngine {
    store: Arc<dyn SaccoStore>,
    callbacks: CallbackStore,
    locator: TransactionLocator,
    notification_policy: NotificationFailurePolicy,
}

impl ReconciliationEngine {
    pub fn new(store: Arc<dyn SaccoStore>, notification_policy: NotificationFailurePolicy) -> Self {
        Self {
            callbacks: CallbackStore::new(store.clone()),
            locator: TransactionLocator::new(store.clone()),
            store,
            notification_policy,
        }
    }

    /// Applies a freshly recorded callback.
    #[tracing::instrument(skip_all, fields(transaction_id = %transaction_id))]
    pub async fn reconcile(
        &self,
        transaction_id: &str,
        provider_status: Option<&str>,
        payload: &Value,
    ) -> Result<ReconcileOutcome, ReconciliationError> {
        self.run(transaction_id, provider_status, payload, None).await
    }

    /// Replays every unprocessed callback that was interrupted mid-pass,
    /// continuing after its recorded stage.
    pub async fn resume_unfinished(&self) -> Result<ResumeReport, ReconciliationError> {
        let unfinished = self.callbacks.unfinished().await.map_err(|source| {
            ReconciliationError {
                transaction_id: "*".to_string(),
                step: ReconciliationStep::LoadCallbacks,
                source,
            }
        })?;

        let mut report = ResumeReport::default();
        for record in unfinished {
            let payload = Value::Object(record.payload.clone());
            let status = record.provider_status();
            info!(
                transaction_id = %record.transaction_id,
                stage = ?record.stage,
                "Resuming interrupted reconciliation"
            );
            match self
                .run(&record.transaction_id, status.as_deref(), &payload, record.stage)
                .await
            {
                Ok(_) => report.resumed += 1,
                Err(e) => {
                    error!(error = %e, "Resumed reconciliation failed");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    async fn run(
        &self,
        transaction_id: &str,
        provider_status: Option<&str>,
        payload: &Value,
        resume_from: Option<ReconciliationStage>,
    ) -> Result<ReconcileOutcome, ReconciliationError> {
        let fail = |step: ReconciliationStep| {
            move |source: StoreError| ReconciliationError {
                transaction_id: transaction_id.to_string(),
                step,
                source,
            }
        };
        let done = |stage: ReconciliationStage| resume_from.map_or(false, |from| from >= stage);

        let tx = match self
            .locator
            .find_by_reference(transaction_id)
            .await
            .map_err(fail(ReconciliationStep::Locate))?
        {
            Some(tx) => tx,
            None => {
                info!(transaction_id = %transaction_id, "No transaction found for callback");
                return Ok(ReconcileOutcome::TransactionNotFound);
            }
        };

        let StatusMapping {
            status,
            error_message,
        } = map_status(provider_status, payload);

        info!(
            user_id = %tx.user_id,
            transaction_doc = %tx.id,
            current_status = %tx.status,
            provider_status = provider_status.unwrap_or("<missing>"),
            new_status = %status,
            "Found transaction for callback"
        );

        if resume_from.is_none() {
            self.checkpoint(transaction_id, ReconciliationStage::Started)
                .await
                .map_err(fail(ReconciliationStep::Checkpoint))?;
        }

        if !done(ReconciliationStage::TransactionUpdated) {
            let update = StatusUpdate::new(status, error_message.clone(), payload.clone());
            self.store
                .update_transaction_status(&tx.user_id, &tx.id, &update)
                .await
                .map_err(fail(ReconciliationStep::UpdateTransaction))?;
            self.checkpoint(transaction_id, ReconciliationStage::TransactionUpdated)
                .await
                .map_err(fail(ReconciliationStep::Checkpoint))?;
        }

        let mut savings_updated = false;
        if !done(ReconciliationStage::SavingsUpdated) {
            savings_updated = self
                .mirror_savings(&tx, status)
                .await
                .map_err(fail(ReconciliationStep::UpdateSavings))?;
            self.checkpoint(transaction_id, ReconciliationStage::SavingsUpdated)
                .await
                .map_err(fail(ReconciliationStep::Checkpoint))?;
        }

        let mut notification_id = None;
        if !done(ReconciliationStage::Notified) {
            notification_id = self
                .notify(&tx, status, error_message.as_deref())
                .await
                .map_err(fail(ReconciliationStep::Notify))?;
            self.checkpoint(transaction_id, ReconciliationStage::Notified)
                .await
                .map_err(fail(ReconciliationStep::Checkpoint))?;
        }

        self.callbacks
            .mark_processed(transaction_id)
            .await
            .map_err(fail(ReconciliationStep::MarkProcessed))?;

        info!(
            transaction_id = %transaction_id,
            new_status = %status,
            user_id = %tx.user_id,
            "Transaction status updated"
        );

        Ok(ReconcileOutcome::Applied {
            user_id: tx.user_id,
            transaction_id: tx.id,
            status,
            savings_updated,
            notification_id,
        })
    }

    async fn checkpoint(
        &self,
        transaction_id: &str,
        stage: ReconciliationStage,
    ) -> Result<(), StoreError> {
        self.callbacks.checkpoint(transaction_id, stage).await
    }

    /// Only the first linked savings record is updated.
    async fn mirror_savings(
        &self,
        tx: &TransactionRecord,
        status: TransactionStatus,
    ) -> Result<bool, StoreError> {
        let savings = self
            .store
            .find_savings_by_transaction(&tx.user_id, &tx.id)
            .await?;
        let Some(first) = savings.first() else {
            return Ok(false);
        };
        if savings.len() > 1 {
            warn!(
                user_id = %tx.user_id,
                transaction_doc = %tx.id,
                matches = savings.len(),
                "Multiple savings records reference one transaction, updating the first"
            );
        }
        self.store
            .update_savings_status(&tx.user_id, &first.id, status, Utc::now())
            .await?;
        Ok(true)
    }

    async fn notify(
        &self,
        tx: &TransactionRecord,
        status: TransactionStatus,
        error_message: Option<&str>,
    ) -> Result<Option<Uuid>, StoreError> {
        let notification = notification_composer::compose(&tx.user_id, tx, status, error_message);
        match self.store.insert_notification(&notification).await {
            Ok(id) => {
                info!(user_id = %tx.user_id, notification_id = %id, "Notification sent to user");
                Ok(Some(id))
            }
            Err(e) => match self.notification_policy {
                NotificationFailurePolicy::Swallow => {
                    error!(user_id = %tx.user_id, error = %e, "Error sending notification");
                    Ok(None)
                }
                NotificationFailurePolicy::Block => Err(e),
            },
        }
    }
}
