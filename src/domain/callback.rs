//! Raw provider callbacks and the identifiers extracted from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::validation::ValidationError;

const TRANSACTION_ID_FIELDS: &[&str] = &["transactionId", "externalId"];
const STATUS_FIELDS: &[&str] = &["status", "resultCode"];
const REFERENCE_ID_FIELDS: &[&str] = &["referenceId", "requestId"];

/// Progress marker written to a callback record while it is being reconciled.
///
/// A record with a stage and `processed == false` was interrupted and can be
/// resumed from the step after the recorded one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationStage {
    Started,
    TransactionUpdated,
    SavingsUpdated,
    Notified,
}

impl ReconciliationStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconciliationStage::Started => "started",
            ReconciliationStage::TransactionUpdated => "transaction_updated",
            ReconciliationStage::SavingsUpdated => "savings_updated",
            ReconciliationStage::Notified => "notified",
        }
    }
}

impl fmt::Display for ReconciliationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReconciliationStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "started" => Ok(ReconciliationStage::Started),
            "transaction_updated" => Ok(ReconciliationStage::TransactionUpdated),
            "savings_updated" => Ok(ReconciliationStage::SavingsUpdated),
            "notified" => Ok(ReconciliationStage::Notified),
            other => Err(format!("unknown reconciliation stage: {}", other)),
        }
    }
}

/// A document in `momo_callbacks`, keyed by the provider transaction id.
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackRecord {
    pub transaction_id: String,
    pub payload: Map<String, Value>,
    pub received_at: DateTime<Utc>,
    pub processed: bool,
    pub processed_at: Option<DateTime<Utc>>,
    pub stage: Option<ReconciliationStage>,
}

impl CallbackRecord {
    pub fn received(transaction_id: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            payload,
            received_at: Utc::now(),
            processed: false,
            processed_at: None,
            stage: None,
        }
    }

    pub fn provider_status(&self) -> Option<String> {
        first_present(&self.payload, STATUS_FIELDS)
    }
}

/// Identifiers pulled out of an inbound callback body.
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackEnvelope {
    pub transaction_id: String,
    pub status: Option<String>,
    pub reference_id: Option<String>,
    pub payload: Map<String, Value>,
}

impl CallbackEnvelope {
    /// Fails only when neither `transactionId` nor `externalId` carries a value.
    pub fn from_payload(payload: Map<String, Value>) -> Result<Self, ValidationError> {
        let transaction_id = first_present(&payload, TRANSACTION_ID_FIELDS)
            .ok_or_else(|| ValidationError::new("transactionId", "is missing"))?;

        Ok(Self {
            transaction_id,
            status: first_present(&payload, STATUS_FIELDS),
            reference_id: first_present(&payload, REFERENCE_ID_FIELDS),
            payload,
        })
    }

    pub fn raw(&self) -> Value {
        Value::Object(self.payload.clone())
    }
}

/// First field holding a non-empty string or a number, rendered as a string.
fn first_present(payload: &Map<String, Value>, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|field| match payload.get(*field) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
