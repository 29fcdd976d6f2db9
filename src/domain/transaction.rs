use crate::domain::gateway::ChargeResult;
use crate::domain::money::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// In-flight only; never persisted.
    Pending,
    Successful,
    Failed,
}

/// Ledger entry for one charge attempt that reached a terminal outcome.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Transaction {
    pub id: String,
    pub account_id: String,
    /// Seat, batch or plan the charge paid for.
    pub reference: Option<String>,
    pub amount: Amount,
    pub currency: String,
    pub processor_name: String,
    pub processor_customer_id: String,
    pub processor_payment_id: Option<String>,
    pub status: TransactionStatus,
    pub description: String,
    /// Quote breakdown plus the raw processor response.
    pub detail: Value,
    pub created_at: DateTime<Utc>,
}

/// Everything needed to record a charge besides the processor's answer.
#[derive(Debug, Clone)]
pub struct LedgerContext {
    pub account_id: String,
    pub reference: Option<String>,
    pub processor_name: String,
    pub processor_customer_id: String,
    pub description: String,
    pub quote: Value,
}

impl Transaction {
    pub fn successful(
        context: LedgerContext,
        amount: Amount,
        currency: &str,
        result: &ChargeResult,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            account_id: context.account_id,
            reference: context.reference,
            amount,
            currency: currency.to_string(),
            processor_name: context.processor_name,
            processor_customer_id: context.processor_customer_id,
            processor_payment_id: result.processor_payment_id.clone(),
            status: TransactionStatus::Successful,
            description: context.description,
            detail: serde_json::json!({
                "quote": context.quote,
                "processor": result.raw,
            }),
            created_at: Utc::now(),
        }
    }
}
