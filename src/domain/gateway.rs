use crate::domain::money::Amount;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identity fields used when creating a processor customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingIdentity {
    pub email: String,
    pub display_name: String,
}

/// Processor-side customer as last observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub default_payment_method: Option<String>,
    #[serde(default)]
    pub raw: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethodDetail {
    pub id: String,
    pub brand: Option<String>,
    pub last4: Option<String>,
    pub exp_month: Option<u32>,
    pub exp_year: Option<u32>,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChargeRequest {
    pub customer_id: String,
    pub payment_method_id: String,
    pub amount: Amount,
    pub currency: String,
    pub description: String,
    pub idempotency_key: String,
}

/// Charge outcome as reported by the processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeStatus {
    Succeeded,
    Failed,
    /// Any non-terminal or unrecognised status; never grants an entitlement.
    Other(String),
}

impl ChargeStatus {
    pub fn from_processor(status: &str) -> Self {
        match status {
            "succeeded" => ChargeStatus::Succeeded,
            "failed" | "canceled" | "requires_payment_method" => ChargeStatus::Failed,
            other => ChargeStatus::Other(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ChargeStatus::Other(_))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ChargeStatus::Succeeded)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeResult {
    pub status: ChargeStatus,
    pub processor_payment_id: Option<String>,
    pub failure_message: Option<String>,
    #[serde(default)]
    pub raw: Value,
}
