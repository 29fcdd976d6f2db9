use crate::domain::gateway::CustomerRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum ProfileStatus {
    Active,
    /// The processor no longer resolves the recorded customer.
    Stale,
}

/// Local copy of the processor customer an account is billed through.
///
/// The processor customer id is private: it is set once on creation and only changes through
/// [`PaymentProfile::replace_customer`], when the processor-side customer has vanished.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PaymentProfile {
    pub id: String,
    pub account_id: String,
    pub processor_name: String,
    processor_customer_id: String,
    pub status: ProfileStatus,
    /// Customers the processor stopped resolving, oldest first.
    #[serde(default)]
    pub previous_customer_ids: Vec<String>,
    pub snapshot: CustomerRecord,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentProfile {
    pub fn new(
        account_id: &str,
        processor_name: &str,
        currency: &str,
        customer: CustomerRecord,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            account_id: account_id.to_string(),
            processor_name: processor_name.to_string(),
            processor_customer_id: customer.id.clone(),
            status: ProfileStatus::Active,
            previous_customer_ids: Vec::new(),
            snapshot: customer,
            currency: currency.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn processor_customer_id(&self) -> &str {
        &self.processor_customer_id
    }

    pub fn default_payment_method(&self) -> Option<&str> {
        self.snapshot.default_payment_method.as_deref()
    }

    /// Points the profile at a replacement processor customer.
    pub fn replace_customer(&mut self, customer: CustomerRecord) {
        let stale = std::mem::replace(&mut self.processor_customer_id, customer.id.clone());
        self.previous_customer_ids.push(stale);
        self.snapshot = customer;
        self.status = ProfileStatus::Active;
        self.updated_at = Utc::now();
    }

    /// Refreshes the denormalized snapshot; the customer id itself must not change here.
    pub fn refresh_snapshot(&mut self, customer: CustomerRecord) -> bool {
        if customer.id != self.processor_customer_id || customer == self.snapshot {
            return false;
        }
        self.snapshot = customer;
        self.updated_at = Utc::now();
        true
    }

    pub fn set_default_payment_method(&mut self, method_id: &str) {
        self.snapshot.default_payment_method = Some(method_id.to_string());
        self.updated_at = Utc::now();
    }
}
