use super::gateway::{
    BillingIdentity, ChargeRequest, ChargeResult, CustomerRecord, PaymentMethodDetail,
};
use super::profile::PaymentProfile;
use super::seat::{Batch, BatchName, Seat};
use super::subscription::Subscription;
use super::transaction::Transaction;
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Read-only view of account identities.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn billing_identity(&self, account_id: &str) -> Result<Option<BillingIdentity>>;
}

/// External payment processor.
///
/// Implementations own retry and translation of processor responses. `charge` is attempted
/// exactly once per call.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn name(&self) -> &str;
    async fn create_customer(
        &self,
        identity: &BillingIdentity,
        idempotency_key: &str,
    ) -> Result<CustomerRecord>;
    /// `None` when the processor reports the customer missing or deleted.
    async fn retrieve_customer(&self, customer_id: &str) -> Result<Option<CustomerRecord>>;
    async fn attach_payment_method(
        &self,
        customer_id: &str,
        method_id: &str,
        set_default: bool,
    ) -> Result<PaymentMethodDetail>;
    async fn detach_payment_method(&self, method_id: &str) -> Result<()>;
    async fn list_payment_methods(
        &self,
        customer_id: &str,
        limit: u8,
    ) -> Result<Vec<PaymentMethodDetail>>;
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeResult>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Most recently created profile for the pair, if any.
    async fn latest(
        &self,
        account_id: &str,
        processor_name: &str,
    ) -> Result<Option<PaymentProfile>>;
    /// Inserts unless a profile already exists for the pair; returns whichever is stored.
    async fn create(&self, profile: PaymentProfile) -> Result<PaymentProfile>;
    async fn update(&self, profile: PaymentProfile) -> Result<()>;
}

/// Append-only ledger keyed by processor charge id where one exists.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Appends the entry; a repeated processor charge id returns the entry already stored.
    async fn append(&self, tx: Transaction) -> Result<Transaction>;
    async fn for_account(&self, account_id: &str) -> Result<Vec<Transaction>>;
}

/// Batches, seats and candidates owned by partners.
#[async_trait]
pub trait BatchDirectory: Send + Sync {
    /// Fails with `DuplicateBatchName` when the partner already uses the name.
    async fn create_batch(&self, partner_id: &str, name: &BatchName) -> Result<Batch>;
    async fn get_batch(&self, partner_id: &str, batch_id: &str) -> Result<Option<Batch>>;
    async fn batch_by_name(&self, partner_id: &str, name: &BatchName) -> Result<Option<Batch>>;
    async fn seat_for_batch(&self, partner_id: &str, batch_id: &str) -> Result<Option<Seat>>;
    /// Fails with `SeatAlreadyExists` when the batch already has a seat.
    async fn create_seat(&self, seat: Seat) -> Result<Seat>;
    /// Ids of the batch's unpaid candidates in a stable order; empty for an unknown batch.
    async fn unpaid_candidates(&self, partner_id: &str, batch_id: &str) -> Result<Vec<String>>;
    async fn unpaid_candidate_count(&self, partner_id: &str, batch_id: &str) -> Result<u32> {
        let unpaid = self.unpaid_candidates(partner_id, batch_id).await?;
        Ok(u32::try_from(unpaid.len()).unwrap_or(u32::MAX))
    }
    /// Marks exactly `candidate_ids` as paid by `transaction_id`, all or nothing.
    ///
    /// Candidates already paid by the same transaction count as marked, so a replayed commit
    /// succeeds. Fails with `CandidatesAlreadyPaid` if any of them was paid by another
    /// transaction, and with `NotFound` if any is not enrolled in the batch.
    async fn mark_candidates_paid(
        &self,
        partner_id: &str,
        batch_id: &str,
        candidate_ids: &[String],
        transaction_id: &str,
    ) -> Result<u32>;
}

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn for_account(&self, account_id: &str) -> Result<Vec<Subscription>>;
    async fn create(&self, subscription: Subscription) -> Result<()>;
    async fn cached_balance(&self, account_id: &str) -> Result<u64>;
    async fn set_cached_balance(&self, account_id: &str, seconds: u64) -> Result<()>;
}

#[async_trait]
pub trait PartnerSettings: Send + Sync {
    async fn auto_renew(&self, partner_id: &str) -> Result<bool>;
    async fn set_auto_renew(&self, partner_id: &str, enabled: bool) -> Result<()>;
    async fn mark_setup_complete(&self, partner_id: &str) -> Result<()>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, template_id: &str, recipient: &str, variables: Value) -> Result<()>;
}

pub type SharedAccountDirectory = Arc<dyn AccountDirectory>;
pub type SharedPaymentGateway = Arc<dyn PaymentGateway>;
pub type SharedProfileStore = Arc<dyn ProfileStore>;
pub type SharedTransactionStore = Arc<dyn TransactionStore>;
pub type SharedBatchDirectory = Arc<dyn BatchDirectory>;
pub type SharedSubscriptionStore = Arc<dyn SubscriptionStore>;
pub type SharedPartnerSettings = Arc<dyn PartnerSettings>;
pub type SharedNotifier = Arc<dyn Notifier>;
