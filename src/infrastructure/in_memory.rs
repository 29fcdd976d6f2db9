use crate::domain::gateway::BillingIdentity;
use crate::domain::ports::{
    AccountDirectory, BatchDirectory, Notifier, PartnerSettings, ProfileStore, SubscriptionStore,
    TransactionStore,
};
use crate::domain::profile::PaymentProfile;
use crate::domain::seat::{Batch, BatchName, Seat};
use crate::domain::subscription::Subscription;
use crate::domain::transaction::Transaction;
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Account identities keyed by account id.
#[derive(Default, Clone)]
pub struct InMemoryAccountDirectory {
    identities: Arc<RwLock<HashMap<String, BillingIdentity>>>,
}

impl InMemoryAccountDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, account_id: &str, email: &str, display_name: &str) {
        let mut identities = self.identities.write().await;
        identities.insert(
            account_id.to_string(),
            BillingIdentity {
                email: email.to_string(),
                display_name: display_name.to_string(),
            },
        );
    }

    pub async fn remove(&self, account_id: &str) {
        self.identities.write().await.remove(account_id);
    }
}

#[async_trait]
impl AccountDirectory for InMemoryAccountDirectory {
    async fn billing_identity(&self, account_id: &str) -> Result<Option<BillingIdentity>> {
        let identities = self.identities.read().await;
        Ok(identities.get(account_id).cloned())
    }
}

/// Payment profiles in creation order.
///
/// `create` checks and inserts under one write lock, so concurrent creators for the same
/// (account, processor) pair converge on the first stored profile.
#[derive(Default, Clone)]
pub struct InMemoryProfileStore {
    profiles: Arc<RwLock<Vec<PaymentProfile>>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of profiles recorded for an account across all processors.
    pub async fn count(&self, account_id: &str) -> usize {
        let profiles = self.profiles.read().await;
        profiles.iter().filter(|p| p.account_id == account_id).count()
    }
}

fn latest_profile<'a>(
    profiles: &'a [PaymentProfile],
    account_id: &str,
    processor_name: &str,
) -> Option<&'a PaymentProfile> {
    profiles
        .iter()
        .filter(|p| p.account_id == account_id && p.processor_name == processor_name)
        .max_by(|a, b| a.created_at.cmp(&b.created_at))
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn latest(
        &self,
        account_id: &str,
        processor_name: &str,
    ) -> Result<Option<PaymentProfile>> {
        let profiles = self.profiles.read().await;
        Ok(latest_profile(&profiles, account_id, processor_name).cloned())
    }

    async fn create(&self, profile: PaymentProfile) -> Result<PaymentProfile> {
        let mut profiles = self.profiles.write().await;
        if let Some(existing) =
            latest_profile(&profiles, &profile.account_id, &profile.processor_name)
        {
            return Ok(existing.clone());
        }
        profiles.push(profile.clone());
        Ok(profile)
    }

    async fn update(&self, profile: PaymentProfile) -> Result<()> {
        let mut profiles = self.profiles.write().await;
        let slot = profiles
            .iter_mut()
            .find(|p| p.id == profile.id)
            .ok_or_else(|| PaymentError::NotFound(format!("payment profile {}", profile.id)))?;
        *slot = profile;
        Ok(())
    }
}

/// Append-only ledger.
#[derive(Default, Clone)]
pub struct InMemoryTransactionStore {
    transactions: Arc<RwLock<Vec<Transaction>>>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn append(&self, tx: Transaction) -> Result<Transaction> {
        let mut transactions = self.transactions.write().await;
        if let Some(payment_id) = &tx.processor_payment_id
            && let Some(existing) = transactions
                .iter()
                .find(|t| t.processor_payment_id.as_ref() == Some(payment_id))
        {
            return Ok(existing.clone());
        }
        transactions.push(tx.clone());
        Ok(tx)
    }

    async fn for_account(&self, account_id: &str) -> Result<Vec<Transaction>> {
        let transactions = self.transactions.read().await;
        Ok(transactions
            .iter()
            .filter(|t| t.account_id == account_id)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    id: String,
    batch_id: String,
    paid_by: Option<String>,
}

#[derive(Default)]
struct BatchState {
    batches: HashMap<String, Batch>,
    /// One seat per batch id.
    seats: HashMap<String, Seat>,
    candidates: Vec<Candidate>,
}

/// Batches, seats and candidates under a single lock.
///
/// The name and seat uniqueness checks happen inside the same write section as the insert.
#[derive(Default, Clone)]
pub struct InMemoryBatchDirectory {
    state: Arc<RwLock<BatchState>>,
}

impl InMemoryBatchDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enrolls `count` unpaid candidates into a batch and returns their ids.
    pub async fn enroll_candidates(&self, batch_id: &str, count: u32) -> Vec<String> {
        let mut state = self.state.write().await;
        (0..count)
            .map(|_| {
                let id = Uuid::new_v4().to_string();
                state.candidates.push(Candidate {
                    id: id.clone(),
                    batch_id: batch_id.to_string(),
                    paid_by: None,
                });
                id
            })
            .collect()
    }

    pub async fn batches_for(&self, partner_id: &str) -> Vec<Batch> {
        let state = self.state.read().await;
        state
            .batches
            .values()
            .filter(|b| b.partner_id == partner_id)
            .cloned()
            .collect()
    }

    pub async fn seat_count(&self) -> usize {
        self.state.read().await.seats.len()
    }
}

#[async_trait]
impl BatchDirectory for InMemoryBatchDirectory {
    async fn create_batch(&self, partner_id: &str, name: &BatchName) -> Result<Batch> {
        let mut state = self.state.write().await;
        if state
            .batches
            .values()
            .any(|b| b.partner_id == partner_id && &b.name == name)
        {
            return Err(PaymentError::DuplicateBatchName(name.as_str().to_string()));
        }
        let batch = Batch::new(partner_id, name.clone());
        state.batches.insert(batch.id.clone(), batch.clone());
        Ok(batch)
    }

    async fn get_batch(&self, partner_id: &str, batch_id: &str) -> Result<Option<Batch>> {
        let state = self.state.read().await;
        Ok(state
            .batches
            .get(batch_id)
            .filter(|b| b.partner_id == partner_id)
            .cloned())
    }

    async fn batch_by_name(&self, partner_id: &str, name: &BatchName) -> Result<Option<Batch>> {
        let state = self.state.read().await;
        Ok(state
            .batches
            .values()
            .find(|b| b.partner_id == partner_id && &b.name == name)
            .cloned())
    }

    async fn seat_for_batch(&self, partner_id: &str, batch_id: &str) -> Result<Option<Seat>> {
        let state = self.state.read().await;
        Ok(state
            .seats
            .get(batch_id)
            .filter(|s| s.partner_id == partner_id)
            .cloned())
    }

    async fn create_seat(&self, seat: Seat) -> Result<Seat> {
        let mut state = self.state.write().await;
        if state.seats.contains_key(&seat.batch_id) {
            return Err(PaymentError::SeatAlreadyExists(seat.batch_id.clone()));
        }
        state.seats.insert(seat.batch_id.clone(), seat.clone());
        Ok(seat)
    }

    async fn unpaid_candidates(&self, partner_id: &str, batch_id: &str) -> Result<Vec<String>> {
        let state = self.state.read().await;
        if !state
            .batches
            .get(batch_id)
            .is_some_and(|b| b.partner_id == partner_id)
        {
            return Ok(Vec::new());
        }
        Ok(state
            .candidates
            .iter()
            .filter(|c| c.batch_id == batch_id && c.paid_by.is_none())
            .map(|c| c.id.clone())
            .collect())
    }

    async fn mark_candidates_paid(
        &self,
        partner_id: &str,
        batch_id: &str,
        candidate_ids: &[String],
        transaction_id: &str,
    ) -> Result<u32> {
        let mut state = self.state.write().await;
        if !state
            .batches
            .get(batch_id)
            .is_some_and(|b| b.partner_id == partner_id)
        {
            return Err(PaymentError::NotFound(format!("batch {}", batch_id)));
        }

        let mut positions = Vec::with_capacity(candidate_ids.len());
        for candidate_id in candidate_ids {
            let position = state
                .candidates
                .iter()
                .position(|c| &c.id == candidate_id && c.batch_id == batch_id)
                .ok_or_else(|| PaymentError::NotFound(format!("candidate {}", candidate_id)))?;
            match state.candidates[position].paid_by.as_deref() {
                Some(paid_by) if paid_by != transaction_id => {
                    return Err(PaymentError::CandidatesAlreadyPaid(batch_id.to_string()));
                }
                _ => positions.push(position),
            }
        }

        for position in &positions {
            state.candidates[*position].paid_by = Some(transaction_id.to_string());
        }
        Ok(u32::try_from(positions.len()).unwrap_or(u32::MAX))
    }
}

#[derive(Default, Clone)]
pub struct InMemorySubscriptionStore {
    subscriptions: Arc<RwLock<Vec<Subscription>>>,
    balances: Arc<RwLock<HashMap<String, u64>>>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn for_account(&self, account_id: &str) -> Result<Vec<Subscription>> {
        let subscriptions = self.subscriptions.read().await;
        Ok(subscriptions
            .iter()
            .filter(|s| s.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn create(&self, subscription: Subscription) -> Result<()> {
        self.subscriptions.write().await.push(subscription);
        Ok(())
    }

    async fn cached_balance(&self, account_id: &str) -> Result<u64> {
        let balances = self.balances.read().await;
        Ok(balances.get(account_id).copied().unwrap_or(0))
    }

    async fn set_cached_balance(&self, account_id: &str, seconds: u64) -> Result<()> {
        let mut balances = self.balances.write().await;
        balances.insert(account_id.to_string(), seconds);
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct PartnerFlags {
    auto_renew: bool,
    setup_complete: bool,
}

#[derive(Default, Clone)]
pub struct InMemoryPartnerSettings {
    flags: Arc<RwLock<HashMap<String, PartnerFlags>>>,
}

impl InMemoryPartnerSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_setup_complete(&self, partner_id: &str) -> bool {
        let flags = self.flags.read().await;
        flags.get(partner_id).is_some_and(|f| f.setup_complete)
    }
}

#[async_trait]
impl PartnerSettings for InMemoryPartnerSettings {
    async fn auto_renew(&self, partner_id: &str) -> Result<bool> {
        let flags = self.flags.read().await;
        Ok(flags.get(partner_id).is_some_and(|f| f.auto_renew))
    }

    async fn set_auto_renew(&self, partner_id: &str, enabled: bool) -> Result<()> {
        let mut flags = self.flags.write().await;
        flags.entry(partner_id.to_string()).or_default().auto_renew = enabled;
        Ok(())
    }

    async fn mark_setup_complete(&self, partner_id: &str) -> Result<()> {
        let mut flags = self.flags.write().await;
        flags.entry(partner_id.to_string()).or_default().setup_complete = true;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentNotification {
    pub id: String,
    pub template_id: String,
    pub recipient: String,
    pub variables: Value,
}

/// Records notifications instead of delivering them.
#[derive(Default, Clone)]
pub struct InMemoryNotifier {
    sent: Arc<RwLock<Vec<SentNotification>>>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<SentNotification> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn send(&self, template_id: &str, recipient: &str, variables: Value) -> Result<()> {
        self.sent.write().await.push(SentNotification {
            id: Uuid::new_v4().to_string(),
            template_id: template_id.to_string(),
            recipient: recipient.to_string(),
            variables,
        });
        Ok(())
    }
}
