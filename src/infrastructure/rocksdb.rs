use crate::domain::ports::{
    BatchDirectory, PartnerSettings, ProfileStore, SubscriptionStore, TransactionStore,
};
use crate::domain::profile::PaymentProfile;
use crate::domain::seat::{Batch, BatchName, Seat};
use crate::domain::subscription::Subscription;
use crate::domain::transaction::Transaction;
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

pub const CF_PROFILES: &str = "profiles";
pub const CF_TRANSACTIONS: &str = "transactions";
/// processor payment id -> transaction key
pub const CF_PAYMENT_IDS: &str = "payment_ids";
pub const CF_BATCHES: &str = "batches";
/// partner + batch name -> batch id
pub const CF_BATCH_NAMES: &str = "batch_names";
pub const CF_SEATS: &str = "seats";
pub const CF_CANDIDATES: &str = "candidates";
pub const CF_SUBSCRIPTIONS: &str = "subscriptions";
pub const CF_BALANCES: &str = "balances";
pub const CF_PARTNER_SETTINGS: &str = "partner_settings";

const COLUMN_FAMILIES: [&str; 10] = [
    CF_PROFILES,
    CF_TRANSACTIONS,
    CF_PAYMENT_IDS,
    CF_BATCHES,
    CF_BATCH_NAMES,
    CF_SEATS,
    CF_CANDIDATES,
    CF_SUBSCRIPTIONS,
    CF_BALANCES,
    CF_PARTNER_SETTINGS,
];

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredCandidate {
    paid_by: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredPartnerFlags {
    auto_renew: bool,
    setup_complete: bool,
}

/// Composite key with a NUL separator so one id can never prefix-match another.
fn key(parts: &[&str]) -> Vec<u8> {
    parts.join("\0").into_bytes()
}

fn prefix(parts: &[&str]) -> Vec<u8> {
    let mut prefix = key(parts);
    prefix.push(0);
    prefix
}

/// Persistent store for every collection the payments service writes.
///
/// Each collection lives in its own column family. Check-then-insert operations that must be
/// unique (profiles, batch names, seats, ledger payment ids) run under one write lock.
///
/// `Clone` shares the underlying `Arc<DB>`.
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDbStore {
    /// Opens or creates the database, creating any missing column families.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect::<Vec<_>>();
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| PaymentError::StoreError(format!("column family '{}' not found", name)))
    }

    fn get_json<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>> {
        match self.db.get_cf(self.cf(cf)?, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(&self, cf: &str, key: &[u8], value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.db.put_cf(self.cf(cf)?, key, bytes)?;
        Ok(())
    }

    /// Stages a JSON value in `batch`; nothing is visible until the batch is written.
    fn stage_json<T: Serialize>(
        &self,
        batch: &mut WriteBatch,
        cf: &str,
        key: &[u8],
        value: &T,
    ) -> Result<()> {
        batch.put_cf(self.cf(cf)?, key, serde_json::to_vec(value)?);
        Ok(())
    }

    /// Every (key, value) whose key starts with `prefix`, in key order.
    fn scan_json<T: DeserializeOwned>(&self, cf: &str, prefix: &[u8]) -> Result<Vec<(Vec<u8>, T)>> {
        let iter = self
            .db
            .iterator_cf(self.cf(cf)?, IteratorMode::From(prefix, Direction::Forward));

        let mut items = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            items.push((key.to_vec(), serde_json::from_slice(&value)?));
        }
        Ok(items)
    }

    fn latest_profile(&self, account_id: &str, processor_name: &str) -> Result<Option<PaymentProfile>> {
        let profiles: Vec<(Vec<u8>, PaymentProfile)> =
            self.scan_json(CF_PROFILES, &prefix(&[account_id, processor_name]))?;
        Ok(profiles
            .into_iter()
            .map(|(_, p)| p)
            .max_by(|a, b| a.created_at.cmp(&b.created_at)))
    }

    /// Enrolls `count` unpaid candidates into a batch and returns their ids.
    pub async fn enroll_candidates(&self, batch_id: &str, count: u32) -> Result<Vec<String>> {
        let _guard = self.write_lock.lock().await;
        let mut write = WriteBatch::default();
        let mut ids = Vec::new();
        for _ in 0..count {
            let candidate_id = Uuid::new_v4().to_string();
            self.stage_json(
                &mut write,
                CF_CANDIDATES,
                &key(&[batch_id, &candidate_id]),
                &StoredCandidate::default(),
            )?;
            ids.push(candidate_id);
        }
        self.db.write(write)?;
        Ok(ids)
    }
}

#[async_trait]
impl ProfileStore for RocksDbStore {
    async fn latest(
        &self,
        account_id: &str,
        processor_name: &str,
    ) -> Result<Option<PaymentProfile>> {
        self.latest_profile(account_id, processor_name)
    }

    async fn create(&self, profile: PaymentProfile) -> Result<PaymentProfile> {
        let _guard = self.write_lock.lock().await;
        if let Some(existing) = self.latest_profile(&profile.account_id, &profile.processor_name)? {
            return Ok(existing);
        }
        self.put_json(
            CF_PROFILES,
            &key(&[&profile.account_id, &profile.processor_name, &profile.id]),
            &profile,
        )?;
        Ok(profile)
    }

    async fn update(&self, profile: PaymentProfile) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let profile_key = key(&[&profile.account_id, &profile.processor_name, &profile.id]);
        if self.db.get_pinned_cf(self.cf(CF_PROFILES)?, &profile_key)?.is_none() {
            return Err(PaymentError::NotFound(format!("payment profile {}", profile.id)));
        }
        self.put_json(CF_PROFILES, &profile_key, &profile)
    }
}

#[async_trait]
impl TransactionStore for RocksDbStore {
    async fn append(&self, tx: Transaction) -> Result<Transaction> {
        let _guard = self.write_lock.lock().await;
        let tx_key = key(&[&tx.account_id, &tx.id]);

        let mut batch = WriteBatch::default();
        if let Some(payment_id) = &tx.processor_payment_id {
            if let Some(existing_key) = self.db.get_cf(self.cf(CF_PAYMENT_IDS)?, payment_id)?
                && let Some(existing) = self.get_json(CF_TRANSACTIONS, &existing_key)?
            {
                return Ok(existing);
            }
            batch.put_cf(self.cf(CF_PAYMENT_IDS)?, payment_id, &tx_key);
        }

        // The index entry and the record land together or not at all.
        self.stage_json(&mut batch, CF_TRANSACTIONS, &tx_key, &tx)?;
        self.db.write(batch)?;
        Ok(tx)
    }

    async fn for_account(&self, account_id: &str) -> Result<Vec<Transaction>> {
        Ok(self
            .scan_json(CF_TRANSACTIONS, &prefix(&[account_id]))?
            .into_iter()
            .map(|(_, tx)| tx)
            .collect())
    }
}

#[async_trait]
impl BatchDirectory for RocksDbStore {
    async fn create_batch(&self, partner_id: &str, name: &BatchName) -> Result<Batch> {
        let _guard = self.write_lock.lock().await;
        let name_key = key(&[partner_id, name.as_str()]);
        if self
            .db
            .get_pinned_cf(self.cf(CF_BATCH_NAMES)?, &name_key)?
            .is_some()
        {
            return Err(PaymentError::DuplicateBatchName(name.as_str().to_string()));
        }

        let batch = Batch::new(partner_id, name.clone());
        let mut write = WriteBatch::default();
        self.stage_json(&mut write, CF_BATCHES, &key(&[partner_id, &batch.id]), &batch)?;
        write.put_cf(self.cf(CF_BATCH_NAMES)?, &name_key, batch.id.as_bytes());
        self.db.write(write)?;
        Ok(batch)
    }

    async fn get_batch(&self, partner_id: &str, batch_id: &str) -> Result<Option<Batch>> {
        self.get_json(CF_BATCHES, &key(&[partner_id, batch_id]))
    }

    async fn batch_by_name(&self, partner_id: &str, name: &BatchName) -> Result<Option<Batch>> {
        let name_key = key(&[partner_id, name.as_str()]);
        match self.db.get_cf(self.cf(CF_BATCH_NAMES)?, &name_key)? {
            Some(batch_id) => {
                let batch_id = String::from_utf8_lossy(&batch_id).into_owned();
                self.get_json(CF_BATCHES, &key(&[partner_id, &batch_id]))
            }
            None => Ok(None),
        }
    }

    async fn seat_for_batch(&self, partner_id: &str, batch_id: &str) -> Result<Option<Seat>> {
        let seat: Option<Seat> = self.get_json(CF_SEATS, batch_id.as_bytes())?;
        Ok(seat.filter(|s| s.partner_id == partner_id))
    }

    async fn create_seat(&self, seat: Seat) -> Result<Seat> {
        let _guard = self.write_lock.lock().await;
        if self
            .db
            .get_pinned_cf(self.cf(CF_SEATS)?, seat.batch_id.as_bytes())?
            .is_some()
        {
            return Err(PaymentError::SeatAlreadyExists(seat.batch_id.clone()));
        }
        self.put_json(CF_SEATS, seat.batch_id.as_bytes(), &seat)?;
        Ok(seat)
    }

    async fn unpaid_candidates(&self, partner_id: &str, batch_id: &str) -> Result<Vec<String>> {
        if self.get_batch(partner_id, batch_id).await?.is_none() {
            return Ok(Vec::new());
        }
        let batch_prefix = prefix(&[batch_id]);
        let candidates: Vec<(Vec<u8>, StoredCandidate)> =
            self.scan_json(CF_CANDIDATES, &batch_prefix)?;
        Ok(candidates
            .into_iter()
            .filter(|(_, c)| c.paid_by.is_none())
            .map(|(k, _)| String::from_utf8_lossy(&k[batch_prefix.len()..]).into_owned())
            .collect())
    }

    async fn mark_candidates_paid(
        &self,
        partner_id: &str,
        batch_id: &str,
        candidate_ids: &[String],
        transaction_id: &str,
    ) -> Result<u32> {
        if self.get_batch(partner_id, batch_id).await?.is_none() {
            return Err(PaymentError::NotFound(format!("batch {}", batch_id)));
        }
        let _guard = self.write_lock.lock().await;

        let mut write = WriteBatch::default();
        for candidate_id in candidate_ids {
            let candidate_key = key(&[batch_id, candidate_id]);
            let mut candidate: StoredCandidate = self
                .get_json(CF_CANDIDATES, &candidate_key)?
                .ok_or_else(|| PaymentError::NotFound(format!("candidate {}", candidate_id)))?;
            match candidate.paid_by.as_deref() {
                Some(paid_by) if paid_by != transaction_id => {
                    return Err(PaymentError::CandidatesAlreadyPaid(batch_id.to_string()));
                }
                _ => {
                    candidate.paid_by = Some(transaction_id.to_string());
                    self.stage_json(&mut write, CF_CANDIDATES, &candidate_key, &candidate)?;
                }
            }
        }
        self.db.write(write)?;
        Ok(u32::try_from(candidate_ids.len()).unwrap_or(u32::MAX))
    }
}

#[async_trait]
impl SubscriptionStore for RocksDbStore {
    async fn for_account(&self, account_id: &str) -> Result<Vec<Subscription>> {
        Ok(self
            .scan_json(CF_SUBSCRIPTIONS, &prefix(&[account_id]))?
            .into_iter()
            .map(|(_, s)| s)
            .collect())
    }

    async fn create(&self, subscription: Subscription) -> Result<()> {
        self.put_json(
            CF_SUBSCRIPTIONS,
            &key(&[&subscription.account_id, &subscription.id]),
            &subscription,
        )
    }

    async fn cached_balance(&self, account_id: &str) -> Result<u64> {
        Ok(self.get_json(CF_BALANCES, account_id.as_bytes())?.unwrap_or(0))
    }

    async fn set_cached_balance(&self, account_id: &str, seconds: u64) -> Result<()> {
        self.put_json(CF_BALANCES, account_id.as_bytes(), &seconds)
    }
}

impl RocksDbStore {
    fn partner_flags(&self, partner_id: &str) -> Result<StoredPartnerFlags> {
        Ok(self
            .get_json(CF_PARTNER_SETTINGS, partner_id.as_bytes())?
            .unwrap_or_default())
    }
}

#[async_trait]
impl PartnerSettings for RocksDbStore {
    async fn auto_renew(&self, partner_id: &str) -> Result<bool> {
        Ok(self.partner_flags(partner_id)?.auto_renew)
    }

    async fn set_auto_renew(&self, partner_id: &str, enabled: bool) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut flags = self.partner_flags(partner_id)?;
        flags.auto_renew = enabled;
        self.put_json(CF_PARTNER_SETTINGS, partner_id.as_bytes(), &flags)
    }

    async fn mark_setup_complete(&self, partner_id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut flags = self.partner_flags(partner_id)?;
        flags.setup_complete = true;
        self.put_json(CF_PARTNER_SETTINGS, partner_id.as_bytes(), &flags)
    }
}
