mod common;

use async_trait::async_trait;
use common::{seat_order, TestHarness, CARD, DECLINED_CARD, PARTNER};
use seatpay::application::payments::{BatchTarget, CandidatePayment, PaymentsService, Ports};
use seatpay::config::EngineConfig;
use seatpay::domain::ports::{BatchDirectory, TransactionStore};
use seatpay::domain::seat::{Batch, BatchName, Seat};
use seatpay::error::{PaymentError, Result};
use seatpay::infrastructure::in_memory::{
    InMemoryAccountDirectory, InMemoryBatchDirectory, InMemoryNotifier, InMemoryPartnerSettings,
    InMemoryProfileStore, InMemorySubscriptionStore, InMemoryTransactionStore,
};
use seatpay::infrastructure::sandbox::SandboxGateway;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_batch_name_in_parallel_charges_once() {
    let h = TestHarness::with_account(PARTNER).await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = h.service.clone();
            tokio::spawn(async move { service.purchase_seats(seat_order("Spring", 12, "5")).await })
        })
        .collect();

    let mut succeeded = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(PaymentError::DuplicateBatchName(_)) => duplicates += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(succeeded, 1);
    assert_eq!(duplicates, 7);
    assert_eq!(h.gateway.charge_calls(), 1);
    assert_eq!(h.batches.seat_count().await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_retries_for_one_batch_yield_one_seat_and_one_ledger_entry() {
    let h = TestHarness::with_account(PARTNER).await;
    let mut declined = seat_order("Spring", 12, "5");
    declined.payment_method = DECLINED_CARD.to_string();
    assert!(h.service.purchase_seats(declined).await.is_err());
    let batch_id = h.batches.batches_for(PARTNER).await[0].id.clone();

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let service = h.service.clone();
            let mut retry = seat_order("Spring", 12, "5");
            retry.batch = BatchTarget::Existing(batch_id.clone());
            tokio::spawn(async move { service.purchase_seats(retry).await })
        })
        .collect();

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(PaymentError::SeatAlreadyExists(_)) => {}
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(succeeded, 1);
    assert_eq!(h.batches.seat_count().await, 1);
    // Every retry shares one idempotency key, so the processor replays a single charge.
    assert_eq!(h.ledger.for_account(PARTNER).await.unwrap().len(), 1);
}

/// Batch directory whose seat writes take a while, so callers can give up mid-commit.
struct SlowSeats {
    inner: InMemoryBatchDirectory,
    delay: Duration,
}

#[async_trait]
impl BatchDirectory for SlowSeats {
    async fn create_batch(&self, partner_id: &str, name: &BatchName) -> Result<Batch> {
        self.inner.create_batch(partner_id, name).await
    }

    async fn get_batch(&self, partner_id: &str, batch_id: &str) -> Result<Option<Batch>> {
        self.inner.get_batch(partner_id, batch_id).await
    }

    async fn seat_for_batch(&self, partner_id: &str, batch_id: &str) -> Result<Option<Seat>> {
        self.inner.seat_for_batch(partner_id, batch_id).await
    }

    async fn create_seat(&self, seat: Seat) -> Result<Seat> {
        tokio::time::sleep(self.delay).await;
        self.inner.create_seat(seat).await
    }

    async fn batch_by_name(&self, partner_id: &str, name: &BatchName) -> Result<Option<Batch>> {
        self.inner.batch_by_name(partner_id, name).await
    }

    async fn unpaid_candidates(&self, partner_id: &str, batch_id: &str) -> Result<Vec<String>> {
        self.inner.unpaid_candidates(partner_id, batch_id).await
    }

    async fn mark_candidates_paid(
        &self,
        partner_id: &str,
        batch_id: &str,
        candidate_ids: &[String],
        transaction_id: &str,
    ) -> Result<u32> {
        self.inner
            .mark_candidates_paid(partner_id, batch_id, candidate_ids, transaction_id)
            .await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_purchase_completes_after_caller_gives_up() {
    let accounts = InMemoryAccountDirectory::new();
    accounts.insert(PARTNER, "ops@example.com", "Ops").await;
    let batches = InMemoryBatchDirectory::new();
    let ledger = InMemoryTransactionStore::new();
    let service = PaymentsService::new(
        EngineConfig::default(),
        Ports {
            accounts: Arc::new(accounts),
            gateway: Arc::new(SandboxGateway::new()),
            profiles: Arc::new(InMemoryProfileStore::new()),
            ledger: Arc::new(ledger.clone()),
            batches: Arc::new(SlowSeats {
                inner: batches.clone(),
                delay: Duration::from_millis(300),
            }),
            subscriptions: Arc::new(InMemorySubscriptionStore::new()),
            settings: Arc::new(InMemoryPartnerSettings::new()),
            notifier: Arc::new(InMemoryNotifier::new()),
        },
    );

    let gave_up = tokio::time::timeout(
        Duration::from_millis(100),
        service.purchase_seats(seat_order("Spring", 12, "5")),
    )
    .await;
    assert!(gave_up.is_err());

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(ledger.for_account(PARTNER).await.unwrap().len(), 1);
    assert_eq!(batches.seat_count().await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_candidate_payments_charge_once() {
    let h = TestHarness::with_account(PARTNER).await;
    let batch = h
        .batches
        .create_batch(PARTNER, &BatchName::new("Spring").unwrap())
        .await
        .unwrap();
    h.batches.enroll_candidates(&batch.id, 12).await;

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let service = h.service.clone();
            let payment = CandidatePayment {
                partner_id: PARTNER.to_string(),
                batch_id: batch.id.clone(),
                months: 1,
                payment_method: CARD.to_string(),
            };
            tokio::spawn(async move { service.pay_for_candidates(payment).await })
        })
        .collect();

    let mut transaction_ids = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(receipt) => {
                assert_eq!(receipt.candidates_paid, 12);
                transaction_ids.push(receipt.transaction.id);
            }
            // Arrived after the batch was already settled
            Err(PaymentError::ValidationError(_)) => {}
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert!(!transaction_ids.is_empty());
    transaction_ids.dedup();
    assert_eq!(transaction_ids.len(), 1);
    assert_eq!(h.ledger.for_account(PARTNER).await.unwrap().len(), 1);
    assert_eq!(
        h.batches.unpaid_candidate_count(PARTNER, &batch.id).await.unwrap(),
        0
    );
}

/// Batch directory whose first seat write fails, as if provisioning crashed after the charge.
struct FailFirstSeat {
    inner: InMemoryBatchDirectory,
    failed: std::sync::atomic::AtomicBool,
}

#[async_trait]
impl BatchDirectory for FailFirstSeat {
    async fn create_batch(&self, partner_id: &str, name: &BatchName) -> Result<Batch> {
        self.inner.create_batch(partner_id, name).await
    }

    async fn get_batch(&self, partner_id: &str, batch_id: &str) -> Result<Option<Batch>> {
        self.inner.get_batch(partner_id, batch_id).await
    }

    async fn seat_for_batch(&self, partner_id: &str, batch_id: &str) -> Result<Option<Seat>> {
        self.inner.seat_for_batch(partner_id, batch_id).await
    }

    async fn create_seat(&self, seat: Seat) -> Result<Seat> {
        if !self.failed.swap(true, std::sync::atomic::Ordering::SeqCst) {
            return Err(PaymentError::StoreError("seat write failed".to_string()));
        }
        self.inner.create_seat(seat).await
    }

    async fn batch_by_name(&self, partner_id: &str, name: &BatchName) -> Result<Option<Batch>> {
        self.inner.batch_by_name(partner_id, name).await
    }

    async fn unpaid_candidates(&self, partner_id: &str, batch_id: &str) -> Result<Vec<String>> {
        self.inner.unpaid_candidates(partner_id, batch_id).await
    }

    async fn mark_candidates_paid(
        &self,
        partner_id: &str,
        batch_id: &str,
        candidate_ids: &[String],
        transaction_id: &str,
    ) -> Result<u32> {
        self.inner
            .mark_candidates_paid(partner_id, batch_id, candidate_ids, transaction_id)
            .await
    }
}

fn service_with_failing_seat_write() -> (
    PaymentsService,
    InMemoryBatchDirectory,
    InMemoryTransactionStore,
    InMemoryAccountDirectory,
) {
    let accounts = InMemoryAccountDirectory::new();
    let batches = InMemoryBatchDirectory::new();
    let ledger = InMemoryTransactionStore::new();
    let service = PaymentsService::new(
        EngineConfig::default(),
        Ports {
            accounts: Arc::new(accounts.clone()),
            gateway: Arc::new(SandboxGateway::new()),
            profiles: Arc::new(InMemoryProfileStore::new()),
            ledger: Arc::new(ledger.clone()),
            batches: Arc::new(FailFirstSeat {
                inner: batches.clone(),
                failed: std::sync::atomic::AtomicBool::new(false),
            }),
            subscriptions: Arc::new(InMemorySubscriptionStore::new()),
            settings: Arc::new(InMemoryPartnerSettings::new()),
            notifier: Arc::new(InMemoryNotifier::new()),
        },
    );
    (service, batches, ledger, accounts)
}

#[tokio::test]
async fn test_retry_with_same_order_reuses_the_charge() {
    let (service, batches, ledger, accounts) = service_with_failing_seat_write();
    accounts.insert(PARTNER, "ops@example.com", "Ops").await;

    assert!(service.purchase_seats(seat_order("Spring", 12, "5")).await.is_err());
    let batch_id = batches.batches_for(PARTNER).await[0].id.clone();
    let first_charge = ledger.for_account(PARTNER).await.unwrap()[0].clone();

    let mut retry = seat_order("Spring", 12, "5");
    retry.batch = BatchTarget::Existing(batch_id);
    let receipt = service.purchase_seats(retry).await.unwrap();

    assert_eq!(receipt.transaction.id, first_charge.id);
    assert_eq!(receipt.seat.transaction_id, first_charge.id);
    assert_eq!(ledger.for_account(PARTNER).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_retry_with_bigger_order_pays_for_what_it_gets() {
    let (service, batches, ledger, accounts) = service_with_failing_seat_write();
    accounts.insert(PARTNER, "ops@example.com", "Ops").await;

    assert!(service.purchase_seats(seat_order("Spring", 12, "5")).await.is_err());
    let batch_id = batches.batches_for(PARTNER).await[0].id.clone();
    let first_charge = ledger.for_account(PARTNER).await.unwrap()[0].clone();

    let mut retry = seat_order("Spring", 100, "unlimited");
    retry.batch = BatchTarget::Existing(batch_id);
    let receipt = service.purchase_seats(retry).await.unwrap();

    assert_ne!(receipt.transaction.id, first_charge.id);
    assert_eq!(receipt.transaction.amount, receipt.quote.total_price);
    assert_eq!(receipt.seat.seat_count, 100);
    assert_eq!(receipt.seat.transaction_id, receipt.transaction.id);
    assert_eq!(ledger.for_account(PARTNER).await.unwrap().len(), 2);
}
