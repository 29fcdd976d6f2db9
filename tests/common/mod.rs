#![allow(dead_code)]

use seatpay::application::payments::{BatchTarget, PaymentsService, Ports, SeatPurchase};
use seatpay::config::EngineConfig;
use seatpay::infrastructure::in_memory::{
    InMemoryAccountDirectory, InMemoryBatchDirectory, InMemoryNotifier, InMemoryPartnerSettings,
    InMemoryProfileStore, InMemorySubscriptionStore, InMemoryTransactionStore,
};
use seatpay::infrastructure::sandbox::SandboxGateway;
use std::sync::{Arc, Once};

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("warn,seatpay=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub const PARTNER: &str = "partner-1";
pub const CARD: &str = "pm_card_visa";
pub const DECLINED_CARD: &str = "pm_decline_insufficient_funds";

/// A payments service wired to in-memory stores and the sandbox processor.
///
/// Every adapter is kept so tests can inspect side effects directly.
pub struct TestHarness {
    pub accounts: InMemoryAccountDirectory,
    pub gateway: SandboxGateway,
    pub profiles: InMemoryProfileStore,
    pub ledger: InMemoryTransactionStore,
    pub batches: InMemoryBatchDirectory,
    pub subscriptions: InMemorySubscriptionStore,
    pub settings: InMemoryPartnerSettings,
    pub notifier: InMemoryNotifier,
    pub service: Arc<PaymentsService>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        init_tracing();
        let accounts = InMemoryAccountDirectory::new();
        let gateway = SandboxGateway::new();
        let profiles = InMemoryProfileStore::new();
        let ledger = InMemoryTransactionStore::new();
        let batches = InMemoryBatchDirectory::new();
        let subscriptions = InMemorySubscriptionStore::new();
        let settings = InMemoryPartnerSettings::new();
        let notifier = InMemoryNotifier::new();

        let service = PaymentsService::new(
            config,
            Ports {
                accounts: Arc::new(accounts.clone()),
                gateway: Arc::new(gateway.clone()),
                profiles: Arc::new(profiles.clone()),
                ledger: Arc::new(ledger.clone()),
                batches: Arc::new(batches.clone()),
                subscriptions: Arc::new(subscriptions.clone()),
                settings: Arc::new(settings.clone()),
                notifier: Arc::new(notifier.clone()),
            },
        );

        Self {
            accounts,
            gateway,
            profiles,
            ledger,
            batches,
            subscriptions,
            settings,
            notifier,
            service: Arc::new(service),
        }
    }

    /// Harness with `account_id` already known to the account directory.
    pub async fn with_account(account_id: &str) -> Self {
        let harness = Self::new();
        harness.register(account_id).await;
        harness
    }

    pub async fn register(&self, account_id: &str) {
        self.accounts
            .insert(account_id, &format!("{}@example.com", account_id), account_id)
            .await;
    }
}

pub fn seat_order(batch_name: &str, seat_count: u32, sessions_per_day: &str) -> SeatPurchase {
    SeatPurchase {
        partner_id: PARTNER.to_string(),
        batch: BatchTarget::New(batch_name.to_string()),
        seat_count,
        sessions_per_day: sessions_per_day.to_string(),
        months: 1,
        payment_method: CARD.to_string(),
        auto_renew: None,
        request_id: None,
    }
}
