mod common;

use common::{TestHarness, CARD};
use seatpay::domain::ports::{PaymentGateway, ProfileStore};
use seatpay::domain::profile::ProfileStatus;
use seatpay::error::PaymentError;

#[tokio::test]
async fn test_first_call_creates_profile_second_reuses_it() {
    let h = TestHarness::with_account("acct-1").await;

    let first = h.service.ensure_customer("acct-1", None).await.unwrap();
    let second = h.service.ensure_customer("acct-1", None).await.unwrap();

    assert_eq!(first.processor_customer_id(), second.processor_customer_id());
    assert_eq!(first.processor_name, "sandbox");
    assert_eq!(first.currency, "inr");
    assert_eq!(first.snapshot.email.as_deref(), Some("acct-1@example.com"));
    assert_eq!(h.gateway.create_customer_calls(), 1);
    assert_eq!(h.profiles.count("acct-1").await, 1);
}

#[tokio::test]
async fn test_vanished_customer_is_replaced_on_the_same_profile() {
    let h = TestHarness::with_account("acct-1").await;
    let original = h.service.ensure_customer("acct-1", None).await.unwrap();
    h.gateway
        .forget_customer(original.processor_customer_id())
        .await;

    let replaced = h.service.ensure_customer("acct-1", None).await.unwrap();

    assert_eq!(replaced.id, original.id);
    assert_ne!(
        replaced.processor_customer_id(),
        original.processor_customer_id()
    );
    assert_eq!(replaced.status, ProfileStatus::Active);
    assert_eq!(h.profiles.count("acct-1").await, 1);

    let stored = h.profiles.latest("acct-1", "sandbox").await.unwrap().unwrap();
    assert_eq!(
        stored.processor_customer_id(),
        replaced.processor_customer_id()
    );
    assert!(
        h.gateway
            .retrieve_customer(replaced.processor_customer_id())
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn test_failed_replacement_leaves_the_profile_untouched() {
    let h = TestHarness::with_account("acct-1").await;
    let original = h.service.ensure_customer("acct-1", None).await.unwrap();
    h.gateway
        .forget_customer(original.processor_customer_id())
        .await;
    h.accounts.remove("acct-1").await;

    let result = h.service.ensure_customer("acct-1", None).await;
    assert!(matches!(result, Err(PaymentError::AccountNotFound(_))));

    let stored = h.profiles.latest("acct-1", "sandbox").await.unwrap().unwrap();
    assert_eq!(
        stored.processor_customer_id(),
        original.processor_customer_id()
    );
    assert_eq!(stored.status, ProfileStatus::Active);
    assert!(stored.previous_customer_ids.is_empty());

    h.register("acct-1").await;
    let replaced = h.service.ensure_customer("acct-1", None).await.unwrap();
    assert_eq!(
        replaced.previous_customer_ids,
        vec![original.processor_customer_id().to_string()]
    );
}

#[tokio::test]
async fn test_payment_method_becomes_default() {
    let h = TestHarness::with_account("acct-1").await;

    let profile = h.service.ensure_customer("acct-1", Some(CARD)).await.unwrap();
    assert_eq!(profile.default_payment_method(), Some(CARD));

    let switched = h
        .service
        .ensure_customer("acct-1", Some("pm_card_mastercard"))
        .await
        .unwrap();
    assert_eq!(switched.default_payment_method(), Some("pm_card_mastercard"));

    let stored = h.profiles.latest("acct-1", "sandbox").await.unwrap().unwrap();
    assert_eq!(stored.default_payment_method(), Some("pm_card_mastercard"));
}

#[tokio::test]
async fn test_unknown_account_is_rejected_before_the_processor() {
    let h = TestHarness::new();

    let result = h.service.ensure_customer("ghost", Some(CARD)).await;

    assert!(matches!(result, Err(PaymentError::AccountNotFound(_))));
    assert_eq!(h.gateway.create_customer_calls(), 0);
}

#[tokio::test]
async fn test_unreachable_processor_leaves_no_profile() {
    let h = TestHarness::with_account("acct-1").await;
    h.gateway.set_unreachable(true);

    let result = h.service.ensure_customer("acct-1", None).await;

    assert!(matches!(result, Err(PaymentError::GatewayError(_))));
    assert_eq!(h.profiles.count("acct-1").await, 0);
}

#[tokio::test]
async fn test_concurrent_callers_share_one_customer() {
    let h = TestHarness::with_account("acct-1").await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = h.service.clone();
            tokio::spawn(async move { service.ensure_customer("acct-1", None).await })
        })
        .collect();

    let mut customer_ids = Vec::new();
    for handle in handles {
        let profile = handle.await.unwrap().unwrap();
        customer_ids.push(profile.processor_customer_id().to_string());
    }

    customer_ids.dedup();
    assert_eq!(customer_ids.len(), 1);
    assert_eq!(h.profiles.count("acct-1").await, 1);
}
