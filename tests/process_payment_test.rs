mod common;

use chrono::{Duration, Utc};
use common::{TestHarness, CARD, DECLINED_CARD};
use seatpay::application::hooks::PLAN_PURCHASE_TEMPLATE;
use seatpay::application::payments::PlanPurchase;
use seatpay::domain::money::Amount;
use seatpay::domain::ports::{SubscriptionStore, TransactionStore};
use seatpay::domain::subscription::SubscriptionKind;
use seatpay::error::PaymentError;

const ACCOUNT: &str = "learner-1";

fn plan(plan_id: &str) -> PlanPurchase {
    PlanPurchase {
        account_id: ACCOUNT.to_string(),
        plan_id: plan_id.to_string(),
        payment_method: CARD.to_string(),
        request_id: None,
    }
}

#[tokio::test]
async fn test_subscription_then_topup_accumulates_seconds() {
    let h = TestHarness::with_account(ACCOUNT).await;

    let base = h
        .service
        .process_payment(plan("monthly-standard"))
        .await
        .unwrap();
    assert_eq!(base.subscription.kind, SubscriptionKind::Subscription);
    assert_eq!(base.transaction.amount, Amount::from_units(499));
    assert_eq!(
        base.subscription.payment_reference.as_deref(),
        Some(base.transaction.id.as_str())
    );
    assert_eq!(
        base.subscription.end_date - base.subscription.start_date,
        Duration::days(30)
    );

    let topup = h.service.process_payment(plan("topup-10min")).await.unwrap();
    assert_eq!(topup.subscription.kind, SubscriptionKind::Topup);
    assert_eq!(topup.subscription.end_date, base.subscription.end_date);

    let entitlement = h
        .service
        .compute_entitlement(ACCOUNT, Utc::now())
        .await
        .unwrap();
    assert!(entitlement.active);
    assert_eq!(entitlement.total_granted_seconds, 2400);
    assert_eq!(
        entitlement.active_subscription.map(|s| s.id),
        Some(base.subscription.id)
    );

    let sent = h.notifier.sent().await;
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|n| n.template_id == PLAN_PURCHASE_TEMPLATE));
}

#[tokio::test]
async fn test_topup_requires_active_subscription() {
    let h = TestHarness::with_account(ACCOUNT).await;

    let result = h.service.process_payment(plan("topup-10min")).await;

    assert!(matches!(result, Err(PaymentError::ValidationError(_))));
    assert_eq!(h.gateway.charge_calls(), 0);
}

#[tokio::test]
async fn test_unknown_plan_rejected() {
    let h = TestHarness::with_account(ACCOUNT).await;

    let result = h.service.process_payment(plan("lifetime-gold")).await;

    assert!(matches!(result, Err(PaymentError::ValidationError(_))));
    assert_eq!(h.gateway.charge_calls(), 0);
}

#[tokio::test]
async fn test_declined_plan_grants_nothing() {
    let h = TestHarness::with_account(ACCOUNT).await;
    let mut purchase = plan("monthly-standard");
    purchase.payment_method = DECLINED_CARD.to_string();

    let result = h.service.process_payment(purchase).await;

    assert!(matches!(result, Err(PaymentError::PaymentDeclined(_))));
    assert!(h.ledger.for_account(ACCOUNT).await.unwrap().is_empty());
    assert!(h.subscriptions.for_account(ACCOUNT).await.unwrap().is_empty());
    let entitlement = h
        .service
        .compute_entitlement(ACCOUNT, Utc::now())
        .await
        .unwrap();
    assert!(!entitlement.active);
}

#[tokio::test]
async fn test_resubmitted_request_id_charges_once() {
    let h = TestHarness::with_account(ACCOUNT).await;
    let mut purchase = plan("monthly-standard");
    purchase.request_id = Some("checkout-42".to_string());

    let first = h.service.process_payment(purchase.clone()).await.unwrap();
    let second = h.service.process_payment(purchase).await.unwrap();

    assert_eq!(first.transaction.id, second.transaction.id);
    assert_eq!(first.subscription.id, second.subscription.id);
    assert_eq!(h.ledger.for_account(ACCOUNT).await.unwrap().len(), 1);
    assert_eq!(h.subscriptions.for_account(ACCOUNT).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_lapsed_subscription_resets_cached_balance() {
    let h = TestHarness::with_account(ACCOUNT).await;
    h.service
        .process_payment(plan("monthly-standard"))
        .await
        .unwrap();
    h.subscriptions
        .set_cached_balance(ACCOUNT, 1800)
        .await
        .unwrap();

    let still_active = h
        .service
        .compute_entitlement(ACCOUNT, Utc::now() + Duration::days(29))
        .await
        .unwrap();
    assert!(still_active.active);
    assert_eq!(h.subscriptions.cached_balance(ACCOUNT).await.unwrap(), 1800);

    let lapsed = h
        .service
        .compute_entitlement(ACCOUNT, Utc::now() + Duration::days(31))
        .await
        .unwrap();
    assert!(!lapsed.active);
    assert_eq!(lapsed.total_granted_seconds, 0);
    assert_eq!(h.subscriptions.cached_balance(ACCOUNT).await.unwrap(), 0);
}

#[tokio::test]
async fn test_history_is_newest_first() {
    let h = TestHarness::with_account(ACCOUNT).await;
    let base = h
        .service
        .process_payment(plan("monthly-standard"))
        .await
        .unwrap();
    let topup = h.service.process_payment(plan("topup-10min")).await.unwrap();

    let history = h.service.payment_history(ACCOUNT).await.unwrap();

    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, topup.transaction.id);
    assert_eq!(history[1].id, base.transaction.id);
    assert!(h.service.payment_history("nobody").await.unwrap().is_empty());
}
