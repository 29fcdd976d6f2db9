mod common;

use common::{TestHarness, CARD};
use seatpay::error::PaymentError;

const ACCOUNT: &str = "acct-1";
const SECOND_CARD: &str = "pm_card_mastercard";

async fn harness_with_two_cards() -> TestHarness {
    let h = TestHarness::with_account(ACCOUNT).await;
    h.service.ensure_customer(ACCOUNT, Some(CARD)).await.unwrap();
    h.service
        .ensure_customer(ACCOUNT, Some(SECOND_CARD))
        .await
        .unwrap();
    h.service
        .set_default_payment_method(ACCOUNT, CARD)
        .await
        .unwrap();
    h
}

#[tokio::test]
async fn test_list_flags_the_default() {
    let h = harness_with_two_cards().await;

    let methods = h.service.list_payment_methods(ACCOUNT).await.unwrap();

    assert_eq!(methods.len(), 2);
    let default: Vec<_> = methods.iter().filter(|m| m.is_default).collect();
    assert_eq!(default.len(), 1);
    assert_eq!(default[0].id, CARD);
}

#[tokio::test]
async fn test_set_default_updates_profile() {
    let h = harness_with_two_cards().await;

    let profile = h
        .service
        .set_default_payment_method(ACCOUNT, SECOND_CARD)
        .await
        .unwrap();

    assert_eq!(profile.default_payment_method(), Some(SECOND_CARD));
    let methods = h.service.list_payment_methods(ACCOUNT).await.unwrap();
    assert!(methods.iter().any(|m| m.id == SECOND_CARD && m.is_default));
}

#[tokio::test]
async fn test_default_method_cannot_be_deleted() {
    let h = harness_with_two_cards().await;

    let result = h.service.delete_payment_method(ACCOUNT, CARD).await;

    assert!(matches!(result, Err(PaymentError::ValidationError(_))));
    assert_eq!(h.service.list_payment_methods(ACCOUNT).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_non_default_method_is_detached() {
    let h = harness_with_two_cards().await;

    h.service
        .delete_payment_method(ACCOUNT, SECOND_CARD)
        .await
        .unwrap();

    let methods = h.service.list_payment_methods(ACCOUNT).await.unwrap();
    assert_eq!(methods.len(), 1);
    assert_eq!(methods[0].id, CARD);
}

#[tokio::test]
async fn test_operations_require_a_profile() {
    let h = TestHarness::with_account(ACCOUNT).await;

    assert!(matches!(
        h.service.list_payment_methods(ACCOUNT).await,
        Err(PaymentError::NoPaymentProfile(_))
    ));
    assert!(matches!(
        h.service.set_default_payment_method(ACCOUNT, CARD).await,
        Err(PaymentError::NoPaymentProfile(_))
    ));
    assert!(matches!(
        h.service.delete_payment_method(ACCOUNT, CARD).await,
        Err(PaymentError::NoPaymentProfile(_))
    ));
}
