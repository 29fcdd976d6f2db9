//! Charge execution and the ledger commit that follows a confirmed charge.

use crate::domain::gateway::{ChargeRequest, ChargeResult};
use crate::domain::ports::{PaymentGateway, SharedTransactionStore};
use crate::domain::transaction::Transaction;
use crate::error::{PaymentError, Result};
use std::future::Future;
use tracing::{error, info, warn};

/// Attempts the charge exactly once.
///
/// Only an explicit `succeeded` from the processor is returned as `Ok`; declines and any
/// non-terminal status become `PaymentDeclined`.
pub async fn execute_charge(
    gateway: &dyn PaymentGateway,
    request: &ChargeRequest,
) -> Result<ChargeResult> {
    let result = gateway.charge(request).await?;

    if result.status.is_success() {
        info!(
            customer_id = %request.customer_id,
            amount = %request.amount,
            currency = %request.currency,
            processor_payment_id = ?result.processor_payment_id,
            "Charge succeeded"
        );
        return Ok(result);
    }

    let reason = result
        .failure_message
        .clone()
        .unwrap_or_else(|| format!("processor reported status {:?}", result.status));
    warn!(
        customer_id = %request.customer_id,
        amount = %request.amount,
        status = ?result.status,
        processor_payment_id = ?result.processor_payment_id,
        "Charge not confirmed; nothing will be provisioned"
    );
    Err(PaymentError::PaymentDeclined(reason))
}

/// Appends the ledger entry for a confirmed charge, then runs `provision` with the stored entry.
///
/// The work runs on its own task, so it completes even if the caller stops waiting; a
/// processor-confirmed charge is never abandoned half way. If provisioning fails the
/// transaction stays on the ledger and its id is logged for reconciliation.
///
/// When the ledger already holds the processor payment (a replayed charge), provisioning only
/// runs if the stored entry charged the same amount and currency as `tx`.
pub async fn commit_charge<T, F, Fut>(
    ledger: SharedTransactionStore,
    tx: Transaction,
    provision: F,
) -> Result<(Transaction, T)>
where
    T: Send + 'static,
    F: FnOnce(Transaction) -> Fut + Send + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    let handle = tokio::spawn(async move {
        let expected_amount = tx.amount;
        let expected_currency = tx.currency.clone();
        let stored = ledger.append(tx).await.inspect_err(|e| {
            error!(error = %e, "Charge succeeded but the ledger entry could not be written");
        })?;

        if stored.amount != expected_amount || stored.currency != expected_currency {
            error!(
                transaction_id = %stored.id,
                processor_payment_id = ?stored.processor_payment_id,
                recorded = %stored.amount,
                expected = %expected_amount,
                "Ledger entry does not match the order; nothing will be provisioned"
            );
            return Err(PaymentError::StoreError(format!(
                "transaction {} recorded {} {} but the order costs {} {}",
                stored.id, stored.amount, stored.currency, expected_amount, expected_currency
            )));
        }

        let transaction_id = stored.id.clone();
        match provision(stored.clone()).await {
            Ok(provisioned) => Ok((stored, provisioned)),
            Err(e) => {
                error!(
                    transaction_id = %transaction_id,
                    processor_payment_id = ?stored.processor_payment_id,
                    error = %e,
                    "Transaction recorded without its entitlement; needs reconciliation"
                );
                Err(e)
            }
        }
    });

    handle
        .await
        .map_err(|e| PaymentError::StoreError(format!("commit task failed: {}", e)))?
}
