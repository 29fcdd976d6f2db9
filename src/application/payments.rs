use crate::application::charge::{commit_charge, execute_charge};
use crate::application::hooks::{
    run_post_commit, PostCommit, CANDIDATE_PAYMENT_TEMPLATE, PLAN_PURCHASE_TEMPLATE,
    SEAT_PURCHASE_TEMPLATE,
};
use crate::config::EngineConfig;
use crate::domain::entitlement::{compute_entitlement, Entitlement};
use crate::domain::gateway::{BillingIdentity, ChargeRequest, PaymentMethodDetail};
use crate::domain::ports::{
    SharedAccountDirectory, SharedBatchDirectory, SharedNotifier, SharedPartnerSettings,
    SharedPaymentGateway, SharedProfileStore, SharedSubscriptionStore, SharedTransactionStore,
};
use crate::domain::pricing::{DurationMonths, PricingEngine, PricingQuote, SessionsPerDay};
use crate::domain::profile::PaymentProfile;
use crate::domain::seat::{Batch, BatchName, Seat, SeatGrant};
use crate::domain::subscription::{Subscription, SubscriptionKind};
use crate::domain::transaction::{LedgerContext, Transaction};
use crate::error::{PaymentError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

/// Collaborators the payments service is wired to.
#[derive(Clone)]
pub struct Ports {
    pub accounts: SharedAccountDirectory,
    pub gateway: SharedPaymentGateway,
    pub profiles: SharedProfileStore,
    pub ledger: SharedTransactionStore,
    pub batches: SharedBatchDirectory,
    pub subscriptions: SharedSubscriptionStore,
    pub settings: SharedPartnerSettings,
    pub notifier: SharedNotifier,
}

/// Which batch a seat purchase is for.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchTarget {
    /// Create a new batch with this name.
    New(String),
    /// Buy the seat for a batch the partner already owns.
    Existing(String),
}

#[derive(Debug, Clone)]
pub struct SeatPurchase {
    pub partner_id: String,
    pub batch: BatchTarget,
    pub seat_count: u32,
    pub sessions_per_day: String,
    pub months: u32,
    pub payment_method: String,
    pub auto_renew: Option<bool>,
    /// Caller-chosen attempt key. Concurrent retries of one order share the default key;
    /// a fresh value is needed to retry after a decline, which the processor would replay.
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeatPurchaseReceipt {
    pub batch: Batch,
    pub seat: Seat,
    pub transaction: Transaction,
    pub quote: PricingQuote,
}

#[derive(Debug, Clone)]
pub struct PlanPurchase {
    pub account_id: String,
    pub plan_id: String,
    pub payment_method: String,
    /// Caller-chosen key; resubmitting the same key never charges twice.
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanPurchaseReceipt {
    pub transaction: Transaction,
    pub subscription: Subscription,
}

#[derive(Debug, Clone)]
pub struct CandidatePayment {
    pub partner_id: String,
    pub batch_id: String,
    pub months: u32,
    pub payment_method: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidatePaymentReceipt {
    pub transaction: Transaction,
    pub candidates_paid: u32,
    pub quote: PricingQuote,
}

struct ValidatedSeatOrder {
    seat_count: u32,
    sessions_per_day: SessionsPerDay,
    months: DurationMonths,
}

/// Orchestrates customer reconciliation, pricing, charging and provisioning.
///
/// This is the only component that writes seats, subscriptions and ledger entries.
pub struct PaymentsService {
    config: EngineConfig,
    pricing: PricingEngine,
    ports: Ports,
}

impl PaymentsService {
    pub fn new(config: EngineConfig, ports: Ports) -> Self {
        let pricing = PricingEngine::new(config.pricing.clone());
        Self {
            config,
            pricing,
            ports,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn processor_name(&self) -> &str {
        self.ports.gateway.name()
    }

    /// Returns the account's processor customer, creating or replacing it when needed.
    ///
    /// When `payment_method` differs from the recorded default it is attached and made default.
    pub async fn ensure_customer(
        &self,
        account_id: &str,
        payment_method: Option<&str>,
    ) -> Result<PaymentProfile> {
        let processor = self.processor_name().to_string();
        let existing = self.ports.profiles.latest(account_id, &processor).await?;

        let mut profile = match existing {
            None => self.create_profile(account_id, &processor).await?,
            Some(profile) => self.reconcile_profile(profile).await?,
        };

        if let Some(method) = payment_method
            && profile.default_payment_method() != Some(method)
        {
            self.ports
                .gateway
                .attach_payment_method(profile.processor_customer_id(), method, true)
                .await?;
            profile.set_default_payment_method(method);
            self.ports.profiles.update(profile.clone()).await?;
            info!(account_id, payment_method = method, "Default payment method updated");
        }

        Ok(profile)
    }

    async fn create_profile(&self, account_id: &str, processor: &str) -> Result<PaymentProfile> {
        let identity = self.billing_identity(account_id).await?;
        let idempotency_key = format!("{}-customer-{}", processor, account_id);
        let customer = self
            .ports
            .gateway
            .create_customer(&identity, &idempotency_key)
            .await?;
        let created_id = customer.id.clone();

        let profile = PaymentProfile::new(account_id, processor, &self.config.currency, customer);
        let stored = self.ports.profiles.create(profile).await?;

        if stored.processor_customer_id() != created_id {
            warn!(
                account_id,
                kept = stored.processor_customer_id(),
                discarded = %created_id,
                "Concurrent profile creation detected; keeping the stored profile"
            );
        } else {
            info!(account_id, customer_id = %created_id, "Payment profile created");
        }
        Ok(stored)
    }

    async fn reconcile_profile(&self, mut profile: PaymentProfile) -> Result<PaymentProfile> {
        let customer = self
            .ports
            .gateway
            .retrieve_customer(profile.processor_customer_id())
            .await?;

        match customer {
            Some(customer) => {
                if profile.refresh_snapshot(customer) {
                    self.ports.profiles.update(profile.clone()).await?;
                }
                Ok(profile)
            }
            None => {
                let stale_id = profile.processor_customer_id().to_string();
                warn!(
                    account_id = %profile.account_id,
                    customer_id = %stale_id,
                    "Processor no longer resolves the customer; replacing it"
                );

                // Nothing is written until the replacement customer exists.
                let identity = self.billing_identity(&profile.account_id).await?;
                let idempotency_key = format!(
                    "{}-customer-{}-replaces-{}",
                    profile.processor_name, profile.account_id, stale_id
                );
                let replacement = self
                    .ports
                    .gateway
                    .create_customer(&identity, &idempotency_key)
                    .await?;
                profile.replace_customer(replacement);
                self.ports.profiles.update(profile.clone()).await?;
                info!(
                    account_id = %profile.account_id,
                    customer_id = profile.processor_customer_id(),
                    "Processor customer replaced"
                );
                Ok(profile)
            }
        }
    }

    async fn billing_identity(&self, account_id: &str) -> Result<BillingIdentity> {
        self.ports
            .accounts
            .billing_identity(account_id)
            .await?
            .ok_or_else(|| PaymentError::AccountNotFound(account_id.to_string()))
    }

    async fn require_profile(&self, account_id: &str) -> Result<PaymentProfile> {
        self.ports
            .profiles
            .latest(account_id, self.processor_name())
            .await?
            .ok_or_else(|| PaymentError::NoPaymentProfile(account_id.to_string()))
    }

    fn validate_seat_order(
        &self,
        seat_count: u32,
        sessions_per_day: &str,
        months: u32,
    ) -> Result<ValidatedSeatOrder> {
        if seat_count < self.config.min_seat_count {
            return Err(PaymentError::ValidationError(format!(
                "at least {} seats must be purchased, got {}",
                self.config.min_seat_count, seat_count
            )));
        }
        Ok(ValidatedSeatOrder {
            seat_count,
            sessions_per_day: sessions_per_day.parse()?,
            months: DurationMonths::try_from(months)?,
        })
    }

    /// Preview of what `purchase_seats` would charge for the same inputs.
    pub fn quote_seats(
        &self,
        seat_count: u32,
        sessions_per_day: &str,
        months: u32,
    ) -> Result<PricingQuote> {
        let order = self.validate_seat_order(seat_count, sessions_per_day, months)?;
        self.pricing
            .quote_seats(order.seat_count, order.sessions_per_day, order.months)
    }

    /// Buys one seat allocation for a batch.
    ///
    /// Steps run strictly in order and stop at the first failure: validate, create or load
    /// the batch, check for an existing seat, price, ensure the customer, charge, then record
    /// the transaction before creating the seat.
    pub async fn purchase_seats(&self, order: SeatPurchase) -> Result<SeatPurchaseReceipt> {
        let validated =
            self.validate_seat_order(order.seat_count, &order.sessions_per_day, order.months)?;
        let partner_id = order.partner_id.as_str();

        let batch = match &order.batch {
            BatchTarget::New(name) => {
                let name = BatchName::new(name)?;
                self.ports.batches.create_batch(partner_id, &name).await?
            }
            BatchTarget::Existing(batch_id) => self
                .ports
                .batches
                .get_batch(partner_id, batch_id)
                .await?
                .ok_or_else(|| PaymentError::NotFound(format!("batch {}", batch_id)))?,
        };

        if self
            .ports
            .batches
            .seat_for_batch(partner_id, &batch.id)
            .await?
            .is_some()
        {
            return Err(PaymentError::SeatAlreadyExists(batch.id.clone()));
        }

        let quote = self.pricing.quote_seats(
            validated.seat_count,
            validated.sessions_per_day,
            validated.months,
        )?;

        let profile = self
            .ensure_customer(partner_id, Some(&order.payment_method))
            .await?;

        let description = format!(
            "{} seats x {} sessions/day for {} month(s), batch '{}'",
            validated.seat_count,
            validated.sessions_per_day,
            validated.months.months(),
            batch.name.as_str()
        );
        let request = ChargeRequest {
            customer_id: profile.processor_customer_id().to_string(),
            payment_method_id: order.payment_method.clone(),
            amount: quote.total_price,
            currency: self.config.currency.clone(),
            description: description.clone(),
            idempotency_key: seat_charge_key(&batch.id, &order, &validated, &quote),
        };
        let result = execute_charge(self.ports.gateway.as_ref(), &request).await?;

        let tx = Transaction::successful(
            LedgerContext {
                account_id: partner_id.to_string(),
                reference: Some(batch.id.clone()),
                processor_name: profile.processor_name.clone(),
                processor_customer_id: profile.processor_customer_id().to_string(),
                description,
                quote: serde_json::to_value(&quote)?,
            },
            quote.total_price,
            &self.config.currency,
            &result,
        );

        let batches = self.ports.batches.clone();
        let grant = SeatGrant {
            partner_id: partner_id.to_string(),
            batch_id: batch.id.clone(),
            seat_count: validated.seat_count,
            sessions_per_day: validated.sessions_per_day,
            months: validated.months,
            transaction_id: String::new(),
        };
        let days_per_month = self.config.days_per_month;
        let renewal_interval_days = self.config.seat_renewal_interval_days;

        let (transaction, seat) = commit_charge(self.ports.ledger.clone(), tx, move |stored| {
            async move {
                let seat = Seat::provision(
                    SeatGrant {
                        transaction_id: stored.id,
                        ..grant
                    },
                    Utc::now(),
                    days_per_month,
                    renewal_interval_days,
                )?;
                batches.create_seat(seat).await
            }
        })
        .await?;

        info!(
            partner_id,
            batch_id = %batch.id,
            seat_id = %seat.id,
            transaction_id = %transaction.id,
            total = %quote.total_price,
            "Seats purchased"
        );

        let mut hooks = Vec::new();
        if let Some(requested) = order.auto_renew {
            match self.ports.settings.auto_renew(partner_id).await {
                Ok(current) if current == requested => {}
                Ok(_) => hooks.push(PostCommit::SetAutoRenew {
                    partner_id: partner_id.to_string(),
                    enabled: requested,
                }),
                Err(e) => warn!(partner_id, error = %e, "Could not read auto-renew preference"),
            }
        }
        hooks.push(PostCommit::MarkSetupComplete {
            partner_id: partner_id.to_string(),
        });
        if let Some(recipient) = self.recipient_for(&profile) {
            hooks.push(PostCommit::Notify {
                template_id: SEAT_PURCHASE_TEMPLATE,
                recipient,
                variables: serde_json::json!({
                    "batch_name": batch.name.as_str(),
                    "seat_count": seat.seat_count,
                    "sessions_per_day": seat.sessions_per_day,
                    "end_date": seat.end_date,
                    "amount": transaction.amount,
                    "currency": transaction.currency,
                }),
            });
        }
        self.run_hooks(hooks).await;

        Ok(SeatPurchaseReceipt {
            batch,
            seat,
            transaction,
            quote,
        })
    }

    /// The partner's batch with this name, if one was created.
    ///
    /// A purchase that fails after creating its batch leaves the batch in place; this is how a
    /// caller recovers its id to retry with [`BatchTarget::Existing`].
    pub async fn find_batch(&self, partner_id: &str, batch_name: &str) -> Result<Option<Batch>> {
        let name = BatchName::new(batch_name)?;
        self.ports.batches.batch_by_name(partner_id, &name).await
    }

    /// Preview of the candidate payment for a batch.
    pub async fn quote_candidates(
        &self,
        partner_id: &str,
        batch_id: &str,
        months: u32,
    ) -> Result<PricingQuote> {
        let months = DurationMonths::try_from(months)?;
        self.load_batch(partner_id, batch_id).await?;
        let unpaid = self.unpaid_candidates(partner_id, batch_id).await?;
        self.pricing.quote_candidates(candidate_count(&unpaid), months)
    }

    /// Pays for every unpaid candidate in a batch at the flat per-candidate rate.
    ///
    /// The charge covers exactly the candidates unpaid when the call starts and only those are
    /// marked paid. Concurrent calls for the same set share one processor charge.
    pub async fn pay_for_candidates(
        &self,
        payment: CandidatePayment,
    ) -> Result<CandidatePaymentReceipt> {
        let months = DurationMonths::try_from(payment.months)?;
        let batch = self
            .load_batch(&payment.partner_id, &payment.batch_id)
            .await?;
        let candidate_ids = self
            .unpaid_candidates(&payment.partner_id, &batch.id)
            .await?;
        let unpaid = candidate_count(&candidate_ids);
        let quote = self.pricing.quote_candidates(unpaid, months)?;

        let profile = self
            .ensure_customer(&payment.partner_id, Some(&payment.payment_method))
            .await?;

        let description = format!(
            "{} candidates for {} month(s), batch '{}'",
            unpaid,
            months.months(),
            batch.name.as_str()
        );
        let request = ChargeRequest {
            customer_id: profile.processor_customer_id().to_string(),
            payment_method_id: payment.payment_method.clone(),
            amount: quote.total_price,
            currency: self.config.currency.clone(),
            description: description.clone(),
            idempotency_key: candidate_charge_key(&batch.id, &candidate_ids, months),
        };
        let result = execute_charge(self.ports.gateway.as_ref(), &request).await?;

        let tx = Transaction::successful(
            LedgerContext {
                account_id: payment.partner_id.clone(),
                reference: Some(batch.id.clone()),
                processor_name: profile.processor_name.clone(),
                processor_customer_id: profile.processor_customer_id().to_string(),
                description,
                quote: serde_json::to_value(&quote)?,
            },
            quote.total_price,
            &self.config.currency,
            &result,
        );

        let batches = self.ports.batches.clone();
        let partner_id = payment.partner_id.clone();
        let batch_id = batch.id.clone();
        let (transaction, candidates_paid) =
            commit_charge(self.ports.ledger.clone(), tx, move |stored| async move {
                batches
                    .mark_candidates_paid(&partner_id, &batch_id, &candidate_ids, &stored.id)
                    .await
            })
            .await?;

        info!(
            partner_id = %payment.partner_id,
            batch_id = %batch.id,
            candidates_paid,
            transaction_id = %transaction.id,
            "Candidate payment recorded"
        );

        if let Some(recipient) = self.recipient_for(&profile) {
            self.run_hooks(vec![PostCommit::Notify {
                template_id: CANDIDATE_PAYMENT_TEMPLATE,
                recipient,
                variables: serde_json::json!({
                    "batch_name": batch.name.as_str(),
                    "candidates": candidates_paid,
                    "amount": transaction.amount,
                    "currency": transaction.currency,
                }),
            }])
            .await;
        }

        Ok(CandidatePaymentReceipt {
            transaction,
            candidates_paid,
            quote,
        })
    }

    async fn load_batch(&self, partner_id: &str, batch_id: &str) -> Result<Batch> {
        self.ports
            .batches
            .get_batch(partner_id, batch_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(format!("batch {}", batch_id)))
    }

    async fn unpaid_candidates(&self, partner_id: &str, batch_id: &str) -> Result<Vec<String>> {
        let unpaid = self
            .ports
            .batches
            .unpaid_candidates(partner_id, batch_id)
            .await?;
        if unpaid.is_empty() {
            return Err(PaymentError::ValidationError(format!(
                "batch {} has no unpaid candidates",
                batch_id
            )));
        }
        Ok(unpaid)
    }

    /// Buys a catalog plan for an end-user account and grants the matching subscription.
    pub async fn process_payment(&self, purchase: PlanPurchase) -> Result<PlanPurchaseReceipt> {
        let plan = self
            .config
            .plan(&purchase.plan_id)
            .cloned()
            .ok_or_else(|| {
                PaymentError::ValidationError(format!("unknown plan '{}'", purchase.plan_id))
            })?;

        let now = Utc::now();
        let (start_date, end_date) = match plan.kind {
            SubscriptionKind::Subscription => Subscription::plan_window(&plan, now)?,
            SubscriptionKind::Topup => {
                let current = self.compute_entitlement(&purchase.account_id, now).await?;
                let active = current.active_subscription.ok_or_else(|| {
                    PaymentError::ValidationError(
                        "a top-up requires an active subscription".to_string(),
                    )
                })?;
                (now, active.end_date)
            }
            SubscriptionKind::Partner => {
                return Err(PaymentError::ValidationError(format!(
                    "plan '{}' is granted through partner seats and cannot be bought",
                    plan.id
                )));
            }
        };

        let profile = self
            .ensure_customer(&purchase.account_id, Some(&purchase.payment_method))
            .await?;

        let request_id = purchase
            .request_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let request = ChargeRequest {
            customer_id: profile.processor_customer_id().to_string(),
            payment_method_id: purchase.payment_method.clone(),
            amount: plan.price,
            currency: self.config.currency.clone(),
            description: plan.description.clone(),
            idempotency_key: format!("plan-{}-{}", purchase.account_id, request_id),
        };
        let result = execute_charge(self.ports.gateway.as_ref(), &request).await?;

        let tx = Transaction::successful(
            LedgerContext {
                account_id: purchase.account_id.clone(),
                reference: Some(plan.id.clone()),
                processor_name: profile.processor_name.clone(),
                processor_customer_id: profile.processor_customer_id().to_string(),
                description: plan.description.clone(),
                quote: serde_json::to_value(&plan)?,
            },
            plan.price,
            &self.config.currency,
            &result,
        );

        let subscriptions = self.ports.subscriptions.clone();
        let account_id = purchase.account_id.clone();
        let granted_plan = plan.clone();
        let (transaction, subscription) =
            commit_charge(self.ports.ledger.clone(), tx, move |stored| async move {
                // A replayed request_id lands on the already-stored transaction.
                if let Some(existing) = subscriptions
                    .for_account(&account_id)
                    .await?
                    .into_iter()
                    .find(|s| s.payment_reference.as_deref() == Some(stored.id.as_str()))
                {
                    return Ok(existing);
                }
                let subscription = Subscription::for_plan(
                    &account_id,
                    &granted_plan,
                    &stored.id,
                    start_date,
                    end_date,
                );
                subscriptions.create(subscription.clone()).await?;
                Ok(subscription)
            })
            .await?;

        info!(
            account_id = %purchase.account_id,
            plan = %plan.id,
            subscription_id = %subscription.id,
            transaction_id = %transaction.id,
            "Plan purchased"
        );

        if let Some(recipient) = self.recipient_for(&profile) {
            self.run_hooks(vec![PostCommit::Notify {
                template_id: PLAN_PURCHASE_TEMPLATE,
                recipient,
                variables: serde_json::json!({
                    "plan": plan.id,
                    "start_date": subscription.start_date,
                    "end_date": subscription.end_date,
                    "amount": transaction.amount,
                    "currency": transaction.currency,
                }),
            }])
            .await;
        }

        Ok(PlanPurchaseReceipt {
            transaction,
            subscription,
        })
    }

    /// Currently usable entitlement; recomputed on every call because `now` moves.
    pub async fn compute_entitlement(
        &self,
        account_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Entitlement> {
        let history = self.ports.subscriptions.for_account(account_id).await?;
        let entitlement = compute_entitlement(account_id, &history, &self.config.plans, now);

        if !entitlement.active {
            let cached = self.ports.subscriptions.cached_balance(account_id).await?;
            if cached != 0 {
                self.ports
                    .subscriptions
                    .set_cached_balance(account_id, 0)
                    .await?;
                info!(account_id, cached, "Subscription lapsed; cached balance reset");
            }
        }

        Ok(entitlement)
    }

    /// Ledger entries for an account, newest first.
    pub async fn payment_history(&self, account_id: &str) -> Result<Vec<Transaction>> {
        let mut history = self.ports.ledger.for_account(account_id).await?;
        history.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(history)
    }

    pub async fn list_payment_methods(&self, account_id: &str) -> Result<Vec<PaymentMethodDetail>> {
        let profile = self.require_profile(account_id).await?;
        let mut methods = self
            .ports
            .gateway
            .list_payment_methods(
                profile.processor_customer_id(),
                self.config.payment_method_list_limit,
            )
            .await?;
        for method in &mut methods {
            method.is_default = profile.default_payment_method() == Some(method.id.as_str());
        }
        Ok(methods)
    }

    pub async fn set_default_payment_method(
        &self,
        account_id: &str,
        method_id: &str,
    ) -> Result<PaymentProfile> {
        let mut profile = self.require_profile(account_id).await?;
        self.ports
            .gateway
            .attach_payment_method(profile.processor_customer_id(), method_id, true)
            .await?;
        profile.set_default_payment_method(method_id);
        self.ports.profiles.update(profile.clone()).await?;
        info!(account_id, payment_method = method_id, "Default payment method set");
        Ok(profile)
    }

    /// Detaches a payment method; the current default cannot be removed.
    pub async fn delete_payment_method(&self, account_id: &str, method_id: &str) -> Result<()> {
        let profile = self.require_profile(account_id).await?;
        if profile.default_payment_method() == Some(method_id) {
            return Err(PaymentError::ValidationError(
                "the default payment method cannot be deleted".to_string(),
            ));
        }
        self.ports.gateway.detach_payment_method(method_id).await?;
        info!(account_id, payment_method = method_id, "Payment method detached");
        Ok(())
    }

    fn recipient_for(&self, profile: &PaymentProfile) -> Option<String> {
        let recipient = profile.snapshot.email.clone();
        if recipient.is_none() {
            warn!(account_id = %profile.account_id, "No email on file; skipping notification");
        }
        recipient
    }

    async fn run_hooks(&self, hooks: Vec<PostCommit>) {
        run_post_commit(
            hooks,
            self.ports.notifier.as_ref(),
            self.ports.settings.as_ref(),
        )
        .await;
    }
}

fn candidate_count(candidate_ids: &[String]) -> u32 {
    u32::try_from(candidate_ids.len()).unwrap_or(u32::MAX)
}

/// Charge key for one candidate set: the ids come back in a stable order, so the first and
/// last id with the count identify the set.
fn candidate_charge_key(
    batch_id: &str,
    candidate_ids: &[String],
    months: DurationMonths,
) -> String {
    let first = candidate_ids.first().map(String::as_str).unwrap_or_default();
    let last = candidate_ids.last().map(String::as_str).unwrap_or_default();
    format!(
        "candidates-{}-{}m-{}-{}-{}",
        batch_id,
        months.months(),
        candidate_ids.len(),
        first,
        last
    )
}

/// Charge key for a seat order, bound to everything that determines the price.
fn seat_charge_key(
    batch_id: &str,
    order: &SeatPurchase,
    validated: &ValidatedSeatOrder,
    quote: &PricingQuote,
) -> String {
    let key = format!(
        "seats-{}-{}-{}x{}-{}m-{}",
        batch_id,
        order.payment_method,
        validated.seat_count,
        validated.sessions_per_day,
        validated.months.months(),
        quote.total_price
    );
    match &order.request_id {
        Some(request_id) => format!("{}-{}", key, request_id),
        None => key,
    }
}
