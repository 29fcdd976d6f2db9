//! Deterministic in-process payment processor.
//!
//! Payment method ids drive the outcome of a charge: ids starting with `pm_decline` are
//! declined until [`SandboxGateway::approve_method`] is called for them, ids starting with
//! `pm_pending` stay in `processing`, anything else succeeds.
//! Idempotency keys are honored for customer creation and charges. A charge key reused with
//! different parameters is rejected, and a replayed key returns the original outcome, declines
//! included.

use crate::domain::gateway::{
    BillingIdentity, ChargeRequest, ChargeResult, ChargeStatus, CustomerRecord,
    PaymentMethodDetail,
};
use crate::domain::ports::PaymentGateway;
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

pub const SANDBOX_PROCESSOR: &str = "sandbox";

#[derive(Debug, Clone)]
struct SandboxCustomer {
    record: CustomerRecord,
    methods: Vec<String>,
}

#[derive(Default)]
struct SandboxState {
    customers: HashMap<String, SandboxCustomer>,
    customer_keys: HashMap<String, String>,
    charges: HashMap<String, RecordedCharge>,
    approved_methods: HashSet<String>,
}

/// Parameters a charge idempotency key is bound to.
#[derive(Debug, Clone, PartialEq)]
struct ChargeFingerprint {
    customer_id: String,
    payment_method_id: String,
    amount: String,
    currency: String,
}

impl From<&ChargeRequest> for ChargeFingerprint {
    fn from(request: &ChargeRequest) -> Self {
        Self {
            customer_id: request.customer_id.clone(),
            payment_method_id: request.payment_method_id.clone(),
            amount: request.amount.to_string(),
            currency: request.currency.clone(),
        }
    }
}

#[derive(Debug, Clone)]
struct RecordedCharge {
    fingerprint: ChargeFingerprint,
    result: ChargeResult,
}

#[derive(Default, Clone)]
pub struct SandboxGateway {
    state: Arc<RwLock<SandboxState>>,
    unreachable: Arc<AtomicBool>,
    create_customer_calls: Arc<AtomicUsize>,
    charge_calls: Arc<AtomicUsize>,
}

impl SandboxGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates a network partition: every call fails with a gateway error.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Deletes a customer on the processor side, as if removed from the dashboard.
    pub async fn forget_customer(&self, customer_id: &str) {
        self.state.write().await.customers.remove(customer_id);
    }

    /// Lets a `pm_decline` method succeed from now on, as if funds were added.
    pub async fn approve_method(&self, method_id: &str) {
        self.state
            .write()
            .await
            .approved_methods
            .insert(method_id.to_string());
    }

    pub fn create_customer_calls(&self) -> usize {
        self.create_customer_calls.load(Ordering::SeqCst)
    }

    pub fn charge_calls(&self) -> usize {
        self.charge_calls.load(Ordering::SeqCst)
    }

    fn check_reachable(&self) -> Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(PaymentError::GatewayError(
                "sandbox processor unreachable".to_string(),
            ));
        }
        Ok(())
    }
}

fn method_detail(method_id: &str, default: Option<&str>) -> PaymentMethodDetail {
    let brand = method_id
        .rsplit('_')
        .next()
        .filter(|b| !b.is_empty())
        .map(str::to_string);
    PaymentMethodDetail {
        id: method_id.to_string(),
        brand,
        last4: Some("4242".to_string()),
        exp_month: Some(12),
        exp_year: Some(2030),
        is_default: default == Some(method_id),
    }
}

fn refresh_raw(record: &mut CustomerRecord) {
    record.raw = json!({
        "id": record.id,
        "object": "customer",
        "email": record.email,
        "name": record.name,
        "invoice_settings": { "default_payment_method": record.default_payment_method },
    });
}

#[async_trait]
impl PaymentGateway for SandboxGateway {
    fn name(&self) -> &str {
        SANDBOX_PROCESSOR
    }

    async fn create_customer(
        &self,
        identity: &BillingIdentity,
        idempotency_key: &str,
    ) -> Result<CustomerRecord> {
        self.check_reachable()?;
        self.create_customer_calls.fetch_add(1, Ordering::SeqCst);

        let mut state = self.state.write().await;
        if let Some(existing) = state
            .customer_keys
            .get(idempotency_key)
            .and_then(|id| state.customers.get(id))
        {
            return Ok(existing.record.clone());
        }

        let mut record = CustomerRecord {
            id: format!("cus_{}", Uuid::new_v4().simple()),
            email: Some(identity.email.clone()),
            name: Some(identity.display_name.clone()),
            default_payment_method: None,
            raw: json!(null),
        };
        refresh_raw(&mut record);
        state
            .customer_keys
            .insert(idempotency_key.to_string(), record.id.clone());
        state.customers.insert(
            record.id.clone(),
            SandboxCustomer {
                record: record.clone(),
                methods: Vec::new(),
            },
        );
        Ok(record)
    }

    async fn retrieve_customer(&self, customer_id: &str) -> Result<Option<CustomerRecord>> {
        self.check_reachable()?;
        let state = self.state.read().await;
        Ok(state.customers.get(customer_id).map(|c| c.record.clone()))
    }

    async fn attach_payment_method(
        &self,
        customer_id: &str,
        method_id: &str,
        set_default: bool,
    ) -> Result<PaymentMethodDetail> {
        self.check_reachable()?;
        let mut state = self.state.write().await;
        let customer = state
            .customers
            .get_mut(customer_id)
            .ok_or_else(|| PaymentError::GatewayError(format!("No such customer: {}", customer_id)))?;

        if !customer.methods.iter().any(|m| m == method_id) {
            customer.methods.push(method_id.to_string());
        }
        if set_default {
            customer.record.default_payment_method = Some(method_id.to_string());
            refresh_raw(&mut customer.record);
        }
        Ok(method_detail(
            method_id,
            customer.record.default_payment_method.as_deref(),
        ))
    }

    async fn detach_payment_method(&self, method_id: &str) -> Result<()> {
        self.check_reachable()?;
        let mut state = self.state.write().await;
        let customer = state
            .customers
            .values_mut()
            .find(|c| c.methods.iter().any(|m| m == method_id))
            .ok_or_else(|| PaymentError::NotFound(format!("payment method {}", method_id)))?;

        customer.methods.retain(|m| m != method_id);
        if customer.record.default_payment_method.as_deref() == Some(method_id) {
            customer.record.default_payment_method = None;
            refresh_raw(&mut customer.record);
        }
        Ok(())
    }

    async fn list_payment_methods(
        &self,
        customer_id: &str,
        limit: u8,
    ) -> Result<Vec<PaymentMethodDetail>> {
        self.check_reachable()?;
        let state = self.state.read().await;
        let customer = state
            .customers
            .get(customer_id)
            .ok_or_else(|| PaymentError::GatewayError(format!("No such customer: {}", customer_id)))?;
        let default = customer.record.default_payment_method.as_deref();
        Ok(customer
            .methods
            .iter()
            .take(usize::from(limit))
            .map(|m| method_detail(m, default))
            .collect())
    }

    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeResult> {
        self.check_reachable()?;
        self.charge_calls.fetch_add(1, Ordering::SeqCst);

        let fingerprint = ChargeFingerprint::from(request);
        let mut state = self.state.write().await;
        if let Some(previous) = state.charges.get(&request.idempotency_key) {
            if previous.fingerprint != fingerprint {
                return Err(PaymentError::GatewayError(format!(
                    "idempotency key '{}' was already used with different parameters",
                    request.idempotency_key
                )));
            }
            return Ok(previous.result.clone());
        }
        if !state.customers.contains_key(&request.customer_id) {
            return Err(PaymentError::GatewayError(format!(
                "No such customer: {}",
                request.customer_id
            )));
        }

        let payment_id = format!("pi_{}", Uuid::new_v4().simple());
        let method = request.payment_method_id.as_str();
        let declined =
            method.starts_with("pm_decline") && !state.approved_methods.contains(method);
        let (status, failure_message) = if declined {
            ("failed", Some("Your card was declined.".to_string()))
        } else if method.starts_with("pm_pending") {
            ("processing", None)
        } else {
            ("succeeded", None)
        };

        let result = ChargeResult {
            status: ChargeStatus::from_processor(status),
            processor_payment_id: Some(payment_id.clone()),
            failure_message,
            raw: json!({
                "id": payment_id,
                "object": "payment_intent",
                "amount": request.amount.minor_units()?,
                "currency": request.currency,
                "customer": request.customer_id,
                "payment_method": method,
                "status": status,
            }),
        };
        state.charges.insert(
            request.idempotency_key.clone(),
            RecordedCharge {
                fingerprint,
                result: result.clone(),
            },
        );
        Ok(result)
    }
}
