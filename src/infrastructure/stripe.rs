//! Stripe-compatible REST adapter.
//!
//! Requests are form-encoded with bearer auth. Reads and idempotent writes are retried with
//! exponential backoff on transport errors, 429 and 5xx responses. Charges are sent once.

use crate::config::GatewaySettings;
use crate::domain::gateway::{
    BillingIdentity, ChargeRequest, ChargeResult, ChargeStatus, CustomerRecord,
    PaymentMethodDetail,
};
use crate::domain::ports::PaymentGateway;
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

pub const STRIPE_PROCESSOR: &str = "stripe";
pub const DEFAULT_BASE_URL: &str = "https://api.stripe.com/v1";

/// Backoff schedule for retryable calls.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    pub fn from_settings(settings: &GatewaySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            initial_backoff: Duration::from_millis(settings.initial_backoff_ms),
            max_backoff: Duration::from_millis(settings.max_backoff_ms),
            backoff_multiplier: 2.0,
        }
    }

    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    fn backoff_duration(&self, attempt: u32) -> Duration {
        let backoff = self.initial_backoff.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32);
        let capped = backoff.min(self.max_backoff.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

/// Raw processor reply.
#[derive(Debug)]
struct ApiResponse {
    status: StatusCode,
    body: Value,
}

impl ApiResponse {
    fn is_retryable(&self) -> bool {
        self.status == StatusCode::TOO_MANY_REQUESTS || self.status.is_server_error()
    }

    fn error_field(&self, field: &str) -> Option<&str> {
        self.body
            .get("error")
            .and_then(|e| e.get(field))
            .and_then(Value::as_str)
    }

    fn into_gateway_error(self, operation: &str) -> PaymentError {
        let message = self
            .error_field("message")
            .unwrap_or("no error message")
            .to_string();
        PaymentError::GatewayError(format!(
            "{} failed with HTTP {}: {}",
            operation, self.status, message
        ))
    }
}

pub struct StripeGateway {
    client: Client,
    base_url: String,
    api_key: String,
    retry: RetryPolicy,
}

impl StripeGateway {
    /// Builds the adapter; an API key is required.
    pub fn new(settings: &GatewaySettings) -> Result<Self> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                PaymentError::ValidationError("gateway API key is not configured".to_string())
            })?;
        let client = Client::builder().timeout(settings.timeout()).build()?;
        Ok(Self {
            client,
            base_url: settings
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key,
            retry: RetryPolicy::from_settings(settings),
        })
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        form: &[(String, String)],
        idempotency_key: Option<&str>,
    ) -> Result<ApiResponse> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .client
            .request(method.clone(), &url)
            .bearer_auth(&self.api_key);
        if method == Method::GET {
            request = request.query(form);
        } else {
            request = request.form(form);
        }
        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        debug!(%method, path, status = %status, "Processor response");

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).map_err(|e| {
                PaymentError::GatewayError(format!("unreadable processor response: {}", e))
            })?
        };
        Ok(ApiResponse { status, body })
    }

    async fn send_with_retry(
        &self,
        operation: &str,
        method: Method,
        path: &str,
        form: &[(String, String)],
        idempotency_key: Option<&str>,
    ) -> Result<ApiResponse> {
        let mut attempt = 0;

        loop {
            let outcome = self
                .send(method.clone(), path, form, idempotency_key)
                .await;
            let retryable = match &outcome {
                Ok(response) => response.is_retryable(),
                Err(PaymentError::GatewayError(_)) => true,
                Err(_) => false,
            };

            if !retryable {
                if attempt > 0 {
                    info!(operation, attempt = attempt + 1, "Processor call settled after retry");
                }
                return outcome;
            }
            if attempt >= self.retry.max_retries {
                warn!(operation, attempt = attempt + 1, "Processor call failed after max retries");
                return outcome;
            }

            let backoff = self.retry.backoff_duration(attempt);
            warn!(
                operation,
                attempt = attempt + 1,
                backoff_ms = backoff.as_millis() as u64,
                "Processor call failed, retrying after backoff"
            );
            sleep(backoff).await;
            attempt += 1;
        }
    }
}

fn customer_from(body: Value) -> Result<CustomerRecord> {
    let id = body
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| PaymentError::GatewayError("customer response without id".to_string()))?
        .to_string();
    let text = |field: &str| body.get(field).and_then(Value::as_str).map(str::to_string);
    let default_payment_method = body
        .pointer("/invoice_settings/default_payment_method")
        .and_then(Value::as_str)
        .map(str::to_string);
    Ok(CustomerRecord {
        id,
        email: text("email"),
        name: text("name"),
        default_payment_method,
        raw: body,
    })
}

fn method_from(body: &Value, default: Option<&str>) -> Option<PaymentMethodDetail> {
    let id = body.get("id").and_then(Value::as_str)?.to_string();
    let card = body.get("card");
    let card_text = |field: &str| {
        card.and_then(|c| c.get(field))
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    let card_number = |field: &str| {
        card.and_then(|c| c.get(field))
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
    };
    Some(PaymentMethodDetail {
        is_default: default == Some(id.as_str()),
        brand: card_text("brand"),
        last4: card_text("last4"),
        exp_month: card_number("exp_month"),
        exp_year: card_number("exp_year"),
        id,
    })
}

fn field(key: &str, value: impl Into<String>) -> (String, String) {
    (key.to_string(), value.into())
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    fn name(&self) -> &str {
        STRIPE_PROCESSOR
    }

    async fn create_customer(
        &self,
        identity: &BillingIdentity,
        idempotency_key: &str,
    ) -> Result<CustomerRecord> {
        let form = vec![
            field("email", identity.email.as_str()),
            field("name", identity.display_name.as_str()),
        ];
        let response = self
            .send_with_retry(
                "create_customer",
                Method::POST,
                "/customers",
                &form,
                Some(idempotency_key),
            )
            .await?;
        if !response.status.is_success() {
            return Err(response.into_gateway_error("create_customer"));
        }
        customer_from(response.body)
    }

    async fn retrieve_customer(&self, customer_id: &str) -> Result<Option<CustomerRecord>> {
        let path = format!("/customers/{}", customer_id);
        let response = self
            .send_with_retry("retrieve_customer", Method::GET, &path, &[], None)
            .await?;

        if response.status == StatusCode::NOT_FOUND
            || response.error_field("code") == Some("resource_missing")
        {
            return Ok(None);
        }
        if !response.status.is_success() {
            return Err(response.into_gateway_error("retrieve_customer"));
        }
        if response.body.get("deleted").and_then(Value::as_bool) == Some(true) {
            return Ok(None);
        }
        customer_from(response.body).map(Some)
    }

    async fn attach_payment_method(
        &self,
        customer_id: &str,
        method_id: &str,
        set_default: bool,
    ) -> Result<PaymentMethodDetail> {
        let path = format!("/payment_methods/{}/attach", method_id);
        let key = format!("attach-{}-{}", customer_id, method_id);
        let response = self
            .send_with_retry(
                "attach_payment_method",
                Method::POST,
                &path,
                &[field("customer", customer_id)],
                Some(&key),
            )
            .await?;
        if !response.status.is_success() {
            return Err(response.into_gateway_error("attach_payment_method"));
        }
        let attached = response.body;

        if set_default {
            let path = format!("/customers/{}", customer_id);
            let key = format!("default-{}-{}", customer_id, method_id);
            let response = self
                .send_with_retry(
                    "set_default_payment_method",
                    Method::POST,
                    &path,
                    &[field("invoice_settings[default_payment_method]", method_id)],
                    Some(&key),
                )
                .await?;
            if !response.status.is_success() {
                return Err(response.into_gateway_error("set_default_payment_method"));
            }
        }

        let default = set_default.then_some(method_id);
        method_from(&attached, default).ok_or_else(|| {
            PaymentError::GatewayError("payment method response without id".to_string())
        })
    }

    async fn detach_payment_method(&self, method_id: &str) -> Result<()> {
        let path = format!("/payment_methods/{}/detach", method_id);
        let key = format!("detach-{}", method_id);
        let response = self
            .send_with_retry("detach_payment_method", Method::POST, &path, &[], Some(&key))
            .await?;
        if response.status == StatusCode::NOT_FOUND {
            return Err(PaymentError::NotFound(format!("payment method {}", method_id)));
        }
        if !response.status.is_success() {
            return Err(response.into_gateway_error("detach_payment_method"));
        }
        Ok(())
    }

    async fn list_payment_methods(
        &self,
        customer_id: &str,
        limit: u8,
    ) -> Result<Vec<PaymentMethodDetail>> {
        let form = vec![
            field("customer", customer_id),
            field("type", "card"),
            field("limit", limit.to_string()),
        ];
        let response = self
            .send_with_retry("list_payment_methods", Method::GET, "/payment_methods", &form, None)
            .await?;
        if !response.status.is_success() {
            return Err(response.into_gateway_error("list_payment_methods"));
        }
        Ok(response
            .body
            .get("data")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(|m| method_from(m, None)).collect())
            .unwrap_or_default())
    }

    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeResult> {
        let form = vec![
            field("amount", request.amount.minor_units()?.to_string()),
            field("currency", request.currency.as_str()),
            field("customer", request.customer_id.as_str()),
            field("payment_method", request.payment_method_id.as_str()),
            field("description", request.description.as_str()),
            field("confirm", "true"),
            field("off_session", "true"),
        ];
        let response = self
            .send(
                Method::POST,
                "/payment_intents",
                &form,
                Some(&request.idempotency_key),
            )
            .await?;

        if response.status.is_success() {
            let status = response
                .body
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            return Ok(ChargeResult {
                status: ChargeStatus::from_processor(status),
                processor_payment_id: response
                    .body
                    .get("id")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                failure_message: response
                    .body
                    .pointer("/last_payment_error/message")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                raw: response.body,
            });
        }

        if response.error_field("type") == Some("card_error") {
            return Ok(ChargeResult {
                status: ChargeStatus::Failed,
                processor_payment_id: response
                    .body
                    .pointer("/error/payment_intent/id")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                failure_message: response.error_field("message").map(str::to_string),
                raw: response.body,
            });
        }

        Err(response.into_gateway_error("charge"))
    }
}
