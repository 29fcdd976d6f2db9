//! Engine configuration.
//!
//! Pricing constants, minimums and the plan catalog are gathered into one immutable
//! structure that is handed to the pricing engine and the payments service at construction.

use crate::domain::money::Amount;
use crate::domain::pricing::DiscountTier;
use crate::domain::subscription::{Plan, SubscriptionKind};
use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;

const MAX_DAYS_PER_MONTH: i64 = 31;
const MAX_PLAN_DAYS: i64 = 3_660;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub currency: String,
    pub min_seat_count: u32,
    /// Length of a purchased month when deriving seat end dates.
    pub days_per_month: i64,
    pub seat_renewal_interval_days: u32,
    pub payment_method_list_limit: u8,
    pub pricing: PricingConfig,
    pub plans: Vec<Plan>,
    pub gateway: GatewaySettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            currency: "inr".to_string(),
            min_seat_count: 10,
            days_per_month: 30,
            seat_renewal_interval_days: 30,
            payment_method_list_limit: 10,
            pricing: PricingConfig::default(),
            plans: default_plans(),
            gateway: GatewaySettings::default(),
        }
    }
}

impl EngineConfig {
    /// Loads a JSON document; absent keys keep their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects month and plan lengths that cannot produce a valid date window.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_DAYS_PER_MONTH).contains(&self.days_per_month) {
            return Err(PaymentError::ValidationError(format!(
                "days_per_month must be between 1 and {}, got {}",
                MAX_DAYS_PER_MONTH, self.days_per_month
            )));
        }
        if let Some(plan) = self
            .plans
            .iter()
            .find(|plan| !(1..=MAX_PLAN_DAYS).contains(&plan.duration_days))
        {
            return Err(PaymentError::ValidationError(format!(
                "plan '{}' duration_days must be between 1 and {}, got {}",
                plan.id, MAX_PLAN_DAYS, plan.duration_days
            )));
        }
        Ok(())
    }

    pub fn plan(&self, plan_id: &str) -> Option<&Plan> {
        self.plans.iter().find(|plan| plan.id == plan_id)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub base_price_per_candidate_per_month: Decimal,
    pub per_session_cost: Decimal,
    pub markup: Decimal,
    pub unlimited_sessions_per_day: u32,
    pub sessions_days_per_month: u32,
    pub tiers: Vec<DiscountTier>,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            base_price_per_candidate_per_month: dec!(100),
            per_session_cost: dec!(1.4),
            markup: dec!(1.45),
            unlimited_sessions_per_day: 15,
            sessions_days_per_month: 30,
            tiers: vec![
                DiscountTier {
                    min_units: 100,
                    multiplier: dec!(0.80),
                },
                DiscountTier {
                    min_units: 50,
                    multiplier: dec!(0.85),
                },
                DiscountTier {
                    min_units: 10,
                    multiplier: dec!(0.90),
                },
            ],
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub timeout_secs: u64,
}

impl GatewaySettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 2_000,
            timeout_secs: 30,
        }
    }
}

impl fmt::Debug for GatewaySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewaySettings")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .field("max_retries", &self.max_retries)
            .field("initial_backoff_ms", &self.initial_backoff_ms)
            .field("max_backoff_ms", &self.max_backoff_ms)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn default_plans() -> Vec<Plan> {
    vec![
        Plan {
            id: "monthly-standard".to_string(),
            kind: SubscriptionKind::Subscription,
            description: "Standard monthly access".to_string(),
            price: Amount::from_units(499),
            duration_days: 30,
            daily_sessions: 3,
            session_seconds: 1800,
        },
        Plan {
            id: "topup-10min".to_string(),
            kind: SubscriptionKind::Topup,
            description: "Ten extra minutes".to_string(),
            price: Amount::from_units(99),
            duration_days: 30,
            daily_sessions: 1,
            session_seconds: 600,
        },
    ]
}
