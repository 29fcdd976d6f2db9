use crate::domain::money::Amount;
use crate::error::PaymentError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionKind {
    /// Base entitlement window.
    Subscription,
    /// Extra capacity inside an existing base window.
    Topup,
    /// Granted from a partner's seat.
    Partner,
}

/// Catalog entry an end user can buy.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Plan {
    pub id: String,
    pub kind: SubscriptionKind,
    pub description: String,
    pub price: Amount,
    pub duration_days: i64,
    pub daily_sessions: u32,
    /// Session time the plan grants, summed by the entitlement aggregator.
    pub session_seconds: u64,
}

/// Time-boxed entitlement grant for an account.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Subscription {
    pub id: String,
    pub account_id: String,
    pub kind: SubscriptionKind,
    pub plan_reference: String,
    pub payment_reference: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub daily_sessions: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub partner_id: Option<String>,
    pub batch_id: Option<String>,
    pub seat_id: Option<String>,
}

impl Subscription {
    /// Grant for a paid plan covering `[start_date, end_date)`.
    pub fn for_plan(
        account_id: &str,
        plan: &Plan,
        payment_reference: &str,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            account_id: account_id.to_string(),
            kind: plan.kind,
            plan_reference: plan.id.clone(),
            payment_reference: Some(payment_reference.to_string()),
            start_date,
            end_date,
            daily_sessions: plan.daily_sessions,
            is_active: true,
            created_at: Utc::now(),
            partner_id: None,
            batch_id: None,
            seat_id: None,
        }
    }

    /// `[start_date, start_date + duration_days)`; a non-positive or unrepresentable
    /// duration is a validation error.
    pub fn plan_window(
        plan: &Plan,
        start_date: DateTime<Utc>,
    ) -> Result<(DateTime<Utc>, DateTime<Utc>), PaymentError> {
        let end_date = Some(plan.duration_days)
            .filter(|days| *days > 0)
            .and_then(Duration::try_days)
            .and_then(|span| start_date.checked_add_signed(span))
            .ok_or_else(|| {
                PaymentError::ValidationError(format!(
                    "plan '{}' has an invalid duration of {} days",
                    plan.id, plan.duration_days
                ))
            })?;
        Ok((start_date, end_date))
    }

    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.end_date > now
    }

    /// Whether this record's window lies entirely within `outer`'s window.
    pub fn lies_within(&self, outer: &Subscription) -> bool {
        self.start_date >= outer.start_date && self.end_date <= outer.end_date
    }
}
