//! Derives the usable balance of an account from its subscription history.

use crate::domain::subscription::{Plan, Subscription, SubscriptionKind};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entitlement {
    pub active: bool,
    pub total_granted_seconds: u64,
    pub active_subscription: Option<Subscription>,
}

impl Entitlement {
    pub fn inactive() -> Self {
        Self {
            active: false,
            total_granted_seconds: 0,
            active_subscription: None,
        }
    }
}

/// Merges the live base subscription with the top-ups inside its window.
///
/// When several base subscriptions are live at once the most recently created one wins,
/// then the one ending last, then the greatest id, so repeated calls pick the same record.
pub fn compute_entitlement(
    account_id: &str,
    subscriptions: &[Subscription],
    plans: &[Plan],
    now: DateTime<Utc>,
) -> Entitlement {
    let owned = subscriptions.iter().filter(|s| s.account_id == account_id);

    let active = owned
        .clone()
        .filter(|s| s.kind == SubscriptionKind::Subscription && s.is_live_at(now))
        .max_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then(a.end_date.cmp(&b.end_date))
                .then(a.id.cmp(&b.id))
        });

    let Some(active) = active else {
        return Entitlement::inactive();
    };

    let topup_seconds: u64 = owned
        .filter(|s| s.kind == SubscriptionKind::Topup && s.lies_within(active))
        .map(|s| plan_seconds(plans, s))
        .sum();

    Entitlement {
        active: true,
        total_granted_seconds: plan_seconds(plans, active) + topup_seconds,
        active_subscription: Some(active.clone()),
    }
}

fn plan_seconds(plans: &[Plan], subscription: &Subscription) -> u64 {
    match plans.iter().find(|p| p.id == subscription.plan_reference) {
        Some(plan) => plan.session_seconds,
        None => {
            warn!(
                subscription_id = %subscription.id,
                plan = %subscription.plan_reference,
                "Subscription references an unknown plan; counting zero seconds"
            );
            0
        }
    }
}
