//! Best-effort side effects run after a purchase has been committed.

use crate::domain::ports::{Notifier, PartnerSettings};
use serde_json::Value;
use tracing::{debug, warn};

pub const SEAT_PURCHASE_TEMPLATE: &str = "seat-purchase-confirmation";
pub const PLAN_PURCHASE_TEMPLATE: &str = "plan-purchase-confirmation";
pub const CANDIDATE_PAYMENT_TEMPLATE: &str = "candidate-payment-confirmation";

#[derive(Debug, Clone, PartialEq)]
pub enum PostCommit {
    Notify {
        template_id: &'static str,
        recipient: String,
        variables: Value,
    },
    SetAutoRenew {
        partner_id: String,
        enabled: bool,
    },
    MarkSetupComplete {
        partner_id: String,
    },
}

/// Runs every hook in order. Failures are logged and never reach the caller.
pub async fn run_post_commit(
    hooks: Vec<PostCommit>,
    notifier: &dyn Notifier,
    settings: &dyn PartnerSettings,
) {
    for hook in hooks {
        let outcome = match &hook {
            PostCommit::Notify {
                template_id,
                recipient,
                variables,
            } => notifier.send(template_id, recipient, variables.clone()).await,
            PostCommit::SetAutoRenew {
                partner_id,
                enabled,
            } => settings.set_auto_renew(partner_id, *enabled).await,
            PostCommit::MarkSetupComplete { partner_id } => {
                settings.mark_setup_complete(partner_id).await
            }
        };

        match outcome {
            Ok(()) => debug!(hook = ?hook, "Post-commit hook completed"),
            Err(e) => warn!(hook = ?hook, error = %e, "Post-commit hook failed; continuing"),
        }
    }
}
