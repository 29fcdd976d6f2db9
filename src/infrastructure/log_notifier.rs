use crate::domain::ports::Notifier;
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

/// Notifier for environments without a mail service: every message becomes a log event.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, template_id: &str, recipient: &str, variables: Value) -> Result<()> {
        info!(template_id, recipient, variables = %variables, "Notification");
        Ok(())
    }
}
