use crate::error::Result;
use tracing::info;

use super::r#trait::{Notification, NotificationSink};

pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        info!("Dry-run режим - уведомления только пишутся в лог");
        Self
    }
}

#[async_trait::async_trait]
impl NotificationSink for LogNotifier {
    async fn notify(&self, notification: Notification) -> Result<()> {
        info!(
            "[DRY RUN] Уведомление '{}': {} (timeout {:?})",
            notification.title, notification.message, notification.timeout
        );
        Ok(())
    }
}
