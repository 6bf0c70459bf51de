use crate::config::NotificationConfig;
use crate::error::Result;
use std::sync::Arc;
use std::time::Duration;

/// Готовое к показу уведомление
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub timeout: Duration,
}

/// Trait for notification sinks that can run in different modes
#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    /// Показать уведомление; вызывающий ждёт завершения перед следующим
    async fn notify(&self, notification: Notification) -> Result<()>;
}

/// Factory function to create an appropriate notification sink based on the dry_run flag
pub fn create_notification_sink(
    config: &NotificationConfig,
    dry_run: bool,
) -> Arc<dyn NotificationSink> {
    if dry_run {
        Arc::new(super::dry_run::LogNotifier::new())
    } else {
        Arc::new(super::desktop::DesktopNotifier::new(config.bell))
    }
}
