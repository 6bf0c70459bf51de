use crate::config::NotificationConfig;
use crate::debug_if_enabled;
use crate::events::AlertEvent;
use crate::services::notifier::{Notification, NotificationSink};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{error, info, warn};

/// Единственный потребитель очереди алертов.
///
/// Deliveries are awaited one by one, so two notifications are never shown
/// concurrently regardless of how many workers are producing.
pub struct NotificationDispatcher {
    alerts: UnboundedReceiver<AlertEvent>,
    sink: Arc<dyn NotificationSink>,
    title: String,
    message_template: String,
    timeout: Duration,
}

impl NotificationDispatcher {
    pub fn new(
        alerts: UnboundedReceiver<AlertEvent>,
        sink: Arc<dyn NotificationSink>,
        config: &NotificationConfig,
    ) -> Self {
        Self {
            alerts,
            sink,
            title: config.title.clone(),
            message_template: config.message.clone(),
            timeout: Duration::from_secs(u64::from(config.timeout_secs)),
        }
    }

    fn build_notification(&self, event: &AlertEvent) -> Notification {
        Notification {
            title: self.title.clone(),
            message: event.render_message(&self.message_template),
            timeout: self.timeout,
        }
    }

    pub async fn run(mut self) {
        info!("NotificationDispatcher запущен");

        while let Some(event) = self.alerts.recv().await {
            debug_if_enabled!("Получен алерт из очереди: {}", event);
            let notification = self.build_notification(&event);

            if let Err(e) = self.sink.notify(notification).await {
                error!("Не удалось доставить уведомление для окна '{}': {}", event.window, e);
            }
        }

        // Все отправители закрыты - возможно только при завершении процесса
        warn!("Очередь алертов закрыта, NotificationDispatcher завершает работу");
    }
}
