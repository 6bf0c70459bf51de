use crate::error::{MonitorError, Result};
use std::io::Write;
use tracing::{debug, warn};

use super::r#trait::{Notification, NotificationSink};

/// Системные уведомления рабочего стола через notify-rust
pub struct DesktopNotifier {
    bell: bool,
}

impl DesktopNotifier {
    pub fn new(bell: bool) -> Self {
        Self { bell }
    }

    fn show(notification: &Notification) -> Result<()> {
        let timeout_ms = u32::try_from(notification.timeout.as_millis()).unwrap_or(u32::MAX);

        notify_rust::Notification::new()
            .summary(&notification.title)
            .body(&notification.message)
            .timeout(notify_rust::Timeout::Milliseconds(timeout_ms))
            .show()
            .map(|_| ())
            .map_err(|e| MonitorError::Notification(e.to_string()))
    }

    fn ring_bell(message: &str) {
        // Дублируем в терминал со звуковым сигналом
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = writeln!(stdout, "\x07{}", message).and_then(|_| stdout.flush()) {
            warn!("Не удалось вывести сигнал в терминал: {}", e);
        }
    }
}

#[async_trait::async_trait]
impl NotificationSink for DesktopNotifier {
    async fn notify(&self, notification: Notification) -> Result<()> {
        debug!("Показ уведомления: {}", notification.message);

        if self.bell {
            Self::ring_bell(&notification.message);
        }

        // D-Bus / WinRT вызовы блокирующие
        tokio::task::spawn_blocking(move || Self::show(&notification))
            .await
            .map_err(|e| MonitorError::Notification(format!("задача уведомления упала: {}", e)))?
    }
}
