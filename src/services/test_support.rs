//! Общие тестовые заглушки для источника окон и уведомлений

use crate::error::{MonitorError, Result};
use crate::events::WindowInfo;
use crate::services::notifier::{Notification, NotificationSink};
use crate::services::window_source::WindowSource;
use image::{Rgb, RgbImage};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Источник окон, захват которого описан замыканием по заголовку
pub struct FnSource<F>(pub F);

impl<F> WindowSource for FnSource<F>
where
    F: Fn(&str) -> Result<RgbImage> + Send + Sync,
{
    fn list_windows(&self) -> Result<Vec<WindowInfo>> {
        Ok(Vec::new())
    }

    fn capture(&self, window: &WindowInfo) -> Result<RgbImage> {
        (self.0)(&window.title)
    }

    fn capture_window_image(&self, title: &str) -> Result<RgbImage> {
        (self.0)(title)
    }
}

/// Запоминает уведомления и отслеживает, пересекаются ли вызовы `notify`
#[derive(Default)]
pub struct RecordingSink {
    pub delivered: Mutex<Vec<Notification>>,
    pub max_in_flight: AtomicUsize,
    in_flight: AtomicUsize,
    delay: Duration,
    fail_first: bool,
}

impl RecordingSink {
    /// Каждый показ занимает `delay`, так что параллельные вызовы были бы заметны
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    /// Первая доставка записывается, но завершается ошибкой
    pub fn failing_first() -> Self {
        Self {
            fail_first: true,
            ..Default::default()
        }
    }
}

#[async_trait::async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(&self, notification: Notification) -> Result<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let mut delivered = self.delivered.lock();
        delivered.push(notification);
        if self.fail_first && delivered.len() == 1 {
            return Err(MonitorError::Notification("dbus недоступен".to_string()));
        }
        Ok(())
    }
}

/// Кадр окна 60x40, в области иконки (15, 2) ровно `red` красных пикселей
pub fn frame_with_red_pixels(red: u32) -> RgbImage {
    let mut frame = RgbImage::from_pixel(60, 40, Rgb([0, 0, 0]));
    for i in 0..red {
        frame.put_pixel(15 + i % 30, 2 + i / 30, Rgb([255, 0, 0]));
    }
    frame
}
