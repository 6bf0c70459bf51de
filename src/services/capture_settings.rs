use crate::error::{MonitorError, Result};
use crate::services::detection::ColorRange;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Параметры детекции, которые читаются воркерами на каждой итерации
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSettings {
    pub color_range: ColorRange,
    pub pixel_threshold: u32,
    pub poll_interval: Duration,
    pub alert_cooldown: Duration,
}

impl CaptureSettings {
    fn validate(&self) -> Result<()> {
        if self.pixel_threshold == 0 {
            return Err(MonitorError::Config(anyhow::anyhow!(
                "Порог пикселей должен быть больше 0"
            )));
        }
        if self.poll_interval.is_zero() {
            return Err(MonitorError::Config(anyhow::anyhow!(
                "Интервал опроса должен быть больше 0"
            )));
        }
        Ok(())
    }
}

/// Разделяемый между воркерами handle настроек, изменяемый на лету.
///
/// Readers take a copy of the whole settings struct, so a single iteration
/// never sees a half-applied update.
#[derive(Debug, Clone)]
pub struct CaptureSettingsHandle {
    inner: Arc<RwLock<CaptureSettings>>,
}

impl CaptureSettingsHandle {
    pub fn new(settings: CaptureSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            inner: Arc::new(RwLock::new(settings)),
        })
    }

    pub fn snapshot(&self) -> CaptureSettings {
        *self.inner.read()
    }

    pub fn apply(&self, settings: CaptureSettings) -> Result<()> {
        settings.validate()?;
        *self.inner.write() = settings;
        info!(
            "Настройки захвата обновлены: цвет {}, порог {} px, интервал {:?}, cooldown {:?}",
            settings.color_range,
            settings.pixel_threshold,
            settings.poll_interval,
            settings.alert_cooldown
        );
        Ok(())
    }

    pub fn set_color_range(&self, lower: [u8; 3], upper: [u8; 3]) -> Result<()> {
        let range = ColorRange::new(lower, upper)?;
        self.inner.write().color_range = range;
        Ok(())
    }

    pub fn set_pixel_threshold(&self, threshold: u32) -> Result<()> {
        if threshold == 0 {
            return Err(MonitorError::Config(anyhow::anyhow!(
                "Порог пикселей должен быть больше 0"
            )));
        }
        self.inner.write().pixel_threshold = threshold;
        Ok(())
    }

    pub fn set_poll_interval(&self, interval: Duration) -> Result<()> {
        if interval.is_zero() {
            return Err(MonitorError::Config(anyhow::anyhow!(
                "Интервал опроса должен быть больше 0"
            )));
        }
        self.inner.write().poll_interval = interval;
        Ok(())
    }

    pub fn set_alert_cooldown(&self, cooldown: Duration) {
        self.inner.write().alert_cooldown = cooldown;
    }
}
