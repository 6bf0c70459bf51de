use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::services::capture_settings::CaptureSettings;
use crate::services::detection::{ColorRange, IconRegion};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub logging: LoggingConfig,
    pub capture: CaptureConfig,
    pub region: RegionConfig,
    pub windows: WindowsConfig,
    pub notification: NotificationConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    /// Файл диагностического лога (дописывается, не перезаписывается).
    /// Пустой путь отключает запись в файл.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    pub fn log_file(&self) -> Option<&Path> {
        self.file
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CaptureConfig {
    pub color_min: [u8; 3],
    pub color_max: [u8; 3],
    pub pixel_threshold: u32,
    pub poll_interval_ms: u64,
    pub alert_cooldown_ms: u64,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct RegionConfig {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WindowsConfig {
    /// Подстрока (с учётом регистра), по которой отбираются окна-кандидаты
    pub filter: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationConfig {
    pub title: String,
    /// Шаблон сообщения, `{window}` заменяется полным заголовком окна
    pub message: String,
    pub timeout_secs: u32,
    pub bell: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
                file: Some(PathBuf::from("iconwatch.log")),
            },
            capture: CaptureConfig {
                color_min: [200, 0, 0],
                color_max: [255, 80, 80],
                pixel_threshold: 5,
                poll_interval_ms: 5000,
                alert_cooldown_ms: 5000,
            },
            region: RegionConfig {
                x: 15,
                y: 2,
                width: 30,
                height: 30,
            },
            windows: WindowsConfig {
                filter: "E".to_string(),
            },
            notification: NotificationConfig {
                title: "ALERT".to_string(),
                message: "Сигнал обнаружен в окне {window}!".to_string(),
                timeout_secs: 3,
                bell: true,
            },
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        // Файл необязателен: отсутствующие поля берутся из значений по умолчанию
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("ICONWATCH_").split("__"));

        let config: Config = figment
            .extract()
            .with_context(|| format!("Не удалось загрузить конфигурацию из {:?}", config_path))?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        // Валидация настроек логирования
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Неверный уровень логирования: {}", self.logging.level),
        }

        match self.logging.format.as_str() {
            "pretty" | "compact" => {}
            _ => anyhow::bail!("Неверный формат логирования: {}", self.logging.format),
        }

        // Валидация настроек захвата
        ColorRange::new(self.capture.color_min, self.capture.color_max)?;

        if self.capture.pixel_threshold == 0 {
            anyhow::bail!("pixel_threshold должно быть больше 0");
        }

        if self.capture.poll_interval_ms < 100 {
            anyhow::bail!("poll_interval_ms должно быть минимум 100");
        }

        // Валидация области иконки
        if self.region.width == 0 || self.region.height == 0 {
            anyhow::bail!(
                "Область иконки должна иметь ненулевой размер, получено {}x{}",
                self.region.width,
                self.region.height
            );
        }

        if !self.notification.message.contains("{window}") {
            anyhow::bail!("Шаблон уведомления должен содержать {{window}}");
        }

        Ok(())
    }

    pub fn capture_settings(&self) -> Result<CaptureSettings> {
        Ok(CaptureSettings {
            color_range: ColorRange::new(self.capture.color_min, self.capture.color_max)?,
            pixel_threshold: self.capture.pixel_threshold,
            poll_interval: Duration::from_millis(self.capture.poll_interval_ms),
            alert_cooldown: Duration::from_millis(self.capture.alert_cooldown_ms),
        })
    }

    pub fn icon_region(&self) -> IconRegion {
        IconRegion::new(
            self.region.x,
            self.region.y,
            self.region.width,
            self.region.height,
        )
    }
}
