use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Ошибка конфигурации: {0}")]
    Config(#[from] anyhow::Error),

    #[error("Ошибка ввода-вывода: {0}")]
    Io(#[from] std::io::Error),

    #[error("Окно '{0}' не найдено")]
    WindowNotFound(String),

    #[error("Не удалось захватить окно '{window}': {reason}")]
    CaptureFailure { window: String, reason: String },

    #[error(
        "Область иконки {region} выходит за пределы изображения {image_width}x{image_height}"
    )]
    RegionOutOfBounds {
        region: String,
        image_width: u32,
        image_height: u32,
    },

    #[error("Ошибка анализа изображения: {0}")]
    Detection(String),

    #[error("Не выбрано ни одного окна для мониторинга")]
    EmptySelection,

    #[error("Неверный выбор окон: {0}")]
    InvalidSelection(String),

    #[error("Ошибка уведомления: {0}")]
    Notification(String),

    #[error("Внутренняя ошибка: {0}")]
    Internal(String),
}

impl MonitorError {
    pub fn capture_failure<T>(window: impl Into<String>, reason: impl Into<String>) -> Result<T> {
        Err(MonitorError::CaptureFailure {
            window: window.into(),
            reason: reason.into(),
        })
    }

    /// Ошибка относится к одной итерации опроса и не должна останавливать воркер
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MonitorError::WindowNotFound(_)
                | MonitorError::CaptureFailure { .. }
                | MonitorError::RegionOutOfBounds { .. }
                | MonitorError::Detection(_)
                | MonitorError::Internal(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, MonitorError>;

// Удобные макросы для создания ошибок
#[macro_export]
macro_rules! monitor_error {
    (detection, $($arg:tt)*) => {
        $crate::error::MonitorError::Detection(format!($($arg)*))
    };
    (invalid_selection, $($arg:tt)*) => {
        $crate::error::MonitorError::InvalidSelection(format!($($arg)*))
    };
    (notification, $($arg:tt)*) => {
        $crate::error::MonitorError::Notification(format!($($arg)*))
    };
    (internal, $($arg:tt)*) => {
        $crate::error::MonitorError::Internal(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iteration_errors_are_recoverable() {
        assert!(MonitorError::WindowNotFound("Estado".into()).is_recoverable());
        assert!(MonitorError::Detection("bad buffer".into()).is_recoverable());
        assert!(!MonitorError::EmptySelection.is_recoverable());
    }

    #[test]
    fn test_macro_builds_variant() {
        let err = monitor_error!(invalid_selection, "индекс {} вне диапазона", 7);
        assert!(matches!(err, MonitorError::InvalidSelection(ref msg) if msg.contains('7')));
    }
}
