use std::fmt;
use std::time::Instant;

/// Событие срабатывания детекции для одного окна
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertEvent {
    pub window: String,
    pub matched_pixels: usize,
    pub timestamp: Instant,
}

impl AlertEvent {
    pub fn new(window: impl Into<String>, matched_pixels: usize, timestamp: Instant) -> Self {
        Self {
            window: window.into(),
            matched_pixels,
            timestamp,
        }
    }

    /// Текст уведомления: `{window}` в шаблоне заменяется полным заголовком окна
    pub fn render_message(&self, template: &str) -> String {
        template.replace("{window}", &self.window)
    }
}

impl fmt::Display for AlertEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\"{}\": {} px ({}ms ago)",
            self.window,
            self.matched_pixels,
            self.timestamp.elapsed().as_millis()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_keeps_full_title() {
        let event = AlertEvent::new("Sistema CMS - Estado 0042 - Operador", 7, Instant::now());
        let message = event.render_message("Сигнал обнаружен в окне {window}!");
        assert_eq!(
            message,
            "Сигнал обнаружен в окне Sistema CMS - Estado 0042 - Operador!"
        );
    }

    #[test]
    fn test_display_contains_title_and_count() {
        let event = AlertEvent::new("Estado 7", 12, Instant::now());
        let shown = event.to_string();
        assert!(shown.contains("\"Estado 7\""));
        assert!(shown.contains("12 px"));
    }
}
