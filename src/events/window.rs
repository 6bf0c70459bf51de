use serde::{Deserialize, Serialize};
use std::fmt;

/// Информация об окне, полученная от источника окон
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowInfo {
    pub title: String,
    /// Нативный идентификатор окна (X11 id, HWND и т.п.), если он известен
    pub id: Option<String>,
    pub geometry: Option<WindowGeometry>,
}

impl WindowInfo {
    pub fn new(title: String) -> Self {
        Self {
            title,
            id: None,
            geometry: None,
        }
    }

    pub fn with_id(mut self, id: String) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_geometry(mut self, geometry: WindowGeometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    /// Отбор кандидатов для списка выбора (с учётом регистра)
    pub fn matches_filter(&self, filter: &str) -> bool {
        self.title.contains(filter)
    }

    /// Поиск окна для захвата (регистронезависимо)
    pub fn matches_pattern(&self, pattern: &str) -> bool {
        if pattern.is_empty() {
            return true;
        }
        self.title.to_lowercase().contains(&pattern.to_lowercase())
    }
}

impl fmt::Display for WindowInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "\"{}\" ({})", self.title, id),
            None => write!(f, "\"{}\"", self.title),
        }
    }
}

/// Геометрия окна
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowGeometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Первое окно, заголовок которого содержит `pattern` без учёта регистра
pub fn find_first_matching<'a>(windows: &'a [WindowInfo], pattern: &str) -> Option<&'a WindowInfo> {
    windows.iter().find(|window| window.matches_pattern(pattern))
}
