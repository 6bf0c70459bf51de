use crate::error::{MonitorError, Result};
use crate::events::window::find_first_matching;
use crate::events::WindowInfo;
use crate::services::detection::IconRegion;
use image::RgbImage;
use std::sync::Arc;

/// Источник окон: перечисление видимых окон и захват их содержимого.
///
/// Methods are blocking; async callers must run them on a blocking thread.
pub trait WindowSource: Send + Sync {
    /// Все видимые окна в порядке, в котором их отдаёт система
    fn list_windows(&self) -> Result<Vec<WindowInfo>>;

    /// Захватить пиксели конкретного окна, даже если оно перекрыто другими
    fn capture(&self, window: &WindowInfo) -> Result<RgbImage>;

    /// Заголовки окон, содержащие `filter` (с учётом регистра)
    fn list_candidate_windows(&self, filter: &str) -> Result<Vec<String>> {
        Ok(self
            .list_windows()?
            .into_iter()
            .filter(|window| window.matches_filter(filter))
            .map(|window| window.title)
            .collect())
    }

    /// Захват первого окна, заголовок которого содержит `title` без учёта регистра
    fn capture_window_image(&self, title: &str) -> Result<RgbImage> {
        let windows = self.list_windows()?;
        let window = find_first_matching(&windows, title)
            .ok_or_else(|| MonitorError::WindowNotFound(title.to_string()))?;
        self.capture(window)
    }
}

/// Factory function to create an appropriate window source based on the dry_run flag
pub fn create_window_source(
    region: IconRegion,
    dry_run: bool,
) -> Result<Arc<dyn WindowSource>> {
    if dry_run {
        return Ok(Arc::new(super::dry_run::DryRunWindowSource::new(region)));
    }

    #[cfg(windows)]
    {
        Ok(Arc::new(super::gdi::GdiWindowSource::new()))
    }

    #[cfg(not(windows))]
    {
        Ok(Arc::new(super::x11::X11CliSource::new()))
    }
}
