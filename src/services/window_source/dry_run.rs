use crate::error::{MonitorError, Result};
use crate::events::{WindowGeometry, WindowInfo};
use crate::services::detection::IconRegion;
use dashmap::DashMap;
use image::{Rgb, RgbImage};
use tracing::info;

const FAKE_WINDOWS: [&str; 4] = [
    "Estado 01 - dry_run",
    "Estado 02 - dry_run",
    "Estado 03 - dry_run",
    "Editor - dry_run",
];

const FRAME_WIDTH: u32 = 320;
const FRAME_HEIGHT: u32 = 200;

/// Эмуляция окон: иконка становится красной на каждом `alert_every`-м захвате
pub struct DryRunWindowSource {
    region: IconRegion,
    alert_every: u64,
    captures: DashMap<String, u64>,
}

impl DryRunWindowSource {
    pub fn new(region: IconRegion) -> Self {
        info!("Dry-run режим - WindowSource работает в режиме эмуляции");
        Self {
            region,
            alert_every: 3,
            captures: DashMap::new(),
        }
    }

    #[cfg(test)]
    pub fn with_alert_every(mut self, alert_every: u64) -> Self {
        self.alert_every = alert_every.max(1);
        self
    }

    fn render_frame(&self, signal: bool) -> RgbImage {
        let mut frame = RgbImage::from_pixel(FRAME_WIDTH, FRAME_HEIGHT, Rgb([32, 32, 32]));
        if signal {
            let right = self.region.x.saturating_add(self.region.width).min(FRAME_WIDTH);
            let bottom = self.region.y.saturating_add(self.region.height).min(FRAME_HEIGHT);
            for y in self.region.y..bottom {
                for x in self.region.x..right {
                    frame.put_pixel(x, y, Rgb([230, 20, 20]));
                }
            }
        }
        frame
    }
}

impl super::r#trait::WindowSource for DryRunWindowSource {
    fn list_windows(&self) -> Result<Vec<WindowInfo>> {
        Ok(FAKE_WINDOWS
            .iter()
            .enumerate()
            .map(|(i, title)| {
                WindowInfo::new(title.to_string())
                    .with_id(format!("dry-{}", i))
                    .with_geometry(WindowGeometry {
                        x: 0,
                        y: 0,
                        width: FRAME_WIDTH,
                        height: FRAME_HEIGHT,
                    })
            })
            .collect())
    }

    fn capture(&self, window: &WindowInfo) -> Result<RgbImage> {
        if !FAKE_WINDOWS.contains(&window.title.as_str()) {
            return Err(MonitorError::WindowNotFound(window.title.clone()));
        }

        let count = {
            let mut entry = self.captures.entry(window.title.clone()).or_insert(0);
            *entry += 1;
            *entry
        };

        let signal = count % self.alert_every == 0;
        if signal {
            info!("Dry-run: эмулируем сигнал в окне {} (захват #{})", window, count);
        }

        Ok(self.render_frame(signal))
    }
}
