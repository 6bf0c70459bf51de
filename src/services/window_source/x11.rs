use crate::error::{MonitorError, Result};
use crate::events::{WindowGeometry, WindowInfo};
use image::{ImageFormat, RgbImage};
use std::collections::HashSet;
use std::process::Command;
use tracing::debug;

use super::r#trait::WindowSource;

/// Источник окон для X11: список через `wmctrl -lG`, видимость через `xdotool`,
/// захват через ImageMagick `import`.
///
/// `import -window <id>` reads the window's own drawable, so the image does
/// not depend on stacking order under a compositing window manager.
pub struct X11CliSource;

impl X11CliSource {
    pub fn new() -> Self {
        Self
    }
}

/// Разбор строки `wmctrl -lG`: `<id> <desktop> <x> <y> <w> <h> <host> <title...>`
fn parse_wmctrl_line(line: &str) -> Option<WindowInfo> {
    let mut rest = line.trim_start();
    let mut fields = Vec::with_capacity(7);

    for _ in 0..7 {
        let (field, tail) = match rest.split_once(char::is_whitespace) {
            Some(split) => split,
            None => (rest, ""),
        };
        if field.is_empty() {
            return None;
        }
        fields.push(field);
        rest = tail.trim_start();
    }

    let title = rest.trim_end();
    if title.is_empty() {
        return None;
    }

    // Окна на desktop -1 (sticky) тоже видимы, поэтому desktop не фильтруем
    let geometry = match (
        fields[2].parse::<i32>(),
        fields[3].parse::<i32>(),
        fields[4].parse::<u32>(),
        fields[5].parse::<u32>(),
    ) {
        (Ok(x), Ok(y), Ok(width), Ok(height)) => Some(WindowGeometry {
            x,
            y,
            width,
            height,
        }),
        _ => None,
    };

    let mut window = WindowInfo::new(title.to_string()).with_id(fields[0].to_string());
    if let Some(geometry) = geometry {
        window = window.with_geometry(geometry);
    }
    Some(window)
}

/// X11 идентификатор окна: wmctrl печатает hex (`0x03a00003`), xdotool - десятичный
fn parse_window_id(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}

fn parse_visible_ids(stdout: &str) -> HashSet<u64> {
    stdout.lines().filter_map(parse_window_id).collect()
}

/// Оставить только отображаемые окна: свёрнутые (unmapped) выпадают из списка
fn retain_visible(windows: Vec<WindowInfo>, visible: &HashSet<u64>) -> Vec<WindowInfo> {
    windows
        .into_iter()
        .filter(|window| {
            window
                .id
                .as_deref()
                .and_then(parse_window_id)
                .is_some_and(|id| visible.contains(&id))
        })
        .collect()
}

fn managed_windows() -> Result<Vec<WindowInfo>> {
    let output = Command::new("wmctrl")
        .args(["-lG"])
        .output()
        .map_err(|e| MonitorError::Internal(format!("wmctrl не найден: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(MonitorError::Internal(format!(
            "wmctrl вернул ошибку: {}",
            stderr.trim()
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout.lines().filter_map(parse_wmctrl_line).collect())
}

fn visible_window_ids() -> Result<HashSet<u64>> {
    let output = Command::new("xdotool")
        .args(["search", "--onlyvisible", "--name", "."])
        .output()
        .map_err(|e| MonitorError::Internal(format!("xdotool не найден: {}", e)))?;

    // Пустой поиск xdotool завершается с кодом 1 без текста ошибки
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !output.status.success() && !stderr.trim().is_empty() {
        return Err(MonitorError::Internal(format!(
            "xdotool вернул ошибку: {}",
            stderr.trim()
        )));
    }

    Ok(parse_visible_ids(&String::from_utf8_lossy(&output.stdout)))
}

impl WindowSource for X11CliSource {
    fn list_windows(&self) -> Result<Vec<WindowInfo>> {
        let managed = managed_windows()?;
        let total = managed.len();
        let windows = retain_visible(managed, &visible_window_ids()?);
        debug!("wmctrl вернул {} окон, видимых {}", total, windows.len());

        Ok(windows)
    }

    fn capture(&self, window: &WindowInfo) -> Result<RgbImage> {
        let Some(id) = window.id.as_deref() else {
            return MonitorError::capture_failure(&window.title, "у окна нет X11 идентификатора");
        };

        debug!("Захват окна {} через import", window);
        let output = Command::new("import")
            .args(["-silent", "-window", id, "ppm:-"])
            .output()
            .map_err(|e| MonitorError::CaptureFailure {
                window: window.title.clone(),
                reason: format!("import не найден: {}", e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return MonitorError::capture_failure(&window.title, stderr.trim());
        }

        let image = image::load_from_memory_with_format(&output.stdout, ImageFormat::Pnm)
            .map_err(|e| MonitorError::CaptureFailure {
                window: window.title.clone(),
                reason: format!("не удалось декодировать PPM: {}", e),
            })?;

        Ok(image.to_rgb8())
    }
}
