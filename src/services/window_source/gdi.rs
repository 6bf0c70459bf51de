use crate::error::{MonitorError, Result};
use crate::events::{WindowGeometry, WindowInfo};
use image::RgbImage;
use std::mem;
use tracing::debug;
use windows_sys::core::BOOL;
use windows_sys::Win32::Foundation::{HWND, LPARAM, RECT};
use windows_sys::Win32::Graphics::Gdi::{
    CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDIBits, GetWindowDC,
    ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS, HBITMAP, HDC,
    HGDIOBJ,
};
use windows_sys::Win32::Storage::Xps::PrintWindow;
use windows_sys::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetWindowRect, GetWindowTextLengthW, GetWindowTextW, IsWindowVisible,
};

use super::r#trait::WindowSource;

// Рендерит и окна с аппаратным ускорением (DirectComposition)
const PW_RENDERFULLCONTENT: u32 = 2;

/// Источник окон через Win32: EnumWindows + PrintWindow в совместимый bitmap.
pub struct GdiWindowSource;

impl GdiWindowSource {
    pub fn new() -> Self {
        Self
    }
}

// Каждый GDI-ресурс освобождается в Drop, поэтому ранний return не даёт утечек.

struct WindowDc {
    hwnd: HWND,
    hdc: HDC,
}

impl Drop for WindowDc {
    fn drop(&mut self) {
        unsafe {
            ReleaseDC(self.hwnd, self.hdc);
        }
    }
}

struct MemoryDc(HDC);

impl Drop for MemoryDc {
    fn drop(&mut self) {
        unsafe {
            DeleteDC(self.0);
        }
    }
}

struct Bitmap(HBITMAP);

impl Drop for Bitmap {
    fn drop(&mut self) {
        unsafe {
            DeleteObject(self.0 as HGDIOBJ);
        }
    }
}

/// Возвращает прежний объект в DC до удаления bitmap
struct Selection {
    hdc: HDC,
    previous: HGDIOBJ,
}

impl Drop for Selection {
    fn drop(&mut self) {
        unsafe {
            SelectObject(self.hdc, self.previous);
        }
    }
}

fn hwnd_to_id(hwnd: HWND) -> String {
    format!("{:#x}", hwnd as usize)
}

fn id_to_hwnd(id: &str) -> Option<HWND> {
    let raw = usize::from_str_radix(id.trim_start_matches("0x"), 16).ok()?;
    Some(raw as HWND)
}

unsafe fn window_title(hwnd: HWND) -> Option<String> {
    let len = GetWindowTextLengthW(hwnd);
    if len <= 0 {
        return None;
    }

    let mut buffer = vec![0u16; len as usize + 1];
    let copied = GetWindowTextW(hwnd, buffer.as_mut_ptr(), buffer.len() as i32);
    if copied <= 0 {
        return None;
    }

    Some(String::from_utf16_lossy(&buffer[..copied as usize]))
}

unsafe fn window_rect(hwnd: HWND) -> Option<RECT> {
    let mut rect: RECT = mem::zeroed();
    if GetWindowRect(hwnd, &mut rect) == 0 {
        return None;
    }
    Some(rect)
}

unsafe extern "system" fn collect_visible(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let windows = &mut *(lparam as *mut Vec<WindowInfo>);

    if IsWindowVisible(hwnd) != 0 {
        if let Some(title) = window_title(hwnd) {
            let mut window = WindowInfo::new(title).with_id(hwnd_to_id(hwnd));
            if let Some(rect) = window_rect(hwnd) {
                window = window.with_geometry(WindowGeometry {
                    x: rect.left,
                    y: rect.top,
                    width: (rect.right - rect.left).max(0) as u32,
                    height: (rect.bottom - rect.top).max(0) as u32,
                });
            }
            windows.push(window);
        }
    }

    // Продолжаем перечисление
    1
}

fn capture_hwnd(hwnd: HWND, title: &str) -> Result<RgbImage> {
    let failure = |reason: &str| MonitorError::CaptureFailure {
        window: title.to_string(),
        reason: reason.to_string(),
    };

    unsafe {
        let rect = window_rect(hwnd).ok_or_else(|| failure("GetWindowRect не удался"))?;
        let width = rect.right - rect.left;
        let height = rect.bottom - rect.top;
        if width <= 0 || height <= 0 {
            return Err(failure("окно имеет нулевой размер (свёрнуто?)"));
        }

        let hdc = GetWindowDC(hwnd);
        if hdc.is_null() {
            return Err(failure("GetWindowDC не удался"));
        }
        let window_dc = WindowDc { hwnd, hdc };

        let memory = CreateCompatibleDC(window_dc.hdc);
        if memory.is_null() {
            return Err(failure("CreateCompatibleDC не удался"));
        }
        let memory_dc = MemoryDc(memory);

        let raw_bitmap = CreateCompatibleBitmap(window_dc.hdc, width, height);
        if raw_bitmap.is_null() {
            return Err(failure("CreateCompatibleBitmap не удался"));
        }
        let bitmap = Bitmap(raw_bitmap);

        {
            let previous = SelectObject(memory_dc.0, bitmap.0 as HGDIOBJ);
            let _selection = Selection {
                hdc: memory_dc.0,
                previous,
            };

            if PrintWindow(hwnd, memory_dc.0, PW_RENDERFULLCONTENT) == 0 {
                return Err(failure("PrintWindow вернул ошибку"));
            }
        }

        // GetDIBits требует, чтобы bitmap не был выбран в DC
        let mut info: BITMAPINFO = mem::zeroed();
        info.bmiHeader.biSize = mem::size_of::<BITMAPINFOHEADER>() as u32;
        info.bmiHeader.biWidth = width;
        info.bmiHeader.biHeight = -height; // top-down
        info.bmiHeader.biPlanes = 1;
        info.bmiHeader.biBitCount = 32;
        info.bmiHeader.biCompression = BI_RGB as _;

        let mut bgrx = vec![0u8; width as usize * height as usize * 4];
        let lines = GetDIBits(
            memory_dc.0,
            bitmap.0,
            0,
            height as u32,
            bgrx.as_mut_ptr().cast(),
            &mut info,
            DIB_RGB_COLORS,
        );
        if lines != height {
            return Err(failure("GetDIBits вернул неполное изображение"));
        }

        let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
        for pixel in bgrx.chunks_exact(4) {
            rgb.extend_from_slice(&[pixel[2], pixel[1], pixel[0]]);
        }

        RgbImage::from_raw(width as u32, height as u32, rgb)
            .ok_or_else(|| failure("размер буфера не совпадает с размером окна"))
    }
}

impl WindowSource for GdiWindowSource {
    fn list_windows(&self) -> Result<Vec<WindowInfo>> {
        let mut windows: Vec<WindowInfo> = Vec::new();
        let ok = unsafe { EnumWindows(Some(collect_visible), &mut windows as *mut _ as LPARAM) };
        if ok == 0 {
            return Err(MonitorError::Internal("EnumWindows не удался".to_string()));
        }
        debug!("EnumWindows вернул {} видимых окон", windows.len());
        Ok(windows)
    }

    fn capture(&self, window: &WindowInfo) -> Result<RgbImage> {
        let hwnd = window
            .id
            .as_deref()
            .and_then(id_to_hwnd)
            .ok_or_else(|| MonitorError::CaptureFailure {
                window: window.title.clone(),
                reason: "у окна нет HWND".to_string(),
            })?;

        debug!("Захват окна {} через PrintWindow", window);
        capture_hwnd(hwnd, &window.title)
    }
}
