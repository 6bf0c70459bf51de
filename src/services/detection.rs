//! Region extraction and color-mask counting.
//!
//! Pure functions only: no capture, no timing, no logging. The monitor worker
//! feeds captured images through here on every poll iteration.

use crate::error::{MonitorError, Result};
use image::{imageops, Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Фиксированная область иконки относительно левого верхнего угла окна
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IconRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl IconRegion {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Помещается ли область в изображение заданного размера
    pub fn fits(&self, image_width: u32, image_height: u32) -> bool {
        let right = u64::from(self.x) + u64::from(self.width);
        let bottom = u64::from(self.y) + u64::from(self.height);
        right <= u64::from(image_width) && bottom <= u64::from(image_height)
    }
}

impl fmt::Display for IconRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}) {}x{}", self.x, self.y, self.width, self.height)
    }
}

/// Включительный диапазон цвета по каждому из трёх каналов
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColorRange {
    lower: [u8; 3],
    upper: [u8; 3],
}

impl ColorRange {
    pub fn new(lower: [u8; 3], upper: [u8; 3]) -> Result<Self> {
        if lower.iter().zip(upper.iter()).any(|(lo, hi)| lo > hi) {
            return Err(MonitorError::Config(anyhow::anyhow!(
                "Нижняя граница цвета {:?} больше верхней {:?}",
                lower,
                upper
            )));
        }
        Ok(Self { lower, upper })
    }

    pub fn lower(&self) -> [u8; 3] {
        self.lower
    }

    pub fn upper(&self) -> [u8; 3] {
        self.upper
    }

    #[inline]
    pub fn contains(&self, pixel: &Rgb<u8>) -> bool {
        pixel
            .0
            .iter()
            .zip(self.lower.iter().zip(self.upper.iter()))
            .all(|(channel, (lo, hi))| lo <= channel && channel <= hi)
    }
}

impl fmt::Display for ColorRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}..={:?}", self.lower, self.upper)
    }
}

/// Вырезать область иконки из захваченного изображения окна
pub fn extract_region(image: &RgbImage, region: &IconRegion) -> Result<RgbImage> {
    if !region.fits(image.width(), image.height()) {
        return Err(MonitorError::RegionOutOfBounds {
            region: region.to_string(),
            image_width: image.width(),
            image_height: image.height(),
        });
    }

    Ok(imageops::crop_imm(image, region.x, region.y, region.width, region.height).to_image())
}

/// Количество пикселей, у которых все три канала попадают в диапазон
pub fn count_matching_pixels(image: &RgbImage, range: &ColorRange) -> usize {
    image.pixels().filter(|pixel| range.contains(pixel)).count()
}

pub fn exceeds_threshold(count: usize, threshold: u32) -> bool {
    count as u64 >= u64::from(threshold)
}
