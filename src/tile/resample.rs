//! Deep Zoom pyramid over an in-memory bitmap.
//!
//! Every level is resampled straight from the source with a Catmull-Rom
//! filter; the top level is the source itself. Only the level being tiled is
//! kept, so memory stays at the source plus one level.

use async_trait::async_trait;
use image::imageops::{self, FilterType};
use image::RgbImage;
use tracing::debug;

use crate::dzi::{calculate_max_dzi_level, resampled_level_dimensions};
use crate::error::TileError;

use super::source::TileSource;

pub struct ResampledBitmap {
    source: RgbImage,
    overlap: u32,
    max_level: usize,
    current: Option<(usize, RgbImage)>,
}

impl ResampledBitmap {
    /// Tiles without overlap.
    pub fn new(source: RgbImage) -> Self {
        Self::with_overlap(source, 0)
    }

    pub fn with_overlap(source: RgbImage, overlap: u32) -> Self {
        let max_level = calculate_max_dzi_level(source.width(), source.height());
        Self {
            source,
            overlap,
            max_level,
            current: None,
        }
    }

    /// The resampled raster of `level`, computed on first use.
    pub fn level_image(&mut self, level: usize) -> Result<&RgbImage, TileError> {
        let (width, height) = self
            .level_dimensions(level)
            .ok_or(TileError::InvalidLevel {
                level,
                max_levels: self.level_count(),
            })?;

        if (width, height) == self.source.dimensions() {
            return Ok(&self.source);
        }

        if !matches!(self.current, Some((cached, _)) if cached == level) {
            debug!("Resampling level {} to {}x{}", level, width, height);
            let resized = imageops::resize(&self.source, width, height, FilterType::CatmullRom);
            self.current = Some((level, resized));
        }

        self.current
            .as_ref()
            .map(|(_, image)| image)
            .ok_or(TileError::InvalidLevel {
                level,
                max_levels: self.max_level + 1,
            })
    }
}

#[async_trait]
impl TileSource for ResampledBitmap {
    fn level_count(&self) -> usize {
        self.max_level + 1
    }

    fn level_dimensions(&self, level: usize) -> Option<(u32, u32)> {
        if level > self.max_level {
            return None;
        }
        Some(resampled_level_dimensions(
            self.source.width(),
            self.source.height(),
            level,
            self.max_level,
        ))
    }

    fn overlap(&self) -> u32 {
        self.overlap
    }

    async fn tile(&mut self, level: usize, col: u32, row: u32) -> Result<RgbImage, TileError> {
        let rect = self.tile_rect(level, col, row)?;
        let image = self.level_image(level)?;
        Ok(imageops::crop_imm(image, rect.x, rect.y, rect.width, rect.height).to_image())
    }
}
