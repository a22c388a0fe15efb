//! Deep Zoom pyramid over a whole slide.
//!
//! Deep Zoom levels are the full resolution halved (rounding up) until 1x1.
//! Each level is rendered from the slide level with the largest downsample
//! not exceeding the Deep Zoom downsample:
//!
//! ```text
//! dz level L ── downsample 2^(count-1-L) ──▶ slide level k, residual scale s
//! tile rect (z pixels) ── * s ──▶ region of slide level k ──▶ resize to tile
//! ```
//!
//! Regions are read with [`Slide::read_region`], so slide tiles shared by
//! neighbouring output tiles are decoded once.

use async_trait::async_trait;
use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::dzi::{
    calculate_max_dzi_level, dzi_level_dimensions, dzi_level_downsample, find_best_wsi_level,
    OVERLAP, TILE_SIZE,
};
use crate::error::TileError;
use crate::io::RangeReader;
use crate::slide::Slide;

use super::source::{TileRect, TileSource};

/// Where a Deep Zoom tile comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileRegion {
    pub slide_level: usize,
    /// Top-left corner in slide level pixels
    pub x: i64,
    pub y: i64,
    /// Size of the region read from the slide level
    pub width: u32,
    pub height: u32,
    /// Size of the output tile
    pub tile: TileRect,
}

/// Map `[start, start + len)` in Deep Zoom pixels onto a slide level of
/// length `limit`, with `scale` slide pixels per Deep Zoom pixel.
///
/// The far edge is clamped to the slide level; the result is at least one
/// pixel long.
fn source_span(scale: f64, start: u32, len: u32, limit: u32) -> (i64, u32) {
    let origin = scale * start as f64;
    let wanted = (scale * len as f64).ceil() as i64;
    let available = limit as i64 - origin.ceil() as i64;
    (origin.floor() as i64, wanted.min(available).max(1) as u32)
}

pub struct DeepZoomGenerator<R: RangeReader> {
    slide: Slide<R>,
    tile_size: u32,
    overlap: u32,
    /// Smallest level first
    z_dimensions: Vec<(u32, u32)>,
    slide_downsamples: Vec<f64>,
}

impl<R: RangeReader> DeepZoomGenerator<R> {
    /// Generator with 254 px tiles and 1 px overlap.
    pub fn new(slide: Slide<R>) -> Result<Self, TileError> {
        Self::with_tiling(slide, TILE_SIZE, OVERLAP)
    }

    pub fn with_tiling(slide: Slide<R>, tile_size: u32, overlap: u32) -> Result<Self, TileError> {
        let (width, height) = slide.dimensions().ok_or(TileError::InvalidLevel {
            level: 0,
            max_levels: 0,
        })?;

        let max_level = calculate_max_dzi_level(width, height);
        let z_dimensions = (0..=max_level)
            .map(|level| dzi_level_dimensions(width, height, level, max_level))
            .collect();
        let slide_downsamples = slide.level_downsamples();

        Ok(Self {
            slide,
            tile_size: tile_size.max(1),
            overlap,
            z_dimensions,
            slide_downsamples,
        })
    }

    /// Locate the slide pixels behind tile (`col`, `row`) of `level`.
    pub fn tile_region(&self, level: usize, col: u32, row: u32) -> Result<TileRegion, TileError> {
        let tile = self.tile_rect(level, col, row)?;

        let dz_downsample = dzi_level_downsample(level, self.level_count() - 1);
        let (slide_level, scale) = find_best_wsi_level(&self.slide_downsamples, dz_downsample)
            .ok_or(TileError::InvalidLevel {
                level: 0,
                max_levels: 0,
            })?;
        let (limit_w, limit_h) =
            self.slide
                .level_dimensions(slide_level)
                .ok_or(TileError::InvalidLevel {
                    level: slide_level,
                    max_levels: self.slide.level_count(),
                })?;

        let (x, width) = source_span(scale, tile.x, tile.width, limit_w);
        let (y, height) = source_span(scale, tile.y, tile.height, limit_h);

        Ok(TileRegion {
            slide_level,
            x,
            y,
            width,
            height,
            tile,
        })
    }
}

#[async_trait]
impl<R: RangeReader> TileSource for DeepZoomGenerator<R> {
    fn level_count(&self) -> usize {
        self.z_dimensions.len()
    }

    fn level_dimensions(&self, level: usize) -> Option<(u32, u32)> {
        self.z_dimensions.get(level).copied()
    }

    fn tile_size(&self) -> u32 {
        self.tile_size
    }

    fn overlap(&self) -> u32 {
        self.overlap
    }

    async fn tile(&mut self, level: usize, col: u32, row: u32) -> Result<RgbImage, TileError> {
        let region = self.tile_region(level, col, row)?;
        let pixels = self
            .slide
            .read_region(
                region.slide_level,
                region.x,
                region.y,
                region.width,
                region.height,
            )
            .await?;

        let (tile_w, tile_h) = (region.tile.width, region.tile.height);
        if pixels.dimensions() == (tile_w, tile_h) {
            Ok(pixels)
        } else {
            Ok(imageops::resize(&pixels, tile_w, tile_h, FilterType::Lanczos3))
        }
    }
}
