//! The tile source abstraction shared by both pyramid backends.
//!
//! A [`TileSource`] describes a Deep Zoom pyramid (levels numbered from the
//! 1x1 level up to full resolution) and produces the pixels of any tile.
//! The pipeline driver only talks to this trait.

use async_trait::async_trait;
use image::RgbImage;

use crate::dzi::{dzi_tile_count, TILE_SIZE};
use crate::error::TileError;

/// Pixel rectangle of one tile within its level, overlap included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Start and length of tile `t` of `count` along one axis of length `dim`.
///
/// Overlap is added before the tile unless it is the first and after it
/// unless it is the last.
fn axis_span(t: u32, count: u32, dim: u32, tile_size: u32, overlap: u32) -> (u32, u32) {
    let before = if t != 0 { overlap } else { 0 };
    let after = if t + 1 != count { overlap } else { 0 };

    let origin = tile_size * t;
    let start = origin.saturating_sub(before);
    let len = tile_size.min(dim.saturating_sub(origin)) + before + after;
    (start, len.min(dim.saturating_sub(start)))
}

/// Rectangle of tile (`col`, `row`) in a level of `level_dims`.
pub fn tile_rect(
    level_dims: (u32, u32),
    grid: (u32, u32),
    col: u32,
    row: u32,
    tile_size: u32,
    overlap: u32,
) -> TileRect {
    let (x, width) = axis_span(col, grid.0, level_dims.0, tile_size, overlap);
    let (y, height) = axis_span(row, grid.1, level_dims.1, tile_size, overlap);
    TileRect {
        x,
        y,
        width,
        height,
    }
}

/// A Deep Zoom pyramid that can render its tiles.
#[async_trait]
pub trait TileSource: Send {
    /// Number of levels; level 0 is the smallest.
    fn level_count(&self) -> usize;

    /// `None` outside `0..level_count()`.
    fn level_dimensions(&self, level: usize) -> Option<(u32, u32)>;

    /// Tile edge length excluding overlap.
    fn tile_size(&self) -> u32 {
        TILE_SIZE
    }

    /// Extra pixels shared with each neighbouring tile.
    fn overlap(&self) -> u32;

    /// Full resolution dimensions, i.e. those of the last level.
    fn dimensions(&self) -> Option<(u32, u32)> {
        self.level_dimensions(self.level_count().checked_sub(1)?)
    }

    /// Columns and rows of a level.
    fn grid_size(&self, level: usize) -> Option<(u32, u32)> {
        let (width, height) = self.level_dimensions(level)?;
        Some(dzi_tile_count(width, height, self.tile_size()))
    }

    /// Bounds-checked rectangle of a tile.
    fn tile_rect(&self, level: usize, col: u32, row: u32) -> Result<TileRect, TileError> {
        let invalid_level = || TileError::InvalidLevel {
            level,
            max_levels: self.level_count(),
        };
        let dims = self.level_dimensions(level).ok_or_else(invalid_level)?;
        let grid = self.grid_size(level).ok_or_else(invalid_level)?;

        if col >= grid.0 || row >= grid.1 {
            return Err(TileError::TileOutOfBounds {
                level,
                x: col,
                y: row,
                max_x: grid.0,
                max_y: grid.1,
            });
        }

        Ok(tile_rect(
            dims,
            grid,
            col,
            row,
            self.tile_size(),
            self.overlap(),
        ))
    }

    /// Render tile (`col`, `row`) of `level`.
    async fn tile(&mut self, level: usize, col: u32, row: u32) -> Result<RgbImage, TileError>;
}
