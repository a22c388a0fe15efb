//! Format-agnostic access to slide levels and tiles.
//!
//! Implemented by [`SvsReader`](crate::format::SvsReader) and
//! [`GenericTiffReader`](crate::format::GenericTiffReader). Level geometry is
//! derived from the loaded [`LevelData`]; readers only supply tile bytes.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::TiffError;
use crate::format::LevelData;
use crate::io::RangeReader;

/// Snapshot of one level's geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelInfo {
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub tiles_x: u32,
    pub tiles_y: u32,
    /// Relative to level 0
    pub downsample: f64,
}

#[async_trait]
pub trait SlideReader: Send + Sync {
    /// Levels ordered from full resolution down.
    fn levels(&self) -> &[LevelData];

    fn level_count(&self) -> usize {
        self.levels().len()
    }

    /// Level 0 dimensions.
    fn dimensions(&self) -> Option<(u32, u32)> {
        self.level_dimensions(0)
    }

    fn level_dimensions(&self, level: usize) -> Option<(u32, u32)> {
        self.levels()
            .get(level)
            .map(|l| (l.level.width, l.level.height))
    }

    fn level_downsample(&self, level: usize) -> Option<f64> {
        self.levels().get(level).map(|l| l.level.downsample)
    }

    /// Stored tile size; edge tiles hold fewer valid pixels.
    fn tile_size(&self, level: usize) -> Option<(u32, u32)> {
        self.levels()
            .get(level)
            .map(|l| (l.level.tile_width, l.level.tile_height))
    }

    fn tile_count(&self, level: usize) -> Option<(u32, u32)> {
        self.levels()
            .get(level)
            .map(|l| (l.level.tiles_x, l.level.tiles_y))
    }

    fn level_info(&self, level: usize) -> Option<LevelInfo> {
        let (width, height) = self.level_dimensions(level)?;
        let (tile_width, tile_height) = self.tile_size(level)?;
        let (tiles_x, tiles_y) = self.tile_count(level)?;
        let downsample = self.level_downsample(level)?;

        Some(LevelInfo {
            width,
            height,
            tile_width,
            tile_height,
            tiles_x,
            tiles_y,
            downsample,
        })
    }

    /// Read a tile as a complete, decodable JPEG stream.
    async fn read_tile<R: RangeReader>(
        &self,
        reader: &R,
        level: usize,
        tile_x: u32,
        tile_y: u32,
    ) -> Result<Bytes, TiffError>;
}
