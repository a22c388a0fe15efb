//! Generic pyramidal TIFF reader.
//!
//! Supports tiled, JPEG compressed TIFF files with at least one pyramid
//! level. Other TIFF files fail validation with errors that route the input
//! to the bitmap pipeline.
//!
//! The level loading and tile reading helpers here are shared with the SVS
//! reader.

use async_trait::async_trait;
use bytes::Bytes;
use tracing::warn;

use crate::error::TiffError;
use crate::io::RangeReader;
use crate::slide::SlideReader;

use super::jpeg::prepare_tile_jpeg;
use super::tiff::{
    validate_pyramid, PyramidLevel, TiffHeader, TiffPyramid, TileData, PHOTOMETRIC_RGB,
};

// =============================================================================
// Level Data
// =============================================================================

/// A pyramid level with its tile offset table loaded.
#[derive(Debug, Clone)]
pub struct LevelData {
    pub level: PyramidLevel,
    pub tile_data: TileData,
}

impl LevelData {
    pub fn get_tile_location(&self, tile_x: u32, tile_y: u32) -> Option<(u64, u64)> {
        let tile_index = self.level.tile_index(tile_x, tile_y)?;
        self.tile_data.get_tile_location(tile_index)
    }

    pub fn jpeg_tables(&self) -> Option<&Bytes> {
        self.tile_data.jpeg_tables.as_ref()
    }

    /// Tiles store RGB samples instead of YCbCr.
    pub fn is_rgb(&self) -> bool {
        self.level.photometric == Some(PHOTOMETRIC_RGB)
    }
}

/// Parse, validate and load tile tables for every level of a slide.
///
/// Validation warnings are logged against the reader's identifier.
pub(crate) async fn open_levels<R: RangeReader>(
    reader: &R,
) -> Result<(TiffPyramid, Vec<LevelData>), TiffError> {
    let pyramid = TiffPyramid::parse(reader).await?;

    let validation = validate_pyramid(&pyramid);
    for warning in &validation.warnings {
        warn!("{}: {}", reader.identifier(), warning);
    }
    validation.into_result()?;

    let mut levels = Vec::with_capacity(pyramid.levels.len());
    for level in &pyramid.levels {
        let tile_data = TileData::load(reader, level, &pyramid.header).await?;
        levels.push(LevelData {
            level: level.clone(),
            tile_data,
        });
    }

    Ok((pyramid, levels))
}

/// Read a tile's bytes and turn them into a complete JPEG stream.
pub(crate) async fn read_level_tile<R: RangeReader>(
    reader: &R,
    levels: &[LevelData],
    level: usize,
    tile_x: u32,
    tile_y: u32,
) -> Result<Bytes, TiffError> {
    let level_data = levels.get(level).ok_or_else(|| TiffError::InvalidTagValue {
        tag: "level",
        message: format!("level {} out of range (have {})", level, levels.len()),
    })?;

    let (offset, size) =
        level_data
            .get_tile_location(tile_x, tile_y)
            .ok_or_else(|| TiffError::InvalidTagValue {
                tag: "tile",
                message: format!(
                    "tile ({}, {}) out of range for level {}",
                    tile_x, tile_y, level
                ),
            })?;

    let raw = reader.read_exact_at(offset, size as usize).await?;
    Ok(prepare_tile_jpeg(
        level_data.jpeg_tables().map(|t| t.as_ref()),
        &raw,
        level_data.is_rgb(),
    ))
}

// =============================================================================
// Generic TIFF Reader
// =============================================================================

#[derive(Debug)]
pub struct GenericTiffReader {
    pyramid: TiffPyramid,
    levels: Vec<LevelData>,
}

impl GenericTiffReader {
    /// Open a pyramidal TIFF.
    ///
    /// Fails with `StripOrganization`, `UnsupportedCompression` or
    /// `NoPyramidLevels` for TIFF files that are not tiled JPEG pyramids.
    pub async fn open<R: RangeReader>(reader: &R) -> Result<Self, TiffError> {
        let (pyramid, levels) = open_levels(reader).await?;
        Ok(GenericTiffReader { pyramid, levels })
    }

    pub fn header(&self) -> &TiffHeader {
        &self.pyramid.header
    }
}

#[async_trait]
impl SlideReader for GenericTiffReader {
    fn levels(&self) -> &[LevelData] {
        &self.levels
    }

    async fn read_tile<R: RangeReader>(
        &self,
        reader: &R,
        level: usize,
        tile_x: u32,
        tile_y: u32,
    ) -> Result<Bytes, TiffError> {
        read_level_tile(reader, &self.levels, level, tile_x, tile_y).await
    }
}
