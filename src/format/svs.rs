//! Aperio SVS reader.
//!
//! SVS files are pyramidal TIFFs whose first IFD carries an Aperio
//! ImageDescription:
//!
//! ```text
//! Aperio Image Library v12.0.5
//! 46000x32914 [0,100 46000x32914] (256x256) JPEG/RGB Q=30|AppMag = 20|MPP = 0.4990
//! ```
//!
//! Tiles are abbreviated JPEG streams completed from the level's JPEGTables.
//! Pyramid handling is shared with [`GenericTiffReader`](super::GenericTiffReader);
//! this reader adds the metadata.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::TiffError;
use crate::io::RangeReader;
use crate::slide::SlideReader;

use super::generic_tiff::{open_levels, read_level_tile, LevelData};
use super::tiff::{TiffHeader, TiffPyramid, TiffTag, ValueReader};

// =============================================================================
// SVS Metadata
// =============================================================================

/// Properties parsed from the Aperio ImageDescription.
#[derive(Debug, Clone, Default)]
pub struct SvsMetadata {
    /// Microns per pixel
    pub mpp: Option<f64>,
    /// Objective magnification
    pub magnification: Option<f64>,
}

impl SvsMetadata {
    pub fn parse(description: &str) -> Self {
        let mut metadata = SvsMetadata::default();

        for part in description.split('|') {
            let Some((key, value)) = part.split_once('=') else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());

            match key {
                "MPP" => metadata.mpp = value.parse().ok(),
                "AppMag" => metadata.magnification = value.parse().ok(),
                _ => {}
            }
        }

        metadata
    }
}

// =============================================================================
// SVS Reader
// =============================================================================

#[derive(Debug)]
pub struct SvsReader {
    pyramid: TiffPyramid,
    levels: Vec<LevelData>,
    metadata: SvsMetadata,
}

impl SvsReader {
    pub async fn open<R: RangeReader>(reader: &R) -> Result<Self, TiffError> {
        let (pyramid, levels) = open_levels(reader).await?;
        let metadata = Self::read_metadata(reader, &pyramid).await?;

        Ok(SvsReader {
            pyramid,
            levels,
            metadata,
        })
    }

    /// Metadata comes from the full resolution level's ImageDescription.
    async fn read_metadata<R: RangeReader>(
        reader: &R,
        pyramid: &TiffPyramid,
    ) -> Result<SvsMetadata, TiffError> {
        let entry = pyramid
            .levels
            .first()
            .and_then(|level| level.ifd.get_entry_by_tag(TiffTag::ImageDescription));

        match entry {
            Some(entry) => {
                let values = ValueReader::new(reader, &pyramid.header);
                Ok(SvsMetadata::parse(&values.read_string(entry).await?))
            }
            None => Ok(SvsMetadata::default()),
        }
    }

    pub fn header(&self) -> &TiffHeader {
        &self.pyramid.header
    }

    pub fn metadata(&self) -> &SvsMetadata {
        &self.metadata
    }
}

#[async_trait]
impl SlideReader for SvsReader {
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
