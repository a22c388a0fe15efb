//! An opened whole slide: detected format, cached reader and decoded tiles.
//!
//! Opening runs format detection, wraps the file in a [`BlockCache`] and
//! loads the pyramid. [`Slide::read_region`] assembles arbitrary rectangles
//! of a level from decoded slide tiles, which is what the Deep Zoom
//! generator samples from.

use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use image::{imageops, Rgb, RgbImage};
use lru::LruCache;
use tracing::{debug, info};

use crate::error::{FormatError, TiffError, TileError};
use crate::format::tiff::TiffHeader;
use crate::format::{detect_format, GenericTiffReader, LevelData, SlideFormat, SvsReader};
use crate::io::{BlockCache, RangeReader, DEFAULT_BLOCK_CACHE_CAPACITY, DEFAULT_BLOCK_SIZE};
use crate::tile::decode_jpeg;

use super::reader::{LevelInfo, SlideReader};

/// Default number of decoded slide tiles kept in memory.
pub const DEFAULT_TILE_CACHE_CAPACITY: usize = 64;

/// Pixels outside the slide are filled with white.
const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

/// Cache sizes used when opening a slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlideOptions {
    pub block_size: usize,
    pub cache_blocks: usize,
    pub cache_tiles: usize,
}

impl Default for SlideOptions {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            cache_blocks: DEFAULT_BLOCK_CACHE_CAPACITY,
            cache_tiles: DEFAULT_TILE_CACHE_CAPACITY,
        }
    }
}

/// Format-specific reader behind a [`Slide`].
///
/// An enum because `SlideReader::read_tile` is generic and the trait is not
/// object safe.
#[derive(Debug)]
enum SlideReaderInner {
    Svs(SvsReader),
    GenericTiff(GenericTiffReader),
}

#[async_trait]
impl SlideReader for SlideReaderInner {
    fn levels(&self) -> &[LevelData] {
        match self {
            SlideReaderInner::Svs(r) => r.levels(),
            SlideReaderInner::GenericTiff(r) => r.levels(),
        }
    }

    async fn read_tile<R: RangeReader>(
        &self,
        reader: &R,
        level: usize,
        tile_x: u32,
        tile_y: u32,
    ) -> Result<Bytes, TiffError> {
        match self {
            SlideReaderInner::Svs(r) => r.read_tile(reader, level, tile_x, tile_y).await,
            SlideReaderInner::GenericTiff(r) => {
                r.read_tile(reader, level, tile_x, tile_y).await
            }
        }
    }
}

fn log_header(identifier: &str, header: &TiffHeader) {
    debug!(
        "{}: {} {:?}",
        identifier,
        if header.is_bigtiff { "BigTIFF" } else { "TIFF" },
        header.byte_order
    );
}

type TileKey = (usize, u32, u32);

pub struct Slide<R: RangeReader> {
    format: SlideFormat,
    reader: BlockCache<R>,
    inner: SlideReaderInner,
    decoded: LruCache<TileKey, Arc<RgbImage>>,
}

impl<R: RangeReader> Slide<R> {
    /// Detect the format of `reader` and open it as a slide.
    ///
    /// Inputs that are not tiled JPEG pyramids fail with
    /// [`FormatError::UnsupportedFormat`].
    pub async fn open(reader: R, options: SlideOptions) -> Result<Self, FormatError> {
        let reader = BlockCache::with_capacity(reader, options.block_size, options.cache_blocks);

        let format = detect_format(&reader).await?;
        let inner = match format {
            SlideFormat::AperioSvs => {
                let svs = SvsReader::open(&reader)
                    .await
                    .map_err(FormatError::from_tiff)?;
                log_header(reader.identifier(), svs.header());
                let metadata = svs.metadata();
                info!(
                    "{}: Aperio slide, MPP {:?}, magnification {:?}",
                    reader.identifier(),
                    metadata.mpp,
                    metadata.magnification
                );
                SlideReaderInner::Svs(svs)
            }
            SlideFormat::GenericTiff => {
                let tiff = GenericTiffReader::open(&reader)
                    .await
                    .map_err(FormatError::from_tiff)?;
                log_header(reader.identifier(), tiff.header());
                SlideReaderInner::GenericTiff(tiff)
            }
        };

        for level in 0..inner.level_count() {
            if let Some(info) = inner.level_info(level) {
                debug!(
                    "{}: level {} is {}x{} ({}x{} tiles of {}x{}, downsample {:.3})",
                    reader.identifier(),
                    level,
                    info.width,
                    info.height,
                    info.tiles_x,
                    info.tiles_y,
                    info.tile_width,
                    info.tile_height,
                    info.downsample
                );
            }
        }

        let capacity = NonZeroUsize::new(options.cache_tiles).unwrap_or(NonZeroUsize::MIN);
        Ok(Slide {
            format,
            reader,
            inner,
            decoded: LruCache::new(capacity),
        })
    }

    pub fn format(&self) -> SlideFormat {
        self.format
    }

    pub fn identifier(&self) -> &str {
        self.reader.identifier()
    }

    pub fn level_count(&self) -> usize {
        self.inner.level_count()
    }

    /// Full resolution dimensions.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.inner.dimensions()
    }

    pub fn level_dimensions(&self, level: usize) -> Option<(u32, u32)> {
        self.inner.level_dimensions(level)
    }

    pub fn level_downsample(&self, level: usize) -> Option<f64> {
        self.inner.level_downsample(level)
    }

    pub fn level_info(&self, level: usize) -> Option<LevelInfo> {
        self.inner.level_info(level)
    }

    /// Downsamples of every level, full resolution first.
    pub fn level_downsamples(&self) -> Vec<f64> {
        self.inner
            .levels()
            .iter()
            .map(|data| data.level.downsample)
            .collect()
    }

    fn level_data(&self, level: usize) -> Result<&LevelData, TileError> {
        self.inner
            .levels()
            .get(level)
            .ok_or(TileError::InvalidLevel {
                level,
                max_levels: self.level_count(),
            })
    }

    /// Raw tile as a decodable JPEG stream.
    pub async fn read_tile(
        &self,
        level: usize,
        tile_x: u32,
        tile_y: u32,
    ) -> Result<Bytes, TileError> {
        let data = self.level_data(level)?;
        if data.level.tile_index(tile_x, tile_y).is_none() {
            return Err(TileError::TileOutOfBounds {
                level,
                x: tile_x,
                y: tile_y,
                max_x: data.level.tiles_x,
                max_y: data.level.tiles_y,
            });
        }

        Ok(self
            .inner
            .read_tile(&self.reader, level, tile_x, tile_y)
            .await?)
    }

    /// Decoded tile pixels, from the LRU when possible.
    ///
    /// Edge tiles keep their stored padding; see
    /// [`PyramidLevel::tile_dimensions`](crate::format::tiff::PyramidLevel::tile_dimensions).
    pub async fn decode_tile(
        &mut self,
        level: usize,
        tile_x: u32,
        tile_y: u32,
    ) -> Result<Arc<RgbImage>, TileError> {
        let key = (level, tile_x, tile_y);
        if let Some(tile) = self.decoded.get(&key) {
            return Ok(Arc::clone(tile));
        }

        let jpeg = self.read_tile(level, tile_x, tile_y).await?;
        let tile = Arc::new(decode_jpeg(&jpeg)?);
        self.decoded.put(key, Arc::clone(&tile));
        Ok(tile)
    }

    /// Pixels of `level` in the rectangle at (`x`, `y`) of size `width` x
    /// `height`.
    ///
    /// The rectangle may extend past the level bounds on any side; those
    /// pixels are white.
    pub async fn read_region(
        &mut self,
        level: usize,
        x: i64,
        y: i64,
        width: u32,
        height: u32,
    ) -> Result<RgbImage, TileError> {
        let data = self.level_data(level)?;
        let (level_w, level_h) = (data.level.width as i64, data.level.height as i64);
        let (tile_w, tile_h) = (data.level.tile_width as i64, data.level.tile_height as i64);

        let mut canvas = RgbImage::from_pixel(width, height, BACKGROUND);

        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = (x + width as i64).min(level_w);
        let y1 = (y + height as i64).min(level_h);
        if x0 >= x1 || y0 >= y1 {
            return Ok(canvas);
        }

        for tile_y in (y0 / tile_h)..=((y1 - 1) / tile_h) {
            for tile_x in (x0 / tile_w)..=((x1 - 1) / tile_w) {
                let (tx, ty) = (tile_x as u32, tile_y as u32);
                let (valid_w, valid_h) = self
                    .level_data(level)?
                    .level
                    .tile_dimensions(tx, ty)
                    .unwrap_or((0, 0));

                let tile = self.decode_tile(level, tx, ty).await?;
                let valid_w = valid_w.min(tile.width());
                let valid_h = valid_h.min(tile.height());
                if valid_w == 0 || valid_h == 0 {
                    continue;
                }

                let valid = imageops::crop_imm(&*tile, 0, 0, valid_w, valid_h).to_image();
                imageops::replace(
                    &mut canvas,
                    &valid,
                    tile_x * tile_w - x,
                    tile_y * tile_h - y,
                );
            }
        }

        Ok(canvas)
    }
}
