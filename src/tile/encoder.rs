//! JPEG encoding of output tiles and decoding of slide tiles.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, ImageReader, RgbImage};

use crate::error::TileError;

/// Default output JPEG quality (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 75;

pub const MIN_JPEG_QUALITY: u8 = 1;

pub const MAX_JPEG_QUALITY: u8 = 100;

/// Encodes RGB tiles as baseline JPEG at a fixed quality.
#[derive(Debug, Clone, Copy)]
pub struct JpegTileEncoder {
    quality: u8,
}

impl Default for JpegTileEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl JpegTileEncoder {
    /// Out-of-range qualities are clamped to 1..=100.
    pub fn new(quality: u8) -> Self {
        Self {
            quality: clamp_quality(quality),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn encode(&self, tile: &RgbImage) -> Result<Bytes, TileError> {
        let mut output = Vec::new();
        JpegEncoder::new_with_quality(&mut output, self.quality)
            .encode_image(tile)
            .map_err(|e| TileError::Encode {
                message: e.to_string(),
            })?;

        Ok(Bytes::from(output))
    }
}

/// Decode a complete JPEG stream to RGB pixels.
pub fn decode_jpeg(source: &[u8]) -> Result<RgbImage, TileError> {
    let image = ImageReader::with_format(Cursor::new(source), ImageFormat::Jpeg)
        .decode()
        .map_err(|e| TileError::Decode {
            message: e.to_string(),
        })?;

    Ok(image.into_rgb8())
}

#[inline]
pub fn is_valid_quality(quality: u8) -> bool {
    (MIN_JPEG_QUALITY..=MAX_JPEG_QUALITY).contains(&quality)
}

#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY)
}
