//! Test utilities for integration tests.
//!
//! This module provides an in-memory range reader, JPEG fixtures and a
//! builder for tiled JPEG pyramid TIFF files.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, Rgb, RgbImage};

use dzi_tiler::error::IoError;
use dzi_tiler::io::{check_range, RangeReader};

// =============================================================================
// In-memory Range Reader
// =============================================================================

/// A range reader over a byte buffer.
pub struct MemoryReader {
    data: Bytes,
    identifier: String,
}

impl MemoryReader {
    pub fn new(data: Vec<u8>, identifier: impl Into<String>) -> Self {
        Self {
            data: Bytes::from(data),
            identifier: identifier.into(),
        }
    }
}

#[async_trait]
impl RangeReader for MemoryReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        check_range(offset, len, self.size())?;
        let start = offset as usize;
        Ok(self.data.slice(start..start + len))
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

// =============================================================================
// Test Images
// =============================================================================

/// Smooth RGB gradient; survives JPEG round trips with small errors.
pub fn gradient_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let r = (x * 255 / width.max(1)) as u8;
        let g = (y * 255 / height.max(1)) as u8;
        Rgb([r, g, 128])
    })
}

/// Encode an RGB image as a baseline JPEG.
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    encoder.encode_image(image).unwrap();
    buf
}

/// Save `image` under `dir` in the format implied by `name`'s extension.
pub fn write_image(dir: &Path, name: &str, image: &RgbImage) -> PathBuf {
    let path = dir.join(name);
    let format = ImageFormat::from_path(&path).unwrap();
    image.save_with_format(&path, format).unwrap();
    path
}

/// Whether two colours differ by at most `tolerance` per channel.
pub fn colors_close(a: &Rgb<u8>, b: &Rgb<u8>, tolerance: u8) -> bool {
    a.0.iter()
        .zip(b.0.iter())
        .all(|(x, y)| x.abs_diff(*y) <= tolerance)
}

// =============================================================================
// JPEG Stream Splitting
// =============================================================================

/// Split a complete JPEG into a `JPEGTables` blob (SOI DQT DHT EOI) and an
/// abbreviated stream carrying everything else.
pub fn split_jpeg_tables(jpeg: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let mut tables = vec![0xFF, 0xD8];
    let mut tile = vec![0xFF, 0xD8];

    let mut pos = 2;
    while pos + 4 <= jpeg.len() {
        assert_eq!(jpeg[pos], 0xFF, "expected marker at {}", pos);
        let marker = jpeg[pos + 1];
        if marker == 0xDA {
            // SOS: the rest is scan data up to and including EOI
            tile.extend_from_slice(&jpeg[pos..]);
            break;
        }

        let length = u16::from_be_bytes([jpeg[pos + 2], jpeg[pos + 3]]) as usize;
        let segment = &jpeg[pos..pos + 2 + length];
        if marker == 0xDB || marker == 0xC4 {
            tables.extend_from_slice(segment);
        } else {
            tile.extend_from_slice(segment);
        }
        pos += 2 + length;
    }

    tables.extend_from_slice(&[0xFF, 0xD9]);
    (tables, tile)
}

// =============================================================================
// Pyramid TIFF Builder
// =============================================================================

pub const PHOTOMETRIC_YCBCR: u16 = 6;
pub const PHOTOMETRIC_RGB: u16 = 2;

/// Colour of every pixel of stored tile (`tile_x`, `tile_y`) of `level`.
pub fn tile_color(level: usize, tile_x: u32, tile_y: u32) -> Rgb<u8> {
    Rgb([
        (40 + tile_x * 25) as u8,
        (60 + tile_y * 60) as u8,
        (220 - level as u32 * 100) as u8,
    ])
}

/// One IFD of a tiled TIFF.
pub struct TiffLevel {
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub compression: u16,
    pub photometric: u16,
    pub jpeg_tables: Option<Vec<u8>>,
    /// Row-major tile payloads
    pub tiles: Vec<Vec<u8>>,
}

impl TiffLevel {
    /// A level whose stored tiles are solid [`tile_color`] JPEGs.
    pub fn solid_tiles(level: usize, width: u32, height: u32, tile_size: u32) -> Self {
        let tiles_x = width.div_ceil(tile_size);
        let tiles_y = height.div_ceil(tile_size);

        let mut tiles = Vec::new();
        for ty in 0..tiles_y {
            for tx in 0..tiles_x {
                let tile = RgbImage::from_pixel(tile_size, tile_size, tile_color(level, tx, ty));
                tiles.push(encode_jpeg(&tile, 95));
            }
        }

        Self {
            width,
            height,
            tile_width: tile_size,
            tile_height: tile_size,
            compression: 7,
            photometric: PHOTOMETRIC_YCBCR,
            jpeg_tables: None,
            tiles,
        }
    }

    /// Move the quantization and Huffman tables into `JPEGTables`.
    ///
    /// Tiles from one encoder at one quality share identical tables, so the
    /// first tile's are used for the whole level.
    pub fn abbreviated(mut self) -> Self {
        let mut shared = None;
        for tile in &mut self.tiles {
            let (tables, abbreviated) = split_jpeg_tables(tile);
            shared.get_or_insert(tables);
            *tile = abbreviated;
        }
        self.jpeg_tables = shared;
        self
    }

    pub fn with_photometric(mut self, photometric: u16) -> Self {
        self.photometric = photometric;
        self
    }

    pub fn with_compression(mut self, compression: u16) -> Self {
        self.compression = compression;
        self
    }
}

/// Builds little-endian classic TIFF files with chained tiled IFDs.
#[derive(Default)]
pub struct PyramidTiffBuilder {
    description: Option<String>,
    levels: Vec<TiffLevel>,
}

struct Entry {
    tag: u16,
    field_type: u16,
    count: u32,
    value: [u8; 4],
}

impl PyramidTiffBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// ImageDescription of the first IFD.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn add_level(mut self, level: TiffLevel) -> Self {
        self.levels.push(level);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(b"II");
        data.extend_from_slice(&42u16.to_le_bytes());
        // Patched with the first IFD offset
        data.extend_from_slice(&0u32.to_le_bytes());
        let mut next_pointer = 4usize;

        for (index, level) in self.levels.iter().enumerate() {
            let mut entries = Vec::new();

            let mut offsets = Vec::with_capacity(level.tiles.len());
            for tile in &level.tiles {
                offsets.push(data.len() as u32);
                data.extend_from_slice(tile);
            }
            let counts: Vec<u32> = level.tiles.iter().map(|t| t.len() as u32).collect();

            entries.push(Entry::long(256, level.width));
            entries.push(Entry::long(257, level.height));
            entries.push(Entry::short(258, 8));
            entries.push(Entry::short(259, level.compression));
            entries.push(Entry::short(262, level.photometric));
            if index == 0 {
                if let Some(description) = &self.description {
                    let mut bytes = description.as_bytes().to_vec();
                    bytes.push(0);
                    entries.push(Entry::with_data(&mut data, 270, 2, bytes.len() as u32, &bytes));
                }
            }
            entries.push(Entry::short(277, 3));
            entries.push(Entry::long(322, level.tile_width));
            entries.push(Entry::long(323, level.tile_height));
            entries.push(Entry::longs(&mut data, 324, &offsets));
            entries.push(Entry::longs(&mut data, 325, &counts));
            if let Some(tables) = &level.jpeg_tables {
                entries.push(Entry::with_data(&mut data, 347, 7, tables.len() as u32, tables));
            }

            if data.len() % 2 == 1 {
                data.push(0);
            }
            let ifd_offset = data.len() as u32;
            data[next_pointer..next_pointer + 4].copy_from_slice(&ifd_offset.to_le_bytes());

            entries.sort_by_key(|e| e.tag);
            data.extend_from_slice(&(entries.len() as u16).to_le_bytes());
            for entry in &entries {
                data.extend_from_slice(&entry.tag.to_le_bytes());
                data.extend_from_slice(&entry.field_type.to_le_bytes());
                data.extend_from_slice(&entry.count.to_le_bytes());
                data.extend_from_slice(&entry.value);
            }
            next_pointer = data.len();
            data.extend_from_slice(&0u32.to_le_bytes());
        }

        data
    }
}

impl Entry {
    fn short(tag: u16, value: u16) -> Self {
        let mut bytes = [0u8; 4];
        bytes[..2].copy_from_slice(&value.to_le_bytes());
        Entry {
            tag,
            field_type: 3,
            count: 1,
            value: bytes,
        }
    }

    fn long(tag: u16, value: u32) -> Self {
        Entry {
            tag,
            field_type: 4,
            count: 1,
            value: value.to_le_bytes(),
        }
    }

    fn longs(data: &mut Vec<u8>, tag: u16, values: &[u32]) -> Self {
        if values.len() == 1 {
            return Entry::long(tag, values[0]);
        }
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Entry::with_data(data, tag, 4, values.len() as u32, &bytes)
    }

    /// Entry whose payload is stored inline when it fits, else appended.
    fn with_data(data: &mut Vec<u8>, tag: u16, field_type: u16, count: u32, payload: &[u8]) -> Self {
        let mut value = [0u8; 4];
        if payload.len() <= 4 {
            value[..payload.len()].copy_from_slice(payload);
        } else {
            value = (data.len() as u32).to_le_bytes();
            data.extend_from_slice(payload);
        }
        Entry {
            tag,
            field_type,
            count,
            value,
        }
    }
}

/// Single-level tiled JPEG BigTIFF whose LONG8 TileOffsets all point at
/// `tile_offset`, with 100 byte counts. No tile data is stored.
pub fn bigtiff_with_tile_offset(
    width: u32,
    height: u32,
    tile_size: u32,
    tile_offset: u64,
) -> Vec<u8> {
    let tile_count = (width.div_ceil(tile_size) * height.div_ceil(tile_size)) as u64;

    let mut data = Vec::new();
    data.extend_from_slice(b"II");
    data.extend_from_slice(&43u16.to_le_bytes());
    data.extend_from_slice(&8u16.to_le_bytes());
    data.extend_from_slice(&0u16.to_le_bytes());
    data.extend_from_slice(&16u64.to_le_bytes());

    let ifd_len = 8 + 10 * 20 + 8;
    let offsets_at = (16 + ifd_len) as u64;
    let counts_at = offsets_at + tile_count * 8;

    let inline = |value: u64| value.to_le_bytes();
    let entries: [(u16, u16, u64, [u8; 8]); 10] = [
        (256, 4, 1, inline(width as u64)),
        (257, 4, 1, inline(height as u64)),
        (258, 3, 1, inline(8)),
        (259, 3, 1, inline(7)),
        (262, 3, 1, inline(PHOTOMETRIC_YCBCR as u64)),
        (277, 3, 1, inline(3)),
        (322, 4, 1, inline(tile_size as u64)),
        (323, 4, 1, inline(tile_size as u64)),
        (324, 16, tile_count, inline(offsets_at)),
        (325, 16, tile_count, inline(counts_at)),
    ];

    data.extend_from_slice(&(entries.len() as u64).to_le_bytes());
    for (tag, field_type, count, value) in entries {
        data.extend_from_slice(&tag.to_le_bytes());
        data.extend_from_slice(&field_type.to_le_bytes());
        data.extend_from_slice(&count.to_le_bytes());
        data.extend_from_slice(&value);
    }
    data.extend_from_slice(&0u64.to_le_bytes());

    for _ in 0..tile_count {
        data.extend_from_slice(&tile_offset.to_le_bytes());
    }
    for _ in 0..tile_count {
        data.extend_from_slice(&100u64.to_le_bytes());
    }
    data
}

/// Aperio ImageDescription with MPP and magnification.
pub const APERIO_DESCRIPTION: &str =
    "Aperio Image Library v12.0.15\r\n2048x512 [0,0 2048x512] (256x256) JPEG/RGB Q=70|AppMag = 20|MPP = 0.4990";

/// Two-level 2048x512 / 1024x256 pyramid with 256 px solid tiles.
pub fn two_level_pyramid() -> PyramidTiffBuilder {
    PyramidTiffBuilder::new()
        .add_level(TiffLevel::solid_tiles(0, 2048, 512, 256))
        .add_level(TiffLevel::solid_tiles(1, 1024, 256, 256))
}

/// The same pyramid as an SVS file with abbreviated tiles.
pub fn create_svs() -> Vec<u8> {
    PyramidTiffBuilder::new()
        .with_description(APERIO_DESCRIPTION)
        .add_level(TiffLevel::solid_tiles(0, 2048, 512, 256).abbreviated())
        .add_level(TiffLevel::solid_tiles(1, 1024, 256, 256).abbreviated())
        .build()
}

/// Write `data` to `dir/name`.
pub fn write_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, data).unwrap();
    path
}

/// Decode a written tile.
pub fn read_tile(path: &Path) -> RgbImage {
    image::open(path)
        .unwrap_or_else(|e| panic!("{}: {}", path.display(), e))
        .to_rgb8()
}
