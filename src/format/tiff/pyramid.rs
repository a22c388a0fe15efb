//! Pyramid level identification.
//!
//! A slide file chains many IFDs: the resolution levels plus label, macro and
//! thumbnail images. Levels are picked out with a few heuristics:
//!
//! 1. tiled, with tile offset/byte count tags
//! 2. at least [`MIN_PYRAMID_DIMENSION`] on both axes
//! 3. not a small square-ish image (labels)
//! 4. downsample from the largest image close to a power of two
//!
//! Level 0 is the largest image.

use std::collections::HashSet;

use bytes::Bytes;
use tracing::debug;

use crate::error::TiffError;
use crate::io::RangeReader;

use super::parser::{Ifd, IfdEntry, TiffHeader, BIGTIFF_HEADER_SIZE};
use super::tags::TiffTag;
use super::values::ValueReader;

// =============================================================================
// Constants
// =============================================================================

/// Safety limit on the IFD chain length
const MAX_IFDS: usize = 100;

/// Smaller images are thumbnails
pub const MIN_PYRAMID_DIMENSION: u32 = 256;

/// Square-ish images up to this size are treated as labels
const MAX_LABEL_DIMENSION: u32 = 1000;

// =============================================================================
// PyramidLevel
// =============================================================================

/// One resolution level of the slide (0 = full resolution).
#[derive(Debug, Clone)]
pub struct PyramidLevel {
    pub level_index: usize,
    /// Position in the file's IFD chain
    pub ifd_index: usize,
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub tiles_x: u32,
    pub tiles_y: u32,
    /// Relative to level 0
    pub downsample: f64,
    pub compression: u16,
    /// PhotometricInterpretation, when present
    pub photometric: Option<u16>,
    pub ifd: Ifd,
    pub tile_offsets_entry: Option<IfdEntry>,
    pub tile_byte_counts_entry: Option<IfdEntry>,
    pub jpeg_tables_entry: Option<IfdEntry>,
}

impl PyramidLevel {
    /// Build a level from a tiled IFD; `None` if tile or size tags are absent.
    fn from_ifd(ifd: Ifd, ifd_index: usize, header: &TiffHeader) -> Option<Self> {
        let byte_order = header.byte_order;
        let tile_width = ifd.tile_width(byte_order)?;
        let tile_height = ifd.tile_height(byte_order)?;
        let width = ifd.image_width(byte_order)?;
        let height = ifd.image_height(byte_order)?;

        if tile_width == 0 || tile_height == 0 {
            return None;
        }

        Some(PyramidLevel {
            level_index: 0,
            ifd_index,
            width,
            height,
            tile_width,
            tile_height,
            tiles_x: width.div_ceil(tile_width),
            tiles_y: height.div_ceil(tile_height),
            downsample: 1.0,
            // Slide TIFFs omitting Compression are JPEG in practice
            compression: ifd.compression(byte_order).unwrap_or(7),
            photometric: ifd.photometric(byte_order),
            tile_offsets_entry: ifd.get_entry_by_tag(TiffTag::TileOffsets).cloned(),
            tile_byte_counts_entry: ifd.get_entry_by_tag(TiffTag::TileByteCounts).cloned(),
            jpeg_tables_entry: ifd.get_entry_by_tag(TiffTag::JpegTables).cloned(),
            ifd,
        })
    }

    pub fn has_tile_data(&self) -> bool {
        self.tile_offsets_entry.is_some() && self.tile_byte_counts_entry.is_some()
    }

    /// Row-major tile index, `None` outside the grid.
    pub fn tile_index(&self, tile_x: u32, tile_y: u32) -> Option<u32> {
        if tile_x >= self.tiles_x || tile_y >= self.tiles_y {
            return None;
        }
        Some(tile_y * self.tiles_x + tile_x)
    }

    /// Pixels of a tile that lie inside the image. Stored edge tiles are
    /// padded to the full tile size; this is the valid part.
    pub fn tile_dimensions(&self, tile_x: u32, tile_y: u32) -> Option<(u32, u32)> {
        if tile_x >= self.tiles_x || tile_y >= self.tiles_y {
            return None;
        }
        let w = (self.width - tile_x * self.tile_width).min(self.tile_width);
        let h = (self.height - tile_y * self.tile_height).min(self.tile_height);
        Some((w, h))
    }
}

// =============================================================================
// TiffPyramid
// =============================================================================

/// The pyramid levels of a TIFF file, largest first.
#[derive(Debug, Clone)]
pub struct TiffPyramid {
    pub header: TiffHeader,
    pub levels: Vec<PyramidLevel>,
    /// IFDs set aside as label, macro or thumbnail
    pub other_ifds: Vec<(usize, Ifd)>,
}

impl TiffPyramid {
    /// Parse the header and IFD chain and pick out pyramid levels.
    pub async fn parse<R: RangeReader>(reader: &R) -> Result<Self, TiffError> {
        let header_len = BIGTIFF_HEADER_SIZE.min(reader.size() as usize);
        let header_bytes = reader.read_exact_at(0, header_len).await?;
        let header = TiffHeader::parse(&header_bytes, reader.size())?;

        let ifds = read_ifd_chain(reader, &header).await?;
        debug!(
            "{}: {} IFDs in chain",
            reader.identifier(),
            ifds.len()
        );

        Ok(Self::from_ifds(header, ifds))
    }

    /// Classify already-parsed IFDs.
    pub fn from_ifds(header: TiffHeader, ifds: Vec<Ifd>) -> Self {
        let mut candidates = Vec::new();
        let mut other_ifds = Vec::new();

        for (ifd_index, ifd) in ifds.into_iter().enumerate() {
            match PyramidLevel::from_ifd(ifd.clone(), ifd_index, &header) {
                Some(level) if is_pyramid_candidate(&level) => candidates.push(level),
                _ => other_ifds.push((ifd_index, ifd)),
            }
        }

        candidates.sort_by_key(|l| std::cmp::Reverse(l.width as u64 * l.height as u64));

        let mut levels: Vec<PyramidLevel> = Vec::with_capacity(candidates.len());
        if let Some((base_w, base_h)) = candidates.first().map(|l| (l.width, l.height)) {
            for mut level in candidates {
                let downsample = (base_w as f64 / level.width as f64
                    + base_h as f64 / level.height as f64)
                    / 2.0;

                if is_valid_downsample(downsample, levels.is_empty()) {
                    level.level_index = levels.len();
                    level.downsample = downsample;
                    levels.push(level);
                } else {
                    other_ifds.push((level.ifd_index, level.ifd));
                }
            }
        }

        TiffPyramid {
            header,
            levels,
            other_ifds,
        }
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Full resolution dimensions.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.levels.first().map(|l| (l.width, l.height))
    }
}

/// Follow the next-IFD links from the header.
pub async fn read_ifd_chain<R: RangeReader>(
    reader: &R,
    header: &TiffHeader,
) -> Result<Vec<Ifd>, TiffError> {
    let mut ifds = Vec::new();
    let mut seen = HashSet::new();
    let mut offset = header.first_ifd_offset;

    while offset != 0 && ifds.len() < MAX_IFDS && seen.insert(offset) {
        ifds.push(read_ifd(reader, header, offset).await?);
        offset = ifds.last().map_or(0, |ifd: &Ifd| ifd.next_ifd_offset);
    }

    Ok(ifds)
}

/// Read a single IFD at `offset`.
pub async fn read_ifd<R: RangeReader>(
    reader: &R,
    header: &TiffHeader,
    offset: u64,
) -> Result<Ifd, TiffError> {
    if offset >= reader.size() {
        return Err(TiffError::InvalidIfdOffset(offset));
    }

    let count_bytes = reader
        .read_exact_at(offset, header.ifd_count_size())
        .await?;
    let entry_count = header.read_entry_count(&count_bytes);

    let ifd_size = Ifd::calculate_size(entry_count, header)
        .filter(|size| {
            offset
                .checked_add(*size as u64)
                .is_some_and(|end| end <= reader.size())
        })
        .ok_or(TiffError::InvalidIfdOffset(offset))?;
    let ifd_bytes = reader.read_exact_at(offset, ifd_size).await?;
    Ifd::parse(&ifd_bytes, header)
}

fn is_pyramid_candidate(level: &PyramidLevel) -> bool {
    if level.width < MIN_PYRAMID_DIMENSION || level.height < MIN_PYRAMID_DIMENSION {
        return false;
    }

    if !level.has_tile_data() {
        return false;
    }

    // Labels are small and close to square
    if level.width <= MAX_LABEL_DIMENSION && level.height <= MAX_LABEL_DIMENSION {
        let aspect = level.width as f64 / level.height as f64;
        if aspect > 0.5 && aspect < 2.0 {
            return false;
        }
    }

    true
}

/// Level 0 must be ~1x; later levels ~2^n with n >= 1, within 20%.
fn is_valid_downsample(downsample: f64, is_base: bool) -> bool {
    if is_base {
        return (downsample - 1.0).abs() < 0.1;
    }

    let exponent = downsample.log2().round();
    if exponent < 1.0 {
        return false;
    }

    let ratio = downsample / 2f64.powf(exponent);
    ratio > 0.8 && ratio < 1.2
}

// =============================================================================
// Tile Data
// =============================================================================

/// Tile offset table and JPEG tables of one level.
#[derive(Debug, Clone)]
pub struct TileData {
    pub offsets: Vec<u64>,
    pub byte_counts: Vec<u64>,
    pub jpeg_tables: Option<Bytes>,
}

impl TileData {
    pub async fn load<R: RangeReader>(
        reader: &R,
        level: &PyramidLevel,
        header: &TiffHeader,
    ) -> Result<Self, TiffError> {
        let values = ValueReader::new(reader, header);

        let offsets_entry = level
            .tile_offsets_entry
            .as_ref()
            .ok_or(TiffError::MissingTag("TileOffsets"))?;
        let counts_entry = level
            .tile_byte_counts_entry
            .as_ref()
            .ok_or(TiffError::MissingTag("TileByteCounts"))?;

        let offsets = values.read_u64_array(offsets_entry).await?;
        let byte_counts = values.read_u64_array(counts_entry).await?;

        let expected = level.tiles_x as usize * level.tiles_y as usize;
        if offsets.len() < expected || byte_counts.len() < expected {
            return Err(TiffError::InvalidTagValue {
                tag: "TileOffsets",
                message: format!(
                    "level {} needs {} tiles, file lists {} offsets and {} byte counts",
                    level.level_index,
                    expected,
                    offsets.len(),
                    byte_counts.len()
                ),
            });
        }

        let jpeg_tables = match &level.jpeg_tables_entry {
            Some(entry) => Some(values.read_bytes(entry).await?),
            None => None,
        };

        Ok(TileData {
            offsets,
            byte_counts,
            jpeg_tables,
        })
    }

    /// `(offset, byte_count)` of a tile by index.
    pub fn get_tile_location(&self, tile_index: u32) -> Option<(u64, u64)> {
        let idx = tile_index as usize;
        Some((*self.offsets.get(idx)?, *self.byte_counts.get(idx)?))
    }
}

// =============================================================================
// Tests
// =============================================================================
