//! Slide format detection.
//!
//! Inputs that are not TIFF at all are reported as
//! [`FormatError::UnsupportedFormat`] so the caller can hand them to the
//! bitmap pipeline. TIFF files are classified by the vendor string in the
//! first IFD's ImageDescription.

use crate::error::FormatError;
use crate::io::RangeReader;

use super::tiff::{read_ifd, ByteOrder, TiffHeader, TiffTag, BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE};

/// Detected slide format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideFormat {
    /// Aperio SVS (abbreviated JPEG tiles, metadata in ImageDescription)
    AperioSvs,
    /// Any other tiled pyramidal TIFF
    GenericTiff,
}

impl SlideFormat {
    pub const fn name(&self) -> &'static str {
        match self {
            SlideFormat::AperioSvs => "Aperio SVS",
            SlideFormat::GenericTiff => "Generic Pyramidal TIFF",
        }
    }
}

const MIN_HEADER_BYTES: usize = BIGTIFF_HEADER_SIZE;

/// Only the start of ImageDescription is searched for vendor markers
const MAX_DESCRIPTION_BYTES: usize = 1024;

const APERIO_MARKER: &[u8] = b"Aperio";

/// Identify the slide format of `reader`.
///
/// Returns `UnsupportedFormat` for files too small to hold a TIFF header and
/// for files without TIFF magic.
pub async fn detect_format<R: RangeReader>(reader: &R) -> Result<SlideFormat, FormatError> {
    if reader.size() < MIN_HEADER_BYTES as u64 {
        return Err(FormatError::UnsupportedFormat {
            reason: format!("{} bytes is too small for a TIFF file", reader.size()),
        });
    }

    let header_bytes = reader.read_exact_at(0, MIN_HEADER_BYTES).await?;
    if !is_tiff_header(&header_bytes) {
        return Err(FormatError::UnsupportedFormat {
            reason: "not a TIFF file".to_string(),
        });
    }

    let header = TiffHeader::parse(&header_bytes, reader.size())?;
    let ifd = read_ifd(reader, &header, header.first_ifd_offset).await?;

    let description = match ifd.get_entry_by_tag(TiffTag::ImageDescription) {
        Some(entry) if entry.count > 0 => {
            let len = (entry.count as usize).min(MAX_DESCRIPTION_BYTES);
            if entry.is_inline {
                entry.value_offset_bytes[..len.min(entry.value_offset_bytes.len())].to_vec()
            } else {
                let offset = entry.value_offset(header.byte_order);
                let len = len.min(reader.size().saturating_sub(offset) as usize);
                reader.read_exact_at(offset, len).await?.to_vec()
            }
        }
        _ => Vec::new(),
    };

    if contains_aperio_marker(&description) {
        Ok(SlideFormat::AperioSvs)
    } else {
        Ok(SlideFormat::GenericTiff)
    }
}

fn contains_aperio_marker(data: &[u8]) -> bool {
    data.windows(APERIO_MARKER.len())
        .any(|window| window == APERIO_MARKER)
}

/// Quick magic/version check on the first bytes of a file.
pub fn is_tiff_header(bytes: &[u8]) -> bool {
    if bytes.len() < TIFF_HEADER_SIZE {
        return false;
    }

    let byte_order = match &bytes[0..2] {
        b"II" => ByteOrder::LittleEndian,
        b"MM" => ByteOrder::BigEndian,
        _ => return false,
    };

    matches!(byte_order.read_u16(&bytes[2..4]), 42 | 43)
}
