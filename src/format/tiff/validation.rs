//! Checks that a parsed TIFF is a slide this crate can tile.
//!
//! Supported slides are tiled, JPEG compressed and have at least one pyramid
//! level. Files failing these checks are ordinary TIFF images: the errors
//! produced here map to [`TiffError`] variants that
//! [`FormatError::from_tiff`](crate::error::FormatError::from_tiff) treats
//! as unsupported, which sends the input to the bitmap pipeline.

use crate::error::TiffError;

use super::parser::Ifd;
use super::pyramid::{PyramidLevel, TiffPyramid};
use super::tags::Compression;

/// Tiles larger than this are accepted but unusual.
const LARGE_TILE_DIMENSION: u32 = 4096;

// =============================================================================
// Validation Result
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    /// Non-fatal findings, logged by the caller
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn error(error: ValidationError) -> Self {
        ValidationResult {
            errors: vec![error],
            warnings: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    /// First error as a [`TiffError`], if any.
    pub fn into_result(self) -> Result<(), TiffError> {
        match self.errors.into_iter().next() {
            Some(error) => Err(error.into()),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Image data is stored in strips
    StripOrganization { ifd_index: usize },

    UnsupportedCompression {
        ifd_index: usize,
        compression: u16,
        compression_name: String,
    },

    NoPyramidLevels,

    InvalidTileDimensions {
        ifd_index: usize,
        tile_width: u32,
        tile_height: u32,
    },
}

impl From<ValidationError> for TiffError {
    fn from(error: ValidationError) -> Self {
        match error {
            ValidationError::StripOrganization { .. } => TiffError::StripOrganization,
            ValidationError::UnsupportedCompression {
                compression_name, ..
            } => TiffError::UnsupportedCompression(compression_name),
            ValidationError::NoPyramidLevels => TiffError::NoPyramidLevels,
            ValidationError::InvalidTileDimensions {
                ifd_index,
                tile_width,
                tile_height,
            } => TiffError::InvalidTagValue {
                tag: "TileWidth/TileLength",
                message: format!("IFD {}: tile size {}x{}", ifd_index, tile_width, tile_height),
            },
        }
    }
}

// =============================================================================
// Validation
// =============================================================================

fn compression_name(value: u16) -> Option<String> {
    match Compression::from_u16(value) {
        Some(compression) if compression.is_supported() => None,
        Some(compression) => Some(compression.name().to_string()),
        None => Some(format!("Unknown ({})", value)),
    }
}

/// Validate a single pyramid level.
pub fn validate_level(level: &PyramidLevel) -> ValidationResult {
    let mut result = ValidationResult::ok();

    if let Some(name) = compression_name(level.compression) {
        result.add_error(ValidationError::UnsupportedCompression {
            ifd_index: level.ifd_index,
            compression: level.compression,
            compression_name: name,
        });
    }

    if level.tile_width == 0 || level.tile_height == 0 {
        result.add_error(ValidationError::InvalidTileDimensions {
            ifd_index: level.ifd_index,
            tile_width: level.tile_width,
            tile_height: level.tile_height,
        });
    } else if level.tile_width > LARGE_TILE_DIMENSION || level.tile_height > LARGE_TILE_DIMENSION {
        result.add_warning(format!(
            "level {}: large tiles ({}x{})",
            level.level_index, level.tile_width, level.tile_height
        ));
    }

    if level.jpeg_tables_entry.is_none() {
        result.add_warning(format!(
            "level {}: no JPEGTables tag, expecting complete tile streams",
            level.level_index
        ));
    }

    result
}

/// Validate the whole pyramid.
///
/// A file with no levels whose first image is stored in strips reports
/// [`ValidationError::StripOrganization`] rather than `NoPyramidLevels`.
pub fn validate_pyramid(pyramid: &TiffPyramid) -> ValidationResult {
    if pyramid.levels.is_empty() {
        let stripped = pyramid
            .other_ifds
            .iter()
            .any(|(index, ifd)| *index == 0 && is_strip_only(ifd));
        return ValidationResult::error(if stripped {
            ValidationError::StripOrganization { ifd_index: 0 }
        } else {
            ValidationError::NoPyramidLevels
        });
    }

    let mut result = ValidationResult::ok();
    for level in &pyramid.levels {
        let level_result = validate_level(level);
        result.errors.extend(level_result.errors);
        result.warnings.extend(level_result.warnings);
    }
    result
}

fn is_strip_only(ifd: &Ifd) -> bool {
    ifd.is_stripped() && !ifd.is_tiled()
}

// =============================================================================
// Tests
// =============================================================================
