use std::path::PathBuf;

use thiserror::Error;

/// I/O errors that can occur when reading the input file
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Read or seek failure on the underlying file
    #[error("Read error: {0}")]
    Read(String),

    /// Requested range exceeds resource bounds
    #[error("Range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// Input file does not exist
    #[error("File not found: {0}")]
    NotFound(String),
}

/// Errors related to whole-slide format detection and validation
#[derive(Debug, Clone, Error)]
pub enum FormatError {
    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// TIFF parsing error
    #[error("TIFF error: {0}")]
    Tiff(#[from] TiffError),

    /// The file is not a whole slide image this reader understands.
    ///
    /// This is the only error that sends the input to the bitmap pipeline.
    #[error("Unsupported format: {reason}")]
    UnsupportedFormat { reason: String },
}

impl FormatError {
    /// Classify a TIFF error raised while opening a slide.
    ///
    /// Structural mismatches (strips, non-JPEG tiles, no pyramid) mean the
    /// file is a plain TIFF image rather than a slide.
    pub fn from_tiff(err: TiffError) -> Self {
        match err {
            TiffError::StripOrganization
            | TiffError::UnsupportedCompression(_)
            | TiffError::NoPyramidLevels => FormatError::UnsupportedFormat {
                reason: err.to_string(),
            },
            other => FormatError::Tiff(other),
        }
    }

    /// Whether this error should trigger the bitmap fallback.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, FormatError::UnsupportedFormat { .. })
    }
}

/// Errors that can occur when parsing TIFF files
#[derive(Debug, Clone, Error)]
pub enum TiffError {
    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Invalid TIFF magic bytes (not II or MM)
    #[error("Invalid TIFF magic bytes: expected 0x4949 (II) or 0x4D4D (MM), got 0x{0:04X}")]
    InvalidMagic(u16),

    /// Invalid TIFF version number
    #[error("Invalid TIFF version: expected 42 (TIFF) or 43 (BigTIFF), got {0}")]
    InvalidVersion(u16),

    /// Invalid BigTIFF offset byte size (must be 8)
    #[error("Invalid BigTIFF offset byte size: expected 8, got {0}")]
    InvalidBigTiffOffsetSize(u16),

    /// File is too small to contain a valid TIFF header
    #[error("File too small: need at least {required} bytes, got {actual}")]
    FileTooSmall { required: u64, actual: u64 },

    /// Invalid IFD offset (points outside file or to invalid location)
    #[error("Invalid IFD offset: {0}")]
    InvalidIfdOffset(u64),

    /// Required tag is missing from IFD
    #[error("Missing required tag: {0}")]
    MissingTag(&'static str),

    /// Tag has unexpected type or count
    #[error("Invalid tag value for {tag}: {message}")]
    InvalidTagValue { tag: &'static str, message: String },

    /// Unsupported compression scheme
    #[error("Unsupported compression: {0} (only JPEG is supported)")]
    UnsupportedCompression(String),

    /// File uses strips instead of tiles
    #[error("Unsupported organization: file uses strips instead of tiles")]
    StripOrganization,

    /// No IFD qualifies as a pyramid level
    #[error("No pyramid levels found")]
    NoPyramidLevels,

    /// Unknown field type in IFD entry
    #[error("Unknown field type: {0}")]
    UnknownFieldType(u16),
}

/// Errors raised while producing a single output tile
#[derive(Debug, Clone, Error)]
pub enum TileError {
    /// Source pixels could not be decoded
    #[error("Failed to decode tile: {message}")]
    Decode { message: String },

    /// Output tile could not be encoded
    #[error("Failed to encode tile: {message}")]
    Encode { message: String },

    /// Level index outside the pyramid
    #[error("Invalid level {level}: pyramid has {max_levels} levels")]
    InvalidLevel { level: usize, max_levels: usize },

    /// Tile coordinates outside the level grid
    #[error("Tile ({x}, {y}) out of bounds for level {level} ({max_x}x{max_y} tiles)")]
    TileOutOfBounds {
        level: usize,
        x: u32,
        y: u32,
        max_x: u32,
        max_y: u32,
    },

    /// I/O error while reading slide data
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Slide structure error while reading a tile
    #[error("Slide error: {0}")]
    Slide(#[from] TiffError),
}

/// Top-level error for a conversion run
#[derive(Debug, Clone, Error)]
pub enum DziError {
    /// Invalid command line or environment configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The input could not be opened as a slide
    #[error("{0}")]
    Format(#[from] FormatError),

    /// The input could not be decoded as a bitmap
    #[error("Failed to decode {}: {message}", path.display())]
    Decode { path: PathBuf, message: String },

    /// Tile production failed
    #[error("{0}")]
    Tile(#[from] TileError),

    /// Output could not be written
    #[error("Failed to write {}: {message}", path.display())]
    Write { path: PathBuf, message: String },
}

impl DziError {
    /// Wrap a filesystem error for the given output path.
    pub fn write(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        DziError::Write {
            path: path.into(),
            message: err.to_string(),
        }
    }
}
