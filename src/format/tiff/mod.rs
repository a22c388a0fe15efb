//! TIFF and BigTIFF structure parsing.
//!
//! Slide formats are TIFF containers: one IFD per pyramid level plus label,
//! macro and thumbnail images. Only the structure needed to locate tiles is
//! parsed; pixel data is decoded elsewhere.
//!
//! - byte order (II/MM) is declared in the header and applies to every value
//! - BigTIFF widens offsets and counts to 64 bits
//! - small values are stored inline in the IFD entry, larger ones at an offset

mod parser;
mod pyramid;
mod tags;
mod validation;
mod values;

pub use parser::{ByteOrder, Ifd, IfdEntry, TiffHeader, BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE};
pub use pyramid::{
    read_ifd, read_ifd_chain, PyramidLevel, TiffPyramid, TileData, MIN_PYRAMID_DIMENSION,
};
pub use tags::{Compression, FieldType, TiffTag, PHOTOMETRIC_RGB};
pub use validation::{validate_level, validate_pyramid, ValidationError, ValidationResult};
pub use values::{parse_u64_array, ValueReader};
