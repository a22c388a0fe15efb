//! Whole slide image formats.
//!
//! [`detect::detect_format`] classifies a file:
//!
//! - **Aperio SVS**: "Aperio" in the first ImageDescription
//! - **Generic Pyramidal TIFF**: any other tiled JPEG TIFF pyramid
//!
//! Non-TIFF files are reported as unsupported and handled as bitmaps.

pub mod detect;
mod generic_tiff;
pub mod jpeg;
mod svs;
pub mod tiff;

pub use detect::{detect_format, is_tiff_header, SlideFormat};
pub use generic_tiff::{GenericTiffReader, LevelData};
pub use svs::{SvsMetadata, SvsReader};
