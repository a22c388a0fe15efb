//! Tile production.
//!
//! ```text
//!                 ┌──────────────────┐
//!                 │    TileSource    │  level geometry + tile pixels
//!                 └────────┬─────────┘
//!            ┌─────────────┴─────────────┐
//!            ▼                           ▼
//! ┌─────────────────────┐    ┌─────────────────────┐
//! │  ResampledBitmap    │    │  DeepZoomGenerator  │
//! │  (decoded image)    │    │  (whole slide)      │
//! └─────────────────────┘    └─────────────────────┘
//!                                       │
//!                          JpegTileEncoder / decode_jpeg
//! ```
//!
//! - [`TileSource`]: what the pipeline driver iterates over
//! - [`ResampledBitmap`]: every level resampled from one bitmap, no overlap by default
//! - [`DeepZoomGenerator`]: levels rendered from slide regions, 1 px overlap
//! - [`JpegTileEncoder`]: output tile encoding

mod deepzoom;
mod encoder;
mod resample;
mod source;

pub use deepzoom::{DeepZoomGenerator, TileRegion};
pub use encoder::{
    clamp_quality, decode_jpeg, is_valid_quality, JpegTileEncoder, DEFAULT_JPEG_QUALITY,
    MAX_JPEG_QUALITY, MIN_JPEG_QUALITY,
};
pub use resample::ResampledBitmap;
pub use source::{tile_rect, TileRect, TileSource};
