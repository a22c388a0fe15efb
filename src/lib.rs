//! # dzi-tiler
//!
//! Converts a single image into a Deep Zoom (DZI) pyramid: an XML descriptor
//! plus a tree of 254 px JPEG tiles, one directory per resolution level.
//!
//! ## Backends
//!
//! - **Whole slides** (Aperio SVS, tiled JPEG pyramidal TIFF): parsed with an
//!   in-crate TIFF reader and rendered through [`tile::DeepZoomGenerator`],
//!   which samples each Deep Zoom level from the closest slide level with a
//!   1 px tile overlap.
//! - **Bitmaps** (anything the `image` crate decodes): every level resampled
//!   from the decoded source by [`tile::ResampledBitmap`].
//!
//! The slide reader is tried first; inputs it reports as unsupported fall
//! back to the bitmap backend.
//!
//! ## Architecture
//!
//! - [`io`] - byte-range reads with block caching
//! - [`mod@format`] - TIFF/SVS parsers and JPEG stream handling
//! - [`slide`] - opened slides and region reads
//! - [`tile`] - tile sources and tile encoding
//! - [`dzi`] - descriptor and level arithmetic
//! - [`pipeline`] - input selection and pyramid writing
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use dzi_tiler::{run, Config};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let config = Config::for_input("/data/CMU-1.svs");
//!     let report = run(&config).await.unwrap();
//!     println!("{} tiles", report.total_tiles());
//! }
//! ```

pub mod config;
pub mod dzi;
pub mod error;
pub mod format;
pub mod io;
pub mod pipeline;
pub mod slide;
pub mod tile;

// Re-export commonly used types
pub use config::{Config, ReportFormat};
pub use dzi::{
    calculate_max_dzi_level, dzi_level_dimensions, generate_dzi_xml, resampled_level_dimensions,
    OVERLAP, TILE_FORMAT, TILE_SIZE,
};
pub use error::{DziError, FormatError, IoError, TiffError, TileError};
pub use format::{detect_format, SlideFormat, SvsMetadata};
pub use io::{BlockCache, FileRangeReader, RangeReader};
pub use pipeline::{
    generate_pyramid, open_input, run, Backend, InputSource, LevelReport, OutputLayout,
    PyramidReport,
};
pub use slide::{Slide, SlideOptions, SlideReader};
pub use tile::{DeepZoomGenerator, JpegTileEncoder, ResampledBitmap, TileSource};
