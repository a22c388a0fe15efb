//! Slide abstraction layer.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            DeepZoomGenerator            │
//! └────────────────────┬────────────────────┘
//!                      │ read_region
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │                 Slide                   │
//! │  (format detection, block cache,        │
//! │   decoded tile LRU)                     │
//! └────────────────────┬────────────────────┘
//!                      │ SlideReader
//!          ┌───────────┴───────────┐
//!          ▼                       ▼
//! ┌─────────────────┐    ┌─────────────────────┐
//! │   SvsReader     │    │ GenericTiffReader   │
//! └─────────────────┘    └─────────────────────┘
//! ```

mod handle;
mod reader;

pub use handle::{Slide, SlideOptions, DEFAULT_TILE_CACHE_CAPACITY};
pub use reader::{LevelInfo, SlideReader};
