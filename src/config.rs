//! Command line and environment configuration.
//!
//! Every option can also be set through an environment variable with the
//! `DZI_` prefix:
//!
//! - `DZI_INPUT` - Input image or slide (required)
//! - `DZI_OUTPUT` - Output basename (accepted, ignored)
//! - `DZI_JPEG_QUALITY` - Tile JPEG quality (default: 75)
//! - `DZI_BITMAP_OVERLAP` - Tile overlap for plain images (default: 0)
//! - `DZI_BLOCK_SIZE` - Slide read block size in bytes (default: 262144)
//! - `DZI_CACHE_BLOCKS` - Slide blocks kept in memory (default: 100)
//! - `DZI_CACHE_TILES` - Decoded slide tiles kept in memory (default: 64)
//! - `DZI_REPORT` - Summary format, `text` or `json` (default: text)

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::io::{DEFAULT_BLOCK_CACHE_CAPACITY, DEFAULT_BLOCK_SIZE};
use crate::slide::{SlideOptions, DEFAULT_TILE_CACHE_CAPACITY};
use crate::tile::{is_valid_quality, DEFAULT_JPEG_QUALITY};

/// Largest accepted plain-image overlap.
pub const MAX_BITMAP_OVERLAP: u32 = 64;

const MIN_BLOCK_SIZE: usize = 1024;
const MAX_BLOCK_SIZE: usize = 16 * 1024 * 1024;

/// How the end-of-run summary is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ReportFormat {
    /// One line per level
    #[default]
    Text,
    /// A single JSON document
    Json,
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// dzi-tiler - convert an image or whole slide image to a Deep Zoom pyramid.
///
/// Writes `<input dir>/dzi/<name>.dzi` and the tile tree
/// `<input dir>/dzi/<name>_files/<level>/<col>_<row>.jpeg`.
#[derive(Parser, Debug, Clone)]
#[command(name = "dzi-tiler")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Input image path (e.g. .svs, .tif, .jpg, .png).
    #[arg(short, long, env = "DZI_INPUT")]
    pub input: PathBuf,

    /// Output basename. Accepted for compatibility; output always goes next
    /// to the input.
    #[arg(short, long, env = "DZI_OUTPUT")]
    pub output: Option<String>,

    /// JPEG quality of the written tiles (1-100).
    #[arg(short, long, default_value_t = DEFAULT_JPEG_QUALITY, env = "DZI_JPEG_QUALITY")]
    pub quality: u8,

    /// Tile overlap in pixels when tiling a plain image.
    #[arg(long, default_value_t = 0, env = "DZI_BITMAP_OVERLAP")]
    pub bitmap_overlap: u32,

    // =========================================================================
    // Slide reading
    // =========================================================================
    /// Block size in bytes for slide reads.
    #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE, env = "DZI_BLOCK_SIZE")]
    pub block_size: usize,

    /// Number of slide blocks to keep in memory.
    #[arg(long, default_value_t = DEFAULT_BLOCK_CACHE_CAPACITY, env = "DZI_CACHE_BLOCKS")]
    pub cache_blocks: usize,

    /// Number of decoded slide tiles to keep in memory.
    #[arg(long, default_value_t = DEFAULT_TILE_CACHE_CAPACITY, env = "DZI_CACHE_TILES")]
    pub cache_tiles: usize,

    // =========================================================================
    // Output
    // =========================================================================
    /// Format of the summary printed when done.
    #[arg(long, value_enum, default_value_t = ReportFormat::Text, env = "DZI_REPORT")]
    pub report: ReportFormat,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Config {
    /// Configuration for `input` with every other option at its default.
    pub fn for_input(input: impl Into<PathBuf>) -> Self {
        Config {
            input: input.into(),
            output: None,
            quality: DEFAULT_JPEG_QUALITY,
            bitmap_overlap: 0,
            block_size: DEFAULT_BLOCK_SIZE,
            cache_blocks: DEFAULT_BLOCK_CACHE_CAPACITY,
            cache_tiles: DEFAULT_TILE_CACHE_CAPACITY,
            report: ReportFormat::Text,
            verbose: false,
        }
    }

    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.input.as_os_str().is_empty() {
            return Err("Input path is required. Set --input or DZI_INPUT".to_string());
        }

        if !is_valid_quality(self.quality) {
            return Err("quality must be between 1 and 100".to_string());
        }

        if self.bitmap_overlap > MAX_BITMAP_OVERLAP {
            return Err(format!(
                "bitmap_overlap must be at most {}",
                MAX_BITMAP_OVERLAP
            ));
        }

        if self.cache_blocks == 0 {
            return Err("cache_blocks must be greater than 0".to_string());
        }
        if self.cache_tiles == 0 {
            return Err("cache_tiles must be greater than 0".to_string());
        }

        if !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&self.block_size) {
            return Err("block_size must be between 1KB and 16MB".to_string());
        }

        Ok(())
    }

    pub fn slide_options(&self) -> SlideOptions {
        SlideOptions {
            block_size: self.block_size,
            cache_blocks: self.cache_blocks,
            cache_tiles: self.cache_tiles,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
