//! Conversion pipeline: probe the input, pick a tile source, write the pyramid.
//!
//! ```text
//! input ──▶ Slide::open ──ok──────────────▶ DeepZoomGenerator ─┐
//!              │                                               ├─▶ generate_pyramid
//!              └─UnsupportedFormat─▶ decode ─▶ ResampledBitmap ┘
//! ```
//!
//! Any other failure while opening the slide ends the run.

use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::ImageReader;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::dzi::{write_descriptor, TILE_FORMAT};
use crate::error::DziError;
use crate::io::FileRangeReader;
use crate::slide::{Slide, SlideOptions};
use crate::tile::{DeepZoomGenerator, JpegTileEncoder, ResampledBitmap, TileSource};

// =============================================================================
// Output layout
// =============================================================================

/// Where the pyramid of one input is written.
///
/// Everything lives in a `dzi` directory next to the input:
///
/// ```text
/// <dir>/dzi/<name>.dzi
/// <dir>/dzi/<name>_files/<level>/<col>_<row>.jpeg
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    pub dzi_dir: PathBuf,
    pub descriptor: PathBuf,
    pub tiles_dir: PathBuf,
}

impl OutputLayout {
    /// Layout for `input`, named after the file name without its extension.
    pub fn from_input(input: &Path) -> Self {
        let parent = input.parent().unwrap_or_else(|| Path::new(""));
        let name = input
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        let dzi_dir = parent.join("dzi");
        Self {
            descriptor: dzi_dir.join(format!("{}.dzi", name)),
            tiles_dir: dzi_dir.join(format!("{}_files", name)),
            dzi_dir,
        }
    }

    pub fn level_dir(&self, level: usize) -> PathBuf {
        self.tiles_dir.join(level.to_string())
    }

    pub fn tile_path(&self, level: usize, col: u32, row: u32) -> PathBuf {
        self.level_dir(level)
            .join(format!("{}_{}.{}", col, row, TILE_FORMAT))
    }

    /// Create the `dzi` and tile directories.
    pub async fn create_dirs(&self) -> Result<(), DziError> {
        tokio::fs::create_dir_all(&self.tiles_dir)
            .await
            .map_err(|e| DziError::write(&self.tiles_dir, e))
    }
}

// =============================================================================
// Input selection
// =============================================================================

/// Which backend produced the pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Slide,
    Bitmap,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Slide => write!(f, "slide"),
            Backend::Bitmap => write!(f, "bitmap"),
        }
    }
}

/// An opened input, ready to be tiled.
pub enum InputSource {
    Slide(DeepZoomGenerator<FileRangeReader>),
    Bitmap(ResampledBitmap),
}

impl InputSource {
    pub fn backend(&self) -> Backend {
        match self {
            InputSource::Slide(_) => Backend::Slide,
            InputSource::Bitmap(_) => Backend::Bitmap,
        }
    }
}

/// Open `path` as a whole slide, falling back to a plain bitmap when the
/// slide reader does not support the file.
pub async fn open_input(
    path: &Path,
    options: SlideOptions,
    bitmap_overlap: u32,
) -> Result<InputSource, DziError> {
    let reader = FileRangeReader::open(path)
        .await
        .map_err(|e| DziError::Format(e.into()))?;

    match Slide::open(reader, options).await {
        Ok(slide) => {
            info!(
                "Opened {} as {} slide with {} levels",
                path.display(),
                slide.format().name(),
                slide.level_count()
            );
            Ok(InputSource::Slide(DeepZoomGenerator::new(slide)?))
        }
        Err(e) if e.is_unsupported() => {
            info!("{} is not a supported slide ({}), tiling as bitmap", path.display(), e);
            let bitmap = decode_bitmap(path).await?;
            Ok(InputSource::Bitmap(ResampledBitmap::with_overlap(
                bitmap,
                bitmap_overlap,
            )))
        }
        Err(e) => Err(e.into()),
    }
}

/// Decode any raster format the `image` crate understands into RGB.
pub async fn decode_bitmap(path: &Path) -> Result<image::RgbImage, DziError> {
    let decode_error = |message: String| DziError::Decode {
        path: path.to_path_buf(),
        message,
    };

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| decode_error(e.to_string()))?;
    let image = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| decode_error(e.to_string()))?
        .decode()
        .map_err(|e| decode_error(e.to_string()))?;

    debug!(
        "Decoded {} ({}x{}, {:?})",
        path.display(),
        image.width(),
        image.height(),
        image.color()
    );
    Ok(image.to_rgb8())
}

// =============================================================================
// Pyramid generation
// =============================================================================

/// Summary of one written level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelReport {
    pub level: usize,
    pub width: u32,
    pub height: u32,
    pub columns: u32,
    pub rows: u32,
    pub tiles: u32,
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PyramidReport {
    pub backend: Backend,
    pub descriptor: PathBuf,
    pub width: u32,
    pub height: u32,
    pub levels: Vec<LevelReport>,
}

impl PyramidReport {
    pub fn total_tiles(&self) -> u64 {
        self.levels.iter().map(|level| level.tiles as u64).sum()
    }

    /// Human readable summary, one line per level.
    pub fn to_text(&self) -> String {
        let mut text = format!(
            "{} ({}x{}, {} backend)\n",
            self.descriptor.display(),
            self.width,
            self.height,
            self.backend
        );
        for level in &self.levels {
            text.push_str(&format!(
                "Level {}: {} tiles ({}x{}, {}x{} grid)\n",
                level.level, level.tiles, level.width, level.height, level.columns, level.rows
            ));
        }
        text.push_str(&format!("Total: {} tiles\n", self.total_tiles()));
        text
    }
}

/// Write the descriptor and every tile of `source` under `layout`.
///
/// Levels are written smallest first, tiles in row-major order.
pub async fn generate_pyramid<S: TileSource>(
    source: &mut S,
    layout: &OutputLayout,
    encoder: &JpegTileEncoder,
    backend: Backend,
) -> Result<PyramidReport, DziError> {
    let (width, height) = source
        .dimensions()
        .ok_or_else(|| DziError::Config("input has no pyramid levels".to_string()))?;

    write_descriptor(&layout.descriptor, width, height).await?;

    let mut levels = Vec::with_capacity(source.level_count());
    for level in 0..source.level_count() {
        let (level_width, level_height) = source.level_dimensions(level).unwrap_or((0, 0));
        let (columns, rows) = source.grid_size(level).unwrap_or((0, 0));

        let level_dir = layout.level_dir(level);
        tokio::fs::create_dir_all(&level_dir)
            .await
            .map_err(|e| DziError::write(&level_dir, e))?;

        for row in 0..rows {
            for col in 0..columns {
                let tile = source.tile(level, col, row).await?;
                let jpeg = encoder.encode(&tile)?;

                let path = layout.tile_path(level, col, row);
                tokio::fs::write(&path, &jpeg)
                    .await
                    .map_err(|e| DziError::write(&path, e))?;
            }
        }

        let tiles = columns * rows;
        info!("Level {}: {} tiles", level, tiles);
        levels.push(LevelReport {
            level,
            width: level_width,
            height: level_height,
            columns,
            rows,
            tiles,
        });
    }

    Ok(PyramidReport {
        backend,
        descriptor: layout.descriptor.clone(),
        width,
        height,
        levels,
    })
}

/// Convert the input named by `config`.
pub async fn run(config: &Config) -> Result<PyramidReport, DziError> {
    config.validate().map_err(DziError::Config)?;

    if let Some(output) = &config.output {
        warn!(
            "--output {} is ignored; writing next to the input",
            output
        );
    }

    let layout = OutputLayout::from_input(&config.input);
    layout.create_dirs().await?;

    let encoder = JpegTileEncoder::new(config.quality);
    let source = open_input(&config.input, config.slide_options(), config.bitmap_overlap).await?;
    let backend = source.backend();

    let report = match source {
        InputSource::Slide(mut generator) => {
            generate_pyramid(&mut generator, &layout, &encoder, backend).await?
        }
        InputSource::Bitmap(mut bitmap) => {
            generate_pyramid(&mut bitmap, &layout, &encoder, backend).await?
        }
    };

    info!(
        "Wrote {} tiles in {} levels to {}",
        report.total_tiles(),
        report.levels.len(),
        layout.tiles_dir.display()
    );
    Ok(report)
}
