//! Deep Zoom Image (DZI) descriptor and level arithmetic.
//!
//! Deep Zoom numbers levels from the bottom up:
//! - level 0 is at most 1x1 pixel
//! - level `max_level` is the full resolution image
//!
//! whereas slide pyramids number theirs from full resolution down. The
//! helpers here convert between the two.

use std::path::Path;

use tracing::debug;

use crate::error::DziError;

/// Edge length of a tile, excluding overlap.
pub const TILE_SIZE: u32 = 254;

/// Overlap advertised in the descriptor.
pub const OVERLAP: u32 = 1;

/// Tile image format, also the tile file extension.
pub const TILE_FORMAT: &str = "jpeg";

pub const DEEPZOOM_NAMESPACE: &str = "http://schemas.microsoft.com/deepzoom/2008";

/// Render the DZI descriptor for a `width` x `height` image.
///
/// ```xml
/// <?xml version="1.0" encoding="UTF-8"?>
/// <Image xmlns="http://schemas.microsoft.com/deepzoom/2008" TileSize="254" Overlap="1" Format="jpeg">
///   <Size Width="46920" Height="33600"/>
/// </Image>
/// ```
pub fn generate_dzi_xml(width: u32, height: u32) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Image xmlns="{DEEPZOOM_NAMESPACE}" TileSize="{TILE_SIZE}" Overlap="{OVERLAP}" Format="{TILE_FORMAT}">
  <Size Width="{width}" Height="{height}"/>
</Image>
"#
    )
}

/// Write the descriptor to `path`, creating parent directories.
pub async fn write_descriptor(path: &Path, width: u32, height: u32) -> Result<(), DziError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| DziError::write(parent, e))?;
    }

    tokio::fs::write(path, generate_dzi_xml(width, height))
        .await
        .map_err(|e| DziError::write(path, e))?;

    debug!("Wrote descriptor {} ({}x{})", path.display(), width, height);
    Ok(())
}

/// `ceil(log2(max(width, height)))`; 0 for a 1x1 image.
pub fn calculate_max_dzi_level(width: u32, height: u32) -> usize {
    let max_dim = width.max(height);
    if max_dim <= 1 {
        return 0;
    }
    (u32::BITS - (max_dim - 1).leading_zeros()) as usize
}

/// Level dimensions by ceil division: `ceil(width / 2^(max_level - level))`.
///
/// Equal to repeatedly halving the full resolution with rounding up. Returns
/// `(0, 0)` above `max_dzi_level`.
pub fn dzi_level_dimensions(
    width: u32,
    height: u32,
    dzi_level: usize,
    max_dzi_level: usize,
) -> (u32, u32) {
    if dzi_level > max_dzi_level {
        return (0, 0);
    }

    let scale = 1u64 << (max_dzi_level - dzi_level);
    let level_width = (width as u64).div_ceil(scale) as u32;
    let level_height = (height as u64).div_ceil(scale) as u32;

    (level_width.max(1), level_height.max(1))
}

/// Level dimensions by rounding: `max(1, round(width * 2^(level - max_level)))`.
///
/// Used when every level is resampled directly from the source bitmap.
pub fn resampled_level_dimensions(
    width: u32,
    height: u32,
    dzi_level: usize,
    max_dzi_level: usize,
) -> (u32, u32) {
    if dzi_level > max_dzi_level {
        return (0, 0);
    }

    let scale = dzi_level_downsample(dzi_level, max_dzi_level);
    let scaled = |dim: u32| ((dim as f64 / scale).round() as u32).max(1);
    (scaled(width), scaled(height))
}

/// Downsample of a level relative to full resolution; 0.0 above the max.
pub fn dzi_level_downsample(dzi_level: usize, max_dzi_level: usize) -> f64 {
    if dzi_level > max_dzi_level {
        return 0.0;
    }
    2f64.powi((max_dzi_level - dzi_level) as i32)
}

/// Pick the slide level to read a Deep Zoom level from.
///
/// `wsi_level_downsamples` lists slide downsamples from full resolution
/// down. The chosen level is the one with the largest downsample not
/// exceeding `dzi_downsample` (level 0 if none qualifies). Returns
/// `(wsi_level, additional_scale)` where the scale still has to be applied
/// to that level's pixels.
pub fn find_best_wsi_level(
    wsi_level_downsamples: &[f64],
    dzi_downsample: f64,
) -> Option<(usize, f64)> {
    let first = *wsi_level_downsamples.first()?;

    let (best_level, best_downsample) = wsi_level_downsamples
        .iter()
        .copied()
        .enumerate()
        .filter(|&(_, downsample)| downsample <= dzi_downsample)
        .fold((0, first), |best, candidate| {
            if candidate.1 >= best.1 {
                candidate
            } else {
                best
            }
        });

    Some((best_level, dzi_downsample / best_downsample))
}

/// Columns and rows of a level's tile grid.
pub fn dzi_tile_count(level_width: u32, level_height: u32, tile_size: u32) -> (u32, u32) {
    let tiles_x = level_width.div_ceil(tile_size);
    let tiles_y = level_height.div_ceil(tile_size);
    (tiles_x.max(1), tiles_y.max(1))
}
