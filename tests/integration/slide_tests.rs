//! Deep Zoom tiling of whole slides.
//!
//! Tests verify:
//! - Deep Zoom levels halve the slide dimensions rounding up
//! - Each level is read from the closest slide level at or below it
//! - Tiles carry 1 px overlap on interior edges
//! - Tile pixels come from the right place in the slide

use dzi_tiler::pipeline::{generate_pyramid, Backend, OutputLayout};
use dzi_tiler::slide::{Slide, SlideOptions};
use dzi_tiler::tile::{DeepZoomGenerator, JpegTileEncoder, TileRect, TileSource};

use super::test_utils::{
    colors_close, create_svs, read_tile, tile_color, two_level_pyramid, MemoryReader,
};

async fn generator(data: Vec<u8>) -> DeepZoomGenerator<MemoryReader> {
    let slide = Slide::open(MemoryReader::new(data, "mem://slide"), SlideOptions::default())
        .await
        .unwrap();
    DeepZoomGenerator::new(slide).unwrap()
}

// =============================================================================
// Level Geometry
// =============================================================================

#[tokio::test]
async fn test_levels_halve_rounding_up() {
    let dz = generator(two_level_pyramid().build()).await;

    assert_eq!(dz.level_count(), 12);
    assert_eq!(dz.tile_size(), 254);
    assert_eq!(dz.overlap(), 1);
    assert_eq!(dz.dimensions(), Some((2048, 512)));
    assert_eq!(dz.level_dimensions(11), Some((2048, 512)));
    assert_eq!(dz.level_dimensions(10), Some((1024, 256)));
    assert_eq!(dz.level_dimensions(9), Some((512, 128)));
    assert_eq!(dz.level_dimensions(2), Some((4, 1)));
    assert_eq!(dz.level_dimensions(0), Some((1, 1)));
    assert_eq!(dz.level_dimensions(12), None);

    assert_eq!(dz.grid_size(11), Some((9, 3)));
    assert_eq!(dz.grid_size(10), Some((5, 2)));
}

#[tokio::test]
async fn test_tile_rects_carry_overlap() {
    let dz = generator(two_level_pyramid().build()).await;

    let rect = |col, row| dz.tile_rect(11, col, row).unwrap();
    assert_eq!(
        rect(0, 0),
        TileRect {
            x: 0,
            y: 0,
            width: 255,
            height: 255
        }
    );
    assert_eq!(
        rect(1, 1),
        TileRect {
            x: 253,
            y: 253,
            width: 256,
            height: 256
        }
    );
    assert_eq!(
        rect(8, 2),
        TileRect {
            x: 2031,
            y: 507,
            width: 17,
            height: 5
        }
    );
    assert!(dz.tile_rect(11, 9, 0).is_err());
}

#[tokio::test]
async fn test_tile_regions_pick_slide_level() {
    let dz = generator(two_level_pyramid().build()).await;

    // Full resolution
    let region = dz.tile_region(11, 1, 0).unwrap();
    assert_eq!(region.slide_level, 0);
    assert_eq!((region.x, region.y, region.width, region.height), (253, 0, 256, 255));

    // Exactly the second slide level
    let region = dz.tile_region(10, 0, 0).unwrap();
    assert_eq!(region.slide_level, 1);
    assert_eq!((region.x, region.width), (0, 255));

    // Half of the second slide level
    let region = dz.tile_region(9, 0, 0).unwrap();
    assert_eq!(region.slide_level, 1);
    assert_eq!((region.x, region.y, region.width, region.height), (0, 0, 510, 256));
    assert_eq!((region.tile.width, region.tile.height), (255, 128));
}

// =============================================================================
// Tile Pixels
// =============================================================================

#[tokio::test]
async fn test_full_resolution_tile_pixels() {
    let mut dz = generator(two_level_pyramid().build()).await;

    let tile = dz.tile(11, 1, 0).await.unwrap();
    assert_eq!(tile.dimensions(), (256, 255));
    // Column 0 is slide x 253 (stored tile 0), column 3 is x 256 (stored tile 1)
    assert!(colors_close(tile.get_pixel(0, 10), &tile_color(0, 0, 0), 6));
    assert!(colors_close(tile.get_pixel(3, 10), &tile_color(0, 1, 0), 6));
}

#[tokio::test]
async fn test_downsampled_tile_pixels() {
    let mut dz = generator(two_level_pyramid().build()).await;

    let tile = dz.tile(9, 0, 0).await.unwrap();
    assert_eq!(tile.dimensions(), (255, 128));
    // Level 9 x 10 is level 1 x 20, inside stored tile 0 of slide level 1
    assert!(colors_close(tile.get_pixel(10, 60), &tile_color(1, 0, 0), 8));
    assert!(colors_close(tile.get_pixel(200, 60), &tile_color(1, 1, 0), 8));
}

#[tokio::test]
async fn test_smallest_level_is_one_pixel() {
    let mut dz = generator(create_svs()).await;

    let tile = dz.tile(0, 0, 0).await.unwrap();
    assert_eq!(tile.dimensions(), (1, 1));
}

// =============================================================================
// Whole Pyramid
// =============================================================================

#[tokio::test]
async fn test_generate_slide_pyramid() {
    let dir = tempfile::tempdir().unwrap();
    let layout = OutputLayout::from_input(&dir.path().join("CMU-1.svs"));
    let mut dz = generator(create_svs()).await;

    let report = generate_pyramid(&mut dz, &layout, &JpegTileEncoder::default(), Backend::Slide)
        .await
        .unwrap();

    assert_eq!((report.width, report.height), (2048, 512));
    assert_eq!(report.levels.len(), 12);
    assert_eq!(report.levels[11].tiles, 27);
    assert_eq!(report.levels[10].tiles, 10);
    assert_eq!(report.total_tiles(), 50);

    let xml = std::fs::read_to_string(&layout.descriptor).unwrap();
    assert!(xml.contains("<Size Width=\"2048\" Height=\"512\"/>"));

    // Interior tiles are 256 px wide, edge tiles 255
    assert_eq!(read_tile(&layout.tile_path(11, 0, 0)).dimensions(), (255, 255));
    assert_eq!(read_tile(&layout.tile_path(11, 4, 1)).dimensions(), (256, 256));
    assert_eq!(read_tile(&layout.tile_path(11, 8, 2)).dimensions(), (17, 5));
    assert_eq!(read_tile(&layout.tile_path(0, 0, 0)).dimensions(), (1, 1));
    assert!(!layout.tile_path(11, 9, 0).exists());
}
