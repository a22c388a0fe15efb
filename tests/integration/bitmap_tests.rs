//! End-to-end conversion of plain images.
//!
//! Tests verify:
//! - Output layout next to the input
//! - Level counts, tile grids and edge tile sizes
//! - Descriptor contents
//! - Quality and overlap options

use std::path::Path;

use image::{Rgb, RgbImage};

use dzi_tiler::config::Config;
use dzi_tiler::pipeline::{run, Backend, OutputLayout};

use super::test_utils::{gradient_image, read_tile, write_image};

fn tile_dims(layout: &OutputLayout, level: usize, col: u32, row: u32) -> (u32, u32) {
    read_tile(&layout.tile_path(level, col, row)).dimensions()
}

fn count_files(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

#[tokio::test]
async fn test_square_image() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_image(dir.path(), "square.png", &gradient_image(512, 512));

    let report = run(&Config::for_input(&input)).await.unwrap();
    let layout = OutputLayout::from_input(&input);

    assert_eq!(report.backend, Backend::Bitmap);
    assert_eq!(report.descriptor, dir.path().join("dzi").join("square.dzi"));
    assert_eq!(report.levels.len(), 10);

    // 512 = 254 + 254 + 4 on both axes
    let top = &report.levels[9];
    assert_eq!((top.width, top.height), (512, 512));
    assert_eq!((top.columns, top.rows, top.tiles), (3, 3, 9));
    assert_eq!(count_files(&layout.level_dir(9)), 9);
    assert_eq!(tile_dims(&layout, 9, 0, 0), (254, 254));
    assert_eq!(tile_dims(&layout, 9, 2, 1), (4, 254));
    assert_eq!(tile_dims(&layout, 9, 2, 2), (4, 4));

    assert_eq!(report.levels[8].tiles, 2 * 2);
    assert_eq!(tile_dims(&layout, 8, 1, 1), (2, 2));

    let bottom = &report.levels[0];
    assert_eq!((bottom.width, bottom.height, bottom.tiles), (1, 1, 1));
    assert_eq!(tile_dims(&layout, 0, 0, 0), (1, 1));

    let xml = std::fs::read_to_string(&layout.descriptor).unwrap();
    assert!(xml.contains("TileSize=\"254\" Overlap=\"1\" Format=\"jpeg\""));
    assert!(xml.contains("<Size Width=\"512\" Height=\"512\"/>"));
}

#[tokio::test]
async fn test_wide_image() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_image(dir.path(), "wide.jpg", &gradient_image(300, 100));

    let report = run(&Config::for_input(&input)).await.unwrap();
    let layout = OutputLayout::from_input(&input);

    assert_eq!(report.levels.len(), 10);
    assert_eq!(report.levels[9].tiles, 2);
    assert_eq!(tile_dims(&layout, 9, 0, 0), (254, 100));
    assert_eq!(tile_dims(&layout, 9, 1, 0), (46, 100));
    assert!(!layout.tile_path(9, 2, 0).exists());

    // round(300 / 2) x round(100 / 2), then round(37.5) = 38 x round(12.5) = 13
    assert_eq!((report.levels[8].width, report.levels[8].height), (150, 50));
    assert_eq!((report.levels[6].width, report.levels[6].height), (38, 13));

    let xml = std::fs::read_to_string(&layout.descriptor).unwrap();
    assert!(xml.contains("<Size Width=\"300\" Height=\"100\"/>"));
}

#[tokio::test]
async fn test_single_pixel_image() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_image(
        dir.path(),
        "dot.png",
        &RgbImage::from_pixel(1, 1, Rgb([200, 10, 10])),
    );

    let report = run(&Config::for_input(&input)).await.unwrap();
    let layout = OutputLayout::from_input(&input);

    assert_eq!(report.levels.len(), 1);
    assert_eq!(report.total_tiles(), 1);
    assert_eq!(tile_dims(&layout, 0, 0, 0), (1, 1));
    assert_eq!(count_files(&layout.tiles_dir), 1);

    let xml = std::fs::read_to_string(&layout.descriptor).unwrap();
    assert!(xml.contains("<Size Width=\"1\" Height=\"1\"/>"));
}

#[tokio::test]
async fn test_tile_counts_match_grid() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_image(dir.path(), "odd.png", &gradient_image(1001, 377));

    let report = run(&Config::for_input(&input)).await.unwrap();
    let layout = OutputLayout::from_input(&input);

    assert_eq!(report.levels.len(), 11);
    for level in &report.levels {
        assert_eq!(level.columns, level.width.div_ceil(254));
        assert_eq!(level.rows, level.height.div_ceil(254));
        assert_eq!(
            count_files(&layout.level_dir(level.level)),
            level.tiles as usize,
            "level {}",
            level.level
        );
    }

    // Tiles of one level add up to the level size
    let top = &report.levels[10];
    let widths: u32 = (0..top.columns)
        .map(|col| tile_dims(&layout, 10, col, 0).0)
        .sum();
    let heights: u32 = (0..top.rows).map(|row| tile_dims(&layout, 10, 0, row).1).sum();
    assert_eq!((widths, heights), (1001, 377));
}

#[tokio::test]
async fn test_bitmap_overlap_option() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_image(dir.path(), "overlap.png", &gradient_image(600, 300));

    let mut config = Config::for_input(&input);
    config.bitmap_overlap = 1;
    run(&config).await.unwrap();
    let layout = OutputLayout::from_input(&input);

    assert_eq!(tile_dims(&layout, 10, 0, 0), (255, 255));
    assert_eq!(tile_dims(&layout, 10, 1, 1), (256, 47));
    assert_eq!(tile_dims(&layout, 10, 2, 0), (93, 255));
}

#[tokio::test]
async fn test_quality_option() {
    let dir = tempfile::tempdir().unwrap();
    let image = gradient_image(254, 254);
    let low = write_image(dir.path(), "low.png", &image);
    let high = write_image(dir.path(), "high.png", &image);

    let mut config = Config::for_input(&low);
    config.quality = 10;
    run(&config).await.unwrap();
    let mut config = Config::for_input(&high);
    config.quality = 95;
    run(&config).await.unwrap();

    let size = |input: &Path| {
        std::fs::metadata(OutputLayout::from_input(input).tile_path(8, 0, 0))
            .unwrap()
            .len()
    };
    assert!(size(&low) < size(&high));
}

#[tokio::test]
async fn test_output_flag_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_image(dir.path(), "named.png", &gradient_image(20, 20));

    let mut config = Config::for_input(&input);
    config.output = Some("elsewhere".to_string());
    let report = run(&config).await.unwrap();

    assert_eq!(report.descriptor, dir.path().join("dzi").join("named.dzi"));
    assert!(!dir.path().join("elsewhere.dzi").exists());
    assert!(!dir.path().join("dzi").join("elsewhere.dzi").exists());
}
