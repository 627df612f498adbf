//! # Output Integration Tests
//!
//! Decoding sources, category directory preparation and artifact writing
//! against a temporary directory.

mod test_helpers;

use std::fs;

use doc_binarize::binarization::{PixelBuffer, SauvolaParams};
use doc_binarize::errors::AppError;
use doc_binarize::output::{
    load_grayscale, prepare_category_dir, write_manifest, write_sweep, OutputFormat,
    MANIFEST_FILE_NAME,
};
use doc_binarize::sweep::run_sweep;
use image::{GrayImage, Luma, Rgb, RgbImage};
use tempfile::TempDir;
use test_helpers::*;

#[test]
fn test_load_grayscale_round_trips_png() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("page.png");
    let page = shadowed_page();
    page.to_gray_image().save(&path).unwrap();

    let loaded = load_grayscale(&path).unwrap();
    assert_eq!(loaded, page);
}

#[test]
fn test_load_grayscale_converts_color() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("color.png");
    let image = RgbImage::from_fn(4, 3, |x, _| {
        if x < 2 {
            Rgb([0, 0, 0])
        } else {
            Rgb([255, 255, 255])
        }
    });
    image.save(&path).unwrap();

    let loaded = load_grayscale(&path).unwrap();
    assert_eq!((loaded.width(), loaded.height()), (4, 3));
    assert_eq!(loaded.get(0, 0), Some(0));
    assert_eq!(loaded.get(2, 3), Some(255));
}

#[test]
fn test_load_grayscale_reports_missing_file() {
    let dir = TempDir::new().unwrap();
    let result = load_grayscale(&dir.path().join("missing.png"));
    assert!(matches!(result, Err(AppError::Image(_))));
}

#[test]
fn test_prepare_category_dir_clears_previous_run() {
    let dir = TempDir::new().unwrap();
    let stale = dir.path().join("otsu");
    fs::create_dir_all(stale.join("nested")).unwrap();
    fs::write(stale.join("old.jpg"), b"stale").unwrap();
    fs::write(stale.join("nested").join("older.jpg"), b"stale").unwrap();

    let prepared = prepare_category_dir(dir.path(), "otsu").unwrap();

    assert_eq!(prepared, stale);
    assert!(prepared.is_dir());
    assert_eq!(fs::read_dir(&prepared).unwrap().count(), 0);
}

#[test]
fn test_write_sweep_names_files_by_parameters() {
    let dir = TempDir::new().unwrap();
    let page = shadowed_page();
    let result = run_sweep(&page, &[90, 150], &[SauvolaParams::new(15, 0.2)]).unwrap();

    let artifacts = write_sweep(&result, dir.path(), OutputFormat::Png).unwrap();

    let paths: Vec<_> = artifacts
        .iter()
        .map(|artifact| artifact.path.strip_prefix(dir.path()).unwrap().to_path_buf())
        .collect();
    assert_eq!(
        paths,
        vec![
            std::path::PathBuf::from("otsu/otsu_binarization_threshold90.png"),
            std::path::PathBuf::from("otsu/otsu_binarization_threshold150.png"),
            std::path::PathBuf::from("sauvola/sauvola_binarization_w15_k0.20.png"),
        ]
    );
    for artifact in &artifacts {
        assert!(artifact.path.is_file());
        assert!(artifact.bytes > 0);
    }
}

#[test]
fn test_written_png_matches_sweep_output() {
    let dir = TempDir::new().unwrap();
    let page = shadowed_page();
    let result = run_sweep(&page, &[], &[SauvolaParams::new(15, 0.2)]).unwrap();

    let artifacts = write_sweep(&result, dir.path(), OutputFormat::Png).unwrap();
    let reloaded = load_grayscale(&artifacts[0].path).unwrap();

    assert_eq!(reloaded, result.entries()[0].output);
}

#[test]
fn test_write_sweep_leaves_unused_category_alone() {
    let dir = TempDir::new().unwrap();
    let sauvola = dir.path().join("sauvola");
    fs::create_dir_all(&sauvola).unwrap();
    fs::write(sauvola.join("keep.jpg"), b"previous").unwrap();

    let page = PixelBuffer::from(GrayImage::from_pixel(8, 8, Luma([120])));
    let result = run_sweep(&page, &[60], &[]).unwrap();
    write_sweep(&result, dir.path(), OutputFormat::Jpeg).unwrap();

    assert!(dir
        .path()
        .join("otsu/otsu_binarization_threshold60.jpg")
        .is_file());
    assert!(sauvola.join("keep.jpg").is_file());
}

#[test]
fn test_manifest_lists_every_artifact() {
    let dir = TempDir::new().unwrap();
    let page = shadowed_page();
    let result = run_sweep(&page, &[90], &[SauvolaParams::new(11, 0.4)]).unwrap();
    let artifacts = write_sweep(&result, dir.path(), OutputFormat::Jpeg).unwrap();

    let path = write_manifest(
        dir.path(),
        std::path::Path::new("scan.jpg"),
        (page.width(), page.height()),
        &artifacts,
    )
    .unwrap();
    assert_eq!(path, dir.path().join(MANIFEST_FILE_NAME));

    let manifest: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(manifest["source"], "scan.jpg");
    assert_eq!(manifest["width"], PAGE_WIDTH);
    assert_eq!(manifest["height"], PAGE_HEIGHT);
    assert!(manifest["generated_at"].is_string());

    let entries = manifest["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["label"], "Otsu threshold=90");
    assert_eq!(entries[0]["parameters"]["kind"], "otsu");
    assert_eq!(entries[1]["label"], "Sauvola window=11 k=0.40");
    assert_eq!(entries[1]["parameters"]["window_size"], 11);
}

#[test]
fn test_close_k_values_get_distinct_files() {
    let dir = TempDir::new().unwrap();
    let page = shadowed_page();
    let result = run_sweep(
        &page,
        &[],
        &[SauvolaParams::new(11, 0.341), SauvolaParams::new(11, 0.344)],
    )
    .unwrap();
    assert_eq!(
        result.labels(),
        vec!["Sauvola window=11 k=0.341", "Sauvola window=11 k=0.344"]
    );

    let artifacts = write_sweep(&result, dir.path(), OutputFormat::Png).unwrap();
    assert_eq!(
        artifacts[0].path,
        dir.path().join("sauvola/sauvola_binarization_w11_k0.341.png")
    );
    assert_eq!(
        artifacts[1].path,
        dir.path().join("sauvola/sauvola_binarization_w11_k0.344.png")
    );
}

#[test]
fn test_duplicate_entries_are_not_overwritten() {
    let dir = TempDir::new().unwrap();
    let page = shadowed_page();
    let result = run_sweep(&page, &[90, 90], &[]).unwrap();

    let artifacts = write_sweep(&result, dir.path(), OutputFormat::Png).unwrap();

    let paths: std::collections::HashSet<_> =
        artifacts.iter().map(|artifact| artifact.path.clone()).collect();
    assert_eq!(paths.len(), 2);
    assert_eq!(
        artifacts[0].path,
        dir.path().join("otsu/otsu_binarization_threshold90.png")
    );
    assert_eq!(
        artifacts[1].path,
        dir.path().join("otsu/otsu_binarization_threshold90_1.png")
    );
    assert_eq!(fs::read_dir(dir.path().join("otsu")).unwrap().count(), 2);
    for artifact in &artifacts {
        assert_eq!(fs::metadata(&artifact.path).unwrap().len(), artifact.bytes);
    }
}
