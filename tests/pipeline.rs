//! End-to-end runs through the public API with the built-in backend.

use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use imgpipe::api::Api;
use imgpipe::cache::CacheStatus;
use imgpipe::config::{self, LimitsConfig};
use imgpipe::imaging::RustBackend;
use imgpipe::imaging::interlace::{is_interlaced_png, is_progressive_jpeg};
use imgpipe::params::ParameterSet;
use imgpipe::process;
use std::io::Cursor;
use std::path::Path;

fn png_bytes(image: DynamicImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

fn gradient(width: u32, height: u32) -> Vec<u8> {
    png_bytes(DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, 128])
    })))
}

fn half_transparent(width: u32, height: u32) -> Vec<u8> {
    png_bytes(DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, _| {
        if x < width / 2 {
            Rgba([0, 0, 0, 0])
        } else {
            Rgba([255, 0, 0, 255])
        }
    })))
}

fn api() -> Api {
    Api::from_names(
        Box::new(RustBackend::new()),
        &["size", "encode"],
        &LimitsConfig::default(),
    )
    .unwrap()
}

#[test]
fn transparent_png_becomes_progressive_jpeg_on_white() {
    let encoded = api()
        .run(&half_transparent(32, 32), &ParameterSet::from_query("fm=pjpg&q=85"))
        .unwrap();

    assert_eq!(encoded.media_type, "image/jpeg");
    assert!(is_progressive_jpeg(&encoded.bytes));

    let decoded = image::load_from_memory(&encoded.bytes).unwrap();
    assert!(!decoded.color().has_alpha());
    // Transparent half is flattened onto white, not black
    let left = decoded.to_rgb8().get_pixel(2, 16).0;
    assert!(left.iter().all(|&c| c > 230), "expected white, got {left:?}");
}

#[test]
fn resize_then_png_is_interlaced() {
    let encoded = api()
        .run(&gradient(120, 60), &ParameterSet::from_query("w=30&fm=png"))
        .unwrap();

    assert_eq!(encoded.media_type, "image/png");
    assert!(is_interlaced_png(&encoded.bytes));
    let decoded = image::load_from_memory(&encoded.bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (30, 15));
}

#[test]
fn unknown_format_keeps_source_format() {
    let encoded = api()
        .run(&gradient(8, 8), &ParameterSet::from_query("fm=bmp&q=oops"))
        .unwrap();
    assert_eq!(encoded.media_type, "image/png");
}

#[test]
fn plain_jpg_is_baseline() {
    let encoded = api()
        .run(&gradient(16, 16), &ParameterSet::from_query("fm=jpg"))
        .unwrap();
    assert_eq!(encoded.media_type, "image/jpeg");
    assert!(!is_progressive_jpeg(&encoded.bytes));
}

#[test]
fn presets_from_config_feed_the_pipeline() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("imgpipe.toml");
    std::fs::write(
        &path,
        r#"
[defaults]
q = 70

[presets.thumb]
w = 20
fm = "webp"
"#,
    )
    .unwrap();

    let config = config::load_config(&path).unwrap();
    let params = config.resolve_params(&ParameterSet::from_query("p=thumb"));
    assert_eq!(params.get("q"), Some("70"));
    assert_eq!(params.get("w"), Some("20"));

    let encoded = api().run(&gradient(80, 40), &params).unwrap();
    assert_eq!(encoded.media_type, "image/webp");
    let decoded = image::load_from_memory(&encoded.bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (20, 10));
}

#[test]
fn batch_writes_outputs_and_reuses_them() {
    let input = tempfile::TempDir::new().unwrap();
    let output = tempfile::TempDir::new().unwrap();
    std::fs::create_dir_all(input.path().join("album")).unwrap();
    std::fs::write(input.path().join("cover.png"), gradient(40, 40)).unwrap();
    std::fs::write(input.path().join("album/beach.png"), gradient(60, 30)).unwrap();

    let api = api();
    let params = ParameterSet::from_query("w=20&fm=webp");

    let first = process::process_batch(&api, input.path(), output.path(), &params, true, None)
        .unwrap();
    assert!(first.failures.is_empty());
    assert_eq!(first.cache_stats.misses, 2);
    assert!(output.path().join("cover.webp").exists());
    assert!(Path::new(&output.path().join("album/beach.webp")).exists());

    let second = process::process_batch(&api, input.path(), output.path(), &params, true, None)
        .unwrap();
    assert_eq!(second.cache_stats.hits, 2);
    assert!(
        second
            .outputs
            .iter()
            .all(|o| o.status == CacheStatus::Cached)
    );
}
