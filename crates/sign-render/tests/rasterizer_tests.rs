use base64::Engine as _;
use sign_render::rasterizer::{fit_within, is_pseudo_vector};
use sign_render::*;
use std::io::Cursor;
use std::path::PathBuf;
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn embedded_png_svg(width: u32, height: u32) -> String {
    let image = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 0, 0, 255]));
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    let payload = base64::engine::general_purpose::STANDARD.encode(&bytes);
    format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}"><image width="{width}" height="{height}" href="data:image/png;base64,{payload}"/></svg>"#
    )
}

#[test]
fn test_pseudo_vector_is_decoded_directly() {
    let dir = TempDir::new().unwrap();
    let svg = embedded_png_svg(20, 10);
    assert!(is_pseudo_vector(&svg));
    let path = write(&dir, "scan.svg", &svg);

    let pixmap = Rasterizer::new()
        .rasterize_px(&path, SizePx::new(100, 100), None)
        .unwrap();
    assert_eq!((pixmap.width(), pixmap.height()), (100, 50));
    // opaque red survives resampling
    let center = pixmap.pixels()[25 * 100 + 50];
    assert_eq!(center.alpha(), 255);
    assert!(center.red() > 150);
}

#[test]
fn test_vector_template_is_trimmed_and_fitted() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "rect.svg",
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="50" viewBox="0 0 100 50"><rect x="10" y="10" width="80" height="30" fill="black"/></svg>"#,
    );

    let pixmap = Rasterizer::new()
        .rasterize_px(&path, SizePx::new(160, 160), None)
        .unwrap();
    // whitespace around the rectangle is gone: 80x30 scaled to the box width
    assert_eq!(pixmap.width(), 160);
    assert!((59..=61).contains(&pixmap.height()));
    assert!(pixmap.pixels().iter().filter(|p| p.alpha() == 255).count() > 160 * 50);
}

#[test]
fn test_mixed_template_is_vector_rendered() {
    let svg = embedded_png_svg(4, 4).replace("<image", r#"<rect width="2" height="2"/><image"#);
    assert!(!is_pseudo_vector(&svg));
}

#[test]
fn test_rasterize_in_mm() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "square.svg",
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10"><circle cx="5" cy="5" r="5" fill="blue"/></svg>"#,
    );
    let pixmap = Rasterizer::new()
        .rasterize(&path, SizeMm::new(25.4, 25.4), 300, Some(2.0))
        .unwrap();
    assert_eq!((pixmap.width(), pixmap.height()), (300, 300));
}

#[test]
fn test_corrupt_template_is_template_error() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "broken.svg", "<svg><rect");
    match Rasterizer::new().rasterize_px(&path, SizePx::new(50, 50), None) {
        Err(RenderError::Template { path: failed, .. }) => assert_eq!(failed, path),
        _ => panic!("Expected Template error"),
    }
}

#[test]
fn test_invalid_embedded_payload_is_template_error() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "bad.svg",
        r#"<svg><image href="data:image/png;base64,AAAA"/></svg>"#,
    );
    assert!(matches!(
        Rasterizer::new().rasterize_px(&path, SizePx::new(50, 50), None),
        Err(RenderError::Template { .. })
    ));
}

#[test]
fn test_fit_within_never_exceeds_box() {
    for (w, h) in [(1, 1000), (1000, 1), (333, 777), (4000, 4000)] {
        let fitted = fit_within((w, h), SizePx::new(250, 120));
        assert!(fitted.width <= 250 && fitted.height <= 120);
        assert!(fitted.width >= 1 && fitted.height >= 1);
    }
}
