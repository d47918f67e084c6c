//! Pixel buffer helpers
//!
//! All intermediate buffers are `tiny_skia::Pixmap`s holding premultiplied
//! RGBA. Conversion to straight alpha only happens at the output boundary
//! (PNG files and PDF image streams).

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use image::imageops::FilterType;
use image::RgbaImage;
use tiny_skia::{
    IntRect, IntSize, Paint, PathBuilder, Pixmap, PixmapPaint, Rect, Stroke, Transform,
};

use crate::constants::{MAX_RENDER_DIMENSION_PX, METERS_PER_INCH};
use crate::types::{RenderError, Result, Rgba};

/// Allocate a fully transparent buffer
pub fn new_pixmap(width: u32, height: u32) -> Result<Pixmap> {
    if width > MAX_RENDER_DIMENSION_PX || height > MAX_RENDER_DIMENSION_PX {
        return Err(RenderError::Allocation { width, height });
    }
    Pixmap::new(width.max(1), height.max(1)).ok_or(RenderError::Allocation { width, height })
}

/// Draw `src` onto `dst` with its top-left corner at (`x`, `y`)
pub fn paste(dst: &mut Pixmap, src: &Pixmap, x: i32, y: i32) {
    dst.draw_pixmap(
        x,
        y,
        src.as_ref(),
        &PixmapPaint::default(),
        Transform::identity(),
        None,
    );
}

/// Draw `src` centered on `dst`
pub fn paste_centered(dst: &mut Pixmap, src: &Pixmap) {
    let x = (dst.width() as i32 - src.width() as i32) / 2;
    let y = (dst.height() as i32 - src.height() as i32) / 2;
    paste(dst, src, x, y);
}

/// Bounding box of all pixels with non-zero alpha
pub fn content_bounds(pixmap: &Pixmap) -> Option<IntRect> {
    let width = pixmap.width() as usize;
    let mut min_x = usize::MAX;
    let mut min_y = usize::MAX;
    let mut max_x = 0usize;
    let mut max_y = 0usize;
    let mut found = false;

    for (i, px) in pixmap.pixels().iter().enumerate() {
        if px.alpha() == 0 {
            continue;
        }
        let (x, y) = (i % width, i / width);
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
        found = true;
    }

    if !found {
        return None;
    }
    IntRect::from_xywh(
        min_x as i32,
        min_y as i32,
        (max_x - min_x + 1) as u32,
        (max_y - min_y + 1) as u32,
    )
}

/// Remove transparent borders. A fully transparent buffer is returned unchanged.
pub fn trim_transparent(pixmap: Pixmap) -> Pixmap {
    let Some(bounds) = content_bounds(&pixmap) else {
        return pixmap;
    };
    if bounds.width() == pixmap.width() && bounds.height() == pixmap.height() {
        return pixmap;
    }
    pixmap.clone_rect(bounds).unwrap_or(pixmap)
}

/// Resample to `width` x `height` using `filter`.
///
/// Resampling runs on premultiplied data so transparent pixels do not bleed
/// color into edges; ringing from the filter is clamped back to valid
/// premultiplied values afterwards.
pub fn resize(pixmap: &Pixmap, width: u32, height: u32, filter: FilterType) -> Result<Pixmap> {
    let width = width.max(1);
    let height = height.max(1);
    if width == pixmap.width() && height == pixmap.height() {
        return Ok(pixmap.clone());
    }
    let src = RgbaImage::from_raw(pixmap.width(), pixmap.height(), pixmap.data().to_vec())
        .ok_or(RenderError::Allocation {
            width: pixmap.width(),
            height: pixmap.height(),
        })?;
    let mut resized = image::imageops::resize(&src, width, height, filter).into_raw();
    for px in resized.chunks_exact_mut(4) {
        let a = px[3];
        px[0] = px[0].min(a);
        px[1] = px[1].min(a);
        px[2] = px[2].min(a);
    }
    let size = IntSize::from_wh(width, height).ok_or(RenderError::Allocation { width, height })?;
    Pixmap::from_vec(resized, size).ok_or(RenderError::Allocation { width, height })
}

/// Import a straight-alpha image as a premultiplied buffer
pub fn from_rgba_image(image: &RgbaImage) -> Result<Pixmap> {
    let (width, height) = image.dimensions();
    let mut pixmap = new_pixmap(width, height)?;
    for (src, dst) in image
        .as_raw()
        .chunks_exact(4)
        .zip(pixmap.data_mut().chunks_exact_mut(4))
    {
        let a = src[3];
        dst[0] = premul_u8(src[0], a);
        dst[1] = premul_u8(src[1], a);
        dst[2] = premul_u8(src[2], a);
        dst[3] = a;
    }
    Ok(pixmap)
}

/// Straight-alpha RGBA bytes of a buffer
pub fn to_straight_rgba(pixmap: &Pixmap) -> Vec<u8> {
    let mut out = Vec::with_capacity(pixmap.data().len());
    for px in pixmap.pixels() {
        let c = px.demultiply();
        out.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }
    out
}

fn premul_u8(channel: u8, alpha: u8) -> u8 {
    let prod = (channel as u16) * (alpha as u16) + 127;
    ((prod + (prod >> 8)) >> 8) as u8
}

/// Pixels per meter for the PNG `pHYs` chunk
pub fn dpi_to_ppm(dpi: u32) -> u32 {
    (dpi as f64 / METERS_PER_INCH).round() as u32
}

/// Write a buffer as PNG with its resolution embedded
pub fn write_png(pixmap: &Pixmap, path: &Path, dpi: u32) -> Result<()> {
    let file = File::create(path)?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), pixmap.width(), pixmap.height());
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let ppm = dpi_to_ppm(dpi);
    encoder.set_pixel_dims(Some(png::PixelDimensions {
        xppu: ppm,
        yppu: ppm,
        unit: png::Unit::Meter,
    }));
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&to_straight_rgba(pixmap))?;
    writer.finish()?;
    Ok(())
}

fn solid_paint(color: Rgba) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color.to_skia());
    paint.anti_alias = true;
    paint
}

/// Stroke a straight line
pub fn stroke_line(pixmap: &mut Pixmap, from: (f32, f32), to: (f32, f32), width: f32, color: Rgba) {
    let mut pb = PathBuilder::new();
    pb.move_to(from.0, from.1);
    pb.line_to(to.0, to.1);
    let Some(path) = pb.finish() else {
        return;
    };
    let stroke = Stroke {
        width,
        ..Stroke::default()
    };
    pixmap.stroke_path(&path, &solid_paint(color), &stroke, Transform::identity(), None);
}

/// Stroke the outline of a rectangle given by its corners
pub fn stroke_rect(
    pixmap: &mut Pixmap,
    left: f32,
    top: f32,
    right: f32,
    bottom: f32,
    width: f32,
    color: Rgba,
) {
    let Some(rect) = Rect::from_ltrb(left, top, right, bottom) else {
        return;
    };
    let path = PathBuilder::from_rect(rect);
    let stroke = Stroke {
        width,
        ..Stroke::default()
    };
    pixmap.stroke_path(&path, &solid_paint(color), &stroke, Transform::identity(), None);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(width: u32, height: u32, rect: (u32, u32, u32, u32)) -> Pixmap {
        let mut pixmap = new_pixmap(width, height).unwrap();
        let paint = solid_paint(Rgba([255, 0, 0, 255]));
        let r = Rect::from_xywh(rect.0 as f32, rect.1 as f32, rect.2 as f32, rect.3 as f32).unwrap();
        pixmap.fill_rect(r, &paint, Transform::identity(), None);
        pixmap
    }

    #[test]
    fn test_trim_transparent() {
        let pixmap = filled(100, 80, (10, 20, 30, 40));
        let trimmed = trim_transparent(pixmap);
        assert_eq!((trimmed.width(), trimmed.height()), (30, 40));
    }

    #[test]
    fn test_trim_empty_is_noop() {
        let pixmap = new_pixmap(12, 7).unwrap();
        let trimmed = trim_transparent(pixmap);
        assert_eq!((trimmed.width(), trimmed.height()), (12, 7));
    }

    #[test]
    fn test_resize_keeps_valid_premultiplied() {
        let pixmap = filled(50, 50, (10, 10, 30, 30));
        let resized = resize(&pixmap, 17, 23, FilterType::Lanczos3).unwrap();
        assert_eq!((resized.width(), resized.height()), (17, 23));
        for px in resized.data().chunks_exact(4) {
            assert!(px[0] <= px[3]);
        }
    }

    #[test]
    fn test_straight_alpha_roundtrip_opaque() {
        let pixmap = filled(4, 4, (0, 0, 4, 4));
        let data = to_straight_rgba(&pixmap);
        assert_eq!(&data[..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn test_refuses_huge_buffers() {
        match new_pixmap(MAX_RENDER_DIMENSION_PX + 1, 10) {
            Err(RenderError::Allocation { width, .. }) => {
                assert_eq!(width, MAX_RENDER_DIMENSION_PX + 1)
            }
            _ => panic!("Expected Allocation error"),
        }
    }

    #[test]
    fn test_dpi_to_ppm() {
        assert_eq!(dpi_to_ppm(600), 23622);
        assert_eq!(dpi_to_ppm(300), 11811);
    }
}
