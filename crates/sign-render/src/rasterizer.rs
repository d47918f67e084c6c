//! Vector template rasterization
//!
//! Templates are rendered supersampled, trimmed of transparent borders at
//! the high resolution and then downsampled into the target box. Templates
//! that merely wrap an embedded PNG skip vector rendering and are decoded
//! and scaled directly.

use std::path::Path;
use std::sync::Arc;

use base64::Engine as _;
use image::imageops::FilterType;
use log::{debug, info, warn};
use resvg::usvg;
use tiny_skia::{Pixmap, Transform};

use crate::artifact::ArtifactSpec;
use crate::constants::{
    EMBEDDED_PNG_MARKER, MAX_RENDER_DIMENSION_PX, MIN_RECOMMENDED_GRAPHIC_MM, RENDER_SCALE_BIG,
    RENDER_SCALE_BIG_THRESHOLD_PX, RENDER_SCALE_MED, RENDER_SCALE_MED_THRESHOLD_PX,
    RENDER_SCALE_SMALL, VECTOR_PRIMITIVES,
};
use crate::dimensions::{SizeMm, SizePx};
use crate::fonts::FONT_DIR_ENV;
use crate::pixels::{from_rgba_image, new_pixmap, resize, trim_transparent};
use crate::types::{RenderError, Result};

/// True when `content` embeds a PNG and contains no drawing primitives
pub fn is_pseudo_vector(content: &str) -> bool {
    content.contains(EMBEDDED_PNG_MARKER)
        && !VECTOR_PRIMITIVES.iter().any(|tag| content.contains(tag))
}

/// Decode the first embedded PNG payload of `content`
pub fn extract_embedded_png(content: &str) -> Option<Vec<u8>> {
    let start = content.find(EMBEDDED_PNG_MARKER)? + EMBEDDED_PNG_MARKER.len();
    let payload: String = content[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=' | '\n' | '\r' | ' '))
        .filter(|c| !c.is_whitespace())
        .collect();
    base64::engine::general_purpose::STANDARD
        .decode(payload.as_bytes())
        .ok()
}

/// Supersampling factor for a target box: larger targets need less
pub fn choose_render_scale(target: SizePx) -> f32 {
    let side = target.max_side();
    if side > RENDER_SCALE_BIG_THRESHOLD_PX {
        RENDER_SCALE_BIG
    } else if side > RENDER_SCALE_MED_THRESHOLD_PX {
        RENDER_SCALE_MED
    } else {
        RENDER_SCALE_SMALL
    }
}

/// Largest size with the aspect ratio of `source` that fits into `max`
pub fn fit_within(source: (u32, u32), max: SizePx) -> SizePx {
    let (w, h) = (source.0.max(1) as f64, source.1.max(1) as f64);
    let ratio = (max.width as f64 / w).min(max.height as f64 / h);
    SizePx::new(
        ((w * ratio).round() as u32).clamp(1, max.width.max(1)),
        ((h * ratio).round() as u32).clamp(1, max.height.max(1)),
    )
}

/// Check a custom graphic size against the canvas of `spec`.
///
/// Returns a warning for sizes below the recommended minimum.
pub fn validate_graphic_size(size_mm: f32, spec: &ArtifactSpec) -> Result<Option<String>> {
    if size_mm.is_nan() || size_mm <= 0.0 {
        return Err(RenderError::Config(format!(
            "Graphic size must be positive, got {size_mm}mm"
        )));
    }
    let dims = spec.dimensions()?;
    let max = dims.canvas_mm.height;
    if size_mm > max {
        return Err(RenderError::Config(format!(
            "Graphic size {size_mm}mm exceeds the canvas height of {max}mm"
        )));
    }
    if size_mm < MIN_RECOMMENDED_GRAPHIC_MM {
        return Ok(Some(format!(
            "Very small graphic ({size_mm}mm), at least {MIN_RECOMMENDED_GRAPHIC_MM}mm recommended"
        )));
    }
    Ok(None)
}

/// Renders vector templates into pixel buffers
pub struct Rasterizer {
    fontdb: Arc<usvg::fontdb::Database>,
}

impl Default for Rasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Rasterizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rasterizer")
            .field("faces", &self.fontdb.len())
            .finish()
    }
}

impl Rasterizer {
    /// Rasterizer without fonts for template text
    pub fn new() -> Self {
        Self {
            fontdb: Arc::new(usvg::fontdb::Database::new()),
        }
    }

    /// Rasterizer that renders template text with the installed fonts
    pub fn with_system_fonts() -> Self {
        let mut db = usvg::fontdb::Database::new();
        db.load_system_fonts();
        if let Some(dir) = std::env::var_os(FONT_DIR_ENV) {
            db.load_fonts_dir(dir);
        }
        info!("Loaded {} font faces for template text", db.len());
        Self {
            fontdb: Arc::new(db),
        }
    }

    /// Fit the template at `path` into `max` (mm) at `dpi`
    pub fn rasterize(
        &self,
        path: &Path,
        max: SizeMm,
        dpi: u32,
        render_scale: Option<f32>,
    ) -> Result<Pixmap> {
        self.rasterize_px(path, max.to_px(dpi), render_scale)
    }

    /// Fit the template at `path` into `max` pixels, preserving its aspect ratio
    pub fn rasterize_px(
        &self,
        path: &Path,
        max: SizePx,
        render_scale: Option<f32>,
    ) -> Result<Pixmap> {
        if max.width == 0 || max.height == 0 {
            return Err(RenderError::template(
                path,
                format!("no room for the graphic ({}x{}px)", max.width, max.height),
            ));
        }
        let data = std::fs::read(path).map_err(|e| RenderError::template(path, e))?;
        let content = String::from_utf8_lossy(&data);

        if is_pseudo_vector(&content) {
            info!("{} only wraps a PNG, decoding directly", path.display());
            return self.scale_embedded(path, &content, max);
        }
        let scale = render_scale.unwrap_or_else(|| choose_render_scale(max));
        self.render_vector(path, &data, max, scale)
    }

    fn scale_embedded(&self, path: &Path, content: &str, max: SizePx) -> Result<Pixmap> {
        let png = extract_embedded_png(content)
            .ok_or_else(|| RenderError::template(path, "embedded PNG is not valid base64"))?;
        let decoded = image::load_from_memory_with_format(&png, image::ImageFormat::Png)
            .map_err(|e| RenderError::template(path, e))?
            .to_rgba8();
        let source = from_rgba_image(&decoded)?;
        drop(decoded);
        let target = fit_within((source.width(), source.height()), max);
        resize(&source, target.width, target.height, FilterType::Lanczos3)
    }

    fn render_vector(&self, path: &Path, data: &[u8], max: SizePx, scale: f32) -> Result<Pixmap> {
        let options = usvg::Options {
            resources_dir: path.parent().map(Path::to_path_buf),
            fontdb: self.fontdb.clone(),
            ..usvg::Options::default()
        };
        let tree =
            usvg::Tree::from_data(data, &options).map_err(|e| RenderError::template(path, e))?;
        let size = tree.size();
        if size.width() <= 0.0 || size.height() <= 0.0 {
            return Err(RenderError::template(path, "template has an empty canvas"));
        }

        let mut zoom = (max.width as f32 / size.width()).min(max.height as f32 / size.height())
            * scale.max(1.0);
        let limit = MAX_RENDER_DIMENSION_PX as f32;
        let largest = size.width().max(size.height()) * zoom;
        if largest > limit {
            warn!(
                "{}: supersampling capped at {}px",
                path.display(),
                MAX_RENDER_DIMENSION_PX
            );
            zoom *= limit / largest;
        }
        let width = (size.width() * zoom).ceil() as u32;
        let height = (size.height() * zoom).ceil() as u32;

        let mut pixmap = new_pixmap(width, height)?;
        resvg::render(&tree, Transform::from_scale(zoom, zoom), &mut pixmap.as_mut());
        drop(tree);

        let trimmed = trim_transparent(pixmap);
        let target = fit_within((trimmed.width(), trimmed.height()), max);
        debug!(
            "{}: rendered {}x{}px at x{:.1}, trimmed {}x{}px, final {}x{}px",
            path.display(),
            width,
            height,
            scale,
            trimmed.width(),
            trimmed.height(),
            target.width,
            target.height
        );
        resize(&trimmed, target.width, target.height, FilterType::CatmullRom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pseudo_vector_detection() {
        let wrapper = r#"<svg><image href="data:image/png;base64,iVBORw0KGgo="/></svg>"#;
        assert!(is_pseudo_vector(wrapper));

        let mixed = r#"<svg><rect width="1" height="1"/><image href="data:image/png;base64,AAAA"/></svg>"#;
        assert!(!is_pseudo_vector(mixed));

        assert!(!is_pseudo_vector(r#"<svg><circle r="4"/></svg>"#));
    }

    #[test]
    fn test_extract_stops_at_quote() {
        let content = r#"<image href="data:image/png;base64,aGVsbG8="/>"#;
        assert_eq!(extract_embedded_png(content), Some(b"hello".to_vec()));
        assert_eq!(extract_embedded_png("<svg/>"), None);
    }

    #[test]
    fn test_choose_render_scale() {
        assert_eq!(choose_render_scale(SizePx::new(921, 700)), 3.0);
        assert_eq!(choose_render_scale(SizePx::new(1500, 700)), 2.0);
        assert_eq!(choose_render_scale(SizePx::new(2400, 700)), 1.5);
    }

    #[test]
    fn test_fit_within_keeps_aspect() {
        assert_eq!(fit_within((200, 100), SizePx::new(900, 700)), SizePx::new(900, 450));
        assert_eq!(fit_within((100, 200), SizePx::new(900, 700)), SizePx::new(350, 700));
    }

    #[test]
    fn test_validate_graphic_size() {
        let spec = ArtifactSpec::default();
        assert_eq!(validate_graphic_size(20.0, &spec).unwrap(), None);
        assert!(validate_graphic_size(5.0, &spec).unwrap().is_some());
        match validate_graphic_size(40.0, &spec) {
            Err(RenderError::Config(msg)) => assert!(msg.contains("exceeds")),
            _ => panic!("Expected Config error"),
        }
        assert!(validate_graphic_size(0.0, &spec).is_err());
    }
}
