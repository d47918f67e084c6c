use std::sync::Arc;

use log::{debug, warn};
use tiny_skia::Pixmap;

use crate::artifact::ArtifactSpec;
use crate::compose::Compositor;
use crate::constants::{
    DEFAULT_FONT_FAMILY, GUIDE_COLOR_BLEED, GUIDE_COLOR_DIVIDER, GUIDE_COLOR_SAFETY,
    GUIDE_COLOR_TRIM, GUIDE_INNER_LABEL_OFFSET_PX, GUIDE_LABEL_FONT_SIZE_PX,
    GUIDE_LABEL_MIN_FONT_SIZE_PX, GUIDE_LABEL_OFFSET_PX, GUIDE_LABEL_STROKE_COLOR,
    GUIDE_LINE_WIDTH_PX,
};
use crate::dimensions::{Dimensions, SizeMm};
use crate::fonts::{FontResolver, Typeface};
use crate::pixels::{new_pixmap, paste_centered, stroke_line, stroke_rect};
use crate::types::{Result, Rgba};

/// A finished raster at file size, ready to be written or placed on a page
#[derive(Debug, Clone)]
pub struct PrintReadyArtifact {
    pub pixmap: Pixmap,
    pub dpi: u32,
    pub finished_mm: SizeMm,
    pub file_mm: SizeMm,
    /// Width of the bleed border in pixels
    pub bleed_px: u32,
    /// True when advisory guides were drawn
    pub has_guides: bool,
}

impl PrintReadyArtifact {
    /// Pixel rectangle of the finished area without bleed
    pub fn finished_rect(&self) -> Option<tiny_skia::IntRect> {
        tiny_skia::IntRect::from_xywh(
            self.bleed_px as i32,
            self.bleed_px as i32,
            self.pixmap.width().saturating_sub(2 * self.bleed_px),
            self.pixmap.height().saturating_sub(2 * self.bleed_px),
        )
    }
}

/// Adds safety margin and bleed around a composed canvas
pub struct PrintPreparer {
    fonts: Arc<FontResolver>,
}

impl PrintPreparer {
    pub fn new(fonts: Arc<FontResolver>) -> Self {
        Self { fonts }
    }

    /// Center `canvas` inside the finished box, then inside the file box.
    ///
    /// A canvas that does not match the expected size is only reported.
    /// Guides are advisory and must be off for production output.
    pub fn prepare(
        &self,
        canvas: &Pixmap,
        spec: &ArtifactSpec,
        draw_guides: bool,
    ) -> Result<PrintReadyArtifact> {
        let dims = spec.dimensions()?;
        if canvas.width() != dims.canvas_px.width || canvas.height() != dims.canvas_px.height {
            warn!(
                "Canvas is {}x{}px, expected {}x{}px ({}x{}mm)",
                canvas.width(),
                canvas.height(),
                dims.canvas_px.width,
                dims.canvas_px.height,
                dims.canvas_mm.width,
                dims.canvas_mm.height
            );
        }

        let mut finished = new_pixmap(dims.finished_px.width, dims.finished_px.height)?;
        paste_centered(&mut finished, canvas);
        let mut file = new_pixmap(dims.file_px.width, dims.file_px.height)?;
        paste_centered(&mut file, &finished);
        drop(finished);

        if draw_guides {
            self.draw_guides(&mut file, spec, &dims);
        }
        debug!(
            "Print-ready {}x{}px ({}x{}mm)",
            file.width(),
            file.height(),
            dims.file_mm.width,
            dims.file_mm.height
        );

        Ok(PrintReadyArtifact {
            pixmap: file,
            dpi: spec.dpi,
            finished_mm: dims.finished_mm,
            file_mm: dims.file_mm,
            bleed_px: dims.bleed_px(),
            has_guides: draw_guides,
        })
    }

    fn draw_guides(&self, image: &mut Pixmap, spec: &ArtifactSpec, dims: &Dimensions) {
        let w = image.width() as f32;
        let h = image.height() as f32;
        let line = GUIDE_LINE_WIDTH_PX;
        let bleed = dims.bleed_px() as f32;
        let safety = bleed + dims.safety_px() as f32;
        let face = self.fonts.resolve(DEFAULT_FONT_FAMILY);
        let label_px = (GUIDE_LABEL_FONT_SIZE_PX * spec.dpi as f32 / 600.0)
            .floor()
            .max(GUIDE_LABEL_MIN_FONT_SIZE_PX);

        stroke_rect(image, line, line, w - line, h - line, line, Rgba(GUIDE_COLOR_BLEED));
        draw_label(
            image,
            &face,
            &format!("BESCHNITT ({:.1}x{:.1}mm)", dims.file_mm.width, dims.file_mm.height),
            GUIDE_LABEL_OFFSET_PX,
            label_px,
            Rgba(GUIDE_COLOR_BLEED),
        );

        stroke_rect(image, bleed, bleed, w - bleed, h - bleed, line, Rgba(GUIDE_COLOR_TRIM));
        draw_label(
            image,
            &face,
            &format!(
                "SCHNITT ({:.1}x{:.1}mm)",
                dims.finished_mm.width, dims.finished_mm.height
            ),
            bleed + GUIDE_INNER_LABEL_OFFSET_PX,
            label_px,
            Rgba(GUIDE_COLOR_TRIM),
        );

        stroke_rect(image, safety, safety, w - safety, h - safety, line, Rgba(GUIDE_COLOR_SAFETY));
        draw_label(
            image,
            &face,
            &format!("CANVAS ({:.1}x{:.1}mm)", dims.canvas_mm.width, dims.canvas_mm.height),
            safety + GUIDE_INNER_LABEL_OFFSET_PX,
            label_px,
            Rgba(GUIDE_COLOR_SAFETY),
        );

        if spec.is_dual_panel() {
            let panel = Compositor::panel_size(spec, dims);
            let x = safety + panel.width as f32;
            stroke_line(
                image,
                (x, safety),
                (x, safety + dims.canvas_px.height as f32),
                line,
                Rgba(GUIDE_COLOR_DIVIDER),
            );
        }
    }
}

/// Draw a label with its top-left corner at (`offset`, `offset`) and a light halo
fn draw_label(image: &mut Pixmap, face: &Typeface, text: &str, offset: f32, px: f32, color: Rgba) {
    let baseline = offset + face.ink_extents("BH", px).ascent;
    for (dx, dy) in [(-1.0, 0.0), (1.0, 0.0), (0.0, -1.0), (0.0, 1.0)] {
        face.draw(
            image,
            text,
            offset + dx,
            baseline + dy,
            px,
            Rgba(GUIDE_LABEL_STROKE_COLOR),
        );
    }
    face.draw(image, text, offset, baseline, px, color);
}
