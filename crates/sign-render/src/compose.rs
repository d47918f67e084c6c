//! Canvas composition
//!
//! Single-panel artifacts place the graphic at the top of the canvas and
//! the text band at the bottom. Dual-panel artifacts render a narrower
//! single panel on the left and ruled writing lines on the right.

use log::{debug, warn};
use tiny_skia::Pixmap;

use crate::artifact::{ArtifactSpec, BlankKind, TemplateRef};
use crate::constants::{
    RULE_LINE_MARGIN_MM, RULE_LINE_WIDTH_PX, STRENGTH_GAP_FACTOR, STRENGTH_HEIGHT_FACTOR,
    STRENGTH_LEFT_MARGIN_FACTOR, STRENGTH_SLASH_ANGLE_DEG, STRENGTH_SLASH_COUNT,
    STRENGTH_UNDERSCORE_FACTOR, TEXT_COLOR,
};
use crate::dimensions::{mm_to_px, Dimensions, SizePx};
use crate::pixels::{new_pixmap, paste, stroke_line};
use crate::text::TextEngine;
use crate::types::{Result, Rgba, TextMode};

/// Rule lines stay at least this far above the canvas bottom (px)
const CANVAS_EDGE_SAFETY_PX: i64 = 2;

/// Stroke width of rule lines and the strength indicator at `dpi`
pub fn rule_line_width(dpi: u32) -> f32 {
    (RULE_LINE_WIDTH_PX * dpi as f32 / 600.0).max(1.0)
}

/// Width of the left panel for a split at `percent`
pub fn left_panel_width(canvas_width: u32, percent: u8) -> u32 {
    (canvas_width as f64 * percent as f64 / 100.0) as u32
}

/// Horizontal extent of a rule on the right panel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleSpan {
    pub x_start: f32,
    pub x_end: f32,
}

/// Vertical positions of the ruled lines, bottom line first.
///
/// Lines are spaced evenly over the canvas height above the bottom offset,
/// and the bottom line sits on the bottom offset like the text baseline.
pub fn rule_positions(spec: &ArtifactSpec, dims: &Dimensions) -> (Vec<f32>, u32) {
    let count = spec.dual_panel.rule_count.max(1) as u32;
    let canvas_h = dims.canvas_px.height as i64;
    let bottom_px = mm_to_px(spec.text_bottom_offset_mm, spec.dpi) as i64;
    let available_mm = dims.canvas_mm.height - spec.text_bottom_offset_mm;
    let line_h_px = mm_to_px(available_mm / count as f32, spec.dpi);

    let ys = (0..count as i64)
        .map(|i| {
            let y = canvas_h - (bottom_px + i * line_h_px as i64);
            y.min(canvas_h - CANVAS_EDGE_SAFETY_PX) as f32
        })
        .collect();
    (ys, line_h_px)
}

/// Draw the hand-writing strength indicator on the line at `y`.
///
/// Layout from left to right: an empty lead-in, three slashes rising at a
/// fixed angle, a small gap and a trailing underscore.
pub fn draw_strength_indicator(
    pixmap: &mut Pixmap,
    y: f32,
    span: RuleSpan,
    line_height: f32,
    stroke: f32,
) {
    let color = Rgba(TEXT_COLOR);
    let available = span.x_end - span.x_start;
    let height = line_height * STRENGTH_HEIGHT_FACTOR;

    let underscore_start = (span.x_end - available * STRENGTH_UNDERSCORE_FACTOR).floor();
    let area_start = (span.x_start + available * STRENGTH_LEFT_MARGIN_FACTOR).floor();
    let area_end = (underscore_start - available * STRENGTH_GAP_FACTOR).floor();
    let area_width = area_end - area_start;

    let slash_width = height / STRENGTH_SLASH_ANGLE_DEG.to_radians().tan();
    let count = STRENGTH_SLASH_COUNT as f32;
    let spacing = (area_width - count * slash_width) / (count - 1.0);
    let top = (y - height).floor();

    let mut x = area_start;
    for _ in 0..STRENGTH_SLASH_COUNT {
        stroke_line(
            pixmap,
            (x.floor(), y),
            ((x + slash_width).floor(), top),
            stroke,
            color,
        );
        x += slash_width + spacing;
    }
    stroke_line(pixmap, (underscore_start, y), (span.x_end, y), stroke, color);
}

/// Places graphics, text and rules onto canvases
pub struct Compositor<'a> {
    text: &'a TextEngine,
}

impl<'a> Compositor<'a> {
    pub fn new(text: &'a TextEngine) -> Self {
        Self { text }
    }

    /// Size of the panel that holds graphic and text
    pub fn panel_size(spec: &ArtifactSpec, dims: &Dimensions) -> SizePx {
        if spec.is_dual_panel() {
            SizePx::new(
                left_panel_width(dims.canvas_px.width, spec.dual_panel.left_percent),
                dims.canvas_px.height,
            )
        } else {
            dims.canvas_px
        }
    }

    /// Box the graphic is fitted into, in pixels.
    ///
    /// With text the graphic gets the panel height minus text band and gap,
    /// and a custom size only caps it. Without text the graphic may use the
    /// whole panel, or exactly the custom size when one is set.
    pub fn graphic_box(&self, spec: &ArtifactSpec, dims: &Dimensions) -> SizePx {
        let panel = Self::panel_size(spec, dims);
        let custom = spec.custom_graphic_mm.map(|size| size.to_px(spec.dpi));

        if !spec.mode.has_text() {
            return match custom {
                Some(c) => SizePx::new(c.width.min(panel.width), c.height.min(panel.height)),
                None => panel,
            };
        }

        let text_h = self.text.text_height_px(spec);
        let gap = mm_to_px(spec.graphic_text_gap_mm, spec.dpi);
        let available = SizePx::new(panel.width, panel.height.saturating_sub(text_h + gap));
        match custom {
            Some(c) => SizePx::new(
                c.width.min(available.width),
                c.height.min(available.height),
            ),
            None => available,
        }
    }

    /// Render the text band of `spec` onto a transparent panel-sized layer
    pub fn text_layer(
        &self,
        spec: &ArtifactSpec,
        dims: &Dimensions,
        stem: Option<&str>,
    ) -> Result<Pixmap> {
        let panel = Self::panel_size(spec, dims);
        let mut layer = new_pixmap(panel.width, panel.height)?;
        self.text.draw(&mut layer, spec, stem);
        Ok(layer)
    }

    /// Compose the canvas of one artifact.
    ///
    /// `graphic` is already fitted into [`Compositor::graphic_box`];
    /// `text_layer`, when given, replaces drawing the text band.
    pub fn compose(
        &self,
        spec: &ArtifactSpec,
        template: &TemplateRef,
        graphic: Option<&Pixmap>,
        text_layer: Option<&Pixmap>,
    ) -> Result<Pixmap> {
        let dims = spec.dimensions()?;
        let blank = match template {
            TemplateRef::Blank(kind) => Some(kind),
            TemplateRef::Vector(_) => None,
        };
        let stem = match template {
            TemplateRef::Vector(_) => Some(template.id()),
            TemplateRef::Blank(_) => None,
        };

        let mut canvas = new_pixmap(dims.canvas_px.width, dims.canvas_px.height)?;
        if spec.is_dual_panel() {
            if !dims.is_dual_panel() {
                warn!(
                    "Dual-panel layout on {}x{}mm, which is not 2:1",
                    dims.finished_mm.width, dims.finished_mm.height
                );
            }
            let panel = Self::panel_size(spec, &dims);
            let mut left = new_pixmap(panel.width, panel.height)?;
            self.fill_panel(&mut left, spec, &dims, blank, stem.as_deref(), graphic, text_layer)?;
            if let Some(BlankKind::DualRuled { .. }) = blank {
                self.draw_left_rules(&mut left, spec, &dims);
            }
            paste(&mut canvas, &left, 0, 0);
            if !matches!(blank, Some(BlankKind::DualEmpty)) {
                self.draw_right_rules(&mut canvas, spec, &dims, panel.width, blank);
            }
        } else {
            self.fill_panel(
                &mut canvas,
                spec,
                &dims,
                blank,
                stem.as_deref(),
                graphic,
                text_layer,
            )?;
        }
        Ok(canvas)
    }

    #[allow(clippy::too_many_arguments)]
    fn fill_panel(
        &self,
        panel: &mut Pixmap,
        spec: &ArtifactSpec,
        dims: &Dimensions,
        blank: Option<&BlankKind>,
        stem: Option<&str>,
        graphic: Option<&Pixmap>,
        text_layer: Option<&Pixmap>,
    ) -> Result<()> {
        let draws_text = spec.mode.has_text()
            && !matches!(
                blank,
                Some(BlankKind::DualEmpty) | Some(BlankKind::DualRuled { .. })
            );
        if draws_text {
            match text_layer {
                Some(layer) => paste(panel, layer, 0, 0),
                None => {
                    let layer = self.text_layer(spec, dims, stem)?;
                    paste(panel, &layer, 0, 0);
                }
            }
        }

        if let (Some(graphic), None) = (graphic, blank) {
            let x = (panel.width() as i32 - graphic.width() as i32) / 2;
            let y = match spec.mode {
                TextMode::GraphicOnly { position } => {
                    position.offset(panel.height(), graphic.height()) as i32
                }
                _ => 0,
            };
            debug!(
                "Graphic {}x{}px at ({}, {})",
                graphic.width(),
                graphic.height(),
                x,
                y
            );
            paste(panel, graphic, x, y);
        }
        Ok(())
    }

    fn draw_left_rules(&self, left: &mut Pixmap, spec: &ArtifactSpec, dims: &Dimensions) {
        let (ys, _) = rule_positions(spec, dims);
        let margin = mm_to_px(RULE_LINE_MARGIN_MM, spec.dpi) as f32;
        let stroke = rule_line_width(spec.dpi);
        let x_end = left.width() as f32;
        for y in ys {
            stroke_line(left, (margin, y), (x_end, y), stroke, Rgba(TEXT_COLOR));
        }
    }

    fn draw_right_rules(
        &self,
        canvas: &mut Pixmap,
        spec: &ArtifactSpec,
        dims: &Dimensions,
        left_width: u32,
        blank: Option<&BlankKind>,
    ) {
        let (ys, line_h) = rule_positions(spec, dims);
        let margin = mm_to_px(RULE_LINE_MARGIN_MM, spec.dpi) as f32;
        let stroke = rule_line_width(spec.dpi);
        let ruled_both = matches!(blank, Some(BlankKind::DualRuled { .. }));
        let show_strength = blank
            .and_then(BlankKind::forced_strength)
            .unwrap_or(spec.dual_panel.show_strength);

        let span = RuleSpan {
            x_start: if ruled_both {
                left_width as f32
            } else {
                left_width as f32 + margin
            },
            x_end: canvas.width() as f32 - margin,
        };
        let top = ys.len().saturating_sub(1);
        for (i, y) in ys.into_iter().enumerate() {
            if i == top && show_strength {
                draw_strength_indicator(canvas, y, span, line_h as f32, stroke);
            } else {
                stroke_line(
                    canvas,
                    (span.x_start, y),
                    (span.x_end, y),
                    stroke,
                    Rgba(TEXT_COLOR),
                );
            }
        }
        debug!(
            "{} rules on right panel from x={}px, strength={}",
            spec.dual_panel.rule_count, span.x_start, show_strength
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::DualPanelOptions;
    use crate::dimensions::SizeMm;
    use crate::fonts::FontResolver;
    use crate::types::{GraphicPosition, LayoutKind};
    use std::sync::Arc;

    fn engine() -> TextEngine {
        TextEngine::new(Arc::new(FontResolver::builtin()))
    }

    fn dual_spec() -> ArtifactSpec {
        ArtifactSpec {
            finished_width_mm: 90.0,
            layout: LayoutKind::DualPanel,
            dual_panel: DualPanelOptions {
                left_percent: 50,
                rule_count: 4,
                show_strength: true,
            },
            ..ArtifactSpec::default()
        }
    }

    fn inked_columns(pixmap: &Pixmap, from: u32, to: u32) -> bool {
        let w = pixmap.width() as usize;
        pixmap
            .pixels()
            .iter()
            .enumerate()
            .any(|(i, px)| px.alpha() > 0 && (from as usize..to as usize).contains(&(i % w)))
    }

    #[test]
    fn test_left_panel_width_truncates() {
        assert_eq!(left_panel_width(1984, 50), 992);
        assert_eq!(left_panel_width(1985, 33), 655);
    }

    #[test]
    fn test_graphic_box_subtracts_text_and_gap() {
        let engine = engine();
        let compositor = Compositor::new(&engine);
        let spec = ArtifactSpec::default();
        let dims = spec.dimensions().unwrap();
        let gbox = compositor.graphic_box(&spec, &dims);
        let expected = 921 - engine.text_height_px(&spec) - mm_to_px(1.0, 600);
        assert_eq!(gbox, SizePx::new(921, expected));
    }

    #[test]
    fn test_graphic_box_custom_size_caps() {
        let engine = engine();
        let compositor = Compositor::new(&engine);
        let spec = ArtifactSpec {
            custom_graphic_mm: Some(SizeMm::new(20.0, 20.0)),
            ..ArtifactSpec::default()
        };
        let dims = spec.dimensions().unwrap();
        assert_eq!(compositor.graphic_box(&spec, &dims), SizePx::new(472, 472));

        let full = spec.with_mode(TextMode::GraphicOnly {
            position: GraphicPosition::Bottom,
        });
        assert_eq!(compositor.graphic_box(&full, &dims), SizePx::new(472, 472));
    }

    #[test]
    fn test_graphic_only_uses_full_canvas() {
        let engine = engine();
        let compositor = Compositor::new(&engine);
        let spec = ArtifactSpec::default().with_mode(TextMode::GraphicOnly {
            position: GraphicPosition::Center,
        });
        let dims = spec.dimensions().unwrap();
        assert_eq!(compositor.graphic_box(&spec, &dims), dims.canvas_px);
    }

    #[test]
    fn test_rule_positions_bottom_up() {
        let spec = dual_spec();
        let dims = spec.dimensions().unwrap();
        let (ys, line_h) = rule_positions(&spec, &dims);
        assert_eq!(ys.len(), 4);
        assert_eq!(ys[0], (dims.canvas_px.height - 2) as f32);
        assert_eq!(line_h, mm_to_px(39.0 / 4.0, 600));
        assert!(ys.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn test_empty_dual_blank_renders_nothing() {
        let engine = engine();
        let compositor = Compositor::new(&engine);
        let spec = dual_spec();
        let canvas = compositor
            .compose(&spec, &TemplateRef::Blank(BlankKind::DualEmpty), None, None)
            .unwrap();
        assert!(canvas.pixels().iter().all(|px| px.alpha() == 0));
    }

    #[test]
    fn test_ruled_dual_blank_draws_both_sides() {
        let engine = engine();
        let compositor = Compositor::new(&engine);
        let spec = dual_spec();
        let canvas = compositor
            .compose(
                &spec,
                &TemplateRef::Blank(BlankKind::DualRuled { strength: false }),
                None,
                None,
            )
            .unwrap();
        let half = canvas.width() / 2;
        assert!(inked_columns(&canvas, 0, half));
        assert!(inked_columns(&canvas, half, canvas.width()));
    }

    #[test]
    fn test_graphic_only_bottom_anchor() {
        let engine = engine();
        let compositor = Compositor::new(&engine);
        let spec = ArtifactSpec::default().with_mode(TextMode::GraphicOnly {
            position: GraphicPosition::Bottom,
        });
        let mut graphic = new_pixmap(100, 100).unwrap();
        graphic.fill(tiny_skia::Color::BLACK);
        let canvas = compositor
            .compose(
                &spec,
                &TemplateRef::Vector("sign.svg".into()),
                Some(&graphic),
                None,
            )
            .unwrap();
        let w = canvas.width() as usize;
        let last_row = &canvas.pixels()[(canvas.height() as usize - 1) * w..];
        assert!(last_row.iter().any(|px| px.alpha() == 255));
        assert!(canvas.pixels()[..w].iter().all(|px| px.alpha() == 0));
    }
}
