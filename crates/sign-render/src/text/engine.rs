use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::debug;
use tiny_skia::Pixmap;

use crate::artifact::ArtifactSpec;
use crate::compose::rule_line_width;
use crate::constants::{LINE_HEIGHT_FACTOR, METRICS_PROBE, RULE_LINE_MARGIN_MM, TEXT_COLOR};
use crate::dimensions::{mm_to_px, pt_to_px, px_to_mm};
use crate::fonts::{FontResolver, Typeface};
use crate::text::layout::{self, PlaceholderParams, TextFit, TextMeasure};
use crate::types::{Rgba, TextMode};

/// Vertical metrics of one (font, size, dpi) combination in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontMetrics {
    pub font_px: u32,
    pub line_height: u32,
    /// Highest ink of the probe string above the baseline
    pub ascent: u32,
    /// Lowest ink of the probe string below the baseline
    pub descent: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MetricsKey {
    family: String,
    size_centi_pt: u32,
    dpi: u32,
}

/// Width measurement with a resolved typeface
pub struct FaceMeasure<'a> {
    face: &'a Typeface,
    px: f32,
}

impl TextMeasure for FaceMeasure<'_> {
    fn width(&self, text: &str) -> f32 {
        self.face.advance(text, self.px)
    }
}

/// Produces, measures and draws the text band of an artifact.
///
/// Metrics are measured once per (font, size, dpi) from a fixed probe
/// string, so every artifact sharing these settings gets the same baselines
/// regardless of its actual text.
pub struct TextEngine {
    fonts: Arc<FontResolver>,
    metrics: Mutex<HashMap<MetricsKey, FontMetrics>>,
}

impl std::fmt::Debug for TextEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextEngine").finish_non_exhaustive()
    }
}

impl TextEngine {
    pub fn new(fonts: Arc<FontResolver>) -> Self {
        Self {
            fonts,
            metrics: Mutex::new(HashMap::new()),
        }
    }

    pub fn fonts(&self) -> &Arc<FontResolver> {
        &self.fonts
    }

    pub fn metrics(&self, family: &str, size_pt: f32, dpi: u32) -> FontMetrics {
        let key = MetricsKey {
            family: family.to_lowercase(),
            size_centi_pt: (size_pt * 100.0).round() as u32,
            dpi,
        };
        if let Some(metrics) = self
            .metrics
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
        {
            return *metrics;
        }

        let face = self.fonts.resolve(family);
        let font_px = pt_to_px(size_pt, dpi);
        let ink = face.ink_extents(METRICS_PROBE, font_px as f32);
        let metrics = FontMetrics {
            font_px,
            line_height: (font_px as f32 * LINE_HEIGHT_FACTOR) as u32,
            ascent: ink.ascent.ceil() as u32,
            descent: ink.descent.ceil() as u32,
        };
        debug!(
            "Metrics for {} {}pt @ {}dpi: ascent={}px descent={}px line={}px",
            face.name(),
            size_pt,
            dpi,
            metrics.ascent,
            metrics.descent,
            metrics.line_height
        );
        self.metrics
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, metrics);
        metrics
    }

    /// Lines reserved in the text band: one on dual-panel artifacts, two otherwise
    pub fn reserved_lines(spec: &ArtifactSpec) -> usize {
        if spec.is_dual_panel() { 1 } else { 2 }
    }

    /// Height of the text band including the bottom offset.
    ///
    /// Depends only on font, size, dpi and layout, never on the mode's
    /// actual text. Graphic-only artifacts have no text band.
    pub fn text_height_px(&self, spec: &ArtifactSpec) -> u32 {
        if !spec.mode.has_text() {
            return 0;
        }
        let m = self.metrics(&spec.font_family, spec.font_size_pt, spec.dpi);
        let lines = Self::reserved_lines(spec) as u32;
        m.ascent
            + m.line_height * (lines - 1)
            + m.descent
            + mm_to_px(spec.text_bottom_offset_mm, spec.dpi)
    }

    pub fn text_height_mm(&self, spec: &ArtifactSpec) -> f32 {
        px_to_mm(self.text_height_px(spec), spec.dpi)
    }

    fn placeholder_params(spec: &ArtifactSpec) -> PlaceholderParams {
        PlaceholderParams {
            unit_len: spec.unit_placeholder_len,
            call_len: spec.call_placeholder_len,
            strength_digits: spec.strength_digits,
        }
    }

    fn with_measure<T>(&self, spec: &ArtifactSpec, f: impl FnOnce(&FaceMeasure<'_>) -> T) -> T {
        let face = self.fonts.resolve(&spec.font_family);
        let px = pt_to_px(spec.font_size_pt, spec.dpi) as f32;
        f(&FaceMeasure { face: &face, px })
    }

    /// The two text lines of `spec` for a band `max_width_px` wide
    pub fn lines(&self, spec: &ArtifactSpec, stem: Option<&str>, max_width_px: u32) -> [String; 2] {
        self.with_measure(spec, |m| {
            layout::lines_for_mode(
                &spec.mode,
                stem,
                &Self::placeholder_params(spec),
                max_width_px as f32,
                m,
            )
        })
    }

    /// Pixel width of the widest generated line
    pub fn text_width_px(&self, spec: &ArtifactSpec, stem: Option<&str>, max_width_px: u32) -> f32 {
        if !spec.mode.has_text() {
            return 0.0;
        }
        let lines = self.lines(spec, stem, max_width_px);
        self.with_measure(spec, |m| {
            lines.iter().map(|l| m.width(l)).fold(0.0, f32::max)
        })
    }

    /// Width of the widest line in millimeters, for the canvas of `spec`
    pub fn text_width_mm(&self, spec: &ArtifactSpec, stem: Option<&str>) -> f32 {
        let canvas_w = spec
            .dimensions()
            .map(|d| d.canvas_px.width)
            .unwrap_or_default();
        let px = self.text_width_px(spec, stem, canvas_w);
        px / spec.dpi.max(1) as f32 * crate::constants::MM_PER_INCH
    }

    /// Check whether `text` fits `max_lines` lines of `max_width_px` in this font
    pub fn validate_fits(
        &self,
        spec: &ArtifactSpec,
        text: &str,
        max_width_px: u32,
        max_lines: usize,
    ) -> TextFit {
        self.with_measure(spec, |m| {
            layout::validate_fits(text, max_width_px as f32, max_lines, m)
        })
    }

    /// Draw the text band at the bottom of `canvas`.
    ///
    /// Lines share one left edge; the block is centered on the last line.
    /// With a single reserved line only the last line is drawn.
    pub fn draw(&self, canvas: &mut Pixmap, spec: &ArtifactSpec, stem: Option<&str>) {
        if !spec.mode.has_text() {
            return;
        }
        let metrics = self.metrics(&spec.font_family, spec.font_size_pt, spec.dpi);
        let height = self.text_height_px(spec);
        let y_start = canvas.height() as f32 - height as f32;
        let lines = self.lines(spec, stem, canvas.width());
        let reserved = Self::reserved_lines(spec);
        let visible = &lines[lines.len() - reserved..];

        let face = self.fonts.resolve(&spec.font_family);
        let px = metrics.font_px as f32;
        let last_width = face.advance(&lines[1], px);
        let x = ((canvas.width() as f32 - last_width) / 2.0).floor();
        let color = Rgba(TEXT_COLOR);

        let mut baseline = y_start + metrics.ascent as f32;
        for (i, line) in visible.iter().enumerate() {
            let is_rule = matches!(spec.mode, TextMode::RuleStrength) && reserved == 2 && i == 0;
            if is_rule {
                let margin = mm_to_px(RULE_LINE_MARGIN_MM, spec.dpi) as f32;
                crate::pixels::stroke_line(
                    canvas,
                    (margin, baseline),
                    (canvas.width() as f32 - margin, baseline),
                    rule_line_width(spec.dpi),
                    color,
                );
            } else if !line.is_empty() {
                face.draw(canvas, line, x, baseline, px, color);
            }
            baseline += metrics.line_height as f32;
        }
        debug!(
            "Text band at y={}px ({}px high): {:?}",
            y_start, height, visible
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GraphicPosition, LayoutKind};

    fn engine() -> TextEngine {
        TextEngine::new(Arc::new(FontResolver::builtin()))
    }

    #[test]
    fn test_metrics_cached_and_consistent() {
        let engine = engine();
        let a = engine.metrics("Arial", 8.0, 600);
        let b = engine.metrics("arial", 8.0, 600);
        assert_eq!(a, b);
        assert_eq!(a.font_px, 66);
        assert_eq!(a.line_height, 79);
    }

    #[test]
    fn test_text_height_independent_of_content() {
        let engine = engine();
        let base = ArtifactSpec::default();
        let free = base.with_mode(TextMode::FreeText {
            text: Some("Kran".to_string()),
        });
        let call = base.with_mode(TextMode::CallName { name: None });
        assert_eq!(engine.text_height_px(&free), engine.text_height_px(&call));
        assert!(engine.text_height_px(&base) > 0);
    }

    #[test]
    fn test_dual_panel_reserves_one_line() {
        let engine = engine();
        let single = ArtifactSpec::default();
        let dual = ArtifactSpec {
            layout: LayoutKind::DualPanel,
            finished_width_mm: 90.0,
            ..ArtifactSpec::default()
        };
        let m = engine.metrics("Arial", 8.0, 600);
        assert_eq!(
            engine.text_height_px(&single) - engine.text_height_px(&dual),
            m.line_height
        );
    }

    #[test]
    fn test_graphic_only_has_no_text_band() {
        let engine = engine();
        let spec = ArtifactSpec::default().with_mode(TextMode::GraphicOnly {
            position: GraphicPosition::Top,
        });
        assert_eq!(engine.text_height_px(&spec), 0);
        assert_eq!(engine.text_width_mm(&spec, None), 0.0);
    }

    #[test]
    fn test_draw_stays_in_bottom_band() {
        let engine = engine();
        let spec = ArtifactSpec::default();
        let mut canvas = Pixmap::new(921, 921).unwrap();
        engine.draw(&mut canvas, &spec, None);
        let band_top = 921 - engine.text_height_px(&spec) as usize;
        let inked_above = canvas
            .pixels()
            .iter()
            .enumerate()
            .any(|(i, px)| px.alpha() > 0 && i / 921 + 2 < band_top);
        assert!(!inked_above);
        assert!(canvas.pixels().iter().any(|px| px.alpha() > 0));
    }
}
