//! Shared constants for artifact rendering
//!
//! This module centralizes the magic numbers used by geometry, text layout,
//! compositing and batch scheduling.

// =============================================================================
// Unit Conversion
// =============================================================================

/// Millimeters per inch
pub const MM_PER_INCH: f32 = 25.4;

/// Typographic points per inch
pub const POINTS_PER_INCH: f32 = 72.0;

/// Meters per inch, used for the PNG `pHYs` chunk
pub const METERS_PER_INCH: f64 = 0.0254;

// =============================================================================
// Default Artifact Geometry
// =============================================================================

/// Default finished height (mm)
pub const DEFAULT_FINISHED_HEIGHT_MM: f32 = 45.0;

/// Default finished width (mm)
pub const DEFAULT_FINISHED_WIDTH_MM: f32 = 45.0;

/// Default safety margin inside the finished edge (mm)
pub const DEFAULT_SAFETY_MM: f32 = 3.0;

/// Default bleed around the finished edge (mm)
pub const DEFAULT_BLEED_MM: f32 = 3.0;

/// Default output resolution
pub const DEFAULT_DPI: u32 = 600;

/// Resolutions accepted by option validation
pub const SUPPORTED_DPIS: [u32; 3] = [300, 600, 1200];

/// Tolerance for detecting the 2:1 dual-panel aspect (mm)
pub const DUAL_PANEL_TOLERANCE_MM: f32 = 0.1;

/// Graphic sizes below this are accepted with a warning (mm)
pub const MIN_RECOMMENDED_GRAPHIC_MM: f32 = 10.0;

// =============================================================================
// Text Layout
// =============================================================================

/// Default font size (pt)
pub const DEFAULT_FONT_SIZE_PT: f32 = 8.0;

/// Default preferred font family
pub const DEFAULT_FONT_FAMILY: &str = "Arial";

/// Families tried in order when the preferred one is missing
pub const FONT_PRIORITY_LIST: [&str; 5] = [
    "Arial",
    "Liberation Sans",
    "DejaVu Sans",
    "Helvetica",
    "sans-serif",
];

/// Baseline-to-baseline distance relative to the font pixel size
pub const LINE_HEIGHT_FACTOR: f32 = 1.2;

/// Probe string holding the tallest and deepest glyphs used on artifacts
pub const METRICS_PROBE: &str = "Tlfhk_gyqj0123456789/=-:OV";

/// Default gap between graphic and text band (mm)
pub const DEFAULT_GRAPHIC_TEXT_GAP_MM: f32 = 1.0;

/// Default distance between the last text line and the canvas bottom (mm)
pub const DEFAULT_TEXT_BOTTOM_OFFSET_MM: f32 = 0.0;

/// Default unit-name placeholder length (characters)
pub const DEFAULT_UNIT_PLACEHOLDER_LEN: usize = 16;

/// Default call-name placeholder length (characters)
pub const DEFAULT_CALL_PLACEHOLDER_LEN: usize = 14;

/// Default strength digits per group (leaders / sub-leaders / crew / total)
pub const DEFAULT_STRENGTH_DIGITS: [u8; 4] = [1, 1, 2, 2];

/// Underscores drawn per strength digit
pub const UNDERSCORES_PER_DIGIT: usize = 2;

/// Upper bound for fill characters appended while equalizing line widths
pub const MAX_FILL_CHARS: usize = 200;

/// Paired lines farther apart than this are reported (px)
pub const PAIRED_WIDTH_TOLERANCE_PX: f32 = 5.0;

/// A padding step overshooting the target by more than this is rejected (px)
pub const PAIRED_OVERSHOOT_LIMIT_PX: f32 = 10.0;

/// Number of characters of free text included in a template key
pub const TEXT_KEY_PREFIX_CHARS: usize = 20;

// =============================================================================
// Palette
// =============================================================================

/// Text and rule color
pub const TEXT_COLOR: [u8; 4] = [0, 0, 0, 255];

/// Outer guide: bleed edge
pub const GUIDE_COLOR_BLEED: [u8; 4] = [255, 0, 0, 255];

/// Middle guide: trim edge
pub const GUIDE_COLOR_TRIM: [u8; 4] = [0, 0, 255, 255];

/// Inner guide: safety boundary
pub const GUIDE_COLOR_SAFETY: [u8; 4] = [0, 200, 0, 255];

/// Dual-panel split marker
pub const GUIDE_COLOR_DIVIDER: [u8; 4] = [255, 140, 0, 255];

/// Outline behind guide labels
pub const GUIDE_LABEL_STROKE_COLOR: [u8; 4] = [255, 255, 255, 255];

/// Guide line width (px)
pub const GUIDE_LINE_WIDTH_PX: f32 = 3.0;

/// Guide label size at 600 dpi (px)
pub const GUIDE_LABEL_FONT_SIZE_PX: f32 = 24.0;

/// Smallest guide label size at low resolutions (px)
pub const GUIDE_LABEL_MIN_FONT_SIZE_PX: f32 = 8.0;

/// Offset of the outer guide label from the image corner (px)
pub const GUIDE_LABEL_OFFSET_PX: f32 = 15.0;

/// Offset of the inner guide labels from their rectangle (px)
pub const GUIDE_INNER_LABEL_OFFSET_PX: f32 = 10.0;

// =============================================================================
// Dual Panel
// =============================================================================

/// Default share of the canvas width given to the left panel (%)
pub const DEFAULT_LEFT_PERCENT: u8 = 50;

/// Default number of rule lines on the right panel
pub const DEFAULT_RULE_COUNT: u8 = 4;

/// Rule line stroke width (px at 600 dpi, scaled with resolution)
pub const RULE_LINE_WIDTH_PX: f32 = 3.0;

/// Horizontal inset of rule lines from the panel edges (mm)
pub const RULE_LINE_MARGIN_MM: f32 = 1.0;

/// Strength indicator height relative to the line height
pub const STRENGTH_HEIGHT_FACTOR: f32 = 0.8;

/// Trailing underscore width relative to the available width
pub const STRENGTH_UNDERSCORE_FACTOR: f32 = 0.35;

/// Empty lead-in relative to the available width
pub const STRENGTH_LEFT_MARGIN_FACTOR: f32 = 0.08;

/// Gap between last slash and underscore relative to the available width
pub const STRENGTH_GAP_FACTOR: f32 = 0.04;

/// Slash angle against the baseline (degrees)
pub const STRENGTH_SLASH_ANGLE_DEG: f32 = 65.0;

/// Number of slashes in the indicator
pub const STRENGTH_SLASH_COUNT: usize = 3;

// =============================================================================
// Rasterization
// =============================================================================

/// Render scale for targets larger than `RENDER_SCALE_BIG_THRESHOLD_PX`
pub const RENDER_SCALE_BIG: f32 = 1.5;

/// Render scale for targets larger than `RENDER_SCALE_MED_THRESHOLD_PX`
pub const RENDER_SCALE_MED: f32 = 2.0;

/// Render scale for small targets
pub const RENDER_SCALE_SMALL: f32 = 3.0;

/// Pixel size above which the big-target scale applies
pub const RENDER_SCALE_BIG_THRESHOLD_PX: u32 = 2000;

/// Pixel size above which the medium-target scale applies
pub const RENDER_SCALE_MED_THRESHOLD_PX: u32 = 1000;

/// Pixel buffers larger than this on either side are refused
pub const MAX_RENDER_DIMENSION_PX: u32 = 16_000;

/// Markers of real vector drawing in a template
pub const VECTOR_PRIMITIVES: [&str; 7] = [
    "<path",
    "<circle",
    "<rect",
    "<polygon",
    "<polyline",
    "<line",
    "<ellipse",
];

/// Marker of an embedded PNG payload
pub const EMBEDDED_PNG_MARKER: &str = "data:image/png;base64,";

// =============================================================================
// Batch Scheduling
// =============================================================================

/// Chunk multiplier for regular artifacts
pub const DEFAULT_CHUNK_MULTIPLIER: usize = 4;

/// Above this finished dimension, chunks shrink to two tasks per thread (mm)
pub const LARGE_ARTIFACT_THRESHOLD_MM: f32 = 90.0;

/// Above this finished dimension, chunks shrink to one task per thread (mm)
pub const VERY_LARGE_ARTIFACT_THRESHOLD_MM: f32 = 150.0;

/// Default worker count
pub const DEFAULT_THREADS: usize = 6;

/// Overhead applied to the ideal parallel duration when estimating
pub const PARALLEL_OVERHEAD_FACTOR: f64 = 1.1;

// =============================================================================
// Output Naming
// =============================================================================

/// Suffix for artifacts exported with cut guides
pub const SUFFIX_WITH_GUIDES: &str = "_mit_linien";

/// Suffix for production artifacts
pub const SUFFIX_PRINT_READY: &str = "_druckfertig";

/// Mode component of dual-panel output names
pub const DUAL_PANEL_MODE_TAG: &str = "s1_layout";

/// Prefix of single-panel blank identifiers (`BLANKO_<mode>`)
pub const BLANK_PREFIX: &str = "BLANKO_";

/// Dual-panel blank that renders nothing
pub const BLANK_DUAL_EMPTY: &str = "BLANKO_S1_LEER";

/// Dual-panel blank with rule lines on both sides
pub const BLANK_DUAL_RULED: &str = "BLANKO_S1_LINIEN";

/// Dual-panel blank with rule lines on both sides and a strength indicator
pub const BLANK_DUAL_RULED_STRENGTH: &str = "BLANKO_S1_LINIEN_STAERKE";
