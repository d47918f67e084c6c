//! Page geometry and document defaults

/// Points per millimeter (1 inch = 72 points = 25.4mm)
pub const POINTS_PER_MM: f32 = 72.0 / 25.4;

#[inline]
pub fn mm_to_pt(mm: f32) -> f32 {
    mm * POINTS_PER_MM
}

#[inline]
pub fn pt_to_mm(pt: f32) -> f32 {
    pt / POINTS_PER_MM
}

// =============================================================================
// Cut-sheets
// =============================================================================

/// Default left/right page margin
pub const DEFAULT_MARGIN_HORIZONTAL_MM: f32 = 10.0;

/// Default top/bottom page margin
pub const DEFAULT_MARGIN_VERTICAL_MM: f32 = 10.0;

/// Stroke width of trim and safety rectangles
pub const CUT_LINE_WIDTH_PT: f32 = 0.5;

pub const TRIM_LINE_RGB: [f32; 3] = [0.0, 0.0, 1.0];

pub const SAFETY_LINE_RGB: [f32; 3] = [0.0, 1.0, 0.0];

// =============================================================================
// Print hint
// =============================================================================

pub const PRINT_HINT: &str =
    "WICHTIG: In Druckeinstellungen 'Tatsächliche Größe' (100%) wählen - NICHT skalieren!";

pub const PRINT_HINT_FONT_SIZE_PT: f32 = 8.0;

pub const PRINT_HINT_GRAY: f32 = 0.5;

/// Distance of the hint baseline from the top and bottom page edges
pub const PRINT_HINT_EDGE_MM: f32 = 8.0;

/// Average Helvetica glyph width relative to the font size
pub const HELVETICA_CHAR_WIDTH_RATIO: f32 = 0.5;

// =============================================================================
// Splitting
// =============================================================================

/// Artifacts per one-per-page document
pub const DEFAULT_ARTIFACTS_PER_FILE: usize = 100;

/// Pages per cut-sheet document
pub const DEFAULT_PAGES_PER_FILE: usize = 50;

/// A trailing document with fewer pages is merged into the previous one
pub const MIN_LAST_FILE_PAGES: usize = 10;

pub const EXPORT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

// =============================================================================
// Metadata
// =============================================================================

pub const PROGRAM_NAME: &str = "Taktische Zeichen Generator";

pub const DOCUMENT_TITLE_PREFIX: &str = "Taktische Zeichen";
