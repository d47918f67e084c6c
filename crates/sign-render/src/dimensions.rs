//! Geometry of a printed artifact
//!
//! An artifact has three nested boxes. The *file* box includes the bleed,
//! the *finished* box is the trimmed size, and the *canvas* is the safe
//! area where content is placed.
//!
//! ```text
//! +--------------------------------+  file     = finished + 2 * bleed
//! |  +--------------------------+  |
//! |  |  +--------------------+  |  |  finished
//! |  |  |       canvas       |  |  |  canvas   = finished - 2 * safety
//! |  |  +--------------------+  |  |
//! |  +--------------------------+  |
//! +--------------------------------+
//! ```

use crate::constants::{DUAL_PANEL_TOLERANCE_MM, MM_PER_INCH, POINTS_PER_INCH};
use crate::types::{RenderError, Result};

/// Convert millimeters to whole pixels at `dpi`, rounding half away from zero
pub fn mm_to_px(mm: f32, dpi: u32) -> u32 {
    let px = (mm as f64 / MM_PER_INCH as f64 * dpi as f64).round();
    if px <= 0.0 { 0 } else { px as u32 }
}

/// Convert pixels at `dpi` back to millimeters
pub fn px_to_mm(px: u32, dpi: u32) -> f32 {
    if dpi == 0 {
        return 0.0;
    }
    px as f32 / dpi as f32 * MM_PER_INCH
}

/// Convert millimeters to PDF points
pub fn mm_to_pt(mm: f32) -> f32 {
    mm / MM_PER_INCH * POINTS_PER_INCH
}

/// Font pixel size for a point size at `dpi`, truncated like the rasterizer expects
pub fn pt_to_px(pt: f32, dpi: u32) -> u32 {
    (pt / POINTS_PER_INCH * dpi as f32) as u32
}

/// Width/height pair in millimeters
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SizeMm {
    pub width: f32,
    pub height: f32,
}

impl SizeMm {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn to_px(self, dpi: u32) -> SizePx {
        SizePx {
            width: mm_to_px(self.width, dpi),
            height: mm_to_px(self.height, dpi),
        }
    }
}

/// Width/height pair in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SizePx {
    pub width: u32,
    pub height: u32,
}

impl SizePx {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn max_side(self) -> u32 {
        self.width.max(self.height)
    }
}

/// All derived sizes of one artifact
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dimensions {
    pub dpi: u32,
    pub safety_mm: f32,
    pub bleed_mm: f32,
    pub finished_mm: SizeMm,
    pub canvas_mm: SizeMm,
    pub file_mm: SizeMm,
    pub finished_px: SizePx,
    pub canvas_px: SizePx,
    pub file_px: SizePx,
}

impl Dimensions {
    /// Derive canvas and file boxes from the finished size.
    ///
    /// Fails when the safety margin consumes the whole finished box or when
    /// any input is not a positive finite number.
    pub fn derive(
        finished_width_mm: f32,
        finished_height_mm: f32,
        safety_mm: f32,
        bleed_mm: f32,
        dpi: u32,
    ) -> Result<Self> {
        let all_finite = [finished_width_mm, finished_height_mm, safety_mm, bleed_mm]
            .iter()
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(RenderError::Config(
                "Dimensions must be finite numbers".to_string(),
            ));
        }
        if finished_width_mm <= 0.0 || finished_height_mm <= 0.0 {
            return Err(RenderError::Config(format!(
                "Finished size must be positive, got {finished_width_mm}x{finished_height_mm}mm"
            )));
        }
        if safety_mm < 0.0 || bleed_mm < 0.0 {
            return Err(RenderError::Config(
                "Safety margin and bleed must not be negative".to_string(),
            ));
        }
        if dpi == 0 {
            return Err(RenderError::Config("DPI must be positive".to_string()));
        }

        let canvas_mm = SizeMm::new(
            finished_width_mm - 2.0 * safety_mm,
            finished_height_mm - 2.0 * safety_mm,
        );
        if canvas_mm.width <= 0.0 || canvas_mm.height <= 0.0 {
            return Err(RenderError::Config(format!(
                "Safety margin of {safety_mm}mm leaves no canvas inside {finished_width_mm}x{finished_height_mm}mm"
            )));
        }

        let finished_mm = SizeMm::new(finished_width_mm, finished_height_mm);
        let file_mm = SizeMm::new(
            finished_width_mm + 2.0 * bleed_mm,
            finished_height_mm + 2.0 * bleed_mm,
        );

        Ok(Self {
            dpi,
            safety_mm,
            bleed_mm,
            finished_mm,
            canvas_mm,
            file_mm,
            finished_px: finished_mm.to_px(dpi),
            canvas_px: canvas_mm.to_px(dpi),
            file_px: file_mm.to_px(dpi),
        })
    }

    /// True when the finished width is twice the height
    pub fn is_dual_panel(&self) -> bool {
        is_dual_panel(self.finished_mm.width, self.finished_mm.height)
    }

    pub fn bleed_px(&self) -> u32 {
        mm_to_px(self.bleed_mm, self.dpi)
    }

    pub fn safety_px(&self) -> u32 {
        mm_to_px(self.safety_mm, self.dpi)
    }
}

/// True when `width` equals twice `height` within the dual-panel tolerance
pub fn is_dual_panel(width_mm: f32, height_mm: f32) -> bool {
    (width_mm - 2.0 * height_mm).abs() < DUAL_PANEL_TOLERANCE_MM
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mm_to_px_rounds() {
        assert_eq!(mm_to_px(25.4, 600), 600);
        assert_eq!(mm_to_px(39.0, 600), 921);
        assert_eq!(mm_to_px(45.0, 600), 1063);
        assert_eq!(mm_to_px(51.0, 600), 1205);
        assert_eq!(mm_to_px(0.0, 600), 0);
    }

    #[test]
    fn test_px_to_mm() {
        assert!((px_to_mm(600, 600) - 25.4).abs() < 1e-4);
        assert_eq!(px_to_mm(100, 0), 0.0);
    }

    #[test]
    fn test_derive_default_artifact() {
        let dims = Dimensions::derive(45.0, 45.0, 3.0, 3.0, 600).unwrap();
        assert_eq!(dims.canvas_mm, SizeMm::new(39.0, 39.0));
        assert_eq!(dims.file_mm, SizeMm::new(51.0, 51.0));
        assert_eq!(dims.canvas_px, SizePx::new(921, 921));
        assert_eq!(dims.finished_px, SizePx::new(1063, 1063));
        assert_eq!(dims.file_px, SizePx::new(1205, 1205));
        assert!(!dims.is_dual_panel());
    }

    #[test]
    fn test_derive_rejects_oversized_safety() {
        match Dimensions::derive(10.0, 10.0, 5.0, 3.0, 600) {
            Err(RenderError::Config(msg)) => assert!(msg.contains("no canvas")),
            _ => panic!("Expected Config error"),
        }
    }

    #[test]
    fn test_derive_rejects_zero_dpi() {
        assert!(Dimensions::derive(45.0, 45.0, 3.0, 3.0, 0).is_err());
    }

    #[test]
    fn test_dual_panel_detection() {
        assert!(is_dual_panel(90.0, 45.0));
        assert!(is_dual_panel(90.05, 45.0));
        assert!(!is_dual_panel(90.2, 45.0));
        assert!(!is_dual_panel(45.0, 45.0));
    }

    #[test]
    fn test_pt_to_px() {
        assert_eq!(pt_to_px(8.0, 600), 66);
        assert_eq!(pt_to_px(12.0, 300), 50);
    }
}
