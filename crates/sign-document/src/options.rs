use crate::constants::*;
use crate::types::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Document assembly configuration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct DocumentOptions {
    pub kind: DocumentKind,

    // Cut-sheet page
    pub paper: PaperSize,
    pub margin_horizontal_mm: f32,
    pub margin_vertical_mm: f32,

    // Splitting
    /// Artifacts per one-per-page document
    pub artifacts_per_file: usize,
    /// Pages per cut-sheet document
    pub pages_per_file: usize,
    pub min_last_file_pages: usize,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            kind: DocumentKind::PerPage,
            paper: PaperSize::A4,
            margin_horizontal_mm: DEFAULT_MARGIN_HORIZONTAL_MM,
            margin_vertical_mm: DEFAULT_MARGIN_VERTICAL_MM,
            artifacts_per_file: DEFAULT_ARTIFACTS_PER_FILE,
            pages_per_file: DEFAULT_PAGES_PER_FILE,
            min_last_file_pages: MIN_LAST_FILE_PAGES,
        }
    }
}

impl DocumentOptions {
    pub fn cut_sheet() -> Self {
        Self {
            kind: DocumentKind::CutSheet,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("Horizontal margin", self.margin_horizontal_mm),
            ("Vertical margin", self.margin_vertical_mm),
        ] {
            if !(0.0..=50.0).contains(&value) {
                return Err(DocumentError::Config(format!(
                    "{name} must be between 0 and 50mm, got {value}mm"
                )));
            }
        }
        if self.artifacts_per_file == 0 || self.pages_per_file == 0 {
            return Err(DocumentError::Config(
                "Documents must hold at least one page".to_string(),
            ));
        }
        let (width_mm, height_mm) = self.paper.dimensions_mm();
        if width_mm <= 0.0 || height_mm <= 0.0 {
            return Err(DocumentError::Config(format!(
                "Paper size must be positive, got {width_mm}x{height_mm}mm"
            )));
        }
        Ok(())
    }
}
