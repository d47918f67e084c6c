use sign_render::{RenderError, SizeMm};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("Render error: {0}")]
    Render(#[from] RenderError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
    #[error("No artifacts to place")]
    NoArtifacts,
}

pub type Result<T> = std::result::Result<T, DocumentError>;

/// Page orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl Orientation {
    pub fn name(self) -> &'static str {
        match self {
            Orientation::Portrait => "Hochformat",
            Orientation::Landscape => "Querformat",
        }
    }
}

/// Paper size of cut-sheets
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PaperSize {
    #[default]
    A4,
    A3,
    Custom { width_mm: f32, height_mm: f32 },
}

impl PaperSize {
    /// Portrait dimensions (width < height for standard sizes)
    pub fn dimensions_mm(self) -> (f32, f32) {
        match self {
            PaperSize::A4 => (210.0, 297.0),
            PaperSize::A3 => (297.0, 420.0),
            PaperSize::Custom {
                width_mm,
                height_mm,
            } => (width_mm, height_mm),
        }
    }

    pub fn oriented(self, orientation: Orientation) -> SizeMm {
        let (w, h) = self.dimensions_mm();
        let (short, long) = (w.min(h), w.max(h));
        match orientation {
            Orientation::Portrait => SizeMm::new(short, long),
            Orientation::Landscape => SizeMm::new(long, short),
        }
    }
}

/// What a document contains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DocumentKind {
    /// One artifact per page, page size = file size
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "einzelzeichen"))]
    PerPage,
    /// Finished-size artifacts in a grid on paper pages
    #[cfg_attr(feature = "serde", serde(rename = "schnittbogen"))]
    CutSheet,
}

impl DocumentKind {
    /// Name used in document file names and titles
    pub fn name(self) -> &'static str {
        match self {
            DocumentKind::PerPage => "Einzelzeichen",
            DocumentKind::CutSheet => "Schnittbogen",
        }
    }
}
